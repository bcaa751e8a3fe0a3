//! Gemeinsame Typen fuer das Kryptografie-Subsystem

/// Laenge eines AES-256 Schluessels in Bytes
pub const SCHLUESSEL_LAENGE: usize = 32;

/// Laenge des GCM-IV in Bytes (96 Bit)
pub const IV_LAENGE: usize = 12;

/// Laenge des GCM Auth-Tags in Bytes (128 Bit)
pub const TAG_LAENGE: usize = 16;

/// Symmetrischer 256-Bit Schluessel (wird beim Drop genullt)
///
/// Sowohl der ECDH-Pfad als auch der Passphrase-Pfad liefern diesen Typ.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; SCHLUESSEL_LAENGE]);

impl SymmetricKey {
    pub fn new(bytes: [u8; SCHLUESSEL_LAENGE]) -> Self {
        Self(bytes)
    }

    /// Erstellt einen Schluessel aus einem Slice (muss genau 32 Bytes lang sein)
    pub fn from_slice(bytes: &[u8]) -> crate::error::CryptoResult<Self> {
        let arr: [u8; SCHLUESSEL_LAENGE] =
            bytes
                .try_into()
                .map_err(|_| crate::error::CryptoError::UngueltigeSchluesselLaenge {
                    erwartet: SCHLUESSEL_LAENGE,
                    erhalten: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SCHLUESSEL_LAENGE] {
        &self.0
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey([REDACTED] {} bytes)", SCHLUESSEL_LAENGE)
    }
}

/// GCM Initialisierungsvektor (frisch pro Verschluesselung)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iv(pub [u8; IV_LAENGE]);

impl Iv {
    pub fn as_bytes(&self) -> &[u8; IV_LAENGE] {
        &self.0
    }
}

/// Verschluesselter Payload (IV + Ciphertext inkl. Auth-Tag)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub iv: Iv,
    /// Chiffrat mit angehaengtem 16-Byte Tag
    pub ciphertext: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
