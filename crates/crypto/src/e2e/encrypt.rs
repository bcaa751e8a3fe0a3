//! AES-256-GCM Verschluesselung
//!
//! ## Format
//! ```text
//! iv:         12 Bytes, zufaellig pro Aufruf
//! ciphertext: [verschluesselte Daten] [auth_tag(16)]
//! ```
//!
//! Im Pro-Peer-Pfad wird kein AAD verwendet, der Passphrase-Pfad bindet die
//! Raum-ID als AAD an das Chiffrat.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce as AesNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::types::{EncryptedPayload, Iv, SymmetricKey, IV_LAENGE};

/// Verschluesselt einen Klartext mit einem frischen Zufalls-IV
///
/// # Parameter
/// - `key`: 256-Bit Schluessel (Peer- oder Raum-Schluessel)
/// - `plaintext`: beliebige Laenge, auch leer
/// - `aad`: optionale assoziierte Daten (werden authentifiziert, nicht verschluesselt)
pub fn encrypt(
    key: &SymmetricKey,
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> CryptoResult<EncryptedPayload> {
    let mut iv = [0u8; IV_LAENGE];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let payload = Payload {
        msg: plaintext,
        aad: aad.unwrap_or_default(),
    };

    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(&iv), payload)
        .map_err(|e| CryptoError::Verschluesselung(format!("AES-256-GCM: {}", e)))?;

    Ok(EncryptedPayload {
        iv: Iv(iv),
        ciphertext,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TAG_LAENGE;

    fn test_key() -> SymmetricKey {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        SymmetricKey::new(bytes)
    }

    #[test]
    fn chiffrat_enthaelt_tag() {
        let key = test_key();
        let payload = encrypt(&key, b"hallo", None).unwrap();
        assert_eq!(payload.ciphertext.len(), 5 + TAG_LAENGE);
        assert_ne!(&payload.ciphertext[..5], b"hallo");
    }

    #[test]
    fn leerer_klartext_ist_erlaubt() {
        let key = test_key();
        let payload = encrypt(&key, b"", None).unwrap();
        assert_eq!(payload.ciphertext.len(), TAG_LAENGE);
    }

    #[test]
    fn gleicher_klartext_ergibt_verschiedene_ivs() {
        let key = test_key();
        let a = encrypt(&key, b"gleich", None).unwrap();
        let b = encrypt(&key, b"gleich", None).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
