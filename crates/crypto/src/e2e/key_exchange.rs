//! P-256 ECDH Schluesselvereinbarung
//!
//! Jeder Peer kuendigt seinen oeffentlichen Schluessel (SPKI DER) an. Aus dem
//! eigenen privaten Schluessel und dem Schluessel des Peers wird per ECDH ein
//! rohes Shared Secret berechnet und per HKDF-SHA256 zu einem AES-256
//! Schluessel erweitert:
//!
//! ```text
//! prk = HMAC-SHA256(salt = 32 x 0x00, ecdh_secret)
//! key = HMAC-SHA256(prk, "chatapp-ecdh" || 0x01)[..32]
//! ```
//!
//! Salt und Info sind fest, damit bestehende Gegenstellen byte-identische
//! Schluessel ableiten.

use hkdf::Hkdf;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::error::{CryptoError, CryptoResult};
use crate::types::{SymmetricKey, SCHLUESSEL_LAENGE};

/// Fester HKDF-Salt der ECDH-Ableitung (32 Null-Bytes)
pub const ECDH_HKDF_SALT: [u8; 32] = [0u8; 32];

/// Fester HKDF-Info-String der ECDH-Ableitung
pub const ECDH_HKDF_INFO: &[u8] = b"chatapp-ecdh";

/// Parameter fuer den HKDF-Schritt nach dem ECDH
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HkdfParams<'a> {
    pub salt: &'a [u8],
    pub info: &'a [u8],
}

impl HkdfParams<'static> {
    /// Aktuelle Protokoll-Parameter
    pub const ECDH_STANDARD: HkdfParams<'static> = HkdfParams {
        salt: &ECDH_HKDF_SALT,
        info: ECDH_HKDF_INFO,
    };
}

impl Default for HkdfParams<'static> {
    fn default() -> Self {
        Self::ECDH_STANDARD
    }
}

/// Erzeugt ein neues P-256 Schluessel-Paar
pub fn generate_identity_keypair() -> (SecretKey, PublicKey) {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key();
    (secret, public)
}

/// Exportiert einen oeffentlichen Schluessel als X.509 SubjectPublicKeyInfo (DER)
pub fn export_public_key(public_key: &PublicKey) -> CryptoResult<Vec<u8>> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyFormat(format!("SPKI Export: {}", e)))?;
    Ok(der.as_bytes().to_vec())
}

/// Importiert einen oeffentlichen Schluessel aus SPKI DER
///
/// Schlaegt mit `KeyFormat` fehl bei kaputtem DER, falscher Kurve oder
/// einem Punkt der nicht auf P-256 liegt.
pub fn import_public_key(der: &[u8]) -> CryptoResult<PublicKey> {
    PublicKey::from_public_key_der(der).map_err(|e| CryptoError::KeyFormat(e.to_string()))
}

/// Leitet den gemeinsamen AES-256 Schluessel mit den Standard-Parametern ab
///
/// Symmetrisch: `derive_shared_key(a, B) == derive_shared_key(b, A)`.
pub fn derive_shared_key(my_secret: &SecretKey, peer: &PublicKey) -> CryptoResult<SymmetricKey> {
    derive_shared_key_with(my_secret, peer, &HkdfParams::ECDH_STANDARD)
}

/// Leitet den gemeinsamen Schluessel mit expliziten HKDF-Parametern ab
pub fn derive_shared_key_with(
    my_secret: &SecretKey,
    peer: &PublicKey,
    params: &HkdfParams<'_>,
) -> CryptoResult<SymmetricKey> {
    let shared = p256::ecdh::diffie_hellman(my_secret.to_nonzero_scalar(), peer.as_affine());
    let okm = hkdf_derive(
        shared.raw_secret_bytes().as_slice(),
        params.salt,
        params.info,
        SCHLUESSEL_LAENGE,
    )?;
    SymmetricKey::from_slice(&okm)
}

/// HKDF-basierte Key Derivation (allgemein verwendbar)
pub fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8], len: usize) -> CryptoResult<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(okm)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
