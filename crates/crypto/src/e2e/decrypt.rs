//! AES-256-GCM Entschluesselung
//!
//! Jeder Fehler (falscher Schluessel, manipuliertes Chiffrat, kaputter IV)
//! wird als `CryptoError::AuthenticationFailure` gemeldet, damit Aufrufer ihn
//! von "noch kein Schluessel" unterscheiden koennen.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce as AesNonce,
};

use crate::error::{CryptoError, CryptoResult};
use crate::types::{EncryptedPayload, SymmetricKey, IV_LAENGE, TAG_LAENGE};

/// Entschluesselt ein Chiffrat (inkl. angehaengtem Tag)
pub fn decrypt(
    key: &SymmetricKey,
    iv: &[u8],
    ciphertext: &[u8],
    aad: Option<&[u8]>,
) -> CryptoResult<Vec<u8>> {
    if iv.len() != IV_LAENGE || ciphertext.len() < TAG_LAENGE {
        return Err(CryptoError::AuthenticationFailure);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let payload = Payload {
        msg: ciphertext,
        aad: aad.unwrap_or_default(),
    };

    cipher
        .decrypt(AesNonce::from_slice(iv), payload)
        .map_err(|_| CryptoError::AuthenticationFailure)
}

/// Entschluesselt einen `EncryptedPayload`
pub fn decrypt_payload(
    key: &SymmetricKey,
    payload: &EncryptedPayload,
    aad: Option<&[u8]>,
) -> CryptoResult<Vec<u8>> {
    decrypt(key, payload.iv.as_bytes(), &payload.ciphertext, aad)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
