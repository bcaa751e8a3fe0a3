//! Passphrase-basierter Raum-Schluessel (optional)
//!
//! Unabhaengig von Identity und ECDH: alle Teilnehmer eines Raums mit der
//! gleichen Passphrase leiten den gleichen Schluessel ab.
//!
//! ```text
//! salt = SHA-256("chat:" || raum_id)
//! key  = PBKDF2-HMAC-SHA256(passphrase, salt, iterationen, 32 Bytes)
//! ```

use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};
use crate::types::{SymmetricKey, SCHLUESSEL_LAENGE};

/// Standard-Anzahl der PBKDF2-Iterationen
pub const PBKDF2_STANDARD_ITERATIONEN: u32 = 150_000;

const SALT_PRAEFIX: &[u8] = b"chat:";

/// Leitet einen Raum-Schluessel aus Passphrase und Raum-ID ab
pub fn derive_passphrase_key(
    passphrase: &str,
    room_id: &str,
    iterationen: u32,
) -> CryptoResult<SymmetricKey> {
    if iterationen == 0 {
        return Err(CryptoError::KeyDerivation(
            "PBKDF2 braucht mindestens eine Iteration".to_string(),
        ));
    }

    let mut hasher = Sha256::new();
    hasher.update(SALT_PRAEFIX);
    hasher.update(room_id.as_bytes());
    let salt = hasher.finalize();

    let mut key = [0u8; SCHLUESSEL_LAENGE];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), &salt, iterationen, &mut key);
    let result = SymmetricKey::new(key);
    key.iter_mut().for_each(|b| *b = 0);
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
