//! # hubcrypt-crypto
//!
//! Ende-zu-Ende Verschluesselung fuer hubcrypt.
//!
//! ## Module
//! - `e2e` - Schluesselvereinbarung, Verschluesselung, Peer-Schluessel, Sitzungs-Fassade
//! - `identity` - P-256 Schluessel-Paar der laufenden Sitzung
//! - `types` - Gemeinsame Typen (SymmetricKey, Iv, EncryptedPayload)
//! - `error` - Fehlertypen

pub mod e2e;
pub mod error;
pub mod identity;
pub mod types;

// Bequeme Re-Exports
pub use error::{CryptoError, CryptoResult};
pub use identity::Identity;
pub use types::{EncryptedPayload, Iv, SymmetricKey};

pub use e2e::{
    decrypt, derive_passphrase_key, derive_shared_key, derive_shared_key_with, encrypt,
    export_public_key, generate_identity_keypair, hkdf_derive, import_public_key, FallbackPolicy,
    HkdfParams, Incoming, KeyStrategy, Outgoing, PeerKeyStore, SchluesselStatus, SessionCrypto,
    PBKDF2_STANDARD_ITERATIONEN,
};
