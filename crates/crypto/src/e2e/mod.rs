//! E2E Verschluesselung (End-to-End)
//!
//! Client <-> Client Verschluesselung. Der Hub leitet Umschlaege blind weiter
//! und kann den Inhalt nicht entschluesseln.
//!
//! ## Ablauf
//! 1. Jeder Client erzeugt beim Start eine `Identity` (P-256)
//! 2. Beim Verbinden: eigene `PublicKeyAnnouncement` senden
//! 3. Eingehende Ankuendigung: ECDH + HKDF, Schluessel im `PeerKeyStore`
//! 4. Senden: AES-256-GCM einmal pro bekanntem Peer
//! 5. Ohne Peer: `FallbackPolicy` entscheidet (verwerfen oder Klartext)

pub mod decrypt;
pub mod encrypt;
pub mod key_exchange;
pub mod key_store;
pub mod passphrase;
pub mod session;

pub use decrypt::{decrypt, decrypt_payload};
pub use encrypt::encrypt;
pub use key_exchange::{
    derive_shared_key, derive_shared_key_with, export_public_key, generate_identity_keypair,
    hkdf_derive, import_public_key, HkdfParams, ECDH_HKDF_INFO, ECDH_HKDF_SALT,
};
pub use key_store::PeerKeyStore;
pub use passphrase::{derive_passphrase_key, PBKDF2_STANDARD_ITERATIONEN};
pub use session::{
    FallbackPolicy, Incoming, KeyStrategy, Outgoing, SchluesselStatus, SessionCrypto,
};
