//! hubcrypt-protocol – Wire-Format-Definitionen
//!
//! Dieses Crate definiert alle Nachrichten die ueber den Echtzeit-Kanal
//! ausgetauscht werden:
//! - `envelope` – Schluessel-Ankuendigung, Chiffrat-Umschlag, Klartext-Altformat
//! - `hub` – JSON-Hub-Protokoll (Handshake, Invocation, Ping, Close)
//! - `wire` – Record-Separator-Framing (0x1E) als tokio-util Codec

pub mod envelope;
pub mod error;
pub mod hub;
pub mod wire;

pub use envelope::{
    argument_als_json, CipherEnvelope, EnvelopeKind, LegacyPlainEnvelope, PublicKeyAnnouncement,
    ALGORITHMUS_EC_P256,
};
pub use error::{ProtocolError, ProtocolResult};
pub use hub::{methoden, HandshakeRequest, HandshakeResponse, HubMessage};
pub use wire::{RecordCodec, RECORD_SEPARATOR};
