//! hubcrypt-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! hubcrypt-Crates gemeinsam genutzt werden.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{HubcryptError, Result};
pub use event::ChatEvent;
pub use types::PeerId;
