//! Gemeinsame Identifikationstypen fuer hubcrypt
//!
//! Peers werden ueber ihren Benutzernamen identifiziert. Das Newtype-Pattern
//! verhindert Verwechslungen mit beliebigen anderen Strings (Klartext,
//! Base64-Daten, Methodennamen).

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Eindeutige Peer-ID (Benutzername im Chat)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Erstellt eine PeerId aus einem Benutzernamen
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Gibt den Benutzernamen zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PeerId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for PeerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
