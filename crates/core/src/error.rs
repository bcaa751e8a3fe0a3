//! Fehlertypen fuer hubcrypt
//!
//! Zentraler Fehler-Enum. Die einzelnen Crates definieren eigene Fehler
//! und konvertieren via `From` in diesen Typ.

use thiserror::Error;

/// Globaler Result-Alias fuer hubcrypt
pub type Result<T> = std::result::Result<T, HubcryptError>;

/// Alle moeglichen Fehler im hubcrypt-System
#[derive(Debug, Error)]
pub enum HubcryptError {
    // --- Verbindung & Netzwerk ---
    #[error("Negotiate fehlgeschlagen: {0}")]
    Negotiate(String),

    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Nicht verbunden")]
    NichtVerbunden,

    // --- Kryptografie ---
    #[error("Kryptografie-Fehler: {0}")]
    Krypto(String),

    #[error("Kein gemeinsamer Schluessel mit {0}")]
    KeinSchluessel(String),

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl HubcryptError {
    /// Gibt true zurueck wenn ein erneuter Versuch durch den Aufrufer sinnvoll sein koennte
    ///
    /// Negotiate-Fehler zaehlen nicht dazu: sie beenden den Verbindungsversuch.
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::Verbindung(_) | Self::NichtVerbunden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = HubcryptError::KeinSchluessel("carol".into());
        assert_eq!(e.to_string(), "Kein gemeinsamer Schluessel mit carol");
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(HubcryptError::Verbindung("reset".into()).ist_wiederholbar());
        assert!(!HubcryptError::Negotiate("HTTP 500".into()).ist_wiederholbar());
        assert!(!HubcryptError::Krypto("tag".into()).ist_wiederholbar());
    }
}
