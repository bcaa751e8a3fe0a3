//! Fehlertypen fuer das Wire-Format

use thiserror::Error;

/// Fehler beim Kodieren oder Dekodieren von Nachrichten
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("Record zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    RecordZuGross { groesse: usize, maximum: usize },

    #[error("Record ist kein gueltiges UTF-8")]
    KeinUtf8,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProtocolError> for hubcrypt_core::HubcryptError {
    fn from(e: ProtocolError) -> Self {
        hubcrypt_core::HubcryptError::UngueltigeNachricht(e.to_string())
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
