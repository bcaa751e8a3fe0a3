//! Fehlertypen fuer den Echtzeit-Kanal

use hubcrypt_protocol::ProtocolError;
use thiserror::Error;

use crate::state::ChannelState;

/// Fehlertyp fuer Negotiate und Hub-Verbindung
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Negotiate fehlgeschlagen (HTTP-Status, leere Antwort, fehlende Felder)
    #[error("Negotiate fehlgeschlagen: {0}")]
    NegotiationFailure(String),

    /// Verbindungsaufbau, Senden oder Schliessen fehlgeschlagen
    #[error("Transportfehler: {0}")]
    Transport(String),

    /// Hub hat den Handshake abgelehnt oder nicht beantwortet
    #[error("Handshake fehlgeschlagen: {0}")]
    Handshake(String),

    /// Senden ausserhalb des Zustands `Connected`
    #[error("Nicht verbunden")]
    NotConnected,

    /// Operation im aktuellen Zustand nicht erlaubt
    #[error("Ungueltiger Zustand: {0}")]
    UngueltigerZustand(ChannelState),

    #[error("Ungueltige URL: {0}")]
    UngueltigeUrl(String),

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<url::ParseError> for RealtimeError {
    fn from(e: url::ParseError) -> Self {
        Self::UngueltigeUrl(e.to_string())
    }
}

impl From<RealtimeError> for hubcrypt_core::HubcryptError {
    fn from(e: RealtimeError) -> Self {
        match e {
            RealtimeError::NegotiationFailure(msg) => hubcrypt_core::HubcryptError::Negotiate(msg),
            RealtimeError::NotConnected => hubcrypt_core::HubcryptError::NichtVerbunden,
            RealtimeError::Protokoll(p) => p.into(),
            other => hubcrypt_core::HubcryptError::Verbindung(other.to_string()),
        }
    }
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
