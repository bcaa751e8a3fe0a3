//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Oeffentlicher Schluessel nicht lesbar (kein SPKI DER, falsche Kurve, kein Kurvenpunkt)
    #[error("Ungueltiges Schluesselformat: {0}")]
    KeyFormat(String),

    /// GCM-Tag stimmt nicht (falscher Schluessel, manipuliert oder IV/Chiffrat defekt)
    #[error("Authentifizierung fehlgeschlagen: Chiffrat manipuliert oder falscher Schluessel")]
    AuthenticationFailure,

    /// Verschluesselung fuer einen Peer ohne gespeicherten Schluessel
    #[error("Kein gemeinsamer Schluessel mit {peer}")]
    NoSharedKey { peer: String },

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Key Derivation fehlgeschlagen: {0}")]
    KeyDerivation(String),

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Klartext ist kein gueltiges UTF-8")]
    KeinUtf8,

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] hubcrypt_protocol::ProtocolError),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl CryptoError {
    /// Gibt true zurueck wenn der Fehler auf einen manipulierten oder falsch
    /// verschluesselten Payload hinweist (im Gegensatz zu "noch kein Schluessel")
    pub fn ist_authentifizierungsfehler(&self) -> bool {
        matches!(self, Self::AuthenticationFailure)
    }
}

impl From<CryptoError> for hubcrypt_core::HubcryptError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::NoSharedKey { peer } => hubcrypt_core::HubcryptError::KeinSchluessel(peer),
            CryptoError::Protokoll(p) => p.into(),
            other => hubcrypt_core::HubcryptError::Krypto(other.to_string()),
        }
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
