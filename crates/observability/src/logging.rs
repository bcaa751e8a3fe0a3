//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfiguration):
//! - `HC_LOG_LEVEL`: Filter (trace/debug/info/warn/error oder EnvFilter-Direktiven)
//! - `HC_LOG_FORMAT`: Format (text/json)
//!
//! Klartext-Zustellungen tragen das Feld `unverschluesselt = true` und lassen
//! sich so im JSON-Log gezielt herausfiltern.

use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "HC_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "HC_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Ungueltiges Log-Format: {0} (erlaubt: text, json)")]
    UngueltigesFormat(String),

    #[error("Logging bereits initialisiert: {0}")]
    BereitsInitialisiert(String),
}

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anderes => Err(LoggingError::UngueltigesFormat(anderes.to_string())),
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `HC_LOG_LEVEL` und `HC_LOG_FORMAT` ueberschreiben die uebergebenen Werte.
/// Ein ungueltiger Filter faellt auf `info` zurueck.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format: LogFormat = wert_aus_env(ENV_LOG_FORMAT, format).parse()?;

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init(),
    };
    ergebnis.map_err(|e| LoggingError::BereitsInitialisiert(e.to_string()))
}

fn wert_aus_env(name: &str, fallback: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| fallback.to_string())
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    LogFormat::from_str(format).is_ok()
}
