//! # hubcrypt-observability
//!
//! Structured Logging via tracing-subscriber (Text oder JSON auf stderr).
//! stdout bleibt frei fuer die Chat-Anzeige.

pub mod logging;

pub use logging::{
    log_format_gueltig, log_level_gueltig, logging_initialisieren, LogFormat, LoggingError,
    ENV_LOG_FORMAT, ENV_LOG_LEVEL,
};
