//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, sodass der Client ohne Konfigurationsdatei startet.

use hubcrypt_core::{HubcryptError, Result};
use hubcrypt_crypto::{CryptoResult, FallbackPolicy, KeyStrategy, PBKDF2_STANDARD_ITERATIONEN};
use hubcrypt_observability::{log_format_gueltig, log_level_gueltig};
use hubcrypt_realtime::HubConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Negotiate, Benutzername und Zeitlimits
    pub verbindung: VerbindungsEinstellungen,
    /// Fallback-Policy und optionaler Passphrase-Modus
    pub krypto: KryptoEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// Verbindungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    /// Negotiate-Endpunkt (http/https)
    pub negotiate_url: String,
    /// Benutzername im Chat (Standard: `rust-<millis>`)
    pub benutzername: String,
    /// Benutzername als `username` Query an die Hub-URL haengen
    pub username_als_query: bool,
    pub keepalive_sek: u64,
    pub server_timeout_sek: u64,
    pub http_connect_timeout_sek: u64,
    pub http_timeout_sek: u64,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            negotiate_url: "http://127.0.0.1:5242/negotiate".into(),
            benutzername: format!("rust-{}", chrono::Utc::now().timestamp_millis()),
            username_als_query: true,
            keepalive_sek: 15,
            server_timeout_sek: 30,
            http_connect_timeout_sek: 20,
            http_timeout_sek: 30,
        }
    }
}

/// Verhalten wenn noch kein Peer-Schluessel existiert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackEinstellung {
    #[default]
    Deny,
    LegacyPlaintext,
}

/// Krypto-Einstellungen
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KryptoEinstellungen {
    pub fallback: FallbackEinstellung,
    /// Gesetzt = Passphrase-Modus (ein Raum-Schluessel statt ECDH pro Peer)
    pub passphrase: Option<String>,
    /// Raum-ID fuer den Passphrase-Modus
    pub raum: Option<String>,
    pub pbkdf2_iterationen: u32,
}

impl Default for KryptoEinstellungen {
    fn default() -> Self {
        Self {
            fallback: FallbackEinstellung::Deny,
            passphrase: None,
            raum: None,
            pbkdf2_iterationen: PBKDF2_STANDARD_ITERATIONEN,
        }
    }
}

impl std::fmt::Debug for KryptoEinstellungen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KryptoEinstellungen")
            .field("fallback", &self.fallback)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("raum", &self.raum)
            .field("pbkdf2_iterationen", &self.pbkdf2_iterationen)
            .finish()
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| HubcryptError::Konfiguration(format!("Fehler in '{pfad}': {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(HubcryptError::Konfiguration(format!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            ))),
        }
    }

    pub fn aus_toml(inhalt: &str) -> Result<Self> {
        toml::from_str(inhalt).map_err(|e| HubcryptError::Konfiguration(e.to_string()))
    }

    /// Prueft die Konfiguration auf offensichtliche Fehler
    pub fn validieren(&self) -> Result<()> {
        let v = &self.verbindung;
        let url = url::Url::parse(&v.negotiate_url).map_err(|e| {
            HubcryptError::Konfiguration(format!("negotiate_url '{}': {}", v.negotiate_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HubcryptError::Konfiguration(format!(
                "negotiate_url braucht http oder https, nicht '{}'",
                url.scheme()
            )));
        }
        if v.benutzername.trim().is_empty() {
            return Err(HubcryptError::Konfiguration("benutzername ist leer".into()));
        }
        if v.keepalive_sek == 0 || v.server_timeout_sek == 0 {
            return Err(HubcryptError::Konfiguration(
                "keepalive_sek und server_timeout_sek muessen groesser 0 sein".into(),
            ));
        }

        let k = &self.krypto;
        if k.passphrase.is_some() && k.raum.as_deref().map_or(true, |r| r.trim().is_empty()) {
            return Err(HubcryptError::Konfiguration(
                "passphrase gesetzt, aber kein raum angegeben".into(),
            ));
        }
        if k.pbkdf2_iterationen == 0 {
            return Err(HubcryptError::Konfiguration(
                "pbkdf2_iterationen muss groesser 0 sein".into(),
            ));
        }

        if !log_level_gueltig(&self.logging.level) {
            return Err(HubcryptError::Konfiguration(format!(
                "Unbekanntes Log-Level '{}'",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(HubcryptError::Konfiguration(format!(
                "Unbekanntes Log-Format '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Parameter fuer die Hub-Verbindung
    pub fn hub_config(&self) -> HubConfig {
        let v = &self.verbindung;
        HubConfig {
            negotiate_url: v.negotiate_url.clone(),
            username: Some(v.benutzername.clone()),
            username_als_query: v.username_als_query,
            keepalive: Duration::from_secs(v.keepalive_sek),
            server_timeout: Duration::from_secs(v.server_timeout_sek),
            http_connect_timeout: Duration::from_secs(v.http_connect_timeout_sek),
            http_timeout: Duration::from_secs(v.http_timeout_sek),
        }
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        match self.krypto.fallback {
            FallbackEinstellung::Deny => FallbackPolicy::Deny,
            FallbackEinstellung::LegacyPlaintext => FallbackPolicy::LegacyPlaintext,
        }
    }

    /// Schluessel-Strategie: Passphrase falls konfiguriert, sonst ECDH pro Peer
    pub fn key_strategy(&self) -> CryptoResult<KeyStrategy> {
        match (&self.krypto.passphrase, &self.krypto.raum) {
            (Some(passphrase), Some(raum)) => {
                KeyStrategy::passphrase(passphrase, raum, self.krypto.pbkdf2_iterationen)
            }
            _ => Ok(KeyStrategy::PerPeerEcdh),
        }
    }
}
