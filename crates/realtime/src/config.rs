//! Parameter fuer Negotiate und Hub-Verbindung

use std::time::Duration;

/// Konfiguration einer `HubConnection`
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Negotiate-Endpunkt (HTTP GET)
    pub negotiate_url: String,
    /// Benutzername, wird bei Bedarf als `username` Query angehaengt
    pub username: Option<String>,
    pub username_als_query: bool,
    /// Intervall fuer Keepalive-Pings an den Hub
    pub keepalive: Duration,
    /// Verbindung gilt als beendet wenn so lange nichts ankommt
    pub server_timeout: Duration,
    /// Zeitlimits nur fuer den Negotiate-Aufruf
    pub http_connect_timeout: Duration,
    pub http_timeout: Duration,
}

impl HubConfig {
    pub fn neu(negotiate_url: impl Into<String>) -> Self {
        Self {
            negotiate_url: negotiate_url.into(),
            ..Self::default()
        }
    }

    pub fn mit_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            negotiate_url: "http://127.0.0.1:5242/negotiate".to_string(),
            username: None,
            username_als_query: true,
            keepalive: Duration::from_secs(15),
            server_timeout: Duration::from_secs(30),
            http_connect_timeout: Duration::from_secs(20),
            http_timeout: Duration::from_secs(30),
        }
    }
}
