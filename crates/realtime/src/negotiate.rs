//! Negotiate: Endpoint-URL und Access-Token per HTTP GET
//!
//! ```text
//! GET <negotiate_url>  ->  200 {"url": "...", "accessToken": "..."}
//! ```
//!
//! Jede andere Antwort (Status, leerer Body, fehlende Felder) ist ein
//! `NegotiationFailure`. Es wird nicht wiederholt.

use serde::Deserialize;
use url::Url;

use crate::config::HubConfig;
use crate::error::{RealtimeError, RealtimeResult};

/// Ergebnis eines erfolgreichen Negotiate
#[derive(Clone, PartialEq, Eq)]
pub struct NegotiateResponse {
    /// Hub-Endpunkt (http/https oder ws/wss)
    pub url: String,
    /// Kurzlebiges Bearer-Token fuer den Hub
    pub access_token: String,
}

impl std::fmt::Debug for NegotiateResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiateResponse")
            .field("url", &self.url)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RohAntwort {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Baut den HTTP-Client mit den Negotiate-Zeitlimits
pub fn http_client(config: &HubConfig) -> RealtimeResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.http_connect_timeout)
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| RealtimeError::Transport(format!("HTTP-Client: {}", e)))
}

/// Fuehrt genau einen Negotiate-Aufruf aus
pub async fn negotiate(client: &reqwest::Client, negotiate_url: &str) -> RealtimeResult<NegotiateResponse> {
    tracing::info!(url = %negotiate_url, "Negotiate");

    let antwort = client
        .get(negotiate_url)
        .send()
        .await
        .map_err(|e| RealtimeError::NegotiationFailure(format!("HTTP-Anfrage: {}", e)))?;

    let status = antwort.status();
    if !status.is_success() {
        return Err(RealtimeError::NegotiationFailure(format!("HTTP {}", status.as_u16())));
    }

    let body = antwort
        .text()
        .await
        .map_err(|e| RealtimeError::NegotiationFailure(format!("Antwort lesen: {}", e)))?;
    antwort_auswerten(&body)
}

/// Wertet den Body einer Negotiate-Antwort aus
pub(crate) fn antwort_auswerten(body: &str) -> RealtimeResult<NegotiateResponse> {
    if body.trim().is_empty() {
        return Err(RealtimeError::NegotiationFailure("Leere Antwort".to_string()));
    }

    let roh: RohAntwort = serde_json::from_str(body)
        .map_err(|e| RealtimeError::NegotiationFailure(format!("Kein gueltiges JSON: {}", e)))?;

    let url = roh
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| RealtimeError::NegotiationFailure("Feld 'url' fehlt".to_string()))?;
    let access_token = roh
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RealtimeError::NegotiationFailure("Feld 'accessToken' fehlt".to_string()))?;

    Ok(NegotiateResponse { url, access_token })
}

/// Baut die WebSocket-URL des Hubs
///
/// `http`/`https` werden zu `ws`/`wss`. Ein Benutzername wird als
/// `username` Query angehaengt (URL-kodiert, vorhandene Query bleibt).
pub fn hub_url(endpoint: &str, username: Option<&str>) -> RealtimeResult<Url> {
    let mut url = Url::parse(endpoint)?;

    let schema = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => "",
        anderes => {
            return Err(RealtimeError::UngueltigeUrl(format!(
                "Nicht unterstuetztes Schema: {}",
                anderes
            )))
        }
    };
    if !schema.is_empty() && url.set_scheme(schema).is_err() {
        return Err(RealtimeError::UngueltigeUrl(format!(
            "Schema nicht umstellbar: {}",
            endpoint
        )));
    }

    if let Some(name) = username.filter(|n| !n.trim().is_empty()) {
        url.query_pairs_mut().append_pair("username", name);
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
