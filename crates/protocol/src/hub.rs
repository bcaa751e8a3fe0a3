//! JSON-Hub-Protokoll
//!
//! Der Echtzeit-Kanal spricht das JSON-Hub-Protokoll: nach einem Handshake
//! werden benannte Methodenaufrufe (`Invocation`) mit positionalen Argumenten
//! ausgetauscht. Jeder Record endet mit dem Record-Separator `0x1E`
//! (siehe `wire`).
//!
//! ## Nachrichtentypen
//! ```text
//! 1 Invocation   {"type":1,"target":"SendCipher","arguments":["{...}"]}
//! 3 Completion   {"type":3,"invocationId":"1","result":...,"error":...}
//! 6 Ping         {"type":6}
//! 7 Close        {"type":7,"error":"...","allowReconnect":false}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ProtocolError, ProtocolResult};

/// Namen der Hub-Methoden
pub mod methoden {
    /// Ausgehend: eigene Schluessel-Ankuendigung
    pub const SHARE_PUBLIC_KEY: &str = "SharePublicKey";
    /// Ausgehend: Chiffrat-Umschlag
    pub const SEND_CIPHER: &str = "SendCipher";
    /// Ausgehend: Klartext (Altformat, positionale Argumente user + message)
    pub const SEND_MESSAGE: &str = "SendMessage";
    /// Eingehend: Schluessel-Ankuendigung eines Peers
    pub const RECEIVE_PUBLIC_KEY: &str = "ReceivePublicKey";
    /// Eingehend: Chiffrat-Umschlag
    pub const RECEIVE_CIPHER: &str = "ReceiveCipher";
    /// Eingehend: Klartext (Altformat)
    pub const RECEIVE_MESSAGE: &str = "ReceiveMessage";
}

const TYP_INVOCATION: u8 = 1;
const TYP_COMPLETION: u8 = 3;
const TYP_PING: u8 = 6;
const TYP_CLOSE: u8 = 7;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Erster Record des Clients nach dem Verbindungsaufbau
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub protocol: String,
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol: "json".to_string(),
            version: 1,
        }
    }
}

impl HandshakeRequest {
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Antwort des Servers auf den Handshake (`{}` bei Erfolg)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HandshakeResponse {
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// Hub-Nachrichten
// ---------------------------------------------------------------------------

/// Eine Nachricht auf dem Hub nach erfolgreichem Handshake
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Aufruf einer benannten Methode
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    /// Ergebnis eines Aufrufs mit `invocation_id`
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    /// Keepalive
    Ping,
    /// Server beendet die Verbindung
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// Bekannter Rahmen, aber fuer diesen Client ohne Bedeutung (Streams)
    Sonstige(u8),
}

/// Rohform fuer die Deserialisierung (numerisches `type`-Feld)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RohNachricht {
    #[serde(rename = "type")]
    typ: u8,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<Value>>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: Option<bool>,
}

impl HubMessage {
    /// Erstellt einen Methodenaufruf ohne Rueckmeldung (fire-and-forget)
    pub fn invocation(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self::Invocation {
            invocation_id: None,
            target: target.into(),
            arguments,
        }
    }

    /// Serialisiert die Nachricht als JSON (ohne Record-Separator)
    pub fn to_json(&self) -> ProtocolResult<String> {
        let value = match self {
            Self::Invocation {
                invocation_id,
                target,
                arguments,
            } => {
                let mut v = json!({
                    "type": TYP_INVOCATION,
                    "target": target,
                    "arguments": arguments,
                });
                if let Some(id) = invocation_id {
                    v["invocationId"] = Value::String(id.clone());
                }
                v
            }
            Self::Completion {
                invocation_id,
                result,
                error,
            } => {
                let mut v = json!({ "type": TYP_COMPLETION, "invocationId": invocation_id });
                if let Some(r) = result {
                    v["result"] = r.clone();
                }
                if let Some(e) = error {
                    v["error"] = Value::String(e.clone());
                }
                v
            }
            Self::Ping => json!({ "type": TYP_PING }),
            Self::Close {
                error,
                allow_reconnect,
            } => {
                let mut v = json!({ "type": TYP_CLOSE, "allowReconnect": allow_reconnect });
                if let Some(e) = error {
                    v["error"] = Value::String(e.clone());
                }
                v
            }
            Self::Sonstige(typ) => {
                return Err(ProtocolError::UngueltigeNachricht(format!(
                    "Nachrichtentyp {} wird nicht gesendet",
                    typ
                )))
            }
        };
        Ok(value.to_string())
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        let roh: RohNachricht = serde_json::from_str(json)?;
        match roh.typ {
            TYP_INVOCATION => {
                let target = roh.target.ok_or_else(|| {
                    ProtocolError::UngueltigeNachricht("Invocation ohne target".to_string())
                })?;
                Ok(Self::Invocation {
                    invocation_id: roh.invocation_id,
                    target,
                    arguments: roh.arguments.unwrap_or_default(),
                })
            }
            TYP_COMPLETION => Ok(Self::Completion {
                invocation_id: roh.invocation_id.unwrap_or_default(),
                result: roh.result,
                error: roh.error,
            }),
            TYP_PING => Ok(Self::Ping),
            TYP_CLOSE => Ok(Self::Close {
                error: roh.error,
                allow_reconnect: roh.allow_reconnect.unwrap_or(false),
            }),
            2 | 4 | 5 => Ok(Self::Sonstige(roh.typ)),
            unbekannt => Err(ProtocolError::UngueltigeNachricht(format!(
                "Unbekannter Nachrichtentyp {}",
                unbekannt
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
