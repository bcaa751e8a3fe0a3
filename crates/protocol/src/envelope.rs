//! Umschlaege fuer den Echtzeit-Kanal
//!
//! Drei Nachrichtenformate teilen sich den Kanal:
//! - `PublicKeyAnnouncement` – oeffentlicher P-256 Schluessel eines Peers (SPKI DER, Base64)
//! - `CipherEnvelope` – AES-256-GCM Chiffrat fuer genau einen Empfaenger
//! - `LegacyPlainEnvelope` – unverschluesselter Kompatibilitaetspfad
//!
//! ## JSON-Felder
//! ```text
//! Ankuendigung: {"username":"alice","algorithm":"EC-P256","publicKeyB64":"MFkw..."}
//! Chiffrat:     {"from":"alice","to":"bob","iv":"<12 Bytes>","cipher":"<ct + tag>"}
//! Klartext:     {"user":"alice","message":"hallo","timestamp":"..."}
//! ```
//!
//! Die Feldnamen sind Teil des Wire-Formats und duerfen nicht geaendert werden.

use hubcrypt_core::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// Einziger unterstuetzter Algorithmus-Bezeichner fuer Ankuendigungen
pub const ALGORITHMUS_EC_P256: &str = "EC-P256";

fn standard_algorithmus() -> String {
    ALGORITHMUS_EC_P256.to_string()
}

// ---------------------------------------------------------------------------
// Schluessel-Ankuendigung
// ---------------------------------------------------------------------------

/// Oeffentlicher Schluessel eines Peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyAnnouncement {
    /// Benutzername des Absenders
    pub username: PeerId,
    /// Kurve/Algorithmus, immer `EC-P256`
    #[serde(default = "standard_algorithmus")]
    pub algorithm: String,
    /// X.509 SubjectPublicKeyInfo (DER)
    #[serde(rename = "publicKeyB64", with = "base64_feld")]
    pub public_key: Vec<u8>,
}

impl PublicKeyAnnouncement {
    /// Erstellt eine Ankuendigung fuer einen DER-kodierten Schluessel
    pub fn new(username: impl Into<PeerId>, public_key_der: Vec<u8>) -> Self {
        Self {
            username: username.into(),
            algorithm: standard_algorithmus(),
            public_key: public_key_der,
        }
    }

    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// Chiffrat-Umschlag
// ---------------------------------------------------------------------------

/// Verschluesselte Chat-Nachricht
///
/// `to == None` ist fuer Broadcast reserviert. Im Standardbetrieb wird pro
/// Empfaenger ein eigener Umschlag mit gesetztem `to` erzeugt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherEnvelope {
    pub from: PeerId,
    #[serde(default)]
    pub to: Option<PeerId>,
    /// 12 Bytes GCM-IV (Laenge wird erst beim Entschluesseln geprueft)
    #[serde(with = "base64_feld")]
    pub iv: Vec<u8>,
    /// Chiffrat inklusive angehaengtem 16-Byte Auth-Tag
    #[serde(rename = "cipher", with = "base64_feld")]
    pub ciphertext: Vec<u8>,
}

impl CipherEnvelope {
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Gibt true zurueck wenn der Umschlag an alle gerichtet ist
    pub fn ist_broadcast(&self) -> bool {
        self.to.is_none()
    }
}

// ---------------------------------------------------------------------------
// Klartext (Altformat)
// ---------------------------------------------------------------------------

/// Unverschluesselte, unauthentifizierte Nachricht (Rueckwaertskompatibilitaet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPlainEnvelope {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub message: String,
    /// Das bestehende Backend liefert den Zeitstempel unter einem eigenen Feldnamen
    #[serde(default, alias = "fechaHoraCostaRica")]
    pub timestamp: Option<String>,
}

impl LegacyPlainEnvelope {
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        Ok(LegacyPlainEnvelope::deserialize(value)?)
    }

    /// Leerer Absender oder leerer Text werden nicht angezeigt
    pub fn ist_anzeigbar(&self) -> bool {
        !self.user.is_empty() && !self.message.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Klassifizierung
// ---------------------------------------------------------------------------

/// Art eines eingehenden JSON-Payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// Objekt mit `publicKeyB64`
    Announcement,
    /// Objekt mit `cipher`
    Cipher,
    /// Weder noch (oder kein JSON-Objekt)
    Opaque,
}

impl EnvelopeKind {
    /// Erkennt die Art eines rohen JSON-Payloads anhand der Schluesselfelder
    pub fn erkennen(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(obj)) if obj.contains_key("publicKeyB64") => Self::Announcement,
            Ok(Value::Object(obj)) if obj.contains_key("cipher") => Self::Cipher,
            _ => Self::Opaque,
        }
    }
}

/// Normalisiert ein Hub-Argument zu einem JSON-Text
///
/// Gegenstellen senden Umschlaege teils als JSON-String, teils als Objekt.
pub fn argument_als_json(arg: &Value) -> ProtocolResult<String> {
    match arg {
        Value::String(s) => Ok(s.clone()),
        Value::Object(_) => Ok(arg.to_string()),
        other => Err(ProtocolError::UngueltigeNachricht(format!(
            "Argument ist weder String noch Objekt: {}",
            other
        ))),
    }
}

/// Base64 (Standard-Alphabet, ohne Zeilenumbrueche) fuer Byte-Felder
mod base64_feld {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.trim())
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ankuendigung_feldnamen() {
        let a = PublicKeyAnnouncement::new("alice", vec![0x30, 0x59, 0x30]);
        let json = a.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"username":"alice","algorithm":"EC-P256","publicKeyB64":"MFkw"}"#
        );
    }

    #[test]
    fn ankuendigung_ohne_algorithmus_nutzt_standard() {
        let a = PublicKeyAnnouncement::from_json(r#"{"username":"bob","publicKeyB64":"AQID"}"#)
            .unwrap();
        assert_eq!(a.algorithm, ALGORITHMUS_EC_P256);
        assert_eq!(a.public_key, vec![1, 2, 3]);
    }

    #[test]
    fn ankuendigung_mit_kaputtem_base64_schlaegt_fehl() {
        let result =
            PublicKeyAnnouncement::from_json(r#"{"username":"bob","publicKeyB64":"%%%"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn umschlag_to_null_wird_explizit_serialisiert() {
        let u = CipherEnvelope {
            from: PeerId::from("alice"),
            to: None,
            iv: vec![0u8; 12],
            ciphertext: vec![0xff; 16],
        };
        let json = u.to_json().unwrap();
        assert!(json.contains("\"to\":null"));
        assert!(json.contains("\"cipher\":"));
        assert!(u.ist_broadcast());
    }

    #[test]
    fn umschlag_mit_empfaenger() {
        let json = r#"{"from":"alice","to":"bob","iv":"AAAAAAAAAAAAAAAA","cipher":"AQID"}"#;
        let u = CipherEnvelope::from_json(json).unwrap();
        assert_eq!(u.to, Some(PeerId::from("bob")));
        assert_eq!(u.iv.len(), 12);
        assert_eq!(u.ciphertext, vec![1, 2, 3]);
    }

    #[test]
    fn klartext_akzeptiert_backend_zeitstempel() {
        let json = r#"{"user":"bob","message":"hi","fechaHoraCostaRica":"2025-01-01 10:00"}"#;
        let p = LegacyPlainEnvelope::from_json(json).unwrap();
        assert_eq!(p.timestamp.as_deref(), Some("2025-01-01 10:00"));
        assert!(p.ist_anzeigbar());
    }

    #[test]
    fn klartext_ohne_text_nicht_anzeigbar() {
        let p = LegacyPlainEnvelope::from_json(r#"{"user":"bob"}"#).unwrap();
        assert!(!p.ist_anzeigbar());
    }

    #[test]
    fn erkennung() {
        assert_eq!(
            EnvelopeKind::erkennen(r#"{"username":"a","publicKeyB64":"AA=="}"#),
            EnvelopeKind::Announcement
        );
        assert_eq!(
            EnvelopeKind::erkennen(r#"{"from":"a","iv":"","cipher":""}"#),
            EnvelopeKind::Cipher
        );
        assert_eq!(EnvelopeKind::erkennen(r#"{"user":"a"}"#), EnvelopeKind::Opaque);
        assert_eq!(EnvelopeKind::erkennen("kein json"), EnvelopeKind::Opaque);
        assert_eq!(EnvelopeKind::erkennen("[1,2]"), EnvelopeKind::Opaque);
    }

    #[test]
    fn argument_string_oder_objekt() {
        let s = Value::String(r#"{"a":1}"#.into());
        assert_eq!(argument_als_json(&s).unwrap(), r#"{"a":1}"#);

        let o = serde_json::json!({"a": 1});
        assert_eq!(argument_als_json(&o).unwrap(), r#"{"a":1}"#);

        assert!(argument_als_json(&Value::Bool(true)).is_err());
    }
}
