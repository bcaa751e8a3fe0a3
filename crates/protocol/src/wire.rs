//! Wire-Format fuer den Hub-Kanal
//!
//! Record-basiertes Protokoll: JSON-Text, abgeschlossen durch den
//! Record-Separator `0x1E`. Ein WebSocket-Textframe kann mehrere Records
//! enthalten, ein Record kann theoretisch auch ueber mehrere Frames verteilt
//! ankommen.
//!
//! ## Record-Format
//!
//! ```text
//! +----...----+------+----...----+------+
//! | JSON      | 0x1E | JSON      | 0x1E |
//! +----...----+------+----...----+------+
//! ```
//!
//! Maximale Record-Groesse ist konfigurierbar (Standard: 1 MB).

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::hub::HubMessage;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Record-Separator (ASCII RS)
pub const RECORD_SEPARATOR: u8 = 0x1e;

/// Standard-maximale Record-Groesse (1 MB)
pub const DEFAULT_MAX_RECORD_SIZE: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// RecordCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer Record-Separator-getrennte JSON-Nachrichten
///
/// Der Decoder liefert den JSON-Text eines Records; welche Struktur darin
/// steckt (Handshake-Antwort oder `HubMessage`) haengt von der Phase der
/// Verbindung ab und wird vom Aufrufer entschieden.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    /// Maximale erlaubte Record-Groesse in Bytes
    max_record_size: usize,
}

impl RecordCodec {
    /// Erstellt einen neuen `RecordCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }

    /// Erstellt einen `RecordCodec` mit benutzerdefinierter maximaler Record-Groesse
    pub fn with_max_size(max_record_size: usize) -> Self {
        Self { max_record_size }
    }

    pub fn max_record_size(&self) -> usize {
        self.max_record_size
    }

    /// Zerlegt einen kompletten Puffer in alle enthaltenen Records
    ///
    /// Ein unvollstaendiger Rest bleibt im Puffer.
    pub fn alle_records(&mut self, src: &mut BytesMut) -> Result<Vec<String>, ProtocolError> {
        let mut records = Vec::new();
        while let Some(record) = self.decode(src)? {
            records.push(record);
        }
        Ok(records)
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for RecordCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(ende) = src.iter().position(|b| *b == RECORD_SEPARATOR) else {
            // Noch kein vollstaendiger Record – Groesse des Rests begrenzen
            if src.len() > self.max_record_size {
                return Err(ProtocolError::RecordZuGross {
                    groesse: src.len(),
                    maximum: self.max_record_size,
                });
            }
            return Ok(None);
        };

        if ende > self.max_record_size {
            return Err(ProtocolError::RecordZuGross {
                groesse: ende,
                maximum: self.max_record_size,
            });
        }

        let record = src.split_to(ende + 1);
        let text = std::str::from_utf8(&record[..ende]).map_err(|_| ProtocolError::KeinUtf8)?;
        Ok(Some(text.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierungen
// ---------------------------------------------------------------------------

/// Rohes JSON (z.B. Handshake-Anfrage)
impl Encoder<String> for RecordCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_record_size {
            return Err(ProtocolError::RecordZuGross {
                groesse: item.len(),
                maximum: self.max_record_size,
            });
        }
        if item.as_bytes().contains(&RECORD_SEPARATOR) {
            return Err(ProtocolError::UngueltigeNachricht(
                "Record enthaelt den Separator".to_string(),
            ));
        }

        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(RECORD_SEPARATOR);
        Ok(())
    }
}

impl Encoder<HubMessage> for RecordCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: HubMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = item.to_json()?;
        Encoder::<String>::encode(self, json, dst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
