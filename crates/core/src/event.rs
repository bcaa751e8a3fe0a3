//! Ereignisse fuer den Anzeige-Kollaborator
//!
//! Die Anzeige (z.B. eine eingebettete Web-Oberflaeche oder die Konsole)
//! beobachtet nur diese Ereignisse. Klartext-Zustellungen haben eine eigene
//! Variante und muessen in der Oberflaeche kenntlich gemacht werden.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PeerId;

/// Alle Ereignisse die an die Anzeige weitergereicht werden
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "art", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Ende-zu-Ende verschluesselte Nachricht, erfolgreich entschluesselt
    Entschluesselt {
        from: PeerId,
        text: String,
        empfangen: DateTime<Utc>,
    },
    /// Unverschluesselte Nachricht ueber den Kompatibilitaetspfad
    Klartext {
        user: String,
        text: String,
        /// Zeitstempel so wie vom Backend geliefert (Format unbekannt)
        zeitstempel: Option<String>,
    },
    /// Chiffrat empfangen, aber noch kein gemeinsamer Schluessel mit dem Absender
    OhneSchluessel { from: PeerId },
    /// Gemeinsamer Schluessel mit einem Peer abgeleitet (Kontrollebene)
    SchluesselEtabliert { peer: PeerId },
    /// Verbindung wurde beendet
    VerbindungGeschlossen { grund: Option<String> },
}

impl ChatEvent {
    /// Gibt true zurueck wenn das Ereignis eine unverschluesselte Zustellung ist
    pub fn ist_unverschluesselt(&self) -> bool {
        matches!(self, Self::Klartext { .. })
    }

    /// Gibt true zurueck wenn das Ereignis einen anzeigbaren Chat-Text traegt
    pub fn ist_anzeigbar(&self) -> bool {
        matches!(self, Self::Entschluesselt { .. } | Self::Klartext { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ist_serde_kompatibel() {
        let event = ChatEvent::Entschluesselt {
            from: PeerId::from("alice"),
            text: "hallo".into(),
            empfangen: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"art\":\"entschluesselt\""));
        let back: ChatEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn klartext_ist_unterscheidbar() {
        let klartext = ChatEvent::Klartext {
            user: "bob".into(),
            text: "hi".into(),
            zeitstempel: None,
        };
        assert!(klartext.ist_unverschluesselt());
        assert!(klartext.ist_anzeigbar());

        let kontroll = ChatEvent::SchluesselEtabliert {
            peer: PeerId::from("bob"),
        };
        assert!(!kontroll.ist_unverschluesselt());
        assert!(!kontroll.ist_anzeigbar());
    }
}
