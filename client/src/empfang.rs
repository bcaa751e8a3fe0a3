//! Verarbeitung eingehender Hub-Aufrufe
//!
//! Die Handler der Hub-Verbindung sind synchron. Alles was gesendet werden
//! muss (Gegen-Ankuendigung) geht ueber einen Kanal an einen Hintergrund-Task.

use chrono::Utc;
use hubcrypt_core::ChatEvent;
use hubcrypt_crypto::{Incoming, SessionCrypto};
use hubcrypt_protocol::{argument_als_json, LegacyPlainEnvelope};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Gemeinsamer Zustand aller Empfangs-Handler
#[derive(Clone)]
pub(crate) struct Empfang {
    pub(crate) krypto: Arc<SessionCrypto>,
    pub(crate) events: mpsc::UnboundedSender<ChatEvent>,
    /// Signal an den Ankuendigungs-Task
    pub(crate) ankuendigen: mpsc::UnboundedSender<()>,
}

impl Empfang {
    /// `ReceivePublicKey`: Schluessel eines Peers uebernehmen
    pub(crate) fn oeffentlicher_schluessel(&self, args: &[Value]) {
        let Some(raw) = erstes_argument(args) else {
            tracing::warn!(anzahl = args.len(), "ReceivePublicKey ohne verwertbares Argument");
            return;
        };

        match self.krypto.on_announcement(&raw) {
            Ok(Incoming::KeyEstablished { peer, status }) => {
                if status.braucht_gegenankuendigung() {
                    // Spaet beigetretene Peers kennen unseren Schluessel noch nicht
                    let _ = self.ankuendigen.send(());
                    let _ = self.events.send(ChatEvent::SchluesselEtabliert { peer });
                }
            }
            Ok(Incoming::OwnAnnouncement) => {
                tracing::trace!("Eigene Ankuendigung ignoriert");
            }
            Ok(anderes) => {
                tracing::debug!(ergebnis = ?anderes, "Unerwartetes Ergebnis fuer Ankuendigung");
            }
            Err(e) => {
                tracing::warn!(fehler = %e, "Ankuendigung verworfen");
            }
        }
    }

    /// `ReceiveCipher`: Umschlag entschluesseln
    pub(crate) fn chiffrat(&self, args: &[Value]) {
        let Some(raw) = erstes_argument(args) else {
            tracing::warn!(anzahl = args.len(), "ReceiveCipher ohne verwertbares Argument");
            return;
        };

        match self.krypto.on_cipher_envelope(&raw) {
            Ok(Incoming::Decrypted { from, .. }) if from == *self.krypto.username() => {
                tracing::trace!("Eigener Broadcast ignoriert");
            }
            Ok(Incoming::Decrypted { from, plaintext }) => {
                let _ = self.events.send(ChatEvent::Entschluesselt {
                    from,
                    text: plaintext,
                    empfangen: Utc::now(),
                });
            }
            Ok(Incoming::NoSharedKeyYet { from }) => {
                let _ = self.events.send(ChatEvent::OhneSchluessel { from });
            }
            Ok(Incoming::NotAddressedToUs { to }) => {
                tracing::trace!(empfaenger = %to, "Umschlag fuer anderen Peer");
            }
            Ok(anderes) => {
                tracing::debug!(ergebnis = ?anderes, "Umschlag nicht verwertbar");
            }
            Err(e) if e.ist_authentifizierungsfehler() => {
                tracing::warn!("Umschlag verworfen: Authentifizierung fehlgeschlagen");
            }
            Err(e) => {
                tracing::warn!(fehler = %e, "Umschlag verworfen");
            }
        }
    }

    /// `ReceiveMessage`: unverschluesselte Nachricht (Altformat)
    pub(crate) fn klartext(&self, args: &[Value]) {
        let Some(nachricht) = klartext_aus_argumenten(args) else {
            tracing::debug!(anzahl = args.len(), "ReceiveMessage nicht lesbar");
            return;
        };
        if !nachricht.ist_anzeigbar() {
            return;
        }

        tracing::warn!(
            von = %nachricht.user,
            unverschluesselt = true,
            "Unverschluesselte Nachricht empfangen"
        );
        let _ = self.events.send(ChatEvent::Klartext {
            user: nachricht.user,
            text: nachricht.message,
            zeitstempel: nachricht.timestamp,
        });
    }
}

fn erstes_argument(args: &[Value]) -> Option<String> {
    args.first().and_then(|arg| argument_als_json(arg).ok())
}

/// Liest eine Klartext-Nachricht aus den Hub-Argumenten
///
/// Akzeptiert ein Objekt, einen JSON-String oder positional `(user, message)`.
pub(crate) fn klartext_aus_argumenten(args: &[Value]) -> Option<LegacyPlainEnvelope> {
    match args {
        [Value::String(user), Value::String(message), ..] => Some(LegacyPlainEnvelope {
            user: user.clone(),
            message: message.clone(),
            timestamp: None,
        }),
        [obj @ Value::Object(_), ..] => LegacyPlainEnvelope::from_value(obj).ok(),
        [Value::String(json)] => LegacyPlainEnvelope::from_json(json).ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use hubcrypt_core::PeerId;
    use serde_json::json;

    struct Aufbau {
        empfang: Empfang,
        events: mpsc::UnboundedReceiver<ChatEvent>,
        ankuendigen: mpsc::UnboundedReceiver<()>,
    }

    fn aufbau(name: &str) -> Aufbau {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (ank_tx, ankuendigen) = mpsc::unbounded_channel();
        Aufbau {
            empfang: Empfang {
                krypto: Arc::new(SessionCrypto::new(name)),
                events: events_tx,
                ankuendigen: ank_tx,
            },
            events,
            ankuendigen,
        }
    }

    fn ankuendigung(s: &SessionCrypto) -> Value {
        Value::String(s.export_identity_announcement().unwrap().to_json().unwrap())
    }

    #[test]
    fn neuer_peer_loest_gegenankuendigung_aus() {
        let mut alice = aufbau("alice");
        let bob = SessionCrypto::new("bob");

        alice.empfang.oeffentlicher_schluessel(&[ankuendigung(&bob)]);
        assert_eq!(
            alice.events.try_recv().unwrap(),
            ChatEvent::SchluesselEtabliert {
                peer: PeerId::from("bob")
            }
        );
        assert!(alice.ankuendigen.try_recv().is_ok());

        // Wiederholung: kein neues Ereignis, keine Gegen-Ankuendigung
        alice.empfang.oeffentlicher_schluessel(&[ankuendigung(&bob)]);
        assert!(alice.events.try_recv().is_err());
        assert!(alice.ankuendigen.try_recv().is_err());
    }

    #[test]
    fn eigene_und_kaputte_ankuendigungen_werden_ignoriert() {
        let mut alice = aufbau("alice");
        let eigene = ankuendigung(&alice.empfang.krypto);

        alice.empfang.oeffentlicher_schluessel(&[eigene]);
        alice.empfang.oeffentlicher_schluessel(&[json!("kein json")]);
        alice.empfang.oeffentlicher_schluessel(&[]);

        assert!(alice.events.try_recv().is_err());
        assert!(alice.ankuendigen.try_recv().is_err());
    }

    #[test]
    fn chiffrat_wird_entschluesselt() {
        let mut alice = aufbau("alice");
        let bob = SessionCrypto::new("bob");
        alice.empfang.oeffentlicher_schluessel(&[ankuendigung(&bob)]);
        let _ = alice.events.try_recv();
        bob.on_announcement(ankuendigung(&alice.empfang.krypto).as_str().unwrap())
            .unwrap();

        let umschlag = bob.encrypt_for_peer("alice", "hallo alice").unwrap();
        // Objekt statt JSON-String wird ebenfalls akzeptiert
        let arg: Value = serde_json::from_str(&umschlag.to_json().unwrap()).unwrap();
        alice.empfang.chiffrat(&[arg]);

        match alice.events.try_recv().unwrap() {
            ChatEvent::Entschluesselt { from, text, .. } => {
                assert_eq!(from, PeerId::from("bob"));
                assert_eq!(text, "hallo alice");
            }
            other => panic!("Erwartet Entschluesselt, erhalten {:?}", other),
        }
    }

    #[test]
    fn chiffrat_ohne_schluessel_meldet_absender() {
        let mut alice = aufbau("alice");
        let json = r#"{"from":"mallory","to":"alice","iv":"AAAAAAAAAAAAAAAA","cipher":"AQID"}"#;
        alice.empfang.chiffrat(&[json!(json)]);
        assert_eq!(
            alice.events.try_recv().unwrap(),
            ChatEvent::OhneSchluessel {
                from: PeerId::from("mallory")
            }
        );
    }

    #[test]
    fn manipuliertes_chiffrat_erzeugt_kein_ereignis() {
        let mut alice = aufbau("alice");
        let bob = SessionCrypto::new("bob");
        alice.empfang.oeffentlicher_schluessel(&[ankuendigung(&bob)]);
        let _ = alice.events.try_recv();
        bob.on_announcement(ankuendigung(&alice.empfang.krypto).as_str().unwrap())
            .unwrap();

        let mut umschlag = bob.encrypt_for_peer("alice", "geheim").unwrap();
        umschlag.ciphertext[0] ^= 0x01;
        alice.empfang.chiffrat(&[json!(umschlag.to_json().unwrap())]);
        assert!(alice.events.try_recv().is_err());
    }

    #[test]
    fn klartext_formate() {
        let p = klartext_aus_argumenten(&[json!("bob"), json!("hi")]).unwrap();
        assert_eq!((p.user.as_str(), p.message.as_str()), ("bob", "hi"));

        let p = klartext_aus_argumenten(&[json!({
            "user": "bob",
            "message": "hi",
            "fechaHoraCostaRica": "10:00"
        })])
        .unwrap();
        assert_eq!(p.timestamp.as_deref(), Some("10:00"));

        let p = klartext_aus_argumenten(&[json!(r#"{"user":"bob","message":"hi"}"#)]).unwrap();
        assert!(p.ist_anzeigbar());

        assert!(klartext_aus_argumenten(&[]).is_none());
        assert!(klartext_aus_argumenten(&[json!(42)]).is_none());
    }

    #[test]
    fn klartext_wird_als_unverschluesselt_gemeldet() {
        let mut alice = aufbau("alice");
        alice
            .empfang
            .klartext(&[json!({"user": "bob", "message": "hi"})]);
        let event = alice.events.try_recv().unwrap();
        assert!(event.ist_unverschluesselt());

        // Leerer Text wird nicht angezeigt
        alice.empfang.klartext(&[json!({"user": "bob", "message": ""})]);
        assert!(alice.events.try_recv().is_err());
    }
}
