//! hubcrypt-client – E2E-verschluesselter Chat ueber einen Echtzeit-Hub
//!
//! `ChatClient` verbindet Hub-Verbindung und Sitzungs-Krypto:
//! - beim Verbinden wird der eigene oeffentliche Schluessel angekuendigt
//! - eingehende Aufrufe werden als `ChatEvent` an die Anzeige gemeldet
//! - `send_text` verschluesselt pro Peer oder folgt der Fallback-Policy

pub mod anzeige;
pub mod config;
mod empfang;

use hubcrypt_core::{ChatEvent, HubcryptError, PeerId, Result};
use hubcrypt_crypto::{FallbackPolicy, KeyStrategy, Outgoing, SessionCrypto};
use hubcrypt_protocol::methoden;
use hubcrypt_realtime::HubConnection;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use config::ClientConfig;

use empfang::Empfang;

/// Platzhalter-Empfaenger fuer Broadcast-Umschlaege in Fehlermeldungen
const BROADCAST_EMPFAENGER: &str = "*";

/// Maximale Wartezeit auf die Abschlussmeldung beim Beenden
const BEOBACHTER_WARTEZEIT: Duration = Duration::from_secs(1);

/// Ergebnis von `ChatClient::send_text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zustellung {
    /// Verschluesselt, Anzahl gesendeter Umschlaege
    Verschluesselt(usize),
    /// Nur ein Teil der Umschlaege ging raus
    Teilweise {
        gesendet: usize,
        fehlgeschlagen: Vec<PeerId>,
    },
    /// Unverschluesselt ueber den Kompatibilitaetspfad
    Klartext,
    /// Kein Empfaenger bekannt, Nachricht nicht gesendet
    Verworfen,
}

/// Laufender Chat-Client
pub struct ChatClient {
    verbindung: HubConnection,
    krypto: Arc<SessionCrypto>,
    policy: FallbackPolicy,
    /// Sendet Gegen-Ankuendigungen, laeuft bis `stop`
    ankuendiger: Mutex<Option<JoinHandle<()>>>,
    /// Meldet das Verbindungsende, endet von selbst
    beobachter: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("username", self.krypto.username())
            .field("verbindung", &self.verbindung)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ChatClient {
    /// Verbindet mit dem Hub und kuendigt den eigenen Schluessel an
    ///
    /// Liefert den Client und den Ereignis-Strom fuer die Anzeige.
    pub async fn starten(
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChatEvent>)> {
        let krypto = Arc::new(
            SessionCrypto::new(config.verbindung.benutzername.as_str())
                .with_strategy(config.key_strategy()?),
        );
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ank_tx, mut ank_rx) = mpsc::unbounded_channel::<()>();

        let empfang = Empfang {
            krypto: Arc::clone(&krypto),
            events: events_tx.clone(),
            ankuendigen: ank_tx,
        };
        let (e1, e2, e3) = (empfang.clone(), empfang.clone(), empfang);

        let verbindung = HubConnection::builder(config.hub_config())
            .on(methoden::RECEIVE_PUBLIC_KEY, move |args| {
                e1.oeffentlicher_schluessel(args)
            })
            .on(methoden::RECEIVE_CIPHER, move |args| e2.chiffrat(args))
            .on(methoden::RECEIVE_MESSAGE, move |args| e3.klartext(args))
            .start()
            .await?;

        tracing::info!(
            benutzer = %krypto.username(),
            passphrase_modus = !matches!(krypto.strategy(), KeyStrategy::PerPeerEcdh),
            "Mit Hub verbunden"
        );

        let client = Self {
            verbindung: verbindung.clone(),
            krypto: Arc::clone(&krypto),
            policy: config.fallback_policy(),
            ankuendiger: Mutex::new(None),
            beobachter: Mutex::new(None),
        };
        client.ankuendigen().await?;

        // Gegen-Ankuendigungen aus den Handlern senden
        let ankuendiger = {
            let verbindung = verbindung.clone();
            let krypto = Arc::clone(&krypto);
            tokio::spawn(async move {
                while ank_rx.recv().await.is_some() {
                    // Mehrere gleichzeitige Anlaesse zu einer Ankuendigung zusammenfassen
                    while ank_rx.try_recv().is_ok() {}
                    if let Err(e) = eigene_ankuendigung_senden(&verbindung, &krypto).await {
                        tracing::debug!(fehler = %e, "Gegen-Ankuendigung nicht gesendet");
                    }
                }
            })
        };

        // Ende der Verbindung an die Anzeige melden
        let beobachter = {
            let verbindung = verbindung.clone();
            let mut zustand = verbindung.subscribe_state();
            tokio::spawn(async move {
                loop {
                    let terminal = zustand.borrow_and_update().ist_terminal();
                    if terminal {
                        let _ = events_tx.send(ChatEvent::VerbindungGeschlossen {
                            grund: verbindung.close_reason(),
                        });
                        break;
                    }
                    if zustand.changed().await.is_err() {
                        break;
                    }
                }
            })
        };

        *client.ankuendiger.lock() = Some(ankuendiger);
        *client.beobachter.lock() = Some(beobachter);
        Ok((client, events_rx))
    }

    pub fn username(&self) -> &str {
        self.krypto.username().as_str()
    }

    /// Peers mit gemeinsamem Schluessel
    pub fn peers(&self) -> Vec<PeerId> {
        self.krypto.peers()
    }

    pub fn is_connected(&self) -> bool {
        self.verbindung.is_connected()
    }

    /// Sendet die eigene Schluessel-Ankuendigung (erneut)
    pub async fn ankuendigen(&self) -> Result<()> {
        eigene_ankuendigung_senden(&self.verbindung, &self.krypto).await
    }

    /// Sendet einen Chat-Text
    ///
    /// Mit bekannten Peers: ein `SendCipher` pro Umschlag. Ohne Peers
    /// entscheidet die Fallback-Policy.
    pub async fn send_text(&self, text: &str) -> Result<Zustellung> {
        match self.krypto.prepare_outgoing(text, self.policy)? {
            Outgoing::Encrypted(umschlaege) => {
                let anzahl = umschlaege.len();
                let mut fehler = Vec::new();
                // Jeder Empfaenger bekommt seinen Versuch, auch wenn ein anderer scheitert
                for umschlag in umschlaege {
                    let peer = umschlag
                        .to
                        .clone()
                        .unwrap_or_else(|| PeerId::from(BROADCAST_EMPFAENGER));
                    let ergebnis = match umschlag.to_json() {
                        Ok(json) => self
                            .verbindung
                            .send(methoden::SEND_CIPHER, vec![Value::String(json)])
                            .await
                            .map_err(HubcryptError::from),
                        Err(e) => Err(e.into()),
                    };
                    if let Err(e) = ergebnis {
                        tracing::warn!(peer = %peer, fehler = %e, "Umschlag nicht gesendet");
                        fehler.push((peer, e));
                    }
                }
                zustellung_auswerten(anzahl, fehler)
            }
            Outgoing::LegacyPlaintext(klartext) => {
                self.verbindung
                    .send(
                        methoden::SEND_MESSAGE,
                        vec![
                            Value::String(klartext.user),
                            Value::String(klartext.message),
                        ],
                    )
                    .await?;
                Ok(Zustellung::Klartext)
            }
            Outgoing::Dropped => Ok(Zustellung::Verworfen),
        }
    }

    /// Beendet Verbindung und Hintergrund-Tasks
    pub async fn stop(&self) {
        self.verbindung.stop().await;
        if let Some(task) = self.ankuendiger.lock().take() {
            task.abort();
        }
        let beobachter = self.beobachter.lock().take();
        if let Some(task) = beobachter {
            // Zustand ist jetzt terminal, der Beobachter meldet das Ende noch
            let _ = tokio::time::timeout(BEOBACHTER_WARTEZEIT, task).await;
        }
    }
}

/// Fasst die Ergebnisse eines Fan-outs zusammen
///
/// Scheitern alle Umschlaege, ist das Ergebnis der erste Fehler.
fn zustellung_auswerten(
    anzahl: usize,
    fehler: Vec<(PeerId, HubcryptError)>,
) -> Result<Zustellung> {
    let gesendet = anzahl.saturating_sub(fehler.len());
    if fehler.is_empty() {
        tracing::debug!(umschlaege = anzahl, "Nachricht verschluesselt gesendet");
        return Ok(Zustellung::Verschluesselt(anzahl));
    }
    if gesendet == 0 {
        let mut fehler = fehler.into_iter();
        return match fehler.next() {
            Some((_, erster)) => Err(erster),
            None => Ok(Zustellung::Verschluesselt(0)),
        };
    }
    Ok(Zustellung::Teilweise {
        gesendet,
        fehlgeschlagen: fehler.into_iter().map(|(peer, _)| peer).collect(),
    })
}

async fn eigene_ankuendigung_senden(
    verbindung: &HubConnection,
    krypto: &SessionCrypto,
) -> Result<()> {
    let json = krypto.export_identity_announcement()?.to_json()?;
    verbindung
        .send(methoden::SHARE_PUBLIC_KEY, vec![Value::String(json)])
        .await?;
    tracing::debug!("Eigener Schluessel angekuendigt");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alle_umschlaege_gesendet() {
        assert_eq!(
            zustellung_auswerten(3, Vec::new()).unwrap(),
            Zustellung::Verschluesselt(3)
        );
    }

    #[test]
    fn teilweise_zustellung_nennt_fehlgeschlagene_peers() {
        let fehler = vec![(
            PeerId::from("carol"),
            HubcryptError::Verbindung("reset".into()),
        )];
        assert_eq!(
            zustellung_auswerten(3, fehler).unwrap(),
            Zustellung::Teilweise {
                gesendet: 2,
                fehlgeschlagen: vec![PeerId::from("carol")],
            }
        );
    }

    #[test]
    fn ohne_erfolg_kommt_der_erste_fehler_zurueck() {
        let fehler = vec![
            (PeerId::from("bob"), HubcryptError::NichtVerbunden),
            (PeerId::from("carol"), HubcryptError::Verbindung("reset".into())),
        ];
        assert!(matches!(
            zustellung_auswerten(2, fehler),
            Err(HubcryptError::NichtVerbunden)
        ));
    }
}
