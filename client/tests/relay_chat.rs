//! Ende-zu-Ende Tests mit mehreren Clients an einem lokalen Relay-Hub
//!
//! Der Relay-Hub verhaelt sich wie das Backend: jeder `Send*`-Aufruf wird als
//! passender `Receive*`-Aufruf an alle Verbindungen (inklusive Absender)
//! weitergeleitet. Inhalte sieht er nur als undurchsichtige Strings.

use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use hubcrypt_client::config::FallbackEinstellung;
use hubcrypt_client::{ChatClient, ClientConfig, Zustellung};
use hubcrypt_core::{ChatEvent, PeerId};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const RS: char = '\u{1e}';

type Teilnehmer = Arc<Mutex<Vec<mpsc::UnboundedSender<String>>>>;

/// Alle Aufrufe die der Relay gesehen hat (Target, Argumente)
type Mitschnitt = Arc<Mutex<Vec<(String, Vec<Value>)>>>;

struct Relay {
    negotiate_url: String,
    mitschnitt: Mitschnitt,
}

fn weiterleitung(target: &str, args: Vec<Value>) -> Option<(&'static str, Vec<Value>)> {
    match target {
        "SharePublicKey" => Some(("ReceivePublicKey", args)),
        "SendCipher" => Some(("ReceiveCipher", args)),
        "SendMessage" => {
            let user = args.first().cloned().unwrap_or_default();
            let message = args.get(1).cloned().unwrap_or_default();
            Some((
                "ReceiveMessage",
                vec![json!({
                    "user": user,
                    "message": message,
                    "fechaHoraCostaRica": "2025-01-01 10:00"
                })],
            ))
        }
        _ => None,
    }
}

async fn relay_starten() -> Relay {
    let hub = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hub_url = format!("http://{}/chat", hub.local_addr().unwrap());
    let teilnehmer: Teilnehmer = Arc::new(Mutex::new(Vec::new()));
    let mitschnitt: Mitschnitt = Arc::new(Mutex::new(Vec::new()));

    {
        let mitschnitt = Arc::clone(&mitschnitt);
        tokio::spawn(async move {
            loop {
                let (stream, _) = hub.accept().await.unwrap();
                let teilnehmer = Arc::clone(&teilnehmer);
                let mitschnitt = Arc::clone(&mitschnitt);
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    // Handshake
                    match ws.next().await {
                        Some(Ok(Message::Text(_))) => {}
                        other => panic!("Handshake erwartet, erhalten {:?}", other),
                    }
                    // Vor der Handshake-Antwort eintragen, damit kein Broadcast verloren geht
                    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                    teilnehmer.lock().unwrap().push(tx);
                    ws.send(Message::Text(format!("{{}}{}", RS))).await.unwrap();

                    loop {
                        tokio::select! {
                            frame = ws.next() => {
                                let Some(Ok(frame)) = frame else { break };
                                let Message::Text(text) = frame else { continue };
                                for record in text.split(RS).filter(|r| !r.is_empty()) {
                                    let v: Value = serde_json::from_str(record).unwrap();
                                    if v["type"] != 1 {
                                        continue;
                                    }
                                    let target = v["target"].as_str().unwrap_or_default().to_string();
                                    let args = v["arguments"].as_array().cloned().unwrap_or_default();
                                    mitschnitt.lock().unwrap().push((target.clone(), args.clone()));

                                    if let Some((ziel, args)) = weiterleitung(&target, args) {
                                        let record = format!(
                                            "{}{}",
                                            json!({"type": 1, "target": ziel, "arguments": args}),
                                            RS
                                        );
                                        for t in teilnehmer.lock().unwrap().iter() {
                                            let _ = t.send(record.clone());
                                        }
                                    }
                                }
                            }
                            ausgehend = rx.recv() => {
                                let Some(record) = ausgehend else { break };
                                if ws.send(Message::Text(record)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                });
            }
        });
    }

    let app = Router::new().route(
        "/negotiate",
        get(move || {
            let hub_url = hub_url.clone();
            async move { Json(json!({"url": hub_url, "accessToken": "relay-token"})) }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Relay {
        negotiate_url: format!("http://{}/negotiate", addr),
        mitschnitt,
    }
}

fn config(relay: &Relay, name: &str) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.verbindung.negotiate_url = relay.negotiate_url.clone();
    config.verbindung.benutzername = name.to_string();
    config.verbindung.keepalive_sek = 1;
    config.verbindung.server_timeout_sek = 10;
    config.verbindung.http_connect_timeout_sek = 2;
    config.verbindung.http_timeout_sek = 2;
    config
}

/// Wartet auf das erste Ereignis das `pruefen` erfuellt
async fn warte_auf_event<F>(events: &mut mpsc::UnboundedReceiver<ChatEvent>, pruefen: F) -> ChatEvent
where
    F: Fn(&ChatEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("Ereignis-Strom beendet");
            if pruefen(&event) {
                return event;
            }
        }
    })
    .await
    .expect("Erwartetes Ereignis nicht erhalten")
}

fn schluessel_mit(peer: &'static str) -> impl Fn(&ChatEvent) -> bool {
    move |e| matches!(e, ChatEvent::SchluesselEtabliert { peer: p } if p.as_str() == peer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zwei_clients_tauschen_verschluesselt_nachrichten() {
    let relay = relay_starten().await;

    let (alice, mut alice_events) = ChatClient::starten(&config(&relay, "alice")).await.unwrap();
    let (bob, mut bob_events) = ChatClient::starten(&config(&relay, "bob")).await.unwrap();

    // Alice war zuerst da und erfaehrt Bobs Schluessel, Bob erfaehrt Alices
    // Schluessel ueber die Gegen-Ankuendigung
    warte_auf_event(&mut alice_events, schluessel_mit("bob")).await;
    warte_auf_event(&mut bob_events, schluessel_mit("alice")).await;
    assert_eq!(alice.peers(), vec![PeerId::from("bob")]);
    assert_eq!(bob.peers(), vec![PeerId::from("alice")]);

    assert_eq!(
        alice.send_text("hallo bob").await.unwrap(),
        Zustellung::Verschluesselt(1)
    );
    match warte_auf_event(&mut bob_events, |e| e.ist_anzeigbar()).await {
        ChatEvent::Entschluesselt { from, text, .. } => {
            assert_eq!(from, PeerId::from("alice"));
            assert_eq!(text, "hallo bob");
        }
        other => panic!("Erwartet Entschluesselt, erhalten {:?}", other),
    }

    bob.send_text("hallo alice").await.unwrap();
    match warte_auf_event(&mut alice_events, |e| e.ist_anzeigbar()).await {
        ChatEvent::Entschluesselt { from, text, .. } => {
            assert_eq!(from, PeerId::from("bob"));
            assert_eq!(text, "hallo alice");
        }
        other => panic!("Erwartet Entschluesselt, erhalten {:?}", other),
    }

    // Der Hub hat den Text nie im Klartext gesehen
    let mitschnitt = relay.mitschnitt.lock().unwrap().clone();
    assert!(mitschnitt.iter().any(|(t, _)| t == "SendCipher"));
    for (target, args) in &mitschnitt {
        let roh = serde_json::to_string(args).unwrap();
        assert!(!roh.contains("hallo"), "Klartext in {}: {}", target, roh);
        assert_ne!(target, "SendMessage");
    }

    alice.stop().await;
    bob.stop().await;
}

#[tokio::test]
async fn ohne_peers_wird_standardmaessig_verworfen() {
    let relay = relay_starten().await;
    let (alice, _events) = ChatClient::starten(&config(&relay, "alice")).await.unwrap();

    assert_eq!(
        alice.send_text("niemand hoert zu").await.unwrap(),
        Zustellung::Verworfen
    );
    assert!(relay
        .mitschnitt
        .lock()
        .unwrap()
        .iter()
        .all(|(t, _)| t == "SharePublicKey"));

    alice.stop().await;
}

#[tokio::test]
async fn klartext_fallback_ist_sichtbar_markiert() {
    let relay = relay_starten().await;
    let mut cfg = config(&relay, "carol");
    cfg.krypto.fallback = FallbackEinstellung::LegacyPlaintext;
    let (carol, mut events) = ChatClient::starten(&cfg).await.unwrap();

    assert_eq!(
        carol.send_text("hallo welt").await.unwrap(),
        Zustellung::Klartext
    );

    let event = warte_auf_event(&mut events, |e| e.ist_anzeigbar()).await;
    assert!(event.ist_unverschluesselt());
    assert_eq!(
        event,
        ChatEvent::Klartext {
            user: "carol".into(),
            text: "hallo welt".into(),
            zeitstempel: Some("2025-01-01 10:00".into()),
        }
    );

    // Positionale Argumente (user, message) wie vom Backend erwartet
    let mitschnitt = relay.mitschnitt.lock().unwrap().clone();
    let (_, args) = mitschnitt
        .iter()
        .find(|(t, _)| t == "SendMessage")
        .expect("SendMessage erwartet");
    assert_eq!(args, &vec![json!("carol"), json!("hallo welt")]);

    carol.stop().await;
}

#[tokio::test]
async fn passphrase_modus_nutzt_raum_schluessel() {
    let relay = relay_starten().await;
    let passphrase = |name: &str| {
        let mut cfg = config(&relay, name);
        cfg.krypto.passphrase = Some("geheim".into());
        cfg.krypto.raum = Some("lobby".into());
        cfg.krypto.pbkdf2_iterationen = 1_000;
        cfg
    };

    let (alice, mut alice_events) = ChatClient::starten(&passphrase("alice")).await.unwrap();
    let (bob, mut bob_events) = ChatClient::starten(&passphrase("bob")).await.unwrap();

    // Ohne Schluesselaustausch: genau ein Broadcast-Umschlag
    assert_eq!(
        alice.send_text("raum-nachricht").await.unwrap(),
        Zustellung::Verschluesselt(1)
    );
    match warte_auf_event(&mut bob_events, |e| e.ist_anzeigbar()).await {
        ChatEvent::Entschluesselt { from, text, .. } => {
            assert_eq!(from, PeerId::from("alice"));
            assert_eq!(text, "raum-nachricht");
        }
        other => panic!("Erwartet Entschluesselt, erhalten {:?}", other),
    }

    // Eigener Broadcast wird nicht als Nachricht gemeldet
    bob.send_text("antwort").await.unwrap();
    match warte_auf_event(&mut alice_events, |e| e.ist_anzeigbar()).await {
        ChatEvent::Entschluesselt { from, .. } => assert_eq!(from, PeerId::from("bob")),
        other => panic!("Erwartet Entschluesselt, erhalten {:?}", other),
    }

    alice.stop().await;
    bob.stop().await;
}

#[tokio::test]
async fn stop_meldet_verbindungsende() {
    let relay = relay_starten().await;
    let mut cfg = config(&relay, "alice");
    cfg.krypto.fallback = FallbackEinstellung::LegacyPlaintext;
    let (alice, mut events) = ChatClient::starten(&cfg).await.unwrap();
    assert!(alice.is_connected());

    alice.stop().await;
    assert!(!alice.is_connected());
    warte_auf_event(&mut events, |e| {
        matches!(e, ChatEvent::VerbindungGeschlossen { .. })
    })
    .await;

    // Nach dem Beenden ist Senden ein Fehler
    assert!(alice.send_text("zu spaet").await.is_err());
}

#[tokio::test]
async fn negotiate_fehler_wird_gemeldet() {
    let mut cfg = ClientConfig::default();
    cfg.verbindung.negotiate_url = "http://127.0.0.1:1/negotiate".into();
    cfg.verbindung.http_connect_timeout_sek = 1;
    cfg.verbindung.http_timeout_sek = 1;
    assert!(ChatClient::starten(&cfg).await.is_err());
}

#[tokio::test]
async fn zu_lange_nachricht_laesst_verbindung_bestehen() {
    let relay = relay_starten().await;
    let (alice, mut alice_events) = ChatClient::starten(&config(&relay, "alice")).await.unwrap();
    let (bob, mut bob_events) = ChatClient::starten(&config(&relay, "bob")).await.unwrap();
    warte_auf_event(&mut alice_events, schluessel_mit("bob")).await;
    warte_auf_event(&mut bob_events, schluessel_mit("alice")).await;

    // Nach Base64 groesser als ein Record sein darf
    let riesig = "x".repeat(800_000);
    assert!(alice.send_text(&riesig).await.is_err());
    assert!(alice.is_connected());

    assert_eq!(
        alice.send_text("kurz").await.unwrap(),
        Zustellung::Verschluesselt(1)
    );
    match warte_auf_event(&mut bob_events, |e| e.ist_anzeigbar()).await {
        ChatEvent::Entschluesselt { text, .. } => assert_eq!(text, "kurz"),
        other => panic!("Erwartet Entschluesselt, erhalten {:?}", other),
    }

    alice.stop().await;
    bob.stop().await;
}
