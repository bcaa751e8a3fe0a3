//! Hub-Verbindung – Negotiate, WebSocket, Handshake und Nachrichtenschleife
//!
//! Eine `HubConnection` durchlaeuft die Zustandsmaschine aus `state`.
//! Nach dem Handshake laeuft die Verbindung in einem eigenen tokio-Task,
//! der Lesen, Senden, Keepalive und Timeout in einem `select!` vereint.
//!
//! ## Keepalive
//! - Client sendet alle `keepalive` einen Hub-Ping (`{"type":6}`)
//! - Kommt laenger als `server_timeout` nichts an, gilt die Verbindung als beendet
//! - Ein Hub-`Close` beendet die Verbindung ohne Reconnect

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use hubcrypt_protocol::{HandshakeRequest, HandshakeResponse, HubMessage, RecordCodec};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::HubConfig;
use crate::dispatcher::{Handler, HandlerRegistry};
use crate::error::{RealtimeError, RealtimeResult};
use crate::negotiate::{http_client, hub_url, negotiate, NegotiateResponse};
use crate::state::{ChannelState, ZustandsZelle};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Maximale Wartezeit beim Beenden auf den Verbindungs-Task
const STOP_WARTEZEIT: Duration = Duration::from_secs(5);

/// Auftraege an den Verbindungs-Task
enum Befehl {
    /// Fertig kodierter Record
    Senden {
        record: String,
        ack: oneshot::Sender<RealtimeResult<()>>,
    },
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Baut eine `HubConnection` mit registrierten Handlern
pub struct HubConnectionBuilder {
    config: HubConfig,
    handlers: HandlerRegistry,
}

impl HubConnectionBuilder {
    /// Registriert einen Handler fuer eingehende Aufrufe von `target`
    pub fn on<F>(mut self, target: &str, handler: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.handlers.registrieren(target, handler);
        self
    }

    /// Erstellt die Verbindung im Zustand `Idle`
    pub fn build(self) -> RealtimeResult<HubConnection> {
        let http = http_client(&self.config)?;
        Ok(HubConnection {
            inner: Arc::new(Inner {
                config: self.config,
                handlers: Arc::new(self.handlers),
                http,
                zustand: ZustandsZelle::neu(),
                befehle: Mutex::new(None),
                task: Mutex::new(None),
                shutdown: watch::channel(false).0,
                schliessgrund: Mutex::new(None),
            }),
        })
    }

    /// Erstellt und startet die Verbindung
    pub async fn start(self) -> RealtimeResult<HubConnection> {
        let verbindung = self.build()?;
        verbindung.start().await?;
        Ok(verbindung)
    }
}

// ---------------------------------------------------------------------------
// HubConnection
// ---------------------------------------------------------------------------

struct Inner {
    config: HubConfig,
    handlers: Arc<HandlerRegistry>,
    http: reqwest::Client,
    zustand: ZustandsZelle,
    befehle: Mutex<Option<mpsc::Sender<Befehl>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    schliessgrund: Mutex<Option<String>>,
}

/// Duplex-Verbindung zum Hub (billig klonbar)
#[derive(Clone)]
pub struct HubConnection {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for HubConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConnection")
            .field("negotiate_url", &self.inner.config.negotiate_url)
            .field("zustand", &self.state())
            .field("handlers", &self.inner.handlers)
            .finish()
    }
}

impl HubConnection {
    pub fn builder(config: HubConfig) -> HubConnectionBuilder {
        HubConnectionBuilder {
            config,
            handlers: HandlerRegistry::neu(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.inner.zustand.aktuell()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.zustand.abonnieren()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Grund aus einer `Close`-Nachricht des Hubs (falls vorhanden)
    pub fn close_reason(&self) -> Option<String> {
        self.inner.schliessgrund.lock().clone()
    }

    /// Negotiate, WebSocket-Aufbau und Handshake
    ///
    /// Nur aus `Idle` erlaubt. Bei Fehlern endet die Verbindung in `Error`,
    /// es wird nicht erneut versucht.
    pub async fn start(&self) -> RealtimeResult<()> {
        if !self.inner.zustand.uebergang(ChannelState::Negotiating) {
            return Err(RealtimeError::UngueltigerZustand(self.state()));
        }

        let endpunkt = match negotiate(&self.inner.http, &self.inner.config.negotiate_url).await {
            Ok(e) => e,
            Err(e) => return Err(self.fehlschlag(e)),
        };

        if !self.inner.zustand.uebergang(ChannelState::Connecting) {
            // stop() waehrend Negotiate
            return Err(RealtimeError::UngueltigerZustand(self.state()));
        }

        let (ws, rest) = match self.verbinden(&endpunkt).await {
            Ok(v) => v,
            Err(e) => return Err(self.fehlschlag(e)),
        };

        let (befehle_tx, befehle_rx) = mpsc::channel(64);
        *self.inner.befehle.lock() = Some(befehle_tx);

        if !self.inner.zustand.uebergang(ChannelState::Connected) {
            self.inner.befehle.lock().take();
            return Err(RealtimeError::UngueltigerZustand(self.state()));
        }
        tracing::info!("Mit Hub verbunden");

        let schleife = Verbindungsschleife {
            ws,
            codec: RecordCodec::new(),
            puffer: rest,
            inner: Arc::clone(&self.inner),
        };
        let shutdown_rx = self.inner.shutdown.subscribe();
        let handle = tokio::spawn(schleife.betreiben(befehle_rx, shutdown_rx));
        *self.inner.task.lock() = Some(handle);
        Ok(())
    }

    /// Ruft eine Hub-Methode auf
    ///
    /// Das Ergebnis meldet nur ob der Aufruf geschrieben wurde; der Hub
    /// bestaetigt nichts. Ein nicht kodierbarer Aufruf (z.B. zu gross) ist ein
    /// Fehler dieses Aufrufs, die Verbindung bleibt bestehen.
    pub async fn send(&self, target: &str, arguments: Vec<Value>) -> RealtimeResult<()> {
        if !self.is_connected() {
            return Err(RealtimeError::NotConnected);
        }
        let record = als_record(HubMessage::invocation(target, arguments))?;
        let befehle = self
            .inner
            .befehle
            .lock()
            .clone()
            .ok_or(RealtimeError::NotConnected)?;

        let (ack_tx, ack_rx) = oneshot::channel();
        befehle
            .send(Befehl::Senden { record, ack: ack_tx })
            .await
            .map_err(|_| RealtimeError::NotConnected)?;

        ack_rx
            .await
            .map_err(|_| RealtimeError::Transport("Verbindung waehrend des Sendens beendet".to_string()))?
    }

    /// Beendet die Verbindung (best effort)
    ///
    /// Fehler beim Schliessen werden nur geloggt. Danach ist der Zustand
    /// `Closed` (oder bleibt `Error`).
    pub async fn stop(&self) {
        let _ = self.inner.shutdown.send(true);
        self.inner.befehle.lock().take();

        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(STOP_WARTEZEIT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(fehler = %e, "Verbindungs-Task abgebrochen"),
                Err(_) => tracing::warn!("Verbindungs-Task reagiert nicht auf Stop"),
            }
        }

        self.inner.zustand.uebergang(ChannelState::Closed);
        tracing::info!("Hub-Verbindung gestoppt");
    }

    fn fehlschlag(&self, fehler: RealtimeError) -> RealtimeError {
        tracing::error!(fehler = %fehler, "Verbindungsaufbau fehlgeschlagen");
        self.inner.zustand.uebergang(ChannelState::Error);
        fehler
    }

    /// WebSocket oeffnen und Handshake durchfuehren
    ///
    /// Gibt den Stream und bereits empfangene, noch nicht verarbeitete Bytes zurueck.
    async fn verbinden(&self, endpunkt: &NegotiateResponse) -> RealtimeResult<(WsStream, BytesMut)> {
        let config = &self.inner.config;
        let username = config
            .username
            .as_deref()
            .filter(|_| config.username_als_query);
        let url = hub_url(&endpunkt.url, username)?;

        let mut anfrage = url.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", endpunkt.access_token))
            .map_err(|e| RealtimeError::Transport(format!("Ungueltiges Token: {}", e)))?;
        anfrage.headers_mut().insert(AUTHORIZATION, bearer);

        tracing::info!(host = url.host_str().unwrap_or_default(), "Verbinde mit Hub");
        let (mut ws, _) = tokio::time::timeout(config.server_timeout, connect_async(anfrage))
            .await
            .map_err(|_| RealtimeError::Transport("Zeitlimit beim Verbindungsaufbau".to_string()))??;

        let mut codec = RecordCodec::new();
        let mut puffer = BytesMut::new();
        Encoder::<String>::encode(&mut codec, HandshakeRequest::default().to_json()?, &mut puffer)?;
        let handshake = String::from_utf8(puffer.split().to_vec())
            .map_err(|e| RealtimeError::Handshake(format!("Record kein UTF-8: {}", e)))?;
        ws.send(Message::Text(handshake)).await?;

        let antwort = tokio::time::timeout(
            config.server_timeout,
            handshake_antwort(&mut ws, &mut codec, &mut puffer),
        )
        .await
        .map_err(|_| RealtimeError::Handshake("Keine Antwort vom Hub".to_string()))??;

        if let Some(fehler) = antwort.error {
            return Err(RealtimeError::Handshake(fehler));
        }
        tracing::debug!("Handshake abgeschlossen");
        Ok((ws, puffer))
    }
}

async fn handshake_antwort(
    ws: &mut WsStream,
    codec: &mut RecordCodec,
    puffer: &mut BytesMut,
) -> RealtimeResult<HandshakeResponse> {
    loop {
        if let Some(record) = codec.decode(puffer)? {
            return HandshakeResponse::from_json(&record)
                .map_err(|e| RealtimeError::Handshake(format!("Antwort nicht lesbar: {}", e)));
        }
        match ws.next().await {
            Some(Ok(Message::Text(text))) => puffer.extend_from_slice(text.as_bytes()),
            Some(Ok(Message::Binary(daten))) => puffer.extend_from_slice(&daten),
            Some(Ok(Message::Close(_))) | None => {
                return Err(RealtimeError::Handshake(
                    "Verbindung vor dem Handshake geschlossen".to_string(),
                ))
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Verbindungsschleife
// ---------------------------------------------------------------------------

/// Warum die Schleife endet
enum Ende {
    HubClose(Option<String>),
    Getrennt,
    Timeout,
    Stop,
    Fehler(String),
}

struct Verbindungsschleife {
    ws: WsStream,
    codec: RecordCodec,
    puffer: BytesMut,
    inner: Arc<Inner>,
}

impl Verbindungsschleife {
    async fn betreiben(
        mut self,
        mut befehle_rx: mpsc::Receiver<Befehl>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let keepalive = self.inner.config.keepalive;
        let timeout_dauer = self.inner.config.server_timeout;

        let mut ping = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut letzter_empfang = Instant::now();

        // Records die schon mit der Handshake-Antwort ankamen
        let mut ende = self.records_verarbeiten().err();

        while ende.is_none() {
            tokio::select! {
                frame = self.ws.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            letzter_empfang = Instant::now();
                            self.puffer.extend_from_slice(text.as_bytes());
                            ende = self.records_verarbeiten().err();
                        }
                        Some(Ok(Message::Binary(daten))) => {
                            letzter_empfang = Instant::now();
                            self.puffer.extend_from_slice(&daten);
                            ende = self.records_verarbeiten().err();
                        }
                        Some(Ok(Message::Close(_))) | None => ende = Some(Ende::Getrennt),
                        Some(Ok(_)) => letzter_empfang = Instant::now(),
                        Some(Err(e)) => ende = Some(Ende::Fehler(e.to_string())),
                    }
                }

                befehl = befehle_rx.recv() => {
                    match befehl {
                        Some(Befehl::Senden { record, ack }) => {
                            let ergebnis = self.schreiben(record).await;
                            if let Err(e) = &ergebnis {
                                tracing::warn!(fehler = %e, "Senden fehlgeschlagen");
                                ende = Some(Ende::Fehler(e.to_string()));
                            }
                            let _ = ack.send(ergebnis);
                        }
                        None => ende = Some(Ende::Stop),
                    }
                }

                _ = ping.tick() => {
                    match als_record(HubMessage::Ping) {
                        Ok(record) => {
                            if let Err(e) = self.schreiben(record).await {
                                ende = Some(Ende::Fehler(e.to_string()));
                            }
                        }
                        Err(e) => tracing::warn!(fehler = %e, "Ping nicht kodierbar"),
                    }
                }

                _ = tokio::time::sleep_until(letzter_empfang + timeout_dauer) => {
                    ende = Some(Ende::Timeout);
                }

                _ = shutdown_rx.changed() => ende = Some(Ende::Stop),
            }
        }

        match ende {
            Some(Ende::HubClose(grund)) => {
                tracing::info!(grund = grund.as_deref().unwrap_or("-"), "Hub hat die Verbindung geschlossen");
                *self.inner.schliessgrund.lock() = grund;
            }
            Some(Ende::Getrennt) => tracing::info!("Verbindung vom Hub getrennt"),
            Some(Ende::Timeout) => tracing::warn!(
                timeout_sek = timeout_dauer.as_secs(),
                "Server-Timeout, keine Nachricht empfangen"
            ),
            Some(Ende::Stop) | None => {}
            Some(Ende::Fehler(e)) => tracing::warn!(fehler = %e, "Verbindung mit Fehler beendet"),
        }

        // Befehle ablehnen, bevor der Zustand wechselt
        befehle_rx.close();
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!(fehler = %e, "Schliessen des WebSocket fehlgeschlagen");
        }
        self.inner.zustand.uebergang(ChannelState::Closed);
    }

    /// Dekodiert alle vollstaendigen Records und dispatcht sie
    fn records_verarbeiten(&mut self) -> Result<(), Ende> {
        let records = self
            .codec
            .alle_records(&mut self.puffer)
            .map_err(|e| Ende::Fehler(e.to_string()))?;

        for record in records {
            match HubMessage::from_json(&record) {
                Ok(HubMessage::Invocation {
                    target, arguments, ..
                }) => {
                    tracing::trace!(target = %target, "Aufruf empfangen");
                    self.inner.handlers.dispatch(&target, &arguments);
                }
                Ok(HubMessage::Close { error, .. }) => return Err(Ende::HubClose(error)),
                Ok(HubMessage::Ping) => tracing::trace!("Ping vom Hub"),
                Ok(HubMessage::Completion { invocation_id, .. }) => {
                    tracing::debug!(invocation_id = %invocation_id, "Completion ignoriert")
                }
                Ok(HubMessage::Sonstige(typ)) => tracing::trace!(typ, "Nachricht ignoriert"),
                Err(e) => tracing::warn!(fehler = %e, "Unlesbare Hub-Nachricht verworfen"),
            }
        }
        Ok(())
    }

    /// Schreibt einen Record; ein Fehler hier ist ein Transportfehler
    async fn schreiben(&mut self, record: String) -> RealtimeResult<()> {
        self.ws.send(Message::Text(record)).await?;
        Ok(())
    }
}

/// Kodiert eine Hub-Nachricht als Record (JSON + `0x1E`)
///
/// Prueft die maximale Record-Groesse, bevor etwas in die Sendewarteschlange geht.
fn als_record(nachricht: HubMessage) -> RealtimeResult<String> {
    let mut puffer = BytesMut::new();
    Encoder::<HubMessage>::encode(&mut RecordCodec::new(), nachricht, &mut puffer)?;
    String::from_utf8(puffer.to_vec())
        .map_err(|e| RealtimeError::Transport(format!("Record kein UTF-8: {}", e)))
}
