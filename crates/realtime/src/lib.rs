//! # hubcrypt-realtime
//!
//! Echtzeit-Kanal fuer hubcrypt: Negotiate per HTTP, danach eine
//! WebSocket-Verbindung mit dem JSON-Hub-Protokoll und benannten Nachrichten.
//!
//! ## Module
//! - `negotiate` - HTTP-Abfrage von Endpoint-URL und Access-Token
//! - `connection` - `HubConnection` mit Zustandsmaschine, Keepalive und Dispatch
//! - `dispatcher` - Handler-Registry pro Methodenname
//! - `state` - Verbindungszustaende
//! - `config` - Zeitlimits und Verbindungsparameter

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod negotiate;
pub mod state;

pub use config::HubConfig;
pub use connection::{HubConnection, HubConnectionBuilder};
pub use dispatcher::{Handler, HandlerRegistry};
pub use error::{RealtimeError, RealtimeResult};
pub use negotiate::{hub_url, negotiate, NegotiateResponse};
pub use state::ChannelState;
