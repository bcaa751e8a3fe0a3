//! hubcrypt – Konsolen-Chat
//!
//! Laedt die Konfiguration, initialisiert das Logging und verbindet mit dem
//! Hub. Eingabezeilen von stdin werden gesendet, Ereignisse auf stdout
//! ausgegeben.
//!
//! Befehle: `/peers` listet Peers mit Schluessel, `/quit` beendet.

use anyhow::{Context, Result};
use hubcrypt_client::{anzeige, ChatClient, ClientConfig, Zustellung};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad =
        std::env::var("HUBCRYPT_CONFIG").unwrap_or_else(|_| "hubcrypt.toml".into());

    let config = ClientConfig::laden(&config_pfad)?;
    config.validieren()?;

    hubcrypt_observability::logging_initialisieren(&config.logging.level, &config.logging.format)
        .context("Logging konnte nicht initialisiert werden")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        benutzer = %config.verbindung.benutzername,
        "hubcrypt wird gestartet"
    );

    let (client, mut events) = ChatClient::starten(&config)
        .await
        .context("Verbindung zum Hub fehlgeschlagen")?;

    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                println!("{}", anzeige::zeile(&event));
                if matches!(event, hubcrypt_core::ChatEvent::VerbindungGeschlossen { .. }) {
                    break;
                }
            }
            zeile = zeilen.next_line() => {
                let Some(zeile) = zeile? else { break };
                let text = zeile.trim();
                match text {
                    "" => continue,
                    "/quit" => break,
                    "/peers" => {
                        let peers = client.peers();
                        if peers.is_empty() {
                            println!("* Noch keine Peers mit Schluessel");
                        }
                        for peer in peers {
                            println!("* {}", peer);
                        }
                    }
                    _ => match client.send_text(text).await {
                        Ok(Zustellung::Verworfen) => {
                            println!("* Nicht gesendet: noch kein Peer mit Schluessel");
                        }
                        Ok(Zustellung::Klartext) => {
                            println!("* Unverschluesselt gesendet");
                        }
                        Ok(Zustellung::Verschluesselt(_)) => {}
                        Ok(Zustellung::Teilweise { fehlgeschlagen, .. }) => {
                            for peer in fehlgeschlagen {
                                println!("* Nicht zugestellt an {}", peer);
                            }
                        }
                        Err(e) if e.ist_wiederholbar() => {
                            println!("* Senden fehlgeschlagen ({}), bitte erneut versuchen", e);
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "Senden fehlgeschlagen");
                        }
                    },
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C empfangen");
                break;
            }
        }
    }

    client.stop().await;
    tracing::info!("hubcrypt beendet");
    Ok(())
}
