//! Zustandsmaschine des Echtzeit-Kanals
//!
//! ```text
//! Idle -> Negotiating -> Connecting -> Connected -> Closed
//!             |              |
//!             +--> Error <---+
//! ```
//!
//! Es gibt keinen automatischen Reconnect: `Closed` und `Error` sind
//! Endzustaende. `stop()` fuehrt aus jedem nicht-terminalen Zustand nach
//! `Closed`.

use tokio::sync::watch;

/// Zustand einer `HubConnection`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Idle,
    Negotiating,
    Connecting,
    Connected,
    Closed,
    Error,
}

impl ChannelState {
    /// Gibt true zurueck wenn aus diesem Zustand kein Weg mehr herausfuehrt
    pub fn ist_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }

    /// Prueft ob der Uebergang nach `ziel` erlaubt ist
    pub fn erlaubt(self, ziel: ChannelState) -> bool {
        use ChannelState::*;
        matches!(
            (self, ziel),
            (Idle, Negotiating)
                | (Negotiating, Connecting)
                | (Negotiating, Error)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connected, Closed)
                | (Idle | Negotiating | Connecting, Closed)
        )
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Negotiating => "Negotiating",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Closed => "Closed",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Geteilter Zustand mit Benachrichtigung der Beobachter
#[derive(Debug)]
pub(crate) struct ZustandsZelle {
    tx: watch::Sender<ChannelState>,
}

impl ZustandsZelle {
    pub(crate) fn neu() -> Self {
        let (tx, _) = watch::channel(ChannelState::Idle);
        Self { tx }
    }

    pub(crate) fn aktuell(&self) -> ChannelState {
        *self.tx.borrow()
    }

    pub(crate) fn abonnieren(&self) -> watch::Receiver<ChannelState> {
        self.tx.subscribe()
    }

    /// Fuehrt einen Uebergang atomar durch, falls er erlaubt ist
    ///
    /// Gibt false zurueck wenn der Uebergang verworfen wurde.
    pub(crate) fn uebergang(&self, ziel: ChannelState) -> bool {
        let mut von = ChannelState::Idle;
        let geaendert = self.tx.send_if_modified(|aktuell| {
            von = *aktuell;
            if aktuell.erlaubt(ziel) {
                *aktuell = ziel;
                true
            } else {
                false
            }
        });

        if geaendert {
            tracing::debug!(von = %von, nach = %ziel, "Zustandswechsel");
        } else {
            tracing::trace!(von = %von, nach = %ziel, "Zustandswechsel verworfen");
        }
        geaendert
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ChannelState::*;

    #[test]
    fn gueltiger_ablauf() {
        let zelle = ZustandsZelle::neu();
        for ziel in [Negotiating, Connecting, Connected, Closed] {
            assert!(zelle.uebergang(ziel), "Uebergang nach {} erwartet", ziel);
        }
        assert_eq!(zelle.aktuell(), Closed);
    }

    #[test]
    fn endzustaende_bleiben() {
        let zelle = ZustandsZelle::neu();
        zelle.uebergang(Negotiating);
        assert!(zelle.uebergang(Error));
        assert!(!zelle.uebergang(Connecting));
        assert!(!zelle.uebergang(Closed));
        assert_eq!(zelle.aktuell(), Error);
        assert!(Error.ist_terminal());
    }

    #[test]
    fn kein_error_aus_connected() {
        assert!(!Connected.erlaubt(Error));
        assert!(!Idle.erlaubt(Connected));
        assert!(Idle.erlaubt(Closed));
    }

    #[tokio::test]
    async fn beobachter_sehen_wechsel() {
        let zelle = ZustandsZelle::neu();
        let mut rx = zelle.abonnieren();
        zelle.uebergang(Negotiating);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Negotiating);
    }
}
