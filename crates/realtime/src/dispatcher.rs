//! Handler-Registry fuer eingehende Hub-Aufrufe
//!
//! Handler werden pro Methodenname registriert und synchron auf dem
//! Verbindungs-Task aufgerufen. Sie duerfen nicht blockieren: ein langsamer
//! Handler verzoegert alle nachfolgenden Nachrichten der Verbindung.
//! Methodennamen werden ohne Beachtung der Gross-/Kleinschreibung verglichen.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Callback fuer die Argumente eines Hub-Aufrufs
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Zuordnung Methodenname -> Handler
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Handler>>,
}

impl HandlerRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert einen weiteren Handler fuer `target`
    pub fn registrieren(&mut self, target: &str, handler: Handler) {
        self.handlers
            .entry(target.to_ascii_lowercase())
            .or_default()
            .push(handler);
    }

    /// Ruft alle Handler fuer `target` auf
    ///
    /// Gibt false zurueck wenn kein Handler registriert ist.
    pub fn dispatch(&self, target: &str, arguments: &[Value]) -> bool {
        match self.handlers.get(&target.to_ascii_lowercase()) {
            Some(handlers) => {
                for handler in handlers {
                    handler(arguments);
                }
                true
            }
            None => {
                tracing::debug!(target = %target, "Kein Handler registriert");
                false
            }
        }
    }

    pub fn targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        targets.sort_unstable();
        targets
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("targets", &self.targets())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
