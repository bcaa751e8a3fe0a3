//! Sitzungs-Fassade
//!
//! Verbindet Identity, Peer-Schluessel-Speicher und AES-GCM:
//! - eingehende Payloads klassifizieren (Ankuendigung oder Chiffrat)
//! - Ankuendigungen in Peer-Schluessel umsetzen
//! - ausgehenden Text pro Peer verschluesseln
//! - Klartext-Fallback nur nach expliziter Vorgabe des Aufrufers

use chrono::Utc;
use hubcrypt_core::PeerId;
use hubcrypt_protocol::{
    CipherEnvelope, EnvelopeKind, LegacyPlainEnvelope, PublicKeyAnnouncement,
    ALGORITHMUS_EC_P256,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::e2e::decrypt::decrypt;
use crate::e2e::encrypt::encrypt;
use crate::e2e::key_exchange::import_public_key;
use crate::e2e::key_store::PeerKeyStore;
use crate::e2e::passphrase::derive_passphrase_key;
use crate::error::{CryptoError, CryptoResult};
use crate::identity::Identity;
use crate::types::SymmetricKey;

// ---------------------------------------------------------------------------
// Strategie und Policies
// ---------------------------------------------------------------------------

/// Woher der Schluessel fuer ausgehende Nachrichten kommt
#[derive(Debug, Clone, Default)]
pub enum KeyStrategy {
    /// Ein Schluessel pro Peer aus ECDH, ein Umschlag pro Peer
    #[default]
    PerPeerEcdh,
    /// Gemeinsamer Raum-Schluessel aus einer Passphrase, ein Broadcast-Umschlag
    Passphrase { raum: String, key: SymmetricKey },
}

impl KeyStrategy {
    /// Leitet den Raum-Schluessel ab und waehlt die Passphrase-Strategie
    pub fn passphrase(passphrase: &str, raum: &str, iterationen: u32) -> CryptoResult<Self> {
        let key = derive_passphrase_key(passphrase, raum, iterationen)?;
        Ok(Self::Passphrase {
            raum: raum.to_string(),
            key,
        })
    }
}

/// Verhalten wenn noch kein Peer-Schluessel existiert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Nachricht verwerfen
    #[default]
    Deny,
    /// Unverschluesselt ueber den Altpfad senden
    LegacyPlaintext,
}

// ---------------------------------------------------------------------------
// Ergebnisse
// ---------------------------------------------------------------------------

/// Ergebnis einer Ankuendigung fuer den Peer-Schluessel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchluesselStatus {
    /// Erster Schluessel dieses Peers
    Neu,
    /// Gleicher Schluessel wie bisher (wiederholte Ankuendigung)
    Unveraendert,
    /// Anderer Schluessel hat den bisherigen ersetzt
    Ersetzt,
}

impl SchluesselStatus {
    /// Der Peer kennt unseren Schluessel vermutlich noch nicht
    pub fn braucht_gegenankuendigung(self) -> bool {
        matches!(self, Self::Neu | Self::Ersetzt)
    }
}

/// Klassifizierter eingehender Payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Schluessel eines Peers abgeleitet und gespeichert
    KeyEstablished { peer: PeerId, status: SchluesselStatus },
    /// Eigene Ankuendigung (vom Hub zurueckgespiegelt)
    OwnAnnouncement,
    /// Chiffrat erfolgreich entschluesselt
    Decrypted { from: PeerId, plaintext: String },
    /// Chiffrat von einem Peer ohne gespeicherten Schluessel
    NoSharedKeyYet { from: PeerId },
    /// Chiffrat fuer einen anderen Empfaenger
    NotAddressedToUs { to: PeerId },
    /// Weder Ankuendigung noch Chiffrat
    Opaque,
}

/// Ergebnis der Vorbereitung einer ausgehenden Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Ein Umschlag pro Empfaenger (bzw. ein Broadcast im Passphrase-Modus)
    Encrypted(Vec<CipherEnvelope>),
    /// Unverschluesselt, nur bei `FallbackPolicy::LegacyPlaintext`
    LegacyPlaintext(LegacyPlainEnvelope),
    /// Kein Empfaenger und kein Fallback erlaubt
    Dropped,
}

// ---------------------------------------------------------------------------
// SessionCrypto
// ---------------------------------------------------------------------------

/// Krypto-Zustand einer Chat-Sitzung
#[derive(Debug)]
pub struct SessionCrypto {
    username: PeerId,
    identity: Identity,
    store: Arc<PeerKeyStore>,
    strategy: KeyStrategy,
}

impl SessionCrypto {
    /// Neue Sitzung mit frischer Identity und leerem Schluessel-Speicher
    pub fn new(username: impl Into<PeerId>) -> Self {
        Self::with_store(username, Arc::new(PeerKeyStore::new()))
    }

    /// Neue Sitzung mit einem geteilten Schluessel-Speicher
    pub fn with_store(username: impl Into<PeerId>, store: Arc<PeerKeyStore>) -> Self {
        Self {
            username: username.into(),
            identity: Identity::generate(),
            store,
            strategy: KeyStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: KeyStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn username(&self) -> &PeerId {
        &self.username
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn store(&self) -> &Arc<PeerKeyStore> {
        &self.store
    }

    pub fn strategy(&self) -> &KeyStrategy {
        &self.strategy
    }

    /// Ankuendigung des eigenen oeffentlichen Schluessels
    pub fn export_identity_announcement(&self) -> CryptoResult<PublicKeyAnnouncement> {
        Ok(PublicKeyAnnouncement::new(
            self.username.clone(),
            self.identity.public_key_der()?,
        ))
    }

    /// Verarbeitet eine Schluessel-Ankuendigung
    ///
    /// Kaputte Schluessel fuehren zu `KeyFormat`; die Sitzung bleibt davon
    /// unberuehrt.
    pub fn on_announcement(&self, raw: &str) -> CryptoResult<Incoming> {
        let announcement = match PublicKeyAnnouncement::from_json(raw) {
            Ok(a) => a,
            // Feld vorhanden, aber kein gueltiges Base64
            Err(e) if EnvelopeKind::erkennen(raw) == EnvelopeKind::Announcement => {
                return Err(CryptoError::KeyFormat(format!("Schluessel nicht lesbar: {}", e)));
            }
            Err(e) => return Err(e.into()),
        };

        if announcement.username == self.username {
            debug!("Eigene Ankuendigung ignoriert");
            return Ok(Incoming::OwnAnnouncement);
        }
        if announcement.username.is_empty() {
            return Err(CryptoError::UngueltigeDaten(
                "Ankuendigung ohne Benutzername".to_string(),
            ));
        }
        if announcement.algorithm != ALGORITHMUS_EC_P256 {
            return Err(CryptoError::KeyFormat(format!(
                "Nicht unterstuetzter Algorithmus: {}",
                announcement.algorithm
            )));
        }

        let peer_key = import_public_key(&announcement.public_key)?;
        let shared = self.identity.derive_shared_key(&peer_key)?;

        let peer = announcement.username;
        let status = match self.store.upsert(peer.clone(), shared.clone()) {
            None => {
                info!(peer = %peer, "Gemeinsamer Schluessel etabliert");
                SchluesselStatus::Neu
            }
            Some(alt) if *alt == shared => {
                debug!(peer = %peer, "Ankuendigung wiederholt, Schluessel unveraendert");
                SchluesselStatus::Unveraendert
            }
            Some(_) => {
                // Trust on first use: der neue Schluessel gewinnt ohne Pruefung
                warn!(peer = %peer, "Peer hat einen neuen Schluessel angekuendigt, alter Schluessel ersetzt");
                SchluesselStatus::Ersetzt
            }
        };

        Ok(Incoming::KeyEstablished { peer, status })
    }

    /// Verarbeitet einen Chiffrat-Umschlag
    ///
    /// Payloads ohne `cipher`-Feld sind `Opaque`, ein fehlender Schluessel
    /// ist `NoSharedKeyYet`. Ein Umschlag mit kaputtem IV oder Chiffrat
    /// (auch nicht dekodierbares Base64) ist `AuthenticationFailure`.
    pub fn on_cipher_envelope(&self, raw: &str) -> CryptoResult<Incoming> {
        let envelope = match CipherEnvelope::from_json(raw) {
            Ok(e) => e,
            Err(e) if EnvelopeKind::erkennen(raw) == EnvelopeKind::Cipher => {
                warn!(fehler = %e, "Chiffrat-Umschlag mit ungueltigen Feldern verworfen");
                return Err(CryptoError::AuthenticationFailure);
            }
            Err(e) => {
                debug!(fehler = %e, "Chiffrat-Umschlag nicht lesbar");
                return Ok(Incoming::Opaque);
            }
        };

        if let Some(to) = &envelope.to {
            if *to != self.username {
                return Ok(Incoming::NotAddressedToUs { to: to.clone() });
            }
        }

        let plaintext = match (&self.strategy, envelope.ist_broadcast()) {
            (KeyStrategy::Passphrase { raum, key }, true) => {
                decrypt(key, &envelope.iv, &envelope.ciphertext, Some(raum.as_bytes()))?
            }
            _ => {
                let Some(key) = self.store.get(envelope.from.as_str()) else {
                    info!(from = %envelope.from, "Chiffrat empfangen, aber noch kein gemeinsamer Schluessel");
                    return Ok(Incoming::NoSharedKeyYet {
                        from: envelope.from,
                    });
                };
                decrypt(&key, &envelope.iv, &envelope.ciphertext, None)?
            }
        };

        let plaintext = String::from_utf8(plaintext).map_err(|_| CryptoError::KeinUtf8)?;
        Ok(Incoming::Decrypted {
            from: envelope.from,
            plaintext,
        })
    }

    /// Klassifiziert einen beliebigen eingehenden Payload und verarbeitet ihn
    pub fn handle_incoming(&self, raw: &str) -> CryptoResult<Incoming> {
        match EnvelopeKind::erkennen(raw) {
            EnvelopeKind::Announcement => self.on_announcement(raw),
            EnvelopeKind::Cipher => self.on_cipher_envelope(raw),
            EnvelopeKind::Opaque => Ok(Incoming::Opaque),
        }
    }

    /// Verschluesselt einen Text fuer genau einen Peer
    pub fn encrypt_for_peer(&self, peer: &str, text: &str) -> CryptoResult<CipherEnvelope> {
        let key = self.store.get(peer).ok_or_else(|| CryptoError::NoSharedKey {
            peer: peer.to_string(),
        })?;
        self.umschlag(&key, Some(PeerId::from(peer)), text, None)
    }

    /// Verschluesselt einen Text fuer alle bekannten Peers
    ///
    /// Jeder Umschlag bekommt einen eigenen IV. Ohne bekannte Peers ist die
    /// Liste leer; im Passphrase-Modus entsteht genau ein Broadcast-Umschlag.
    pub fn encrypt_for_all_peers(&self, text: &str) -> CryptoResult<Vec<CipherEnvelope>> {
        if let KeyStrategy::Passphrase { raum, key } = &self.strategy {
            return Ok(vec![self.umschlag(key, None, text, Some(raum.as_bytes()))?]);
        }

        self.store
            .known_peers()
            .into_iter()
            .filter_map(|peer| self.store.get(peer.as_str()).map(|key| (peer, key)))
            .map(|(peer, key)| self.umschlag(&key, Some(peer), text, None))
            .collect()
    }

    /// Bereitet eine ausgehende Nachricht gemaess Fallback-Policy vor
    pub fn prepare_outgoing(&self, text: &str, policy: FallbackPolicy) -> CryptoResult<Outgoing> {
        let envelopes = self.encrypt_for_all_peers(text)?;
        if !envelopes.is_empty() {
            debug!(anzahl = envelopes.len(), "Nachricht verschluesselt");
            return Ok(Outgoing::Encrypted(envelopes));
        }

        match policy {
            FallbackPolicy::Deny => {
                warn!("Keine Peer-Schluessel vorhanden, Nachricht verworfen");
                Ok(Outgoing::Dropped)
            }
            FallbackPolicy::LegacyPlaintext => {
                warn!(
                    unverschluesselt = true,
                    "Keine Peer-Schluessel vorhanden, sende Klartext"
                );
                Ok(Outgoing::LegacyPlaintext(LegacyPlainEnvelope {
                    user: self.username.to_string(),
                    message: text.to_string(),
                    timestamp: Some(Utc::now().to_rfc3339()),
                }))
            }
        }
    }

    /// Alle Peers mit gespeichertem Schluessel
    pub fn peers(&self) -> Vec<PeerId> {
        self.store.known_peers()
    }

    pub fn has_peers(&self) -> bool {
        !self.store.is_empty()
    }

    fn umschlag(
        &self,
        key: &SymmetricKey,
        to: Option<PeerId>,
        text: &str,
        aad: Option<&[u8]>,
    ) -> CryptoResult<CipherEnvelope> {
        let payload = encrypt(key, text.as_bytes(), aad)?;
        Ok(CipherEnvelope {
            from: self.username.clone(),
            to,
            iv: payload.iv.as_bytes().to_vec(),
            ciphertext: payload.ciphertext,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
