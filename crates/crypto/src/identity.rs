//! Sitzungs-Identitaet (P-256)
//!
//! Pro Prozessstart wird genau ein Schluessel-Paar erzeugt. Der private
//! Schluessel bleibt im Speicher und wird nie persistiert.

use p256::{PublicKey, SecretKey};

use crate::e2e::key_exchange::{derive_shared_key, export_public_key, generate_identity_keypair};
use crate::error::CryptoResult;
use crate::types::SymmetricKey;

/// P-256 Schluessel-Paar der laufenden Sitzung
pub struct Identity {
    secret: SecretKey,
    public: PublicKey,
}

impl Identity {
    /// Generiert ein neues Schluessel-Paar
    pub fn generate() -> Self {
        let (secret, public) = generate_identity_keypair();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Oeffentlicher Schluessel als SPKI DER (fuer die Ankuendigung)
    pub fn public_key_der(&self) -> CryptoResult<Vec<u8>> {
        export_public_key(&self.public)
    }

    /// Leitet den gemeinsamen Schluessel mit einem Peer ab
    pub fn derive_shared_key(&self, peer: &PublicKey) -> CryptoResult<SymmetricKey> {
        derive_shared_key(&self.secret, peer)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("curve", &"P-256")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::e2e::key_exchange::import_public_key;

    #[test]
    fn identitaet_generieren() {
        let a = Identity::generate();
        let b = Identity::generate();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn der_export_ist_importierbar() {
        let id = Identity::generate();
        let der = id.public_key_der().unwrap();
        assert_eq!(&import_public_key(&der).unwrap(), id.public_key());
    }

    #[test]
    fn gemeinsamer_schluessel_zwischen_identitaeten() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        assert_eq!(
            alice.derive_shared_key(bob.public_key()).unwrap(),
            bob.derive_shared_key(alice.public_key()).unwrap()
        );
    }

    #[test]
    fn debug_verraet_keinen_schluessel() {
        let debug = format!("{:?}", Identity::generate());
        assert!(debug.contains("REDACTED"));
    }
}
