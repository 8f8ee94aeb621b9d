//! Credential ticket codec.
//!
//! The host framework owns the ticket format; the guard only needs to turn a
//! cookie value into a [`CredentialTicket`] and back. A value that does not
//! authenticate, parse or deserialize decodes to `None`.

use crate::error::{GuardError, Result};
use crate::state::CredentialTicket;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::sync::Arc;

/// Nonce length for AES-GCM (96 bits).
const NONCE_LENGTH: usize = 12;

/// Converts between credential tickets and cookie values.
pub trait TicketCodec: Send + Sync {
    /// Encrypt and serialize a ticket into a cookie value.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Codec`] if the ticket cannot be serialized or
    /// encrypted.
    fn encode(&self, ticket: &CredentialTicket) -> Result<String>;

    /// Decrypt a cookie value. Returns `None` for anything that is not a
    /// ticket produced by [`TicketCodec::encode`] under the same key.
    fn decode(&self, value: &str) -> Option<CredentialTicket>;
}

/// AES-256-GCM ticket codec.
///
/// Cookie values are URL-safe base64 (no padding) of
/// `[nonce (12 bytes)][ciphertext (variable)]`, where the plaintext is the
/// JSON-serialized ticket.
#[derive(Clone)]
pub struct AesGcmTicketCodec {
    /// Wrapped in Arc for cheap cloning; every encode draws a fresh nonce.
    cipher: Arc<Aes256Gcm>,
}

impl std::fmt::Debug for AesGcmTicketCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmTicketCodec").finish_non_exhaustive()
    }
}

impl AesGcmTicketCodec {
    /// Create a codec from a 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidConfiguration`] if the key is not
    /// exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(GuardError::InvalidConfiguration(
                "Ticket encryption key must be exactly 32 bytes (256 bits) for AES-256-GCM"
                    .to_string(),
            ));
        }

        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| {
            GuardError::InvalidConfiguration(format!("Failed to initialize AES-256-GCM cipher: {e}"))
        })?;

        Ok(Self {
            cipher: Arc::new(cipher),
        })
    }

    /// Create a codec with a freshly generated random key.
    #[must_use]
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self {
            cipher: Arc::new(Aes256Gcm::new(&key)),
        }
    }
}

impl TicketCodec for AesGcmTicketCodec {
    fn encode(&self, ticket: &CredentialTicket) -> Result<String> {
        let plaintext =
            serde_json::to_vec(ticket).map_err(|e| GuardError::Codec(e.to_string()))?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|e| GuardError::Codec(format!("Encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn decode(&self, value: &str) -> Option<CredentialTicket> {
        let sealed = URL_SAFE_NO_PAD.decode(value).ok()?;
        if sealed.len() <= NONCE_LENGTH {
            return None;
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LENGTH);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self.cipher.decrypt(nonce, ciphertext).ok()?;

        serde_json::from_slice(&plaintext).ok()
    }
}
