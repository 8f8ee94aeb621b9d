//! Ticket hash engine.
//!
//! A salted SHA-512 digest over the stable fields of a credential ticket.
//! The digest is embedded in the ticket's auxiliary data and mirrored in the
//! shadow record; it lets the guard reject a tampered auxiliary-data field
//! without a store lookup. The outer ticket encryption remains the primary
//! tamper protection.

use crate::constants::{HASH_BYTE_LENGTH, HASH_HEX_LENGTH};
use crate::error::{GuardError, Result};
use crate::state::CredentialTicket;
use chrono::SecondsFormat;
use sha2::{Digest, Sha512};

/// Computes and validates ticket hashes with a fixed salt.
#[derive(Clone)]
pub struct TicketHasher {
    salt: String,
}

impl std::fmt::Debug for TicketHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketHasher").field("salt", &"<redacted>").finish()
    }
}

impl TicketHasher {
    /// Create a hasher with the configured salt.
    #[must_use]
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Compute the lowercase hex digest of `ticket`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::DigestLength`] if the digest or its rendering
    /// has an unexpected length. This indicates a broken build, never
    /// attacker input.
    pub fn compute(&self, ticket: &CredentialTicket) -> Result<String> {
        compute_hash(ticket, &self.salt)
    }

    /// Recompute the digest of `ticket` and compare it with `expected`.
    ///
    /// The comparison is ordinal and case-sensitive: an uppercase rendering
    /// of the right digest does not validate.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidArgument`] if `expected` is empty, or
    /// any error from [`TicketHasher::compute`].
    pub fn validate(&self, ticket: &CredentialTicket, expected: &str) -> Result<bool> {
        validate_hash(ticket, expected, &self.salt)
    }
}

/// The exact string that is digested for `ticket`.
fn hash_input(ticket: &CredentialTicket, salt: &str) -> String {
    format!(
        "||{}|{}|{}|{}|{}|{}|{}||",
        ticket.cookie_path,
        ticket.expiration.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ticket.is_persistent,
        ticket.issue_date.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ticket.name,
        ticket.version,
        salt,
    )
}

/// Compute the salted hash of `ticket`.
///
/// The input string is digested as UTF-32 little-endian code units.
///
/// # Errors
///
/// Returns [`GuardError::DigestLength`] if the digest has the wrong size.
pub fn compute_hash(ticket: &CredentialTicket, salt: &str) -> Result<String> {
    let input = hash_input(ticket, salt);

    let mut hasher = Sha512::new();
    for c in input.chars() {
        hasher.update(u32::from(c).to_le_bytes());
    }
    let digest = hasher.finalize();

    if digest.len() != HASH_BYTE_LENGTH {
        return Err(GuardError::DigestLength {
            expected: HASH_BYTE_LENGTH,
            actual: digest.len(),
        });
    }

    let rendered = hex::encode(digest);
    if rendered.len() != HASH_HEX_LENGTH {
        return Err(GuardError::DigestLength {
            expected: HASH_HEX_LENGTH,
            actual: rendered.len(),
        });
    }

    Ok(rendered)
}

/// Recompute the hash of `ticket` and compare it with `expected`.
///
/// # Errors
///
/// Returns [`GuardError::InvalidArgument`] if `expected` is empty, or any
/// error from [`compute_hash`].
pub fn validate_hash(ticket: &CredentialTicket, expected: &str, salt: &str) -> Result<bool> {
    if expected.is_empty() {
        return Err(GuardError::empty_argument("expected_hash"));
    }

    let actual = compute_hash(ticket, salt)?;
    Ok(constant_time_eq::constant_time_eq(
        expected.as_bytes(),
        actual.as_bytes(),
    ))
}
