//! Ticket store trait.
//!
//! This module defines the trait for persisting shadow records of issued
//! credential tickets, keyed by [`TicketKey`].

use crate::error::{GuardError, Result};
use crate::state::{ShadowRecord, TicketKey};
use chrono::{DateTime, Utc};

/// Shadow-record store.
///
/// # Implementation Notes
///
/// - Every entry carries an absolute expiration instant. Expiry is evaluated
///   against the store's clock on every read; an expired entry is reported
///   as absent even if it has not been purged yet.
/// - `insert`, `replace`, `update_expiration` and `revoke` are independent
///   atomic operations on a single key.
/// - Enumerations return point-in-time snapshots and never block writers.
/// - Subject names compare case-insensitively.
///
/// # Errors
///
/// Every operation returns [`GuardError::InvalidArgument`] for a nil key or
/// an empty subject, and [`GuardError::Store`] if the backend is unavailable.
/// A missing or expired record is never an error.
///
/// [`GuardError::InvalidArgument`]: crate::GuardError::InvalidArgument
/// [`GuardError::Store`]: crate::GuardError::Store
pub trait TicketStore: Send + Sync {
    /// Store `record` under its key until `expiration`, overwriting any
    /// previous entry with the same key.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn insert(&self, record: ShadowRecord, expiration: DateTime<Utc>) -> Result<()>;

    /// Fetch a live record.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn get(&self, key: TicketKey) -> Result<Option<ShadowRecord>>;

    /// Returns `true` if a live record exists for `key`.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn contains(&self, key: TicketKey) -> Result<bool>;

    /// Delete the record for `key`. Revoking an unknown key is a no-op.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn revoke(&self, key: TicketKey) -> Result<()>;

    /// Move the expiration of a live record.
    ///
    /// Returns `false` if no live record exists for `key`.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn update_expiration(&self, key: TicketKey, expiration: DateTime<Utc>) -> Result<bool>;

    /// Overwrite a live record in place, keeping its key, and expire it at
    /// the record's ticket expiration.
    ///
    /// Returns `false` if no live record exists for the key.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn replace(&self, record: ShadowRecord) -> Result<bool>;

    /// Delete every record held by `subject`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn revoke_subject(&self, subject: &str) -> Result<usize>;

    /// Live records held by `subject`.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn subject_records(&self, subject: &str) -> Result<Vec<ShadowRecord>>;

    /// Keys of the live records held by `subject`.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn subject_keys(&self, subject: &str) -> Result<Vec<TicketKey>>;

    /// Every live record.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn all_records(&self) -> Result<Vec<ShadowRecord>>;

    /// Every live key.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn all_keys(&self) -> Result<Vec<TicketKey>>;

    /// Distinct subjects holding at least one live record.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn subjects(&self) -> Result<Vec<String>>;

    /// Returns `true` if a live record with the same key exists and belongs
    /// to the same subject.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn verify(&self, record: &ShadowRecord) -> Result<bool>;

    /// Physically remove expired entries. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Store`](crate::GuardError::Store) if the backend
    /// is unavailable.
    fn remove_expired(&self) -> Result<usize>;
}

/// Reject the nil key, which is never issued.
pub(crate) fn check_key(key: TicketKey) -> Result<()> {
    if key.0.is_nil() {
        return Err(GuardError::InvalidArgument {
            name: "key",
            reason: "cannot be the nil UUID",
        });
    }
    Ok(())
}

/// Reject the anonymous (empty) subject.
pub(crate) fn check_subject(subject: &str) -> Result<()> {
    if subject.is_empty() {
        return Err(GuardError::empty_argument("subject"));
    }
    Ok(())
}

/// Subjects compare case-insensitively.
pub(crate) fn same_subject(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
