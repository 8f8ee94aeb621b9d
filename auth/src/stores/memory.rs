//! In-memory ticket store.
//!
//! Shadow records are held in a sharded concurrent map keyed by
//! [`TicketKey`]. Single-key operations lock one shard; enumerations walk
//! the shards one at a time, so they see a best-effort snapshot and never
//! stop writers on other shards.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ticketguard_auth::environment::SystemClock;
//! use ticketguard_auth::stores::MemoryTicketStore;
//!
//! let store = MemoryTicketStore::new(Arc::new(SystemClock));
//! assert!(store.is_empty());
//! ```

use crate::environment::Clock;
use crate::error::Result;
use crate::providers::ticket_store::{check_key, check_subject, same_subject};
use crate::providers::TicketStore;
use crate::state::{ShadowRecord, TicketKey};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A stored record and the instant it stops being served.
#[derive(Debug, Clone)]
struct Entry {
    record: ShadowRecord,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Process-local shadow-record store.
#[derive(Clone)]
pub struct MemoryTicketStore {
    entries: Arc<DashMap<TicketKey, Entry>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryTicketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTicketStore")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl MemoryTicketStore {
    /// Create an empty store that evaluates expiry with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Number of physically stored entries, including expired ones not yet
    /// purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is physically stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_records(&self, subject: Option<&str>) -> Vec<ShadowRecord> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| entry.is_live_at(now))
            .filter(|entry| subject.is_none_or(|s| same_subject(&entry.record.subject, s)))
            .map(|entry| entry.record.clone())
            .collect()
    }
}


impl TicketStore for MemoryTicketStore {
    fn insert(&self, record: ShadowRecord, expiration: DateTime<Utc>) -> Result<()> {
        check_key(record.key)?;
        check_subject(&record.subject)?;

        tracing::info!(
            key = %record.key,
            subject = %record.subject,
            expires_at = %expiration,
            "Inserting shadow record"
        );

        self.entries.insert(
            record.key,
            Entry {
                record,
                expires_at: expiration,
            },
        );
        Ok(())
    }

    fn get(&self, key: TicketKey) -> Result<Option<ShadowRecord>> {
        check_key(key)?;
        let now = self.clock.now();
        Ok(self
            .entries
            .get(&key)
            .filter(|entry| entry.is_live_at(now))
            .map(|entry| entry.record.clone()))
    }

    fn contains(&self, key: TicketKey) -> Result<bool> {
        check_key(key)?;
        let now = self.clock.now();
        Ok(self
            .entries
            .get(&key)
            .is_some_and(|entry| entry.is_live_at(now)))
    }

    fn revoke(&self, key: TicketKey) -> Result<()> {
        check_key(key)?;
        if self.entries.remove(&key).is_some() {
            tracing::info!(key = %key, "Revoked shadow record");
        } else {
            tracing::debug!(key = %key, "Revoke of unknown shadow record ignored");
        }
        Ok(())
    }

    fn update_expiration(&self, key: TicketKey, expiration: DateTime<Utc>) -> Result<bool> {
        check_key(key)?;
        let now = self.clock.now();
        let Some(mut entry) = self.entries.get_mut(&key) else {
            return Ok(false);
        };
        if !entry.is_live_at(now) {
            return Ok(false);
        }
        entry.expires_at = expiration;

        tracing::debug!(key = %key, expires_at = %expiration, "Extended shadow record");
        Ok(true)
    }

    fn replace(&self, record: ShadowRecord) -> Result<bool> {
        check_key(record.key)?;
        check_subject(&record.subject)?;
        let now = self.clock.now();
        let key = record.key;
        let Some(mut entry) = self.entries.get_mut(&key) else {
            return Ok(false);
        };
        if !entry.is_live_at(now) {
            return Ok(false);
        }
        entry.expires_at = record.ticket_expiration;
        entry.record = record;

        tracing::debug!(key = %key, expires_at = %entry.expires_at, "Renewed shadow record");
        Ok(true)
    }

    fn revoke_subject(&self, subject: &str) -> Result<usize> {
        check_subject(subject)?;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !same_subject(&entry.record.subject, subject);
            if !keep {
                removed += 1;
            }
            keep
        });

        tracing::info!(subject = %subject, removed, "Revoked subject shadow records");
        Ok(removed)
    }

    fn subject_records(&self, subject: &str) -> Result<Vec<ShadowRecord>> {
        check_subject(subject)?;
        Ok(self.live_records(Some(subject)))
    }

    fn subject_keys(&self, subject: &str) -> Result<Vec<TicketKey>> {
        check_subject(subject)?;
        Ok(self
            .live_records(Some(subject))
            .into_iter()
            .map(|record| record.key)
            .collect())
    }

    fn all_records(&self) -> Result<Vec<ShadowRecord>> {
        Ok(self.live_records(None))
    }

    fn all_keys(&self) -> Result<Vec<TicketKey>> {
        Ok(self
            .live_records(None)
            .into_iter()
            .map(|record| record.key)
            .collect())
    }

    fn subjects(&self) -> Result<Vec<String>> {
        // Keyed by lowercase name; the first spelling seen wins.
        let mut distinct: BTreeMap<String, String> = BTreeMap::new();
        for record in self.live_records(None) {
            distinct
                .entry(record.subject.to_lowercase())
                .or_insert(record.subject);
        }
        Ok(distinct.into_values().collect())
    }

    fn verify(&self, record: &ShadowRecord) -> Result<bool> {
        check_key(record.key)?;
        Ok(self
            .get(record.key)?
            .is_some_and(|stored| same_subject(&stored.subject, &record.subject)))
    }

    fn remove_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live_at(now));
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            tracing::debug!(removed, "Purged expired shadow records");
        }
        Ok(removed)
    }
}
