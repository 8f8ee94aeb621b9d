//! Mock ticket store for testing.

use crate::environment::Clock;
use crate::error::{GuardError, Result};
use crate::providers::ticket_store::{check_key, check_subject, same_subject};
use crate::providers::TicketStore;
use crate::state::{ShadowRecord, TicketKey};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type Entries = HashMap<TicketKey, (ShadowRecord, DateTime<Utc>)>;

/// Mock ticket store.
///
/// Mutex-protected map that can be switched into an unavailable state to
/// exercise backend failures.
#[derive(Clone)]
pub struct MockTicketStore {
    entries: Arc<Mutex<Entries>>,
    unavailable: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MockTicketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTicketStore")
            .field("unavailable", &self.unavailable.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl MockTicketStore {
    /// Create an empty mock store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            unavailable: Arc::new(AtomicBool::new(false)),
            clock,
        }
    }

    /// Make every subsequent operation fail (for testing).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored entries, expired or not (for testing).
    #[must_use]
    pub fn stored(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GuardError::Store("mock store unavailable".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| GuardError::Store("Lock poisoned".to_string()))
    }

    fn live(&self, subject: Option<&str>) -> Result<Vec<ShadowRecord>> {
        let now = self.clock.now();
        let entries = self.lock()?;
        Ok(entries
            .values()
            .filter(|(_, expires_at)| now <= *expires_at)
            .filter(|(record, _)| {
                subject.is_none_or(|s| same_subject(&record.subject, s))
            })
            .map(|(record, _)| record.clone())
            .collect())
    }
}

impl TicketStore for MockTicketStore {
    fn insert(&self, record: ShadowRecord, expiration: DateTime<Utc>) -> Result<()> {
        check_key(record.key)?;
        check_subject(&record.subject)?;
        self.lock()?.insert(record.key, (record, expiration));
        Ok(())
    }

    fn get(&self, key: TicketKey) -> Result<Option<ShadowRecord>> {
        check_key(key)?;
        let now = self.clock.now();
        Ok(self
            .lock()?
            .get(&key)
            .filter(|(_, expires_at)| now <= *expires_at)
            .map(|(record, _)| record.clone()))
    }

    fn contains(&self, key: TicketKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn revoke(&self, key: TicketKey) -> Result<()> {
        check_key(key)?;
        self.lock()?.remove(&key);
        Ok(())
    }

    fn update_expiration(&self, key: TicketKey, expiration: DateTime<Utc>) -> Result<bool> {
        check_key(key)?;
        let now = self.clock.now();
        let mut entries = self.lock()?;
        match entries.get_mut(&key) {
            Some((_, expires_at)) if now <= *expires_at => {
                *expires_at = expiration;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn replace(&self, record: ShadowRecord) -> Result<bool> {
        check_key(record.key)?;
        check_subject(&record.subject)?;
        let now = self.clock.now();
        let mut entries = self.lock()?;
        match entries.get_mut(&record.key) {
            Some(entry) if now <= entry.1 => {
                let expiration = record.ticket_expiration;
                *entry = (record, expiration);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn revoke_subject(&self, subject: &str) -> Result<usize> {
        check_subject(subject)?;
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, (record, _)| !same_subject(&record.subject, subject));
        Ok(before - entries.len())
    }

    fn subject_records(&self, subject: &str) -> Result<Vec<ShadowRecord>> {
        check_subject(subject)?;
        self.live(Some(subject))
    }

    fn subject_keys(&self, subject: &str) -> Result<Vec<TicketKey>> {
        check_subject(subject)?;
        Ok(self.live(Some(subject))?.into_iter().map(|r| r.key).collect())
    }

    fn all_records(&self) -> Result<Vec<ShadowRecord>> {
        self.live(None)
    }

    fn all_keys(&self) -> Result<Vec<TicketKey>> {
        Ok(self.live(None)?.into_iter().map(|r| r.key).collect())
    }

    fn subjects(&self) -> Result<Vec<String>> {
        let mut subjects: Vec<String> = self.live(None)?.into_iter().map(|r| r.subject).collect();
        subjects.sort_by_cached_key(|s| s.to_lowercase());
        subjects.dedup_by(|a, b| same_subject(a, b));
        Ok(subjects)
    }

    fn verify(&self, record: &ShadowRecord) -> Result<bool> {
        Ok(self
            .get(record.key)?
            .is_some_and(|stored| same_subject(&stored.subject, &record.subject)))
    }

    fn remove_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| now <= *expires_at);
        Ok(before - entries.len())
    }
}
