//! Ticket analyzer.
//!
//! Validates the fields of the decrypted credential ticket, unpacks its
//! auxiliary data and resolves the embedded store key to a shadow record.
//!
//! Validity deliberately ignores the hash and key checks. They feed the
//! shadow-record analyzer instead, which is where a tampered or revoked
//! ticket is classified.

use super::cookie::CookieAnalysis;
use crate::constants::{ISSUE_DATE_FLOOR_UNIX, SUPPORTED_TICKET_VERSION};
use crate::error::Result;
use crate::hash::TicketHasher;
use crate::providers::TicketStore;
use crate::state::{CredentialTicket, ShadowRecord, TicketKey};
use crate::user_data::EmbeddedData;
use chrono::{DateTime, Utc};

/// Checks performed on the credential ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TicketChecks {
    /// A ticket was recovered from the cookie.
    pub exists: bool,
    /// The ticket's cookie path matches the configured path.
    pub path_matches: bool,
    /// The ticket's expiration has passed.
    pub expired: bool,
    /// The issue date lies after the sanity floor.
    pub issue_date_valid: bool,
    /// The subject name is non-empty.
    pub name_valid: bool,
    /// Persistence flag. Accepted as-is.
    pub persistence_valid: bool,
    /// The version is the supported protocol version.
    pub version_valid: bool,
    /// The auxiliary data is non-empty.
    pub has_user_data: bool,
    /// A well-formed hash sits at the expected offset.
    pub user_data_contains_hash: bool,
    /// The embedded hash matches the recomputed one.
    pub user_data_hash_valid: bool,
    /// A well-formed store key is embedded.
    pub user_data_contains_key: bool,
    /// The embedded key resolved to a live shadow record.
    pub user_data_key_found: bool,
}

impl TicketChecks {
    /// The ticket's own fields are acceptable.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.exists
            && self.path_matches
            && !self.expired
            && self.issue_date_valid
            && self.name_valid
            && self.persistence_valid
            && self.version_valid
    }

    /// The ticket is invalid because a field was forged rather than because
    /// it expired.
    #[must_use]
    pub const fn is_malicious(&self) -> bool {
        if !self.exists || self.is_valid() {
            return false;
        }
        !self.path_matches
            || !self.persistence_valid
            || !self.issue_date_valid
            || !self.name_valid
            || !self.version_valid
    }
}

/// Result of analyzing the credential ticket.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TicketAnalysis {
    /// The analyzed ticket.
    pub ticket: Option<CredentialTicket>,
    /// The hash embedded in the auxiliary data.
    pub embedded_hash: Option<String>,
    /// The store key embedded in the auxiliary data.
    pub embedded_key: Option<TicketKey>,
    /// The shadow record the embedded key resolved to.
    pub record: Option<ShadowRecord>,
    /// Individual check results.
    pub checks: TicketChecks,
}

impl TicketAnalysis {
    /// See [`TicketChecks::is_valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.checks.is_valid()
    }

    /// See [`TicketChecks::is_malicious`].
    #[must_use]
    pub const fn is_malicious(&self) -> bool {
        self.checks.is_malicious()
    }
}

/// Analyze the ticket recovered by the cookie analyzer.
///
/// `store` is `None` when shadow-record tracking is disabled; the embedded
/// key is then never resolved.
///
/// # Errors
///
/// Returns [`GuardError::DigestLength`](crate::GuardError::DigestLength) if
/// hashing is broken, or [`GuardError::Store`](crate::GuardError::Store) if
/// the store lookup fails. Malformed tickets are never errors.
pub fn analyze_ticket(
    cookie: &CookieAnalysis,
    cookie_path: &str,
    hasher: &TicketHasher,
    store: Option<&dyn TicketStore>,
    now: DateTime<Utc>,
) -> Result<TicketAnalysis> {
    let Some(ticket) = cookie.ticket.as_ref().filter(|_| cookie.checks.has_value) else {
        return Ok(TicketAnalysis::default());
    };

    let embedded = EmbeddedData::parse(&ticket.user_data);

    let user_data_hash_valid = match embedded.hash.as_deref() {
        Some(hash) => hasher.validate(ticket, hash)?,
        None => false,
    };

    // The nil key is well-formed but never issued, so it is a plain miss.
    let record = match (embedded.key, store) {
        (Some(key), Some(store)) if !key.0.is_nil() => store.get(key)?,
        _ => None,
    };

    let checks = TicketChecks {
        exists: true,
        path_matches: ticket.cookie_path == cookie_path,
        expired: ticket.is_expired_at(now),
        issue_date_valid: DateTime::from_timestamp(ISSUE_DATE_FLOOR_UNIX, 0)
            .is_some_and(|floor| ticket.issue_date > floor),
        name_valid: !ticket.name.is_empty(),
        persistence_valid: true,
        version_valid: ticket.version == SUPPORTED_TICKET_VERSION,
        has_user_data: !ticket.user_data.is_empty(),
        user_data_contains_hash: embedded.contains_hash(),
        user_data_hash_valid,
        user_data_contains_key: embedded.contains_key(),
        user_data_key_found: record.is_some(),
    };

    Ok(TicketAnalysis {
        ticket: Some(ticket.clone()),
        embedded_hash: embedded.hash,
        embedded_key: embedded.key,
        record,
        checks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cookie::CookieChecks;
    use crate::environment::SystemClock;
    use crate::stores::MemoryTicketStore;
    use crate::user_data::pack;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn ticket(now: DateTime<Utc>) -> CredentialTicket {
        CredentialTicket {
            version: 2,
            name: "alice".to_string(),
            issue_date: now - Duration::minutes(1),
            expiration: now + Duration::minutes(30),
            is_persistent: false,
            user_data: String::new(),
            cookie_path: "/".to_string(),
        }
    }

    fn cookie_with(ticket: CredentialTicket) -> CookieAnalysis {
        CookieAnalysis {
            cookie: None,
            ticket: Some(ticket),
            checks: CookieChecks {
                exists: true,
                has_value: true,
                value_decrypts: true,
                ..CookieChecks::default()
            },
        }
    }

    fn valid_checks() -> TicketChecks {
        TicketChecks {
            exists: true,
            path_matches: true,
            expired: false,
            issue_date_valid: true,
            name_valid: true,
            persistence_valid: true,
            version_valid: true,
            ..TicketChecks::default()
        }
    }

    #[test]
    fn test_no_ticket_is_invalid_but_benign() {
        let hasher = TicketHasher::new("pepper");
        let analysis =
            analyze_ticket(&CookieAnalysis::default(), "/", &hasher, None, Utc::now()).unwrap();
        assert!(!analysis.checks.exists);
        assert!(!analysis.is_valid());
        assert!(!analysis.is_malicious());
    }

    #[test]
    fn test_plain_ticket_is_valid() {
        let now = Utc::now();
        let hasher = TicketHasher::new("pepper");
        let analysis = analyze_ticket(&cookie_with(ticket(now)), "/", &hasher, None, now).unwrap();
        assert!(analysis.is_valid());
        assert!(!analysis.checks.user_data_contains_hash);
        assert!(!analysis.checks.user_data_contains_key);
    }

    #[test]
    fn test_field_checks() {
        let now = Utc::now();
        let hasher = TicketHasher::new("pepper");
        let ancient = CredentialTicket {
            issue_date: Utc.with_ymd_and_hms(2006, 1, 22, 0, 0, 0).unwrap(),
            ..ticket(now)
        };
        let analysis = analyze_ticket(&cookie_with(ancient), "/", &hasher, None, now).unwrap();
        assert!(!analysis.checks.issue_date_valid);
        assert!(analysis.is_malicious());

        let v1 = CredentialTicket {
            version: 1,
            ..ticket(now)
        };
        let analysis = analyze_ticket(&cookie_with(v1), "/", &hasher, None, now).unwrap();
        assert!(!analysis.checks.version_valid);
        assert!(analysis.is_malicious());

        let analysis = analyze_ticket(&cookie_with(ticket(now)), "/app", &hasher, None, now).unwrap();
        assert!(!analysis.checks.path_matches);
        assert!(analysis.is_malicious());
    }

    #[test]
    fn test_expired_ticket_is_benign() {
        let checks = TicketChecks {
            expired: true,
            ..valid_checks()
        };
        assert!(!checks.is_valid());
        assert!(!checks.is_malicious());

        let checks = TicketChecks {
            name_valid: false,
            ..valid_checks()
        };
        assert!(checks.is_malicious());
    }

    #[test]
    fn test_embedded_hash_and_key() {
        let now = Utc::now();
        let hasher = TicketHasher::new("pepper");
        let store = MemoryTicketStore::new(Arc::new(SystemClock));
        let plain = ticket(now);
        let hash = hasher.compute(&plain).unwrap();
        let key = TicketKey::new();
        let packed = plain.with_user_data(pack(&hash, key));

        let analysis =
            analyze_ticket(&cookie_with(packed), "/", &hasher, Some(&store), now).unwrap();
        assert!(analysis.checks.user_data_contains_hash);
        assert!(analysis.checks.user_data_hash_valid);
        assert!(analysis.checks.user_data_contains_key);
        assert!(!analysis.checks.user_data_key_found);
        assert_eq!(analysis.embedded_key, Some(key));
        assert!(analysis.record.is_none());
        assert!(analysis.is_valid());
    }

    #[test]
    fn test_wrong_hash_does_not_affect_validity() {
        let now = Utc::now();
        let hasher = TicketHasher::new("pepper");
        let forged = ticket(now).with_user_data(pack(&"0".repeat(128), TicketKey::new()));

        let analysis = analyze_ticket(&cookie_with(forged), "/", &hasher, None, now).unwrap();
        assert!(analysis.checks.user_data_contains_hash);
        assert!(!analysis.checks.user_data_hash_valid);
        assert!(analysis.is_valid());
        assert!(!analysis.is_malicious());
    }

    #[test]
    fn test_nil_key_is_a_miss() {
        let now = Utc::now();
        let hasher = TicketHasher::new("pepper");
        let store = MemoryTicketStore::new(Arc::new(SystemClock));
        let nil = TicketKey(uuid::Uuid::nil());
        let forged = ticket(now).with_user_data(pack(&"0".repeat(128), nil));

        let analysis =
            analyze_ticket(&cookie_with(forged), "/", &hasher, Some(&store), now).unwrap();
        assert!(analysis.checks.user_data_contains_key);
        assert!(!analysis.checks.user_data_key_found);
        assert_eq!(analysis.embedded_key, Some(nil));
        assert!(analysis.record.is_none());
    }
}
