//! Shadow-record analyzer.
//!
//! Cross-checks the server-held shadow record against the cookie and ticket
//! the client presented, and against the calling host address.

use super::cookie::CookieAnalysis;
use super::ticket::TicketAnalysis;
use crate::state::{RequestContext, ShadowRecord};

/// Agreement checks between the shadow record and the client's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShadowChecks {
    /// A shadow record was available.
    pub exists: bool,
    /// Record and cookie domains agree.
    pub cookie_domain_match: bool,
    /// Record, ticket and cookie paths all agree.
    pub cookie_path_match: bool,
    /// Record and cookie secure flags agree.
    pub cookie_secure_match: bool,
    /// Record and cookie names agree.
    pub cookie_name_match: bool,
    /// Record and ticket persistence flags agree.
    pub persistence_match: bool,
    /// Record and ticket issue dates are identical.
    pub issue_date_match: bool,
    /// Record and ticket subjects agree.
    pub subject_match: bool,
    /// Record and ticket versions agree.
    pub version_match: bool,
    /// The record hash equals the hash embedded in the ticket.
    pub hash_match: bool,
    /// The record was issued to the calling host address.
    pub host_address_match: bool,
    /// Whether `host_address_match` takes part in the verdict.
    pub enforce_host_address: bool,
}

impl ShadowChecks {
    const fn host_address_ok(&self) -> bool {
        !self.enforce_host_address || self.host_address_match
    }

    /// Record and credential agree on every field.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.exists
            && self.cookie_domain_match
            && self.cookie_path_match
            && self.cookie_secure_match
            && self.cookie_name_match
            && self.persistence_match
            && self.issue_date_match
            && self.subject_match
            && self.version_match
            && self.hash_match
            && self.host_address_ok()
    }

    /// Any disagreement between an existing record and the credential.
    #[must_use]
    pub const fn is_malicious(&self) -> bool {
        if !self.exists || self.is_valid() {
            return false;
        }
        !self.cookie_domain_match
            || !self.cookie_path_match
            || !self.cookie_secure_match
            || !self.cookie_name_match
            || !self.persistence_match
            || !self.issue_date_match
            || !self.subject_match
            || !self.version_match
            || !self.hash_match
            || !self.host_address_ok()
    }
}

/// Result of analyzing the shadow record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShadowAnalysis {
    /// The analyzed record.
    pub record: Option<ShadowRecord>,
    /// Individual check results.
    pub checks: ShadowChecks,
}

impl ShadowAnalysis {
    /// See [`ShadowChecks::is_valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.checks.is_valid()
    }

    /// See [`ShadowChecks::is_malicious`].
    #[must_use]
    pub const fn is_malicious(&self) -> bool {
        self.checks.is_malicious()
    }
}

/// Analyze the record the ticket analyzer resolved from the embedded key.
#[must_use]
pub fn analyze_resolved(
    context: &RequestContext,
    cookie: &CookieAnalysis,
    ticket: &TicketAnalysis,
    enforce_host_address: bool,
) -> ShadowAnalysis {
    analyze_shadow(
        context,
        cookie,
        ticket,
        ticket.record.as_ref(),
        enforce_host_address,
    )
}

/// Analyze an explicit shadow record.
///
/// No record means no server-side history, which is invalid but never
/// malicious. A record without a cookie or ticket to compare against
/// disagrees on every field.
#[must_use]
pub fn analyze_shadow(
    context: &RequestContext,
    cookie: &CookieAnalysis,
    ticket: &TicketAnalysis,
    record: Option<&ShadowRecord>,
    enforce_host_address: bool,
) -> ShadowAnalysis {
    let Some(record) = record else {
        return ShadowAnalysis::default();
    };

    let transport = cookie.cookie.as_ref();
    let credential = ticket.ticket.as_ref();

    let checks = ShadowChecks {
        exists: true,
        cookie_domain_match: transport
            .is_some_and(|c| c.domain_matches(record.cookie_domain.as_deref())),
        cookie_path_match: match (transport, credential) {
            (Some(c), Some(t)) => record.cookie_path == t.cookie_path && t.cookie_path == c.path,
            _ => false,
        },
        cookie_secure_match: transport.is_some_and(|c| c.secure == record.cookie_secure),
        cookie_name_match: transport.is_some_and(|c| c.name == record.cookie_name),
        persistence_match: credential.is_some_and(|t| t.is_persistent == record.ticket_is_persistent),
        issue_date_match: credential.is_some_and(|t| t.issue_date == record.ticket_issue_date),
        subject_match: credential.is_some_and(|t| t.name == record.subject),
        version_match: credential.is_some_and(|t| t.version == record.ticket_version),
        hash_match: ticket.embedded_hash.as_deref().is_some_and(|hash| {
            constant_time_eq::constant_time_eq(hash.as_bytes(), record.ticket_hash.as_bytes())
        }),
        host_address_match: record.host_address == context.host_address,
        enforce_host_address,
    };

    ShadowAnalysis {
        record: Some(record.clone()),
        checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cookie::CookieChecks;
    use crate::analysis::ticket::TicketChecks;
    use crate::state::{CredentialTicket, TicketKey, TransportCookie};
    use chrono::{Duration, Utc};

    struct Fixture {
        context: RequestContext,
        cookie: CookieAnalysis,
        ticket: TicketAnalysis,
        record: ShadowRecord,
    }

    fn fixture() -> Fixture {
        let now = Utc::now();
        let hash = "ab".repeat(64);
        let credential = CredentialTicket {
            version: 2,
            name: "alice".to_string(),
            issue_date: now,
            expiration: now + Duration::minutes(30),
            is_persistent: true,
            user_data: String::new(),
            cookie_path: "/".to_string(),
        };
        let record = ShadowRecord {
            key: TicketKey::new(),
            subject: "alice".to_string(),
            host_address: "10.0.0.1".to_string(),
            user_agent: None,
            cookie_name: ".TGAUTH".to_string(),
            cookie_domain: None,
            cookie_path: "/".to_string(),
            cookie_secure: false,
            ticket_expiration: credential.expiration,
            ticket_is_persistent: true,
            ticket_issue_date: now,
            ticket_payload: String::new(),
            ticket_version: 2,
            ticket_hash: hash.clone(),
        };
        Fixture {
            context: RequestContext::anonymous("10.0.0.1", None),
            cookie: CookieAnalysis {
                cookie: Some(TransportCookie::new(".TGAUTH", "/", "v")),
                ticket: Some(credential.clone()),
                checks: CookieChecks::default(),
            },
            ticket: TicketAnalysis {
                ticket: Some(credential),
                embedded_hash: Some(hash),
                embedded_key: Some(record.key),
                record: Some(record.clone()),
                checks: TicketChecks::default(),
            },
            record,
        }
    }

    #[test]
    fn test_no_record_is_benign() {
        let f = fixture();
        let analysis = analyze_shadow(&f.context, &f.cookie, &f.ticket, None, true);
        assert!(!analysis.is_valid());
        assert!(!analysis.is_malicious());
    }

    #[test]
    fn test_matching_record_is_valid() {
        let f = fixture();
        let analysis = analyze_resolved(&f.context, &f.cookie, &f.ticket, true);
        assert!(analysis.is_valid());
        assert!(!analysis.is_malicious());
    }

    #[test]
    fn test_host_address_enforcement() {
        let mut f = fixture();
        f.context.host_address = "192.0.2.7".to_string();

        let enforced = analyze_resolved(&f.context, &f.cookie, &f.ticket, true);
        assert!(!enforced.checks.host_address_match);
        assert!(enforced.is_malicious());

        let relaxed = analyze_resolved(&f.context, &f.cookie, &f.ticket, false);
        assert!(relaxed.is_valid());
    }

    #[test]
    fn test_hash_mismatch_is_malicious() {
        let mut f = fixture();
        f.ticket.embedded_hash = Some("cd".repeat(64));
        let analysis = analyze_resolved(&f.context, &f.cookie, &f.ticket, true);
        assert!(!analysis.checks.hash_match);
        assert!(analysis.is_malicious());
    }

    #[test]
    fn test_three_way_path_check() {
        let mut f = fixture();
        if let Some(cookie) = f.cookie.cookie.as_mut() {
            cookie.path = "/app".to_string();
        }
        let analysis = analyze_resolved(&f.context, &f.cookie, &f.ticket, true);
        assert!(!analysis.checks.cookie_path_match);
        assert!(analysis.is_malicious());
    }

    #[test]
    fn test_field_mismatches() {
        let f = fixture();
        let mismatched = [
            ShadowRecord { subject: "bob".to_string(), ..f.record.clone() },
            ShadowRecord { ticket_version: 1, ..f.record.clone() },
            ShadowRecord { ticket_is_persistent: false, ..f.record.clone() },
            ShadowRecord { cookie_secure: true, ..f.record.clone() },
            ShadowRecord { cookie_name: ".OTHER".to_string(), ..f.record.clone() },
            ShadowRecord { cookie_domain: Some("example.com".to_string()), ..f.record.clone() },
            ShadowRecord {
                ticket_issue_date: f.record.ticket_issue_date - Duration::seconds(1),
                ..f.record.clone()
            },
        ];
        for record in &mismatched {
            let analysis = analyze_shadow(&f.context, &f.cookie, &f.ticket, Some(record), false);
            assert!(!analysis.is_valid(), "{record:?}");
            assert!(analysis.is_malicious(), "{record:?}");
        }
    }

    #[test]
    fn test_record_without_credential_disagrees() {
        let f = fixture();
        let analysis = analyze_shadow(
            &f.context,
            &CookieAnalysis::default(),
            &TicketAnalysis::default(),
            Some(&f.record),
            false,
        );
        assert!(analysis.is_malicious());
    }
}
