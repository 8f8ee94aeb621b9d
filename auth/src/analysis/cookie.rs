//! Cookie analyzer.
//!
//! Validates the transport envelope against the configured cookie settings
//! and recovers the credential ticket inside it.

use crate::codec::TicketCodec;
use crate::config::CookieSettings;
use crate::state::{CredentialTicket, TransportCookie};
use chrono::{DateTime, Utc};

/// Checks performed on the transport cookie.
///
/// All checks except `exists` are `false` when no cookie was presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CookieChecks {
    /// A cookie was presented.
    pub exists: bool,
    /// The cookie name matches the configured name.
    pub name_valid: bool,
    /// The cookie domain matches the configured domain.
    pub domain_valid: bool,
    /// The cookie carries an expiry that has passed.
    pub expired: bool,
    /// The cookie path matches the configured path.
    pub path_valid: bool,
    /// The secure flag matches the configured requirement.
    pub secure_valid: bool,
    /// The cookie value is non-empty.
    pub has_value: bool,
    /// The value decoded to a credential ticket.
    pub value_decrypts: bool,
}

impl CookieChecks {
    /// Every check passes. An empty cookie is valid; a non-empty one must
    /// decode.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.exists
            && self.name_valid
            && self.domain_valid
            && !self.expired
            && self.path_valid
            && self.secure_valid
            && (!self.has_value || self.value_decrypts)
    }

    /// The cookie is invalid for a reason other than absence or natural
    /// expiry.
    #[must_use]
    pub const fn is_malicious(&self) -> bool {
        if !self.exists || self.is_valid() {
            return false;
        }
        !self.name_valid
            || !self.domain_valid
            || !self.path_valid
            || (self.has_value && !self.value_decrypts)
            || !self.secure_valid
    }
}

/// Result of analyzing the transport cookie.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CookieAnalysis {
    /// The analyzed cookie.
    pub cookie: Option<TransportCookie>,
    /// The ticket recovered from the cookie value.
    pub ticket: Option<CredentialTicket>,
    /// Individual check results.
    pub checks: CookieChecks,
}

impl CookieAnalysis {
    /// See [`CookieChecks::is_valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.checks.is_valid()
    }

    /// See [`CookieChecks::is_malicious`].
    #[must_use]
    pub const fn is_malicious(&self) -> bool {
        self.checks.is_malicious()
    }

    /// The cookie had naturally expired.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        self.checks.expired
    }
}

/// Analyze a (possibly absent) transport cookie.
///
/// Never fails: a value that does not decode is recorded as
/// `value_decrypts = false`.
#[must_use]
pub fn analyze_cookie(
    cookie: Option<&TransportCookie>,
    settings: &CookieSettings,
    codec: &dyn TicketCodec,
    now: DateTime<Utc>,
) -> CookieAnalysis {
    let Some(cookie) = cookie else {
        return CookieAnalysis::default();
    };

    let has_value = cookie.has_value();
    let ticket = if has_value {
        codec.decode(&cookie.value)
    } else {
        None
    };

    let checks = CookieChecks {
        exists: true,
        name_valid: cookie.name == settings.name,
        domain_valid: cookie.domain_matches(settings.domain.as_deref()),
        expired: cookie.is_expired_at(now),
        path_valid: cookie.path == settings.path,
        secure_valid: cookie.secure == settings.require_secure,
        has_value,
        value_decrypts: ticket.is_some(),
    };

    CookieAnalysis {
        cookie: Some(cookie.clone()),
        ticket,
        checks,
    }
}
