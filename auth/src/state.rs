//! Ticket guard state types.
//!
//! This module defines the values flowing through the analyzers: the
//! transport cookie, the credential ticket it decrypts to, the server-side
//! shadow record and the per-request context snapshot.

use crate::error::{GuardError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Key of a shadow record in the ticket store.
///
/// Rendered as a lowercase hyphenated UUID (36 characters), which is the
/// form embedded in a ticket's auxiliary data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketKey(pub uuid::Uuid);

impl TicketKey {
    /// Generate a new random `TicketKey`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for TicketKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TicketKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Transport
// ═══════════════════════════════════════════════════════════════════════

/// The credential cookie as read from a request or written to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCookie {
    /// Cookie name.
    pub name: String,

    /// Cookie domain (`None` when the cookie is host-only).
    pub domain: Option<String>,

    /// Cookie path.
    pub path: String,

    /// Whether the cookie is restricted to HTTPS.
    pub secure: bool,

    /// Expiry instant. `None` is the "never" sentinel of a session cookie.
    pub expires: Option<DateTime<Utc>>,

    /// Raw (encrypted) value.
    pub value: String,
}

impl TransportCookie {
    /// Create a session cookie with the given name, path and value.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: None,
            path: path.into(),
            secure: false,
            expires: None,
            value: value.into(),
        }
    }

    /// Set the cookie domain.
    #[must_use]
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    /// Set the secure flag.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the expiry instant.
    #[must_use]
    pub const fn with_expires(mut self, expires: Option<DateTime<Utc>>) -> Self {
        self.expires = expires;
        self
    }

    /// True if the cookie's domain names the same domain as `domain`.
    ///
    /// A leading dot and ASCII case are not significant, so `.example.com`
    /// matches `example.com`.
    #[must_use]
    pub fn domain_matches(&self, domain: Option<&str>) -> bool {
        fn bare(domain: &str) -> &str {
            domain.strip_prefix('.').unwrap_or(domain)
        }
        match (self.domain.as_deref(), domain) {
            (Some(a), Some(b)) => bare(a).eq_ignore_ascii_case(bare(b)),
            (None, None) => true,
            _ => false,
        }
    }

    /// True if the cookie carries an expiry that lies before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| now > expires)
    }

    /// True if the cookie carries a non-empty value.
    #[must_use]
    pub fn has_value(&self) -> bool {
        !self.value.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Credential Ticket
// ═══════════════════════════════════════════════════════════════════════

/// The decrypted payload of the credential cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialTicket {
    /// Protocol version.
    pub version: u8,

    /// Subject identity.
    pub name: String,

    /// Issue instant.
    pub issue_date: DateTime<Utc>,

    /// Expiration instant.
    pub expiration: DateTime<Utc>,

    /// Whether the ticket survives browser sessions.
    pub is_persistent: bool,

    /// Opaque auxiliary data. Rewritten to `<hash>;<key>` once a shadow
    /// record exists for the ticket.
    pub user_data: String,

    /// Path the issuing cookie was scoped to.
    pub cookie_path: String,
}

impl CredentialTicket {
    /// True if the ticket's expiration lies before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiration
    }

    /// Copy of this ticket with different auxiliary data.
    #[must_use]
    pub fn with_user_data(&self, user_data: impl Into<String>) -> Self {
        Self {
            user_data: user_data.into(),
            ..self.clone()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Shadow Record
// ═══════════════════════════════════════════════════════════════════════

/// Server-held mirror of an issued credential ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowRecord {
    /// Primary key in the ticket store.
    pub key: TicketKey,

    /// Subject the ticket was issued to.
    pub subject: String,

    /// Address of the client that received the ticket.
    pub host_address: String,

    /// User agent of the client that received the ticket.
    pub user_agent: Option<String>,

    /// Credential cookie name.
    pub cookie_name: String,

    /// Credential cookie domain.
    pub cookie_domain: Option<String>,

    /// Credential cookie path.
    pub cookie_path: String,

    /// Credential cookie secure flag.
    pub cookie_secure: bool,

    /// Ticket expiration.
    pub ticket_expiration: DateTime<Utc>,

    /// Ticket persistence flag.
    pub ticket_is_persistent: bool,

    /// Ticket issue date.
    pub ticket_issue_date: DateTime<Utc>,

    /// The ticket's original auxiliary data, moved here to make room for
    /// the packed hash and key.
    pub ticket_payload: String,

    /// Ticket version.
    pub ticket_version: u8,

    /// Hash of the ticket's stable fields.
    pub ticket_hash: String,
}

impl ShadowRecord {
    /// True if the mirrored ticket's expiration lies before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.ticket_expiration
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Request Context
// ═══════════════════════════════════════════════════════════════════════

/// An authenticated-or-anonymous identity as seen by one layer of the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Principal {
    /// Whether the identity is authenticated.
    pub is_authenticated: bool,

    /// Identity name (empty when anonymous).
    pub name: String,
}

impl Principal {
    /// An authenticated principal.
    #[must_use]
    pub fn authenticated(name: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            name: name.into(),
        }
    }

    /// The anonymous principal.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Snapshot of the calling client, taken once per analysis pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Client host address.
    pub host_address: String,

    /// Client user agent.
    pub user_agent: Option<String>,

    /// Whether the host considers the request authenticated.
    pub is_authenticated: bool,

    /// Subject name, if any.
    pub subject_name: Option<String>,
}

impl RequestContext {
    /// Build a context from the platform's current user and the ambient
    /// execution-context principal.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InconsistentPrincipal`] if the two principals
    /// disagree on authentication state or name.
    pub fn new(
        host_address: impl Into<String>,
        user_agent: Option<String>,
        platform: Option<&Principal>,
        ambient: Option<&Principal>,
    ) -> Result<Self> {
        let platform_authenticated = platform.is_some_and(|p| p.is_authenticated);
        let ambient_authenticated = ambient.is_some_and(|p| p.is_authenticated);
        if platform_authenticated != ambient_authenticated {
            return Err(GuardError::InconsistentPrincipal);
        }

        let platform_name = platform.map(|p| p.name.as_str()).filter(|n| !n.is_empty());
        let ambient_name = ambient.map(|p| p.name.as_str()).filter(|n| !n.is_empty());
        if platform_name != ambient_name {
            return Err(GuardError::InconsistentPrincipal);
        }

        Ok(Self {
            host_address: host_address.into(),
            user_agent,
            is_authenticated: platform_authenticated,
            subject_name: platform_name.map(str::to_string),
        })
    }

    /// Context for a request without any principal attached yet.
    #[must_use]
    pub fn anonymous(host_address: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            host_address: host_address.into(),
            user_agent,
            is_authenticated: false,
            subject_name: None,
        }
    }
}
