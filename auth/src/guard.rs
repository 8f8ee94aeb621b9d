//! Request lifecycle.
//!
//! [`TicketGuard`] binds the analyzers, the comparison state machine and
//! the ticket store to the two hooks a host pipeline provides: one when a
//! request arrives and one when its response is about to leave.
//!
//! # Flow
//!
//! ```text
//! begin_request ──► before analysis ──► AuthStatus ──► RequestScope
//!                                                          │
//!                         (host handles the request)       │
//!                                                          ▼
//! end_request ──► after analysis ──► compare ──► store mutation + CookieDirective
//! ```

use crate::analysis::{compare, ComparisonResult, RequestAnalysis, RequestAnalyzer};
use crate::codec::TicketCodec;
use crate::config::GuardConfig;
use crate::constants::SUPPORTED_TICKET_VERSION;
use crate::environment::Clock;
use crate::error::{GuardError, Result};
use crate::providers::TicketStore;
use crate::state::{CredentialTicket, RequestContext, ShadowRecord, TicketKey, TransportCookie};
use crate::user_data::pack;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Credential status established when the request arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthStatus {
    /// No usable credential was presented.
    NotFound,
    /// A credential was presented but must not be trusted.
    Invalid,
    /// The credential and its shadow record agree.
    Valid,
}

/// State carried from [`TicketGuard::begin_request`] to
/// [`TicketGuard::end_request`].
#[derive(Debug, Clone)]
pub struct RequestScope {
    before: RequestAnalysis,
    status: AuthStatus,
}

impl RequestScope {
    /// The analysis taken when the request arrived.
    #[must_use]
    pub const fn before(&self) -> &RequestAnalysis {
        &self.before
    }

    /// The status established when the request arrived.
    #[must_use]
    pub const fn status(&self) -> AuthStatus {
        self.status
    }
}

/// Result of [`TicketGuard::begin_request`].
#[derive(Debug, Clone)]
pub struct BeginOutcome {
    /// Carry this to [`TicketGuard::end_request`].
    pub scope: RequestScope,

    /// Credential status.
    pub status: AuthStatus,

    /// The request showed tampering. Hosts may delay the response.
    pub malicious: bool,

    /// The credential cookie downstream handlers should see.
    ///
    /// `None` unless the status is [`AuthStatus::Valid`]. With tracking
    /// enabled this carries a re-encoded ticket whose auxiliary data is the
    /// payload held in the shadow record.
    pub downstream_cookie: Option<TransportCookie>,
}

impl BeginOutcome {
    /// The authenticated subject, if the status is valid.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        if self.status != AuthStatus::Valid {
            return None;
        }
        self.scope
            .before
            .ticket
            .ticket
            .as_ref()
            .map(|ticket| ticket.name.as_str())
    }
}

/// What the host must do with the credential cookie on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieDirective {
    /// Leave the response cookies as they are.
    Keep,
    /// Replace the credential cookie with this one.
    Set(TransportCookie),
    /// Replace the credential cookie with this expired, empty one.
    Clear(TransportCookie),
}

/// Result of [`TicketGuard::end_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOutcome {
    /// Verdict of the comparison, if one was run.
    pub verdict: Option<ComparisonResult>,

    /// The shadow record was renewed by sliding expiration.
    pub renewed: bool,

    /// Cookie action for the response.
    pub directive: CookieDirective,
}

impl EndOutcome {
    const fn keep(verdict: Option<ComparisonResult>) -> Self {
        Self {
            verdict,
            renewed: false,
            directive: CookieDirective::Keep,
        }
    }
}

/// Stateful credential-ticket validation for a host request pipeline.
#[derive(Clone)]
pub struct TicketGuard {
    config: Arc<GuardConfig>,
    store: Arc<dyn TicketStore>,
    codec: Arc<dyn TicketCodec>,
    clock: Arc<dyn Clock>,
    analyzer: RequestAnalyzer,
}

impl std::fmt::Debug for TicketGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketGuard")
            .field("enabled", &self.config.enabled)
            .field("analyzer", &self.analyzer)
            .finish_non_exhaustive()
    }
}

impl TicketGuard {
    /// Create a guard over an explicit store.
    ///
    /// # Errors
    ///
    /// Returns any error from [`GuardConfig::validate`].
    pub fn new(
        config: GuardConfig,
        store: Arc<dyn TicketStore>,
        codec: Arc<dyn TicketCodec>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let analyzer = RequestAnalyzer::new(config.clone(), store.clone(), codec.clone(), clock.clone());

        tracing::info!(
            enabled = config.enabled,
            enforce_host_address = config.enforce_host_address,
            sliding_expiration = config.sliding_expiration,
            cookie = %config.cookie.name,
            "Ticket guard initialized"
        );

        Ok(Self {
            config,
            store,
            codec,
            clock,
            analyzer,
        })
    }

    /// Create a guard over the store backend named in the configuration.
    ///
    /// # Errors
    ///
    /// Returns any error from [`GuardConfig::validate`].
    pub fn from_config(
        config: GuardConfig,
        codec: Arc<dyn TicketCodec>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = config.store.build(clock.clone());
        Self::new(config, store, codec, clock)
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// The shadow-record store.
    #[must_use]
    pub fn store(&self) -> &dyn TicketStore {
        self.store.as_ref()
    }

    /// The clock every expiry is evaluated against.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// The analyzer, for hosts that want to analyze cookies directly.
    #[must_use]
    pub const fn analyzer(&self) -> &RequestAnalyzer {
        &self.analyzer
    }

    // ═══════════════════════════════════════════════════════════
    // Hooks
    // ═══════════════════════════════════════════════════════════

    /// Analyze the credential cookie of an arriving request.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable or the substitute cookie
    /// cannot be encoded.
    pub fn begin_request(
        &self,
        context: &RequestContext,
        cookie: Option<&TransportCookie>,
    ) -> Result<BeginOutcome> {
        if self.config.enabled {
            self.store.remove_expired()?;
        }

        let before = self.analyzer.analyze(context, cookie)?;
        let malicious = before.is_malicious();
        let status = if before.is_authenticated() && before.is_valid() && !malicious {
            AuthStatus::Valid
        } else if before.is_authenticated() || malicious {
            AuthStatus::Invalid
        } else {
            AuthStatus::NotFound
        };

        if malicious {
            tracing::warn!(
                host_address = %context.host_address,
                layers = ?before.malicious_layers(),
                "Malicious credential presented"
            );
        } else if status == AuthStatus::Invalid {
            tracing::debug!(
                host_address = %context.host_address,
                "Credential rejected, treating request as anonymous"
            );
        }

        let downstream_cookie = match (status, cookie) {
            (AuthStatus::Valid, Some(cookie)) => Some(self.downstream_cookie(&before, cookie)?),
            _ => None,
        };

        Ok(BeginOutcome {
            scope: RequestScope { before, status },
            status,
            malicious,
            downstream_cookie,
        })
    }

    /// Compare the response's credential cookie against the arrival
    /// analysis and apply the verdict.
    ///
    /// `response_cookie` is the credential cookie the host set on the
    /// response, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable or a cookie cannot be
    /// encoded.
    pub fn end_request(
        &self,
        scope: RequestScope,
        context: &RequestContext,
        response_cookie: Option<&TransportCookie>,
    ) -> Result<EndOutcome> {
        if !self.config.enabled {
            return Ok(EndOutcome::keep(None));
        }

        if scope.status == AuthStatus::Valid && response_cookie.is_none() {
            return self.renew_if_old(&scope.before);
        }

        let before = &scope.before;
        let after = self.analyzer.analyze(context, response_cookie)?;
        let verdict = compare(before, &after);

        let directive = match verdict {
            ComparisonResult::LoginRequest => self.register(context, &after)?,
            ComparisonResult::LogoutRequest => {
                if let Some(record) = &before.ticket.record {
                    self.store.revoke(record.key)?;
                    tracing::info!(subject = %record.subject, key = %record.key, "Logout");
                }
                CookieDirective::Clear(self.clear_cookie())
            }
            ComparisonResult::MaliciousRequest => {
                tracing::warn!(
                    host_address = %context.host_address,
                    before = ?before.malicious_layers(),
                    after = ?after.malicious_layers(),
                    "Clearing credential of malicious request"
                );
                CookieDirective::Clear(self.clear_cookie())
            }
            ComparisonResult::AuthenticatedRequest
                if response_cookie.is_some() && after.ticket.record.is_none() =>
            {
                // A new credential replaced one that was already present.
                if let Some(record) = &before.ticket.record {
                    self.store.revoke(record.key)?;
                }
                self.register(context, &after)?
            }
            ComparisonResult::AuthenticatedRequest | ComparisonResult::UnauthenticatedRequest => {
                CookieDirective::Keep
            }
        };

        Ok(EndOutcome {
            verdict: Some(verdict),
            renewed: false,
            directive,
        })
    }

    // ═══════════════════════════════════════════════════════════
    // Credential helpers
    // ═══════════════════════════════════════════════════════════

    /// Mint a ticket for `subject` valid from now for the configured
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidArgument`] if `subject` is empty, or
    /// [`GuardError::InvalidConfiguration`] if the expiration is not
    /// representable.
    pub fn create_ticket(
        &self,
        subject: &str,
        is_persistent: bool,
        user_data: impl Into<String>,
    ) -> Result<CredentialTicket> {
        if subject.is_empty() {
            return Err(GuardError::empty_argument("subject"));
        }
        let now = self.clock.now();
        Ok(CredentialTicket {
            version: SUPPORTED_TICKET_VERSION,
            name: subject.to_string(),
            issue_date: now,
            expiration: self.expiration_from(now)?,
            is_persistent,
            user_data: user_data.into(),
            cookie_path: self.config.cookie.path.clone(),
        })
    }

    /// Encode `ticket` into a credential cookie with the configured
    /// attributes. Persistent tickets get an expiry; others are session
    /// cookies.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Codec`] if encoding fails.
    pub fn auth_cookie(&self, ticket: &CredentialTicket) -> Result<TransportCookie> {
        let value = self.codec.encode(ticket)?;
        Ok(
            TransportCookie::new(self.config.cookie.name.clone(), ticket.cookie_path.clone(), value)
                .with_domain(self.config.cookie.domain.clone())
                .with_secure(self.config.cookie.require_secure)
                .with_expires(ticket.is_persistent.then_some(ticket.expiration)),
        )
    }

    /// An empty credential cookie that expired a month ago.
    #[must_use]
    pub fn clear_cookie(&self) -> TransportCookie {
        TransportCookie::new(
            self.config.cookie.name.clone(),
            self.config.cookie.path.clone(),
            String::new(),
        )
        .with_domain(self.config.cookie.domain.clone())
        .with_secure(self.config.cookie.require_secure)
        .with_expires(Some(self.clock.now() - Duration::days(30)))
    }

    /// Revoke every shadow record held by `subject`, signing them out
    /// everywhere.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidArgument`] if `subject` is empty.
    pub fn revoke_subject(&self, subject: &str) -> Result<usize> {
        self.store.revoke_subject(subject)
    }

    // ═══════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════

    fn downstream_cookie(
        &self,
        before: &RequestAnalysis,
        cookie: &TransportCookie,
    ) -> Result<TransportCookie> {
        let (Some(ticket), Some(record)) = (&before.ticket.ticket, &before.ticket.record) else {
            return Ok(cookie.clone());
        };

        let original = CredentialTicket {
            version: record.ticket_version,
            name: record.subject.clone(),
            issue_date: record.ticket_issue_date,
            expiration: ticket.expiration,
            is_persistent: record.ticket_is_persistent,
            user_data: record.ticket_payload.clone(),
            cookie_path: record.cookie_path.clone(),
        };
        Ok(TransportCookie {
            value: self.codec.encode(&original)?,
            ..cookie.clone()
        })
    }

    /// Store a shadow record for the freshly minted credential in `after`
    /// and rewrite the client ticket to point at it.
    fn register(&self, context: &RequestContext, after: &RequestAnalysis) -> Result<CookieDirective> {
        let (Some(ticket), Some(cookie)) = (&after.ticket.ticket, &after.cookie.cookie) else {
            return Ok(CookieDirective::Keep);
        };

        let hash = self.analyzer.hasher().compute(ticket)?;
        let key = TicketKey::new();
        let record = ShadowRecord {
            key,
            subject: ticket.name.clone(),
            host_address: context.host_address.clone(),
            user_agent: context.user_agent.clone(),
            cookie_name: cookie.name.clone(),
            cookie_domain: cookie.domain.clone(),
            cookie_path: cookie.path.clone(),
            cookie_secure: cookie.secure,
            ticket_expiration: ticket.expiration,
            ticket_is_persistent: ticket.is_persistent,
            ticket_issue_date: ticket.issue_date,
            ticket_payload: ticket.user_data.clone(),
            ticket_version: ticket.version,
            ticket_hash: hash.clone(),
        };
        self.store.insert(record, ticket.expiration)?;

        tracing::info!(
            subject = %ticket.name,
            key = %key,
            host_address = %context.host_address,
            "Login"
        );

        let client = ticket.with_user_data(pack(&hash, key));
        Ok(CookieDirective::Set(self.auth_cookie(&client)?))
    }

    /// A full ticket lifetime from `now`.
    fn expiration_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_add_signed(self.config.ticket_timeout())
            .ok_or_else(|| {
                GuardError::InvalidConfiguration(
                    "ticket expiration is out of range".to_string(),
                )
            })
    }

    /// Sliding expiration: once less than half the ticket lifetime remains,
    /// extend ticket and shadow record to a full lifetime from now.
    fn renew_if_old(&self, before: &RequestAnalysis) -> Result<EndOutcome> {
        if !self.config.sliding_expiration {
            return Ok(EndOutcome::keep(None));
        }
        let (Some(ticket), Some(record)) = (&before.ticket.ticket, &before.ticket.record) else {
            return Ok(EndOutcome::keep(None));
        };

        let now = self.clock.now();
        let timeout = self.config.ticket_timeout();
        if ticket.expiration - now > timeout / 2 {
            return Ok(EndOutcome::keep(None));
        }

        let renewed = CredentialTicket {
            expiration: self.expiration_from(now)?,
            ..ticket.clone()
        };
        let hash = self.analyzer.hasher().compute(&renewed)?;
        let renewed_record = ShadowRecord {
            ticket_expiration: renewed.expiration,
            ticket_hash: hash.clone(),
            ..record.clone()
        };
        if !self.store.replace(renewed_record)? {
            return Ok(EndOutcome::keep(None));
        }

        tracing::debug!(subject = %record.subject, key = %record.key, "Renewed credential");

        let client = renewed.with_user_data(pack(&hash, record.key));
        Ok(EndOutcome {
            verdict: None,
            renewed: true,
            directive: CookieDirective::Set(self.auth_cookie(&client)?),
        })
    }
}
