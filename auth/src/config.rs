//! Ticket guard configuration.
//!
//! Configuration is an explicit value built once at startup, validated, and
//! shared by `Arc` with every analyzer and the ticket store. Hosts may build
//! it in code with the `with_*` methods or load it from TOML.

use crate::constants::{DEFAULT_COOKIE_NAME, EXAMPLE_HASH_SALT, MAX_TICKET_TIMEOUT_SECONDS};
use crate::error::{GuardError, Result};
use chrono::Duration;
use serde::Deserialize;

/// Selection of the ticket store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TicketStoreKind {
    /// Process-local concurrent map.
    #[default]
    Memory,
}

/// Expected attributes of the credential cookie.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    /// Cookie name.
    pub name: String,

    /// Cookie domain (`None` for host-only cookies).
    pub domain: Option<String>,

    /// Cookie path.
    pub path: String,

    /// Whether the cookie must carry the secure flag.
    pub require_secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            domain: None,
            path: "/".to_string(),
            require_secure: false,
        }
    }
}

/// Stateful ticket validation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Whether shadow-record tracking is enabled.
    ///
    /// Default: true
    pub enabled: bool,

    /// Reject tickets presented from a host address other than the one
    /// they were issued to.
    ///
    /// Default: true
    pub enforce_host_address: bool,

    /// Reserved. Accepted for compatibility but not consulted by any
    /// analyzer.
    ///
    /// Default: false
    pub enforce_user_agent: bool,

    /// Salt mixed into every ticket hash. Required.
    pub hash_salt: String,

    /// Ticket store backend.
    pub store: TicketStoreKind,

    /// Credential cookie attributes.
    pub cookie: CookieSettings,

    /// Lifetime of minted tickets, in seconds.
    ///
    /// Default: 1800 (30 minutes)
    pub ticket_timeout_seconds: i64,

    /// Renew tickets and shadow records once half their lifetime has
    /// elapsed.
    ///
    /// Default: false
    pub sliding_expiration: bool,
}

impl GuardConfig {
    /// Create a configuration with the given hash salt and defaults for
    /// everything else.
    #[must_use]
    pub fn new(hash_salt: impl Into<String>) -> Self {
        Self {
            hash_salt: hash_salt.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidConfiguration`] if the document does not
    /// parse, or any error from [`GuardConfig::validate`].
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let config: Self = toml::from_str(document)
            .map_err(|e| GuardError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is safe to run with.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - tracking is enabled and the hash salt is empty
    /// - the hash salt equals the shipped example value
    /// - the cookie name or path is empty
    /// - the ticket timeout is not positive or exceeds
    ///   [`MAX_TICKET_TIMEOUT_SECONDS`]
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.hash_salt.is_empty() {
            return Err(GuardError::MissingConfiguration { field: "hash_salt" });
        }
        if self.hash_salt == EXAMPLE_HASH_SALT {
            return Err(GuardError::ExampleHashSalt);
        }
        if self.cookie.name.is_empty() {
            return Err(GuardError::MissingConfiguration { field: "cookie.name" });
        }
        if self.cookie.path.is_empty() {
            return Err(GuardError::MissingConfiguration { field: "cookie.path" });
        }
        if self.ticket_timeout_seconds <= 0 {
            return Err(GuardError::InvalidConfiguration(
                "ticket_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.ticket_timeout_seconds > MAX_TICKET_TIMEOUT_SECONDS {
            return Err(GuardError::InvalidConfiguration(format!(
                "ticket_timeout_seconds must not exceed {MAX_TICKET_TIMEOUT_SECONDS}"
            )));
        }
        Ok(())
    }

    /// Lifetime of minted tickets.
    #[must_use]
    ///
    /// Out-of-range values are clamped to [`MAX_TICKET_TIMEOUT_SECONDS`].
    pub fn ticket_timeout(&self) -> Duration {
        Duration::try_seconds(self.ticket_timeout_seconds.min(MAX_TICKET_TIMEOUT_SECONDS))
            .unwrap_or_else(Duration::zero)
    }

    /// Enable or disable shadow-record tracking.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enable or disable host address enforcement.
    #[must_use]
    pub const fn with_enforce_host_address(mut self, enforce: bool) -> Self {
        self.enforce_host_address = enforce;
        self
    }

    /// Set the (inert) user agent enforcement flag.
    #[must_use]
    pub const fn with_enforce_user_agent(mut self, enforce: bool) -> Self {
        self.enforce_user_agent = enforce;
        self
    }

    /// Set the credential cookie attributes.
    #[must_use]
    pub fn with_cookie(mut self, cookie: CookieSettings) -> Self {
        self.cookie = cookie;
        self
    }

    /// Set the ticket lifetime.
    #[must_use]
    pub fn with_ticket_timeout(mut self, timeout: Duration) -> Self {
        self.ticket_timeout_seconds = timeout.num_seconds();
        self
    }

    /// Enable or disable sliding expiration.
    #[must_use]
    pub const fn with_sliding_expiration(mut self, sliding: bool) -> Self {
        self.sliding_expiration = sliding;
        self
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enforce_host_address: true,
            enforce_user_agent: false,
            hash_salt: String::new(),
            store: TicketStoreKind::Memory,
            cookie: CookieSettings::default(),
            ticket_timeout_seconds: 1800,
            sliding_expiration: false,
        }
    }
}
