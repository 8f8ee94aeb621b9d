//! Error types for ticket validation and shadow-record storage.
//!
//! Only deployment mistakes, programmer errors and call-contract violations
//! are errors. A hostile or stale client never produces a `GuardError`: bad
//! decrypts, malformed auxiliary data and field mismatches are reported as
//! boolean checks on the analysis records instead.

use thiserror::Error;

/// Result type alias for guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Error taxonomy for the ticket guard.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    // ═══════════════════════════════════════════════════════════
    // Configuration Errors (fatal at startup)
    // ═══════════════════════════════════════════════════════════

    /// A mandatory configuration value is missing or empty.
    #[error("Missing configuration value: {field}")]
    MissingConfiguration {
        /// Name of the missing field
        field: &'static str,
    },

    /// The hash salt was left at the shipped example value.
    #[error("The hash salt is still set to the shipped example value")]
    ExampleHashSalt,

    /// A configuration value is present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ═══════════════════════════════════════════════════════════
    // Programmer Errors
    // ═══════════════════════════════════════════════════════════

    /// The digest produced an unexpected number of bytes or hex characters.
    #[error("Digest length mismatch: expected {expected}, got {actual}")]
    DigestLength {
        /// Expected length
        expected: usize,
        /// Observed length
        actual: usize,
    },

    /// The platform principal and the ambient principal disagree.
    #[error("Platform and ambient principals disagree")]
    InconsistentPrincipal,

    // ═══════════════════════════════════════════════════════════
    // Call Contract
    // ═══════════════════════════════════════════════════════════

    /// A required argument was empty.
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Argument name
        name: &'static str,
        /// Why it was rejected
        reason: &'static str,
    },

    // ═══════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════

    /// Encoding a credential ticket failed.
    #[error("Ticket codec error: {0}")]
    Codec(String),

    /// The ticket store is unavailable.
    #[error("Ticket store error: {0}")]
    Store(String),
}

impl GuardError {
    /// Shorthand for an empty required argument.
    #[must_use]
    pub const fn empty_argument(name: &'static str) -> Self {
        Self::InvalidArgument {
            name,
            reason: "cannot be empty",
        }
    }

    /// Returns `true` if this error should abort startup.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ticketguard_auth::GuardError;
    /// assert!(GuardError::ExampleHashSalt.is_configuration_error());
    /// assert!(!GuardError::empty_argument("key").is_configuration_error());
    /// ```
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingConfiguration { .. }
                | Self::ExampleHashSalt
                | Self::InvalidConfiguration(_)
        )
    }

    /// Returns `true` if a caller passed an argument that violates the
    /// operation's contract.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ticketguard_auth::GuardError;
    /// assert!(GuardError::empty_argument("subject").is_contract_violation());
    /// assert!(!GuardError::InconsistentPrincipal.is_contract_violation());
    /// ```
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}
