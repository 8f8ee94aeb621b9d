//! # Ticketguard Testing
//!
//! Testing utilities and helpers for the ticket guard.
//!
//! This crate provides:
//! - Deterministic clocks
//! - Fixtures for configuration, request contexts and tickets
//! - A guard harness that wires a guard to an inspectable store
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```
//! use ticketguard_testing::helpers::GuardHarness;
//!
//! let harness = GuardHarness::new();
//! let cookie = harness.login("alice", "10.0.0.1");
//! assert!(cookie.is_some());
//! assert_eq!(harness.store.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use ticketguard_auth::environment::Clock;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticketguard_testing::mocks::FixedClock;
    /// use ticketguard_auth::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same instant, so a clone handed to the guard can be
    /// advanced from the test.
    #[derive(Debug, Clone)]
    pub struct MutableClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl MutableClock {
        /// Create a clock stopped at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an instant.
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for MutableClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// The instant [`test_clock`] is stopped at: 2025-01-01 00:00:00 UTC.
    #[must_use]
    pub fn test_instant() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_instant())
    }
}

/// Fixtures and a guard harness.
pub mod helpers {
    use super::mocks::{test_instant, MutableClock};
    use super::Clock;
    use std::sync::Arc;
    use ticketguard_auth::codec::{AesGcmTicketCodec, TicketCodec};
    use ticketguard_auth::config::GuardConfig;
    use ticketguard_auth::guard::{BeginOutcome, CookieDirective, EndOutcome, TicketGuard};
    use ticketguard_auth::state::{CredentialTicket, RequestContext, TransportCookie};
    use ticketguard_auth::stores::MemoryTicketStore;
    use ticketguard_auth::Result;

    /// Salt used by [`test_config`].
    pub const TEST_SALT: &str = "test-salt-not-for-production";

    /// Encryption key used by [`test_codec`].
    pub const TEST_KEY: [u8; 32] = [0x42; 32];

    /// Route guard logs to the test harness output. Filtered by `RUST_LOG`;
    /// safe to call from every test.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// A valid configuration with host address enforcement on.
    #[must_use]
    pub fn test_config() -> GuardConfig {
        GuardConfig::new(TEST_SALT)
    }

    /// Codec with a fixed key.
    #[must_use]
    pub fn test_codec() -> AesGcmTicketCodec {
        match AesGcmTicketCodec::new(&TEST_KEY) {
            Ok(codec) => codec,
            Err(_) => AesGcmTicketCodec::generate(),
        }
    }

    /// Anonymous context for a client at `host`.
    #[must_use]
    pub fn context(host: &str) -> RequestContext {
        RequestContext::anonymous(host, Some("test-agent/1.0".to_string()))
    }

    /// A version 2 ticket issued at `issued` for thirty minutes.
    #[must_use]
    pub fn ticket(subject: &str, issued: chrono::DateTime<chrono::Utc>) -> CredentialTicket {
        CredentialTicket {
            version: 2,
            name: subject.to_string(),
            issue_date: issued,
            expiration: issued + chrono::Duration::minutes(30),
            is_persistent: false,
            user_data: String::new(),
            cookie_path: "/".to_string(),
        }
    }

    /// The cookie a browser would send back after receiving `directive`.
    #[must_use]
    pub fn echoed(directive: &CookieDirective) -> Option<TransportCookie> {
        match directive {
            CookieDirective::Set(cookie) => Some(cookie.clone()),
            CookieDirective::Keep | CookieDirective::Clear(_) => None,
        }
    }

    /// A guard over a memory store, a fixed-key codec and a mutable clock.
    #[derive(Debug, Clone)]
    pub struct GuardHarness {
        /// The guard under test.
        pub guard: Arc<TicketGuard>,
        /// The store the guard writes to.
        pub store: Arc<MemoryTicketStore>,
        /// The codec the guard encodes with.
        pub codec: Arc<AesGcmTicketCodec>,
        /// The clock shared by guard and store.
        pub clock: MutableClock,
    }

    impl Default for GuardHarness {
        fn default() -> Self {
            Self::new()
        }
    }

    impl GuardHarness {
        /// Harness with [`test_config`].
        #[must_use]
        pub fn new() -> Self {
            Self::with_config(test_config())
        }

        /// Harness with a custom configuration.
        ///
        /// An invalid configuration falls back to [`test_config`]; use
        /// [`GuardHarness::try_with_config`] to observe the error.
        #[must_use]
        pub fn with_config(config: GuardConfig) -> Self {
            match Self::try_with_config(config) {
                Ok(harness) => harness,
                Err(_) => Self::new(),
            }
        }

        /// Harness with a custom configuration.
        ///
        /// # Errors
        ///
        /// Returns any configuration error from [`TicketGuard::new`].
        pub fn try_with_config(config: GuardConfig) -> Result<Self> {
            let clock = MutableClock::new(test_instant());
            let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
            let store = Arc::new(MemoryTicketStore::new(shared_clock.clone()));
            let codec = Arc::new(test_codec());
            let guard = TicketGuard::new(config, store.clone(), codec.clone(), shared_clock)?;
            Ok(Self {
                guard: Arc::new(guard),
                store,
                codec,
                clock,
            })
        }

        /// Encode a ticket with the harness codec into a cookie carrying the
        /// configured attributes.
        ///
        /// # Errors
        ///
        /// Returns error if encoding fails.
        pub fn cookie_for(&self, ticket: &CredentialTicket) -> Result<TransportCookie> {
            self.guard.auth_cookie(ticket)
        }

        /// Run one request through both hooks.
        ///
        /// # Errors
        ///
        /// Returns any error from the guard hooks.
        pub fn round_trip(
            &self,
            host: &str,
            request_cookie: Option<&TransportCookie>,
            response_cookie: Option<&TransportCookie>,
        ) -> Result<(BeginOutcome, EndOutcome)> {
            let ctx = context(host);
            let begin = self.guard.begin_request(&ctx, request_cookie)?;
            let end = self
                .guard
                .end_request(begin.scope.clone(), &ctx, response_cookie)?;
            Ok((begin, end))
        }

        /// Log `subject` in from `host` and return the rewritten credential
        /// cookie the client receives.
        #[must_use]
        pub fn login(&self, subject: &str, host: &str) -> Option<TransportCookie> {
            let ticket = self.guard.create_ticket(subject, false, "roles=user").ok()?;
            let minted = self.cookie_for(&ticket).ok()?;
            let (_, end) = self.round_trip(host, None, Some(&minted)).ok()?;
            echoed(&end.directive)
        }

        /// Decode a cookie value with the harness codec.
        #[must_use]
        pub fn decode(&self, cookie: &TransportCookie) -> Option<CredentialTicket> {
            self.codec.decode(&cookie.value)
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;
    use ticketguard_auth::state::CredentialTicket;

    /// Non-empty subject names, including non-ASCII ones.
    pub fn subject() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9@._\\-\u{e9}\u{4e2d}]{1,40}"
    }

    /// Instants between 2006-02-01 and 2100-01-01, at whole or fractional
    /// seconds.
    pub fn instant() -> impl Strategy<Value = DateTime<Utc>> {
        (1_138_752_000_i64..4_102_444_800_i64, prop_oneof![Just(0_u32), 0_u32..1_000_000_000])
            .prop_map(|(secs, nanos)| DateTime::from_timestamp(secs, nanos).unwrap_or_default())
    }

    /// Arbitrary well-formed tickets.
    pub fn ticket() -> impl Strategy<Value = CredentialTicket> {
        (
            subject(),
            instant(),
            1_i64..86_400,
            any::<bool>(),
            "[ -~]{0,64}",
            prop_oneof![Just("/".to_string()), "/[a-z]{1,12}"],
        )
            .prop_map(|(name, issue_date, lifetime, is_persistent, user_data, cookie_path)| {
                CredentialTicket {
                    version: 2,
                    name,
                    issue_date,
                    expiration: issue_date + Duration::seconds(lifetime),
                    is_persistent,
                    user_data,
                    cookie_path,
                }
            })
    }
}

// Re-export commonly used items
pub use helpers::GuardHarness;
pub use mocks::{test_clock, FixedClock, MutableClock};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_mutable_clock_clones_share_time() {
        let clock = MutableClock::new(mocks::test_instant());
        let handle = clock.clone();
        handle.advance(Duration::minutes(5));
        assert_eq!(clock.now(), mocks::test_instant() + Duration::minutes(5));
    }

    #[test]
    fn test_harness_login_stores_one_record() {
        let harness = GuardHarness::new();
        assert!(harness.login("alice", "10.0.0.1").is_some());
        assert_eq!(harness.store.len(), 1);
    }
}
