//! Aggregate request classification.

use super::cookie::{analyze_cookie, CookieAnalysis};
use super::shadow::{analyze_resolved, ShadowAnalysis};
use super::ticket::{analyze_ticket, TicketAnalysis};
use crate::codec::TicketCodec;
use crate::config::GuardConfig;
use crate::environment::Clock;
use crate::error::Result;
use crate::hash::TicketHasher;
use crate::providers::TicketStore;
use crate::state::{RequestContext, TransportCookie};
use std::sync::Arc;

/// The combined cookie, ticket and shadow-record analyses of one request
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAnalysis {
    /// Client snapshot the analysis was taken for.
    pub context: RequestContext,
    /// Transport envelope analysis.
    pub cookie: CookieAnalysis,
    /// Credential ticket analysis.
    pub ticket: TicketAnalysis,
    /// Shadow-record analysis. Empty when tracking is disabled.
    pub shadow: ShadowAnalysis,
    /// Whether shadow-record tracking was enabled.
    pub tracking_enabled: bool,
}

impl RequestAnalysis {
    /// A ticket was presented and its fields are acceptable.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.ticket.ticket.is_some() && self.ticket.is_valid()
    }

    /// Every layer is valid.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.cookie.is_valid()
            && self.ticket.is_valid()
            && (!self.tracking_enabled || self.shadow.is_valid())
    }

    /// Any layer detected tampering.
    #[must_use]
    pub const fn is_malicious(&self) -> bool {
        self.cookie.is_malicious()
            || self.ticket.is_malicious()
            || (self.tracking_enabled && self.shadow.is_malicious())
    }

    /// Names of the layers that flagged the request as malicious.
    #[must_use]
    pub fn malicious_layers(&self) -> Vec<&'static str> {
        let mut layers = Vec::new();
        if self.cookie.is_malicious() {
            layers.push("cookie");
        }
        if self.ticket.is_malicious() {
            layers.push("ticket");
        }
        if self.tracking_enabled && self.shadow.is_malicious() {
            layers.push("shadow_record");
        }
        layers
    }
}

/// Runs the three analyzers in order against shared configuration.
#[derive(Clone)]
pub struct RequestAnalyzer {
    config: Arc<GuardConfig>,
    store: Arc<dyn TicketStore>,
    codec: Arc<dyn TicketCodec>,
    hasher: TicketHasher,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RequestAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAnalyzer")
            .field("config", &self.config.cookie)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}

impl RequestAnalyzer {
    /// Create an analyzer.
    ///
    /// The configuration is expected to be validated already.
    #[must_use]
    pub fn new(
        config: Arc<GuardConfig>,
        store: Arc<dyn TicketStore>,
        codec: Arc<dyn TicketCodec>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let hasher = TicketHasher::new(config.hash_salt.clone());
        Self {
            config,
            store,
            codec,
            hasher,
            clock,
        }
    }

    /// The hasher built from the configured salt.
    #[must_use]
    pub const fn hasher(&self) -> &TicketHasher {
        &self.hasher
    }

    /// Analyze one snapshot of a request's credential cookie.
    ///
    /// # Errors
    ///
    /// Returns error only for broken hashing or an unavailable store.
    pub fn analyze(
        &self,
        context: &RequestContext,
        cookie: Option<&TransportCookie>,
    ) -> Result<RequestAnalysis> {
        let now = self.clock.now();
        let tracking_enabled = self.config.enabled;

        let cookie = analyze_cookie(cookie, &self.config.cookie, self.codec.as_ref(), now);
        let store = tracking_enabled.then_some(self.store.as_ref());
        let ticket = analyze_ticket(&cookie, &self.config.cookie.path, &self.hasher, store, now)?;
        let shadow = if tracking_enabled {
            analyze_resolved(context, &cookie, &ticket, self.config.enforce_host_address)
        } else {
            ShadowAnalysis::default()
        };

        Ok(RequestAnalysis {
            context: context.clone(),
            cookie,
            ticket,
            shadow,
            tracking_enabled,
        })
    }
}
