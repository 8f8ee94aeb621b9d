//! Comparison state machine.
//!
//! Classifies the change between the analysis taken when a request arrives
//! and the one taken when its response leaves.

use super::request::RequestAnalysis;
use std::fmt;

/// What happened to the credential over the course of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonResult {
    /// Neither snapshot was authenticated.
    UnauthenticatedRequest,
    /// Both snapshots were authenticated.
    AuthenticatedRequest,
    /// A credential was minted during the request.
    LoginRequest,
    /// The credential was dropped, or had naturally expired on arrival.
    LogoutRequest,
    /// Either snapshot showed tampering.
    MaliciousRequest,
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnauthenticatedRequest => "unauthenticated",
            Self::AuthenticatedRequest => "authenticated",
            Self::LoginRequest => "login",
            Self::LogoutRequest => "logout",
            Self::MaliciousRequest => "malicious",
        };
        f.write_str(name)
    }
}

/// The parts of a [`RequestAnalysis`] the state machine looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// See [`RequestAnalysis::is_authenticated`].
    pub authenticated: bool,
    /// See [`RequestAnalysis::is_malicious`].
    pub malicious: bool,
    /// The transport cookie had naturally expired.
    pub cookie_expired: bool,
}

impl Snapshot {
    /// Project an analysis onto the fields the state machine consults.
    #[must_use]
    pub const fn of(analysis: &RequestAnalysis) -> Self {
        Self {
            authenticated: analysis.is_authenticated(),
            malicious: analysis.is_malicious(),
            cookie_expired: analysis.cookie.is_expired(),
        }
    }
}

/// Classify a request from its before and after snapshots.
///
/// Rules are tried in order; the first match wins.
#[must_use]
pub const fn classify(before: Snapshot, after: Snapshot) -> ComparisonResult {
    if before.malicious || after.malicious {
        return ComparisonResult::MaliciousRequest;
    }
    match (before.authenticated, after.authenticated) {
        (true, true) => ComparisonResult::AuthenticatedRequest,
        (true, false) => ComparisonResult::LogoutRequest,
        (false, false) if before.cookie_expired => ComparisonResult::LogoutRequest,
        (false, true) => ComparisonResult::LoginRequest,
        (false, false) => ComparisonResult::UnauthenticatedRequest,
    }
}

/// Classify a request from its before and after analyses.
#[must_use]
pub const fn compare(before: &RequestAnalysis, after: &RequestAnalysis) -> ComparisonResult {
    classify(Snapshot::of(before), Snapshot::of(after))
}
