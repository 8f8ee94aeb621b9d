//! Layered credential analysis.
//!
//! ```text
//! TransportCookie ──► cookie ──► ticket ──► shadow ──► RequestAnalysis
//!                                  │                        │
//!                                  ▼                        ▼
//!                             TicketStore        compare(before, after)
//! ```
//!
//! Each layer produces an immutable record of named boolean checks with
//! `is_valid` and `is_malicious` derived from them. Absence is invalid but
//! never malicious; only mismatches that cannot be explained by a missing
//! or naturally expired credential count as tampering.

pub mod compare;
pub mod cookie;
pub mod request;
pub mod shadow;
pub mod ticket;

pub use compare::{classify, compare, ComparisonResult, Snapshot};
pub use cookie::{analyze_cookie, CookieAnalysis, CookieChecks};
pub use request::{RequestAnalysis, RequestAnalyzer};
pub use shadow::{analyze_resolved, analyze_shadow, ShadowAnalysis, ShadowChecks};
pub use ticket::{analyze_ticket, TicketAnalysis, TicketChecks};
