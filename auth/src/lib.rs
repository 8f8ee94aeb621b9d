//! # Ticketguard Authentication
//!
//! Stateful validation of client-held credential tickets.
//!
//! A web framework hands its users an encrypted credential cookie. This
//! crate hardens that scheme against tampering, replay and ticket theft by
//! keeping a server-side shadow record of every issued ticket and
//! cross-checking the two on every request.
//!
//! ## Features
//!
//! - **Layered analysis**: cookie envelope, ticket fields, shadow record
//! - **Tamper classification**: invalid vs. malicious, never exceptions
//! - **Embedded integrity hash**: salted SHA-512 over the ticket's stable fields
//! - **Revocation**: per ticket or per subject
//! - **Sliding expiration**: optional renewal of ticket and record
//!
//! ## Architecture
//!
//! ```text
//! begin_request ─► RequestAnalysis (before) ─┐
//!                                            ├─► compare ─► TicketStore mutation
//! end_request ───► RequestAnalysis (after) ──┘              + CookieDirective
//! ```
//!
//! ## Example: Login
//!
//! ```rust,ignore
//! use ticketguard_auth::*;
//!
//! let guard = TicketGuard::from_config(config, codec, clock)?;
//!
//! // Request arrives without a credential.
//! let begin = guard.begin_request(&context, None)?;
//!
//! // The login handler mints a ticket.
//! let ticket = guard.create_ticket("alice", false, "")?;
//! let cookie = guard.auth_cookie(&ticket)?;
//!
//! // The shadow record is stored and the cookie rewritten to point at it.
//! let end = guard.end_request(begin.scope, &context, Some(&cookie))?;
//! assert_eq!(end.verdict, Some(ComparisonResult::LoginRequest));
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod analysis;
pub mod codec;
pub mod config;
pub mod constants;
pub mod environment;
pub mod error;
pub mod guard;
pub mod hash;
pub mod providers;
pub mod state;
pub mod stores;
pub mod user_data;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use analysis::{ComparisonResult, RequestAnalysis, RequestAnalyzer};
pub use codec::{AesGcmTicketCodec, TicketCodec};
pub use config::{CookieSettings, GuardConfig, TicketStoreKind};
pub use environment::{Clock, SystemClock};
pub use error::{GuardError, Result};
pub use guard::{AuthStatus, BeginOutcome, CookieDirective, EndOutcome, RequestScope, TicketGuard};
pub use hash::{compute_hash, validate_hash, TicketHasher};
pub use providers::TicketStore;
pub use state::{CredentialTicket, Principal, RequestContext, ShadowRecord, TicketKey, TransportCookie};
pub use stores::MemoryTicketStore;
