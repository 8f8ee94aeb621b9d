//! Axum integration for the ticket guard.
//!
//! Binds [`TicketGuard`](ticketguard_auth::TicketGuard)'s begin and end
//! hooks onto the `Cookie` and `Set-Cookie` headers of every request.
//!
//! # Request Flow
//!
//! ```text
//! Cookie ──► begin_request ──► handler ──► Set-Cookie ──► end_request ──► Set-Cookie
//!               │                 ▲
//!               └─ GuardedRequest ┘
//! ```
//!
//! Handlers read the outcome through the [`GuardedRequest`] and
//! [`Authenticated`] extractors and mint credentials with
//! [`set_cookie_header`].

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{Authenticated, ClientIp, GuardedRequest, UserAgent};
pub use middleware::{set_cookie_header, ticket_guard};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
