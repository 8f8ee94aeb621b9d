//! Custom Axum extractors.
//!
//! - `ClientIp`: client address from forwarding headers or the connection
//! - `UserAgent`: the `User-Agent` header
//! - `GuardedRequest`: what the ticket guard established for this request
//! - `Authenticated`: the subject of a valid credential, or 401
//!
//! # Examples
//!
//! ```ignore
//! use ticketguard_web::extractors::Authenticated;
//!
//! async fn profile(user: Authenticated) -> String {
//!     format!("Signed in as {}", user.subject)
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{connect_info::ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use ticketguard_auth::{AuthStatus, BeginOutcome, RequestAnalysis};

/// Client IP address.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
/// 3. Connection IP (when served with `into_make_service_with_connect_info`)
/// 4. Loopback
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_ip(&parts.headers, parts.extensions.get())))
    }
}

/// Extract client IP from headers or connection info.
pub(crate) fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> IpAddr {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    let real = headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if let Some(ip) = real {
        return ip;
    }

    connect_info.map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |info| info.0.ip())
}

/// User-Agent header, if the client sent one.
#[derive(Debug, Clone)]
pub struct UserAgent(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(user_agent(&parts.headers)))
    }
}

pub(crate) fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// What the guard established when the request arrived.
///
/// Inserted into the request extensions by
/// [`ticket_guard`](crate::middleware::ticket_guard).
#[derive(Debug, Clone)]
pub struct GuardedRequest {
    /// Credential status.
    pub status: AuthStatus,
    /// The request showed tampering.
    pub malicious: bool,
    /// The authenticated subject, when the status is valid.
    pub subject: Option<String>,
    /// The full arrival analysis.
    pub analysis: Arc<RequestAnalysis>,
}

impl From<&BeginOutcome> for GuardedRequest {
    fn from(begin: &BeginOutcome) -> Self {
        Self {
            status: begin.status,
            malicious: begin.malicious,
            subject: begin.subject().map(str::to_string),
            analysis: Arc::new(begin.scope.before().clone()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for GuardedRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| AppError::internal("Ticket guard middleware not installed"))
    }
}

/// The subject of a valid credential. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct Authenticated {
    /// Authenticated subject name.
    pub subject: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let guarded = GuardedRequest::from_request_parts(parts, state).await?;
        guarded
            .subject
            .map(|subject| Self { subject })
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}
