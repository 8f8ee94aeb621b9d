//! Axum middleware binding the ticket guard onto HTTP cookies.
//!
//! # Example
//!
//! ```ignore
//! use axum::{middleware::from_fn_with_state, Router};
//! use ticketguard_web::middleware::ticket_guard;
//!
//! let guard = Arc::new(TicketGuard::from_config(config, codec, clock)?);
//! let app = Router::new()
//!     .route("/me", get(profile))
//!     .layer(from_fn_with_state(guard.clone(), ticket_guard))
//!     .with_state(guard);
//! ```
//!
//! # Flow
//!
//! 1. **Parse** the credential cookie from the `Cookie` header
//! 2. **Begin**: analyze it and establish the credential status
//! 3. **Rewrite** the `Cookie` header so handlers see the substitute
//!    credential, or none at all
//! 4. **Run** the handler with a [`GuardedRequest`] extension
//! 5. **End**: compare the handler's `Set-Cookie` for the credential against
//!    the arrival analysis
//! 6. **Apply** the resulting directive as a `Set-Cookie` header
//!
//! Browsers send only `name=value` pairs, so the request cookie's domain,
//! path and secure flag are taken from the configured cookie settings.

use crate::error::AppError;
use crate::extractors::{client_ip, user_agent, GuardedRequest};
use crate::WebResult;
use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use cookie::Cookie;
use std::net::SocketAddr;
use std::sync::Arc;
use ticketguard_auth::{
    CookieDirective, CookieSettings, RequestContext, TicketGuard, TransportCookie,
};
use time::OffsetDateTime;

/// Run every request through [`TicketGuard::begin_request`] and
/// [`TicketGuard::end_request`].
///
/// Guard failures short-circuit into an [`AppError`] response.
pub async fn ticket_guard(
    State(guard): State<Arc<TicketGuard>>,
    request: Request,
    next: Next,
) -> Response {
    match guard_request(&guard, request, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn guard_request(
    guard: &TicketGuard,
    mut request: Request,
    next: Next,
) -> WebResult<Response> {
    let settings = &guard.config().cookie;
    let host = client_ip(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
    );
    let context = RequestContext::anonymous(host.to_string(), user_agent(request.headers()));

    let presented = request_cookie(request.headers(), settings);
    let begin = guard.begin_request(&context, presented.as_ref())?;

    rewrite_cookie_header(
        request.headers_mut(),
        &settings.name,
        begin.downstream_cookie.as_ref(),
    );
    request.extensions_mut().insert(GuardedRequest::from(&begin));

    let mut response = next.run(request).await;

    let issued = response_cookie(response.headers(), settings, guard.clock().now());
    let end = guard.end_request(begin.scope, &context, issued.as_ref())?;
    if let Some(verdict) = end.verdict {
        tracing::debug!(verdict = %verdict, renewed = end.renewed, "Request classified");
    }
    apply_directive(response.headers_mut(), &settings.name, &end.directive)?;

    Ok(response)
}

/// The credential cookie from the request's `Cookie` headers.
fn request_cookie(headers: &HeaderMap, settings: &CookieSettings) -> Option<TransportCookie> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == settings.name)
        .map(|c| {
            TransportCookie::new(c.name(), settings.path.clone(), c.value())
                .with_domain(settings.domain.clone())
                .with_secure(settings.require_secure)
        })
}

/// Drop the credential from the `Cookie` headers and append `substitute`.
fn rewrite_cookie_header(
    headers: &mut HeaderMap,
    name: &str,
    substitute: Option<&TransportCookie>,
) {
    let mut pairs: Vec<String> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .filter(|c| c.name() != name)
        .map(|c| format!("{}={}", c.name(), c.value()))
        .collect();
    if let Some(cookie) = substitute {
        pairs.push(format!("{}={}", cookie.name, cookie.value));
    }

    headers.remove(header::COOKIE);
    if pairs.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&pairs.join("; ")) {
        headers.insert(header::COOKIE, value);
    }
}

/// The last credential cookie the handler set on the response.
fn response_cookie(
    headers: &HeaderMap,
    settings: &CookieSettings,
    now: DateTime<Utc>,
) -> Option<TransportCookie> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v).ok())
        .rfind(|c| c.name() == settings.name)
        .map(|c| {
            // Max-Age wins over Expires; one past the representable range
            // never expires.
            let expires = match c.max_age() {
                Some(age) => Duration::try_seconds(age.whole_seconds())
                    .and_then(|age| now.checked_add_signed(age)),
                None => c
                    .expires_datetime()
                    .and_then(|at| DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())),
            };
            TransportCookie::new(c.name(), c.path().unwrap_or(&settings.path), c.value())
                .with_domain(c.domain().map(str::to_string))
                .with_secure(c.secure().unwrap_or(false))
                .with_expires(expires)
        })
}

fn apply_directive(
    headers: &mut HeaderMap,
    name: &str,
    directive: &CookieDirective,
) -> WebResult<()> {
    let cookie = match directive {
        CookieDirective::Keep => return Ok(()),
        CookieDirective::Set(cookie) | CookieDirective::Clear(cookie) => cookie,
    };

    let others: Vec<HeaderValue> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter(|v| {
            v.to_str()
                .ok()
                .and_then(|s| Cookie::parse(s).ok())
                .is_none_or(|c| c.name() != name)
        })
        .cloned()
        .collect();

    headers.remove(header::SET_COOKIE);
    for value in others {
        headers.append(header::SET_COOKIE, value);
    }
    headers.append(header::SET_COOKIE, set_cookie_header(cookie)?);
    Ok(())
}

/// Render a credential cookie as a `Set-Cookie` header value.
///
/// Handlers use this to hand a freshly minted credential to the middleware.
///
/// # Errors
///
/// Returns [`AppError`] if the expiry is out of range or the rendered
/// cookie is not a valid header value.
pub fn set_cookie_header(cookie: &TransportCookie) -> WebResult<HeaderValue> {
    let mut builder = Cookie::build((cookie.name.clone(), cookie.value.clone()))
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(true);
    if let Some(domain) = &cookie.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(expires) = cookie.expires {
        let at = OffsetDateTime::from_unix_timestamp(expires.timestamp())
            .map_err(|e| AppError::internal(format!("Cookie expiry out of range: {e}")))?;
        builder = builder.expires(at);
    }

    HeaderValue::from_str(&builder.build().to_string())
        .map_err(|e| AppError::internal(format!("Invalid cookie header: {e}")))
}
