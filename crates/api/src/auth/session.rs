//! Anonymous session cookie.
//!
//! Every API request carries a `roast_session` id. When the browser sent
//! none (or an unparsable one) a fresh UUID is issued and set on the
//! response, so anonymous visitors can create and later claim characters.

use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::state::AppState;

/// Name of the anonymous session cookie.
pub const SESSION_COOKIE: &str = "roast_session";

/// Session cookie lifetime: one year.
const SESSION_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// The request's anonymous session id, inserted as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(pub Uuid);

/// Middleware: attach a [`SessionId`] and issue the cookie when missing.
pub async fn ensure_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = session_from_headers(request.headers());
    let session = existing.unwrap_or_else(Uuid::new_v4);
    request.extensions_mut().insert(SessionId(session));

    let mut response = next.run(request).await;

    if existing.is_none() {
        let cookie = session_cookie(session, state.config.secure_cookies());
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "Failed to build session cookie"),
        }
    }
    response
}

/// Read the session id from the `Cookie` headers, if present and valid.
pub fn session_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

fn session_cookie(session: Uuid, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={session}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_MAX_AGE_SECS}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn finds_session_among_other_cookies() {
        let id = Uuid::new_v4();
        let found = session_from_headers(&headers(&format!("theme=dark; roast_session={id}; x=1")));
        assert_eq!(found, Some(id));
    }

    #[test]
    fn garbage_session_is_ignored() {
        assert_eq!(session_from_headers(&headers("roast_session=not-a-uuid")), None);
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_attributes() {
        let id = Uuid::nil();
        let cookie = session_cookie(id, false);
        assert!(cookie.starts_with("roast_session=00000000-0000-0000-0000-000000000000;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
        assert!(session_cookie(id, true).ends_with("; Secure"));
    }
}
