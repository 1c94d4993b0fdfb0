//! Owner identification for cart and order requests.
//!
//! An upstream auth gateway may set `x-owner-id`; that wins. Otherwise the
//! owner is the anonymous session named by the session cookie, and a fresh
//! session is provisioned when the request carries neither.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use common::OwnerId;
use doc_store::DocumentStore;

use crate::state::AppState;

/// Header carrying an authenticated owner id.
pub const OWNER_HEADER: &str = "x-owner-id";

const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

/// The owner a request acts for.
///
/// Returning it as a response part sets the session cookie when the session
/// was provisioned by this request.
#[derive(Debug, Clone)]
pub struct Session {
    pub owner: OwnerId,
    set_cookie: Option<HeaderValue>,
}

impl Session {
    /// True if this request created the session.
    pub fn is_new(&self) -> bool {
        self.set_cookie.is_some()
    }

    fn resolve(headers: &HeaderMap, cookie_name: &str) -> Self {
        if let Some(owner) = header_owner(headers) {
            return Self {
                owner,
                set_cookie: None,
            };
        }
        if let Some(owner) = cookie_owner(headers, cookie_name) {
            return Self {
                owner,
                set_cookie: None,
            };
        }

        let owner = OwnerId::anonymous();
        let cookie = format!(
            "{cookie_name}={owner}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_MAX_AGE_SECS}"
        );
        tracing::debug!(owner = %owner, "provisioned anonymous session");
        Self {
            owner,
            set_cookie: HeaderValue::from_str(&cookie).ok(),
        }
    }
}

fn header_owner(headers: &HeaderMap) -> Option<OwnerId> {
    let value = headers.get(OWNER_HEADER)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| OwnerId::new(value))
}

fn cookie_owner(headers: &HeaderMap, cookie_name: &str) -> Option<OwnerId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.trim().is_empty())
        .map(|(_, value)| OwnerId::new(value.trim()))
}

impl<S> FromRequestParts<Arc<AppState<S>>> for Session
where
    S: DocumentStore + Clone + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::resolve(&parts.headers, &state.session_cookie))
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(cookie) = self.set_cookie {
            res.headers_mut().append(SET_COOKIE, cookie);
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn header_owner_wins_over_cookie() {
        let session = Session::resolve(
            &headers(&[("x-owner-id", "user-42"), ("cookie", "session_id=sess_abc")]),
            "session_id",
        );
        assert_eq!(session.owner.as_str(), "user-42");
        assert!(!session.is_new());
    }

    #[test]
    fn cookie_is_found_among_others() {
        let session = Session::resolve(
            &headers(&[("cookie", "theme=dark; session_id=sess_abc; lang=en")]),
            "session_id",
        );
        assert_eq!(session.owner.as_str(), "sess_abc");
        assert!(!session.is_new());
    }

    #[test]
    fn missing_identity_provisions_a_session() {
        let session = Session::resolve(&headers(&[("cookie", "session_id=")]), "sid");
        assert!(session.is_new());
        assert!(session.owner.as_str().starts_with("sess_"));

        let cookie = session.set_cookie.clone().unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with(&format!("sid={}", session.owner)));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn blank_header_is_ignored() {
        let session = Session::resolve(
            &headers(&[("x-owner-id", "  "), ("cookie", "session_id=sess_abc")]),
            "session_id",
        );
        assert_eq!(session.owner.as_str(), "sess_abc");
    }
}
