//! Bearer-token session extractor.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRef, FromRequestParts};
use axum::response::{IntoResponse, Response};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use http::StatusCode;
use http::request::Parts;
use uuid::Uuid;

use storefront_domain::user::UserRole;

use crate::token::{TokenInfo, validate_access_token};

/// HMAC secret used to validate session tokens.
///
/// Application state must expose it through [`FromRef`] for [`Session`] to extract.
#[derive(Clone)]
pub struct SessionSecret(pub Arc<str>);

impl SessionSecret {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self(secret.into())
    }
}

/// Authenticated caller, taken from `Authorization: Bearer <jwt>`.
///
/// Returns 401 when the header is absent or the token does not validate.
/// Role enforcement (403) is done by handlers after extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub identifier: String,
    pub role: UserRole,
    pub expires_at: u64,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<TokenInfo> for Session {
    fn from(info: TokenInfo) -> Self {
        Self {
            user_id: info.user_id,
            identifier: info.identifier,
            role: info.role,
            expires_at: info.expires_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::MissingToken => "missing bearer token",
            Self::InvalidToken => "invalid or expired token",
        };
        let body = serde_json::json!({
            "kind": "INVALID_TOKEN",
            "message": message,
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    SessionSecret: FromRef<S>,
{
    type Rejection = SessionRejection;

    // Validation is synchronous; resolve it before building the returned future so the
    // future does not borrow `parts`.
    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let secret = SessionSecret::from_ref(state);
        let result = match parts.headers.typed_get::<Authorization<Bearer>>() {
            None => Err(SessionRejection::MissingToken),
            Some(Authorization(bearer)) => validate_access_token(bearer.token(), &secret.0)
                .map(Session::from)
                .map_err(|_| SessionRejection::InvalidToken),
        };

        async move { result }
    }
}
