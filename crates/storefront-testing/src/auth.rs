//! Bearer-token helpers for integration tests.
//!
//! `TestSession` signs a real HS256 token with a test secret, so requests pass
//! through the same `Session` extractor production traffic does.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use uuid::Uuid;

use storefront_auth_types::token::{JwtClaims, sign_claims};
use storefront_domain::user::UserRole;

pub const TEST_JWT_SECRET: &str = "storefront-test-secret";

/// Identity minted into test requests.
pub struct TestSession {
    pub user_id: Uuid,
    pub identifier: String,
    pub role: UserRole,
    pub secret: String,
}

impl TestSession {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self {
            user_id,
            identifier: format!("{user_id}@test.local"),
            role,
            secret: TEST_JWT_SECRET.to_owned(),
        }
    }

    pub fn customer(user_id: Uuid) -> Self {
        Self::new(user_id, UserRole::Customer)
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, UserRole::Admin)
    }

    /// Signed token valid for one hour.
    pub fn token(&self) -> String {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            + 3600;
        let claims = JwtClaims {
            sub: self.user_id.to_string(),
            identifier: self.identifier.clone(),
            role: self.role,
            exp,
        };
        sign_claims(&claims, &self.secret).expect("test token signing")
    }

    /// `Authorization: Bearer <token>` header value.
    pub fn bearer(&self) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", self.token())).expect("ascii bearer header")
    }

    pub fn headers(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, self.bearer());
        map
    }
}
