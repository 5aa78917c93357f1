use std::time::{SystemTime, UNIX_EPOCH};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Serialize;

use storefront_auth_types::token::{JwtClaims, sign_claims};
use storefront_domain::identifier::Identifier;

use crate::domain::types::User;
use crate::error::StorefrontError;

/// Issued session token, returned by both password and OTP login.
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    /// Seconds since UNIX epoch.
    pub expires_at: u64,
}

/// Signs HS256 session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    pub secret: String,
    pub expires_in_secs: u64,
}

impl TokenIssuer {
    pub fn issue(
        &self,
        user: &User,
        identifier: &Identifier,
    ) -> Result<SessionToken, StorefrontError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StorefrontError::Internal(e.into()))?
            .as_secs();
        let exp = now + self.expires_in_secs;
        let claims = JwtClaims {
            sub: user.id.to_string(),
            identifier: identifier.value().to_owned(),
            role: user.role,
            exp,
        };
        let access_token =
            sign_claims(&claims, &self.secret).map_err(|e| StorefrontError::Internal(e.into()))?;
        Ok(SessionToken {
            access_token,
            token_type: "Bearer",
            expires_in: self.expires_in_secs,
            expires_at: exp,
        })
    }
}

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, StorefrontError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StorefrontError::Internal(anyhow::anyhow!("hash password: {e}")))
}

/// `true` if `password` matches the stored PHC hash. Unparsable hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
