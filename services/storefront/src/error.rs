use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use storefront_core::error::json_error;

/// Storefront domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum StorefrontError {
    #[error("user not found")]
    UserNotFound,
    #[error("product not found")]
    ProductNotFound,
    #[error("variant not found")]
    VariantNotFound,
    #[error("cart item not found")]
    CartItemNotFound,
    #[error("order not found")]
    OrderNotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid or expired otp")]
    InvalidOrExpiredOtp,
    #[error("invalid otp, {remaining_attempts} attempts remaining")]
    InvalidOtp { remaining_attempts: u64 },
    #[error("forbidden")]
    Forbidden,
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("too many attempts, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("insufficient stock for product {product_id}, {available} available")]
    InsufficientStock {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        available: i32,
    },
    #[error("cart is empty")]
    EmptyCart,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl StorefrontError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::ProductNotFound => "PRODUCT_NOT_FOUND",
            Self::VariantNotFound => "VARIANT_NOT_FOUND",
            Self::CartItemNotFound => "CART_ITEM_NOT_FOUND",
            Self::OrderNotFound => "ORDER_NOT_FOUND",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidOrExpiredOtp => "INVALID_OR_EXPIRED_OTP",
            Self::InvalidOtp { .. } => "INVALID_OTP",
            Self::Forbidden => "FORBIDDEN",
            Self::UserAlreadyExists => "USER_ALREADY_EXISTS",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::EmptyCart => "EMPTY_CART",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::UserNotFound
            | Self::ProductNotFound
            | Self::VariantNotFound
            | Self::CartItemNotFound
            | Self::OrderNotFound => StatusCode::NOT_FOUND,
            Self::InvalidCredentials
            | Self::InvalidToken
            | Self::InvalidOrExpiredOtp
            | Self::InvalidOtp { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::UserAlreadyExists | Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::InvalidInput(_) | Self::EmptyCart => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Extractor rejections surface as INVALID_INPUT instead of axum's plain-text bodies.

impl From<JsonRejection> for StorefrontError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for StorefrontError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for StorefrontError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        // TraceLayer already records every status; only 500s carry a cause worth logging.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = ?e, kind = "INTERNAL", "internal error");
        }
        let mut response = json_error(self.status(), self.kind(), self.to_string());
        if let Self::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
