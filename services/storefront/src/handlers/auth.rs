use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_domain::identifier::Identifier;
use storefront_domain::user::UserRole;

use crate::domain::notification::DeliveryChannel;
use crate::domain::types::User;
use crate::error::StorefrontError;
use crate::handlers::JsonBody;
use crate::state::AppState;
use crate::usecase::auth::{
    LoginOutput, OtpLoginInput, OtpLoginUseCase, PasswordLoginInput, PasswordLoginUseCase,
    RegisterInput, RegisterUseCase, RequestOtpUseCase,
};
use crate::usecase::token::SessionToken;

fn parse_identifier(raw: &str) -> Result<Identifier, StorefrontError> {
    raw.parse()
        .map_err(|e| StorefrontError::InvalidInput(format!("identifier: {e}")))
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(serialize_with = "storefront_core::serde::to_rfc3339_ms")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub token: SessionToken,
    pub user: UserResponse,
}

impl From<LoginOutput> for AuthResponse {
    fn from(output: LoginOutput) -> Self {
        Self {
            token: output.token,
            user: output.user.into(),
        }
    }
}

// ── POST /auth/register ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), StorefrontError> {
    let email = body
        .email
        .as_deref()
        .map(|raw| match parse_identifier(raw)? {
            id @ Identifier::Email(_) => Ok(id),
            Identifier::Phone(_) => Err(StorefrontError::InvalidInput(
                "email: not an email address".into(),
            )),
        })
        .transpose()?;
    let phone = body
        .phone
        .as_deref()
        .map(|raw| match parse_identifier(raw)? {
            id @ Identifier::Phone(_) => Ok(id),
            Identifier::Email(_) => Err(StorefrontError::InvalidInput(
                "phone: not a phone number".into(),
            )),
        })
        .transpose()?;

    let usecase = RegisterUseCase {
        users: state.user_repo(),
        queue: state.notification_queue(),
    };
    let user = usecase
        .execute(RegisterInput {
            name: body.name,
            email,
            phone,
            password: body.password,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

// ── POST /auth/login ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, StorefrontError> {
    let identifier = parse_identifier(&body.identifier)?;
    let usecase = PasswordLoginUseCase {
        users: state.user_repo(),
        tokens: state.tokens.clone(),
    };
    let output = usecase
        .execute(PasswordLoginInput {
            identifier,
            password: body.password,
        })
        .await?;
    Ok(Json(output.into()))
}

// ── POST /auth/otp/request ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct OtpRequest {
    pub identifier: String,
}

#[derive(Serialize)]
pub struct OtpRequestResponse {
    pub channel: DeliveryChannel,
    pub expires_in: u64,
}

pub async fn request_otp(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<OtpRequest>,
) -> Result<Json<OtpRequestResponse>, StorefrontError> {
    let identifier = parse_identifier(&body.identifier)?;
    let usecase = RequestOtpUseCase {
        users: state.user_repo(),
        otp: state.otp(),
    };
    let issued = usecase.execute(&identifier).await?;
    Ok(Json(OtpRequestResponse {
        channel: issued.channel,
        expires_in: issued.expires_in_secs,
    }))
}

// ── POST /auth/otp/verify ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct OtpVerifyRequest {
    pub identifier: String,
    pub code: String,
}

pub async fn verify_otp(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<OtpVerifyRequest>,
) -> Result<Json<AuthResponse>, StorefrontError> {
    let identifier = parse_identifier(&body.identifier)?;
    let usecase = OtpLoginUseCase {
        users: state.user_repo(),
        otp: state.otp(),
        tokens: state.tokens.clone(),
    };
    let output = usecase
        .execute(OtpLoginInput {
            identifier,
            code: body.code.trim().to_owned(),
        })
        .await?;
    Ok(Json(output.into()))
}
