use chrono::Utc;
use uuid::Uuid;

use storefront_domain::identifier::Identifier;
use storefront_domain::user::UserRole;

use crate::domain::notification::{Notification, NotificationJob};
use crate::domain::repository::{EphemeralStore, NotificationQueue, UserRepository};
use crate::domain::types::User;
use crate::error::StorefrontError;
use crate::usecase::otp::{OtpIssued, OtpStateMachine};
use crate::usecase::token::{
    MIN_PASSWORD_LENGTH, SessionToken, TokenIssuer, hash_password, verify_password,
};

/// Token plus the account it was issued for.
#[derive(Debug)]
pub struct LoginOutput {
    pub user: User,
    pub token: SessionToken,
}

// ── Password login ───────────────────────────────────────────────────────────

pub struct PasswordLoginInput {
    pub identifier: Identifier,
    pub password: String,
}

pub struct PasswordLoginUseCase<U: UserRepository> {
    pub users: U,
    pub tokens: TokenIssuer,
}

impl<U: UserRepository> PasswordLoginUseCase<U> {
    pub async fn execute(&self, input: PasswordLoginInput) -> Result<LoginOutput, StorefrontError> {
        let user = self
            .users
            .find_by_identifier(&input.identifier)
            .await?
            .ok_or(StorefrontError::InvalidCredentials)?;

        // OTP-only accounts have no password credential.
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(StorefrontError::InvalidCredentials)?;
        if !verify_password(&input.password, hash) {
            return Err(StorefrontError::InvalidCredentials);
        }

        let token = self.tokens.issue(&user, &input.identifier)?;
        Ok(LoginOutput { user, token })
    }
}

// ── OTP request ──────────────────────────────────────────────────────────────

pub struct RequestOtpUseCase<U, S, Q>
where
    U: UserRepository,
    S: EphemeralStore,
    Q: NotificationQueue,
{
    pub users: U,
    pub otp: OtpStateMachine<S, Q>,
}

impl<U, S, Q> RequestOtpUseCase<U, S, Q>
where
    U: UserRepository,
    S: EphemeralStore,
    Q: NotificationQueue,
{
    pub async fn execute(&self, identifier: &Identifier) -> Result<OtpIssued, StorefrontError> {
        self.users
            .find_by_identifier(identifier)
            .await?
            .ok_or(StorefrontError::UserNotFound)?;
        self.otp.issue(identifier).await
    }
}

// ── OTP login ────────────────────────────────────────────────────────────────

pub struct OtpLoginInput {
    pub identifier: Identifier,
    pub code: String,
}

pub struct OtpLoginUseCase<U, S, Q>
where
    U: UserRepository,
    S: EphemeralStore,
    Q: NotificationQueue,
{
    pub users: U,
    pub otp: OtpStateMachine<S, Q>,
    pub tokens: TokenIssuer,
}

impl<U, S, Q> OtpLoginUseCase<U, S, Q>
where
    U: UserRepository,
    S: EphemeralStore,
    Q: NotificationQueue,
{
    pub async fn execute(&self, input: OtpLoginInput) -> Result<LoginOutput, StorefrontError> {
        let user = self
            .users
            .find_by_identifier(&input.identifier)
            .await?
            .ok_or(StorefrontError::InvalidCredentials)?;

        self.otp.verify(&input.identifier, &input.code).await?;

        let token = self.tokens.issue(&user, &input.identifier)?;
        Ok(LoginOutput { user, token })
    }
}

// ── Register ─────────────────────────────────────────────────────────────────

pub struct RegisterInput {
    pub name: String,
    pub email: Option<Identifier>,
    pub phone: Option<Identifier>,
    pub password: Option<String>,
}

pub struct RegisterUseCase<U, Q>
where
    U: UserRepository,
    Q: NotificationQueue,
{
    pub users: U,
    pub queue: Q,
}

impl<U, Q> RegisterUseCase<U, Q>
where
    U: UserRepository,
    Q: NotificationQueue,
{
    pub async fn execute(&self, input: RegisterInput) -> Result<User, StorefrontError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(StorefrontError::InvalidInput("name is required".into()));
        }
        if input.email.is_none() && input.phone.is_none() {
            return Err(StorefrontError::InvalidInput(
                "email or phone is required".into(),
            ));
        }
        if input
            .password
            .as_deref()
            .is_some_and(|p| p.chars().count() < MIN_PASSWORD_LENGTH)
        {
            return Err(StorefrontError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        for identifier in input.email.iter().chain(input.phone.iter()) {
            if self.users.find_by_identifier(identifier).await?.is_some() {
                return Err(StorefrontError::UserAlreadyExists);
            }
        }

        let password_hash = input.password.as_deref().map(hash_password).transpose()?;

        let user = User {
            id: Uuid::now_v7(),
            name: name.to_owned(),
            email: input.email.map(|e| e.value().to_owned()),
            phone: input.phone.map(|p| p.value().to_owned()),
            password_hash,
            // Self-registration never grants elevated roles.
            role: UserRole::Customer,
            created_at: Utc::now(),
        };
        self.users.create(&user).await?;

        if let Some(recipient) = user.contact() {
            let job = NotificationJob::keyed(
                Notification::Welcome {
                    recipient,
                    name: user.name.clone(),
                },
                user.id,
            );
            if let Err(e) = self.queue.enqueue(&job).await {
                tracing::warn!(error = ?e, user_id = %user.id, "failed to enqueue welcome notification");
            }
        }

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }
}
