//! One-time code lifecycle per identifier.
//!
//! Three keys live in the ephemeral store for each identifier:
//!
//! | Key | Value | TTL |
//! |-----|-------|-----|
//! | `otp:{id}` | the active code | [`OTP_TTL_SECS`] |
//! | `otp:attempts:{id}` | failed verifications | [`OTP_COOLDOWN_SECS`] from the first failure |
//! | `otp:cooldown:{id}` | presence flag | [`OTP_COOLDOWN_SECS`] |
//!
//! No counter state is held in process memory, so limits hold across instances.

use rand::RngExt;

use storefront_domain::identifier::Identifier;

use crate::domain::notification::{ChannelPolicy, DeliveryChannel, Notification, NotificationJob};
use crate::domain::repository::{EphemeralStore, NotificationQueue};
use crate::domain::types::{OTP_COOLDOWN_SECS, OTP_LENGTH, OTP_MAX_ATTEMPTS, OTP_TTL_SECS};
use crate::error::StorefrontError;

/// Key holding the active code for `identifier`.
pub fn code_key(identifier: &Identifier) -> String {
    format!("otp:{}", identifier.key())
}

fn attempts_key(identifier: &Identifier) -> String {
    format!("otp:attempts:{}", identifier.key())
}

fn cooldown_key(identifier: &Identifier) -> String {
    format!("otp:cooldown:{}", identifier.key())
}

/// Uniform over `000000..=999999`, drawn from the thread-local CSPRNG.
pub fn generate_code() -> String {
    let upper = 10u32.pow(OTP_LENGTH as u32);
    let n = rand::rng().random_range(0..upper);
    format!("{n:0width$}", width = OTP_LENGTH)
}

fn codes_match(stored: &str, submitted: &str) -> bool {
    stored.len() == submitted.len()
        && stored
            .bytes()
            .zip(submitted.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Acknowledgement of an issued code. Never carries the code itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpIssued {
    /// First channel delivery will be attempted on.
    pub channel: DeliveryChannel,
    pub expires_in_secs: u64,
}

pub struct OtpStateMachine<S, Q>
where
    S: EphemeralStore,
    Q: NotificationQueue,
{
    pub store: S,
    pub queue: Q,
    pub channels: ChannelPolicy,
}

impl<S, Q> OtpStateMachine<S, Q>
where
    S: EphemeralStore,
    Q: NotificationQueue,
{
    async fn reject_if_cooling_down(&self, identifier: &Identifier) -> Result<(), StorefrontError> {
        let key = cooldown_key(identifier);
        if self.store.exists(&key).await? {
            let retry_after_secs = self
                .store
                .ttl(&key)
                .await?
                .unwrap_or(OTP_COOLDOWN_SECS)
                .max(1);
            return Err(StorefrontError::RateLimited { retry_after_secs });
        }
        Ok(())
    }

    /// Issue a fresh code, replacing any active one, and enqueue its delivery.
    ///
    /// The caller is responsible for checking that the identifier belongs to a
    /// known account.
    pub async fn issue(&self, identifier: &Identifier) -> Result<OtpIssued, StorefrontError> {
        self.reject_if_cooling_down(identifier).await?;

        let code = generate_code();
        self.store
            .set_ex(&code_key(identifier), &code, OTP_TTL_SECS)
            .await?;
        self.store.del(&attempts_key(identifier)).await?;

        let channels = self.channels.channels_for(identifier);
        let job = NotificationJob::new(Notification::OtpDelivery {
            recipient: identifier.clone(),
            code,
            expires_in_secs: OTP_TTL_SECS,
            channels: channels.to_vec(),
        });
        self.queue.enqueue(&job).await?;

        tracing::info!(
            identifier = %identifier.key(),
            channel = channels[0].as_str(),
            "otp issued"
        );

        Ok(OtpIssued {
            channel: channels[0],
            expires_in_secs: OTP_TTL_SECS,
        })
    }

    /// Check a submitted code. On success the code is consumed.
    ///
    /// Every failure increments the attempt counter; the failure that reaches
    /// [`OTP_MAX_ATTEMPTS`] opens the cooldown and reports `RateLimited`.
    pub async fn verify(
        &self,
        identifier: &Identifier,
        submitted: &str,
    ) -> Result<(), StorefrontError> {
        self.reject_if_cooling_down(identifier).await?;

        let key = code_key(identifier);
        let stored = self.store.get(&key).await?;

        if stored
            .as_deref()
            .is_some_and(|code| codes_match(code, submitted))
        {
            // Only the caller whose delete removed the key wins a concurrent race.
            if !self.store.del(&key).await? {
                return Err(StorefrontError::InvalidOrExpiredOtp);
            }
            self.store.del(&attempts_key(identifier)).await?;
            return Ok(());
        }

        let attempts = self
            .store
            .incr_with_expiry(&attempts_key(identifier), OTP_COOLDOWN_SECS)
            .await?;

        if attempts >= OTP_MAX_ATTEMPTS {
            self.store
                .set_ex(&cooldown_key(identifier), "1", OTP_COOLDOWN_SECS)
                .await?;
            self.store.del(&attempts_key(identifier)).await?;
            tracing::warn!(
                identifier = %identifier.key(),
                attempts,
                "otp cooldown entered"
            );
            return Err(StorefrontError::RateLimited {
                retry_after_secs: OTP_COOLDOWN_SECS,
            });
        }

        match stored {
            None => Err(StorefrontError::InvalidOrExpiredOtp),
            Some(_) => Err(StorefrontError::InvalidOtp {
                remaining_attempts: OTP_MAX_ATTEMPTS - attempts,
            }),
        }
    }
}
