//! Outbox dispatch worker.
//!
//! Each poll leases a batch of due events, renders each into messages and
//! tries them in fallback order. Delivery is at-least-once: a worker that dies
//! after sending but before recording success will resend once the lease lapses.
//!
//! OTP payloads carry no code. The live code is read from the ephemeral store
//! at delivery; a code that expired or was already used drops the job.

use std::future::Future;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use crate::domain::notification::Notification;
use crate::domain::repository::{EphemeralStore, NotificationSender, OutboxRepository};
use crate::domain::types::OutboxEvent;
use crate::error::StorefrontError;
use crate::usecase::otp::code_key;

/// How long a claimed event stays hidden from other workers.
pub const LEASE_SECS: i64 = 60;

/// Delay before retry number `attempts` (1-based): `base * 2^(attempts - 1)`.
pub fn retry_delay(backoff_base_ms: i64, attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
    Duration::milliseconds(backoff_base_ms.saturating_mul(1i64 << exponent))
}

fn describe(error: &StorefrontError) -> String {
    match error {
        StorefrontError::Internal(inner) => format!("{inner:#}"),
        other => other.to_string(),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
}

pub struct DispatchWorker<O, S, E>
where
    O: OutboxRepository,
    S: NotificationSender,
    E: EphemeralStore,
{
    pub outbox: O,
    pub sender: S,
    /// Source of live one-time codes.
    pub codes: E,
    pub app_name: String,
    pub batch_size: u64,
}

impl<O, S, E> DispatchWorker<O, S, E>
where
    O: OutboxRepository,
    S: NotificationSender,
    E: EphemeralStore,
{
    /// Process one batch of due events.
    pub async fn run_once(&self) -> Result<DispatchStats, StorefrontError> {
        let lease_until = Utc::now() + Duration::seconds(LEASE_SECS);
        let events = self.outbox.claim_due(self.batch_size, lease_until).await?;

        let mut stats = DispatchStats::default();
        for event in events {
            let attempts = event.attempts + 1;

            let notification = match serde_json::from_value::<Notification>(event.payload.clone())
            {
                Ok(n) => n,
                Err(e) => {
                    // Retrying cannot fix a payload we cannot read.
                    let error = format!("undecodable payload: {e}");
                    tracing::error!(event_id = %event.id, kind = %event.kind, %error, "dropping outbox event");
                    self.outbox.mark_failed(event.id, attempts, &error).await?;
                    stats.failed += 1;
                    continue;
                }
            };

            let delivery = match self.with_live_code(notification).await {
                Ok(Some(notification)) => self.deliver(&event, &notification).await,
                Ok(None) => {
                    let error = "otp expired before delivery";
                    tracing::info!(event_id = %event.id, kind = %event.kind, "dropping otp delivery, code no longer live");
                    self.outbox.mark_failed(event.id, attempts, error).await?;
                    stats.failed += 1;
                    continue;
                }
                Err(e) => Err(e),
            };

            match delivery {
                Ok(()) => {
                    self.outbox.mark_processed(event.id, attempts).await?;
                    tracing::info!(event_id = %event.id, kind = %event.kind, attempts, "notification delivered");
                    stats.delivered += 1;
                }
                Err(e) if attempts >= event.max_attempts => {
                    let error = describe(&e);
                    self.outbox.mark_failed(event.id, attempts, &error).await?;
                    tracing::error!(event_id = %event.id, kind = %event.kind, attempts, %error, "notification failed permanently");
                    stats.failed += 1;
                }
                Err(e) => {
                    let error = describe(&e);
                    let next_attempt_at = Utc::now() + retry_delay(event.backoff_base_ms, attempts);
                    self.outbox
                        .schedule_retry(event.id, attempts, next_attempt_at, &error)
                        .await?;
                    tracing::warn!(event_id = %event.id, kind = %event.kind, attempts, %error, %next_attempt_at, "notification retry scheduled");
                    stats.retried += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Fill an OTP delivery with the code currently live for its recipient.
    /// `None` when there is no live code.
    async fn with_live_code(
        &self,
        mut notification: Notification,
    ) -> Result<Option<Notification>, StorefrontError> {
        if let Notification::OtpDelivery {
            recipient, code, ..
        } = &mut notification
        {
            match self.codes.get(&code_key(recipient)).await? {
                Some(live) => *code = live,
                None => return Ok(None),
            }
        }
        Ok(Some(notification))
    }

    /// Try each rendered message in order until one is accepted.
    async fn deliver(
        &self,
        event: &OutboxEvent,
        notification: &Notification,
    ) -> Result<(), StorefrontError> {
        let messages = notification.render(&self.app_name);
        let mut last_error = None;
        for (i, message) in messages.iter().enumerate() {
            match self.sender.send(message).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if i + 1 < messages.len() {
                        tracing::warn!(
                            event_id = %event.id,
                            channel = message.channel.as_str(),
                            error = %describe(&e),
                            "delivery failed, falling back"
                        );
                    }
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            StorefrontError::Internal(anyhow::anyhow!("notification rendered no messages"))
        }))
    }

    /// Poll until `shutdown` resolves. Batch errors are logged and the loop continues.
    pub async fn run(&self, poll_interval: StdDuration, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("dispatch worker stopping");
                    return;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(stats) if stats != DispatchStats::default() => {
                            tracing::debug!(?stats, "dispatch batch processed");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %describe(&e), "dispatch batch failed"),
                    }
                }
            }
        }
    }
}
