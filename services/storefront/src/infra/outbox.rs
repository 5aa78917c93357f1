use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, LockBehavior, LockType, OnConflict},
};
use uuid::Uuid;

use storefront_schema::outbox_events;

use crate::domain::notification::NotificationJob;
use crate::domain::repository::{NotificationQueue, OutboxRepository};
use crate::domain::types::OutboxEvent;
use crate::error::StorefrontError;

// ── Producer ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbNotificationQueue {
    pub db: DatabaseConnection,
}

impl NotificationQueue for DbNotificationQueue {
    /// Re-enqueueing an existing idempotency key is a no-op.
    async fn enqueue(&self, job: &NotificationJob) -> Result<(), StorefrontError> {
        let policy = job.notification.policy();
        let payload =
            serde_json::to_value(&job.notification).context("serialize notification payload")?;
        let now = Utc::now();

        outbox_events::Entity::insert(outbox_events::ActiveModel {
            id: Set(job.id),
            kind: Set(job.notification.kind().to_owned()),
            payload: Set(payload),
            idempotency_key: Set(job.idempotency_key.clone()),
            priority: Set(policy.priority),
            max_attempts: Set(policy.max_attempts),
            backoff_base_ms: Set(policy.backoff_base_ms),
            attempts: Set(0),
            last_error: Set(None),
            created_at: Set(now),
            next_attempt_at: Set(now),
            processed_at: Set(None),
            failed_at: Set(None),
        })
        .on_conflict(
            OnConflict::column(outbox_events::Column::IdempotencyKey)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .context("enqueue notification")?;
        Ok(())
    }
}

// ── Consumer ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOutboxRepository {
    pub db: DatabaseConnection,
}

impl OutboxRepository for DbOutboxRepository {
    async fn claim_due(
        &self,
        limit: u64,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxEvent>, StorefrontError> {
        let rows = self
            .db
            .transaction::<_, Vec<outbox_events::Model>, sea_orm::DbErr>(|txn| {
                Box::pin(async move {
                    let rows = outbox_events::Entity::find()
                        .filter(outbox_events::Column::ProcessedAt.is_null())
                        .filter(outbox_events::Column::FailedAt.is_null())
                        .filter(outbox_events::Column::NextAttemptAt.lte(Utc::now()))
                        .order_by_asc(outbox_events::Column::Priority)
                        .order_by_asc(outbox_events::Column::NextAttemptAt)
                        .limit(limit)
                        .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
                        .all(txn)
                        .await?;
                    if !rows.is_empty() {
                        // Lease: hide the batch from other workers until it expires.
                        outbox_events::Entity::update_many()
                            .col_expr(
                                outbox_events::Column::NextAttemptAt,
                                Expr::value(lease_until),
                            )
                            .filter(outbox_events::Column::Id.is_in(rows.iter().map(|r| r.id)))
                            .exec(txn)
                            .await?;
                    }
                    Ok(rows)
                })
            })
            .await
            .context("claim due outbox events")?;

        Ok(rows
            .into_iter()
            .map(|m| OutboxEvent {
                id: m.id,
                kind: m.kind,
                payload: m.payload,
                attempts: m.attempts,
                max_attempts: m.max_attempts,
                backoff_base_ms: m.backoff_base_ms,
            })
            .collect())
    }

    async fn mark_processed(&self, id: Uuid, attempts: i32) -> Result<(), StorefrontError> {
        outbox_events::ActiveModel {
            id: Set(id),
            attempts: Set(attempts),
            last_error: Set(None),
            processed_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("mark outbox event processed")?;
        Ok(())
    }

    async fn schedule_retry(
        &self,
        id: Uuid,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), StorefrontError> {
        outbox_events::ActiveModel {
            id: Set(id),
            attempts: Set(attempts),
            last_error: Set(Some(error.to_owned())),
            next_attempt_at: Set(next_attempt_at),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("schedule outbox retry")?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        attempts: i32,
        error: &str,
    ) -> Result<(), StorefrontError> {
        outbox_events::ActiveModel {
            id: Set(id),
            attempts: Set(attempts),
            last_error: Set(Some(error.to_owned())),
            failed_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("mark outbox event failed")?;
        Ok(())
    }
}
