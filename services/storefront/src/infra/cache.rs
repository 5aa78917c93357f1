use deadpool_redis::Pool;
use deadpool_redis::redis::{self, AsyncCommands, RedisError};

use crate::domain::repository::EphemeralStore;
use crate::error::StorefrontError;

#[derive(Clone)]
pub struct RedisStore {
    pub pool: Pool,
}

fn internal(e: RedisError) -> StorefrontError {
    StorefrontError::Internal(e.into())
}

impl RedisStore {
    async fn conn(&self) -> Result<deadpool_redis::Connection, StorefrontError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorefrontError::Internal(e.into()))
    }

    /// Round-trip a PING, for readiness checks.
    pub async fn ping(&self) -> bool {
        let Ok(mut conn) = self.conn().await else {
            return false;
        };
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

impl EphemeralStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorefrontError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await.map_err(internal)?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StorefrontError> {
        let mut conn = self.conn().await?;
        let (): () = conn.set_ex(key, value, ttl_secs).await.map_err(internal)?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, StorefrontError> {
        let mut conn = self.conn().await?;
        let removed: usize = conn.del(key).await.map_err(internal)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorefrontError> {
        let mut conn = self.conn().await?;
        let exists: bool = conn.exists(key).await.map_err(internal)?;
        Ok(exists)
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, StorefrontError> {
        let mut conn = self.conn().await?;
        // -2: missing, -1: no expiry.
        let ttl: i64 = conn.ttl(key).await.map_err(internal)?;
        Ok(u64::try_from(ttl).ok())
    }

    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<u64, StorefrontError> {
        let mut conn = self.conn().await?;
        // EXPIRE ... NX (Redis 7+) keeps the window anchored at the first failure.
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs)
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(internal)?;
        Ok(count)
    }
}
