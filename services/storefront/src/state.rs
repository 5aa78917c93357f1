use axum::extract::FromRef;
use deadpool_redis::Pool as RedisPool;
use sea_orm::DatabaseConnection;

use storefront_auth_types::session::SessionSecret;

use crate::domain::notification::ChannelPolicy;
use crate::infra::cache::RedisStore;
use crate::infra::db::{
    DbCartRepository, DbCatalogRepository, DbOrderRepository, DbUserRepository,
};
use crate::infra::outbox::DbNotificationQueue;
use crate::usecase::cart::CartManager;
use crate::usecase::otp::OtpStateMachine;
use crate::usecase::token::TokenIssuer;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: RedisPool,
    pub session_secret: SessionSecret,
    pub tokens: TokenIssuer,
    pub channels: ChannelPolicy,
}

impl FromRef<AppState> for SessionSecret {
    fn from_ref(state: &AppState) -> Self {
        state.session_secret.clone()
    }
}

impl AppState {
    pub fn user_repo(&self) -> DbUserRepository {
        DbUserRepository {
            db: self.db.clone(),
        }
    }

    pub fn catalog_repo(&self) -> DbCatalogRepository {
        DbCatalogRepository {
            db: self.db.clone(),
        }
    }

    pub fn cart_repo(&self) -> DbCartRepository {
        DbCartRepository {
            db: self.db.clone(),
        }
    }

    pub fn order_repo(&self) -> DbOrderRepository {
        DbOrderRepository {
            db: self.db.clone(),
        }
    }

    pub fn ephemeral_store(&self) -> RedisStore {
        RedisStore {
            pool: self.redis.clone(),
        }
    }

    pub fn notification_queue(&self) -> DbNotificationQueue {
        DbNotificationQueue {
            db: self.db.clone(),
        }
    }

    pub fn otp(&self) -> OtpStateMachine<RedisStore, DbNotificationQueue> {
        OtpStateMachine {
            store: self.ephemeral_store(),
            queue: self.notification_queue(),
            channels: self.channels,
        }
    }

    pub fn cart_manager(&self) -> CartManager<DbCartRepository, DbCatalogRepository, RedisStore> {
        CartManager {
            carts: self.cart_repo(),
            catalog: self.catalog_repo(),
            cache: self.ephemeral_store(),
        }
    }
}
