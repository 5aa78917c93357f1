use sea_orm_migration::prelude::*;

mod m20260501_000001_create_users;
mod m20260501_000002_create_catalog;
mod m20260501_000003_create_carts;
mod m20260501_000004_create_orders;
mod m20260501_000005_create_outbox_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260501_000001_create_users::Migration),
            Box::new(m20260501_000002_create_catalog::Migration),
            Box::new(m20260501_000003_create_carts::Migration),
            Box::new(m20260501_000004_create_orders::Migration),
            Box::new(m20260501_000005_create_outbox_events::Migration),
        ]
    }
}
