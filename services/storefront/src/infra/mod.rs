pub mod cache;
pub mod db;
pub mod notify;
pub mod outbox;
