pub mod notification;
pub mod repository;
pub mod types;
