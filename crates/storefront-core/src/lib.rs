//! Ambient plumbing shared by storefront binaries: env config loading, JSON
//! error bodies, health checks, request ids and tracing setup.

pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
