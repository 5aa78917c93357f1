//! Session-token types shared by the storefront service and its test tooling.
//!
//! Provides JWT validation and the `Session` extractor.

pub mod session;
pub mod token;
