use axum::Json;
use axum::extract::{Path, Query};
use axum_extra::extract::WithRejection;

use crate::error::StorefrontError;

pub mod auth;
pub mod cart;
pub mod health;
pub mod orders;

/// JSON body whose rejection renders as `INVALID_INPUT`.
pub type JsonBody<T> = WithRejection<Json<T>, StorefrontError>;

pub type PathParam<T> = WithRejection<Path<T>, StorefrontError>;

pub type QueryParams<T> = WithRejection<Query<T>, StorefrontError>;
