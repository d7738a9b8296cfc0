//! Concrete database client implementations.
//!
//! This module contains production-ready database adapters that implement
//! the repository traits defined in the domain layer.

pub mod postgres;
pub mod query;

pub use postgres::{PostgresClient, PostgresConfig};
