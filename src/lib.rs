//! Axum Backend Template
//!
//! A Rust web backend template with users, articles, JWT authentication,
//! a read-through cache and per-client rate limiting, structured around
//! trait-based abstraction and dependency injection.
//!
//! # Architecture Overview
//!
//! This crate is organized into four main layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │ Handlers, routing, auth and rate limiting,   │
//! │ the {code, message, data} envelope           │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │  User, article and auth services, caching,   │
//! │  configuration, background maintenance       │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │   Traits, types, errors (no dependencies)    │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │  PostgreSQL, Redis, JWT, bcrypt, telemetry   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Key Features
//!
//! - **Trait-based abstraction**: storage, cache, hashing and tokens sit behind traits
//! - **Dependency injection**: services receive their collaborators through constructors
//! - **Testability**: in-memory mocks (feature `test-utils`) drive the full router in tests
//! - **Error handling**: one error hierarchy mapped onto HTTP status and envelope codes
//! - **Validation**: request validation using the `validator` crate
//! - **Observability**: structured logging with `tracing`, Prometheus metrics
//! - **Security**: bcrypt hashing, JWT bearer tokens, secrets wrapped in `secrecy`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use axum_backend_template::api::{RouterConfig, create_router};
//! use axum_backend_template::app::AppState;
//! use axum_backend_template::infra::{BcryptHasher, JwtManager, PostgresClient, RedisCache};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(PostgresClient::with_defaults(&database_url).await?);
//!     let cache = Arc::new(RedisCache::connect(&redis_url, Default::default()).await?);
//!     let hasher = Arc::new(BcryptHasher::new(10)?);
//!     let tokens = Arc::new(JwtManager::new(&jwt_secret, token_ttl)?);
//!
//!     let state = Arc::new(AppState::new(db, cache, hasher, tokens, cache_ttl));
//!
//!     let router = create_router(state, RouterConfig::default());
//!     axum::serve(listener, router).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
