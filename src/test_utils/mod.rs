//! Test utilities and mock implementations.
//!
//! This module provides reusable mock implementations of domain traits
//! for use in unit and integration tests.

pub mod mocks;

use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::PasswordHasher;
use crate::infra::{BcryptHasher, JwtManager};

pub use mocks::{MockCache, MockConfig, MockDatabase};

pub const TEST_JWT_SECRET: &str = "test-secret-do-not-use-in-production";

/// Lowest bcrypt cost, so hashing doesn't dominate test time.
pub fn fast_hasher() -> Arc<dyn PasswordHasher> {
    Arc::new(BcryptHasher::new(4).expect("bcrypt cost 4 is valid"))
}

/// Token manager with [`TEST_JWT_SECRET`] and a one hour lifetime.
pub fn test_jwt() -> JwtManager {
    test_jwt_with_ttl(Duration::from_secs(3600))
}

pub fn test_jwt_with_ttl(ttl: Duration) -> JwtManager {
    JwtManager::new(&SecretString::from(TEST_JWT_SECRET.to_string()), ttl)
        .expect("test token lifetime is in range")
}
