//! Infrastructure layer implementations.

pub mod cache;
pub mod database;
pub mod observability;
pub mod password;
pub mod token;

pub use cache::{NoopCache, RedisCache, RedisConfig};
pub use database::{PostgresClient, PostgresConfig};
pub use password::BcryptHasher;
pub use token::{Claims, JwtManager};
