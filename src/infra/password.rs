//! bcrypt password hashing on the blocking thread pool.

use async_trait::async_trait;

use crate::domain::{AppError, PasswordHasher};

pub struct BcryptHasher {
    cost: u32,
    /// Hash of a throwaway value, verified against when the account is missing
    dummy_hash: String,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let dummy_hash = bcrypt::non_truncating_hash("dummy-password-for-timing", cost)?;
        Ok(Self { cost, dummy_hash })
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }
}

async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
        .map_err(AppError::from)
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    async fn hash(&self, plain: &str) -> Result<String, AppError> {
        let plain = plain.to_owned();
        let cost = self.cost;
        blocking(move || bcrypt::non_truncating_hash(plain, cost)).await
    }

    async fn verify(&self, plain: &str, hash: &str) -> Result<bool, AppError> {
        let plain = plain.to_owned();
        let hash = hash.to_owned();
        // Input past 72 bytes can never match a hash this service produced
        blocking(move || match bcrypt::non_truncating_verify(plain, &hash) {
            Err(bcrypt::BcryptError::Truncation(_)) => Ok(false),
            other => other,
        })
        .await
    }

    async fn verify_dummy(&self, plain: &str) -> Result<(), AppError> {
        self.verify(plain, &self.dummy_hash).await.map(|_| ())
    }
}
