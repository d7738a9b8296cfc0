//! Registration, login and token-backed identity.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::user_service::UserService;
use crate::domain::{
    AppError, AuthError, AuthUser, LoginRequest, LoginResponse, PasswordHasher, RegisterRequest,
    TokenIssuer, User, UserRepository,
};

pub struct AuthService {
    users: Arc<UserService>,
    repo: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        users: Arc<UserService>,
        repo: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            users,
            repo,
            hasher,
            tokens,
        }
    }

    /// Self-service registration. New accounts are always enabled.
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        self.users.create(request.into()).await
    }

    /// Verifies credentials and issues a bearer token.
    ///
    /// Unknown usernames and wrong passwords produce the same
    /// `InvalidCredentials` error after comparable hashing work.
    ///
    /// # Errors
    ///
    /// - `Auth(InvalidCredentials)` for any credential mismatch
    /// - `Auth(UserDisabled)` when the password is right but the account is disabled
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        request.validate()?;

        let Some(credentials) = self
            .repo
            .get_credentials_by_username(&request.username)
            .await?
        else {
            self.hasher.verify_dummy(request.password.expose()).await?;
            warn!("Login failed: unknown username");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !self
            .hasher
            .verify(request.password.expose(), &credentials.password_hash)
            .await?
        {
            warn!(user_id = credentials.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        if !credentials.is_enabled() {
            warn!(user_id = credentials.id, "Login rejected: user disabled");
            return Err(AuthError::UserDisabled.into());
        }

        let token = self.tokens.issue(credentials.id, &credentials.username)?;

        // A failed stamp must not block a valid login
        if let Err(e) = self.repo.record_login(credentials.id, Utc::now()).await {
            warn!(user_id = credentials.id, error = %e, "Failed to record last login");
        }
        self.users
            .invalidate(credentials.id, &[&credentials.username])
            .await;

        let user = self.users.get_by_id(credentials.id).await?;
        info!(user_id = user.id, "User logged in");
        Ok(LoginResponse::new(token, user))
    }

    /// Profile of the token holder.
    pub async fn me(&self, actor: &AuthUser) -> Result<User, AppError> {
        self.users.get_by_id(actor.user_id).await
    }
}
