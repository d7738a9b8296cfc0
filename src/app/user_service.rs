//! User management: creation, profile updates, password changes.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::cache::ReadThroughCache;
use crate::domain::{
    AppError, AuthUser, ChangePasswordRequest, CreateUserRequest, Entity, ListQuery, NewUser,
    PaginatedResponse, Password, PasswordHasher, UpdateUserRequest, User, UserChanges, UserId,
    UserRepository, UserStatus, ValidationError, username_cache_key, validate_password_strength,
};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Application service for the user entity.
///
/// Reads go through the cache; every write invalidates both the ID entry
/// and the username entry of the affected user.
pub struct UserService {
    users: Arc<dyn UserRepository>,
    cache: ReadThroughCache,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        cache: ReadThroughCache,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users,
            cache,
            hasher,
        }
    }

    /// Creates a user after validation, policy and uniqueness checks.
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed fields or a weak password
    /// - `Conflict` when the username or email is taken
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<User, AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Validation failed for create user request");
            AppError::from(e)
        })?;
        validate_password_strength(request.password.expose())?;
        self.ensure_unique(Some(&request.username), Some(&request.email), None)
            .await?;

        let password_hash = self.hasher.hash(request.password.expose()).await?;
        let user = self
            .users
            .create(&NewUser {
                username: request.username,
                email: request.email,
                password_hash,
                nickname: request.nickname,
                avatar: request.avatar,
                status: request.status.unwrap_or_default(),
            })
            .await?;

        info!(user_id = user.id, "User created");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: UserId) -> Result<User, AppError> {
        self.cache
            .get_entity::<User, _>(&*self.users, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))
    }

    #[instrument(skip(self))]
    pub async fn get_by_username(&self, username: &str) -> Result<User, AppError> {
        let key = username_cache_key(username);
        if let Some(user) = self.cache.get::<User>(&key).await {
            return Ok(user);
        }

        let user = self
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{username}'")))?;
        self.cache.put(&key, &user).await;
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: &ListQuery<UserStatus>,
    ) -> Result<PaginatedResponse<User>, AppError> {
        self.users.list(query).await
    }

    /// Partial profile update. Users may only update themselves.
    #[instrument(skip(self, actor, request), fields(actor_id = actor.user_id))]
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: UserId,
        request: UpdateUserRequest,
    ) -> Result<User, AppError> {
        ensure_self(actor, id)?;
        request.validate()?;

        let current = self
            .users
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;

        let mut changes = UserChanges::from(request);
        // Unchanged values need no uniqueness check and no write
        if changes.username.as_deref() == Some(current.username.as_str()) {
            changes.username = None;
        }
        if changes.email.as_deref() == Some(current.email.as_str()) {
            changes.email = None;
        }
        if changes.is_empty() {
            return Ok(current);
        }

        self.ensure_unique(changes.username.as_deref(), changes.email.as_deref(), Some(id))
            .await?;

        let updated = self.users.update(id, &changes).await?;
        self.invalidate(id, &[&current.username, &updated.username])
            .await;

        info!(user_id = id, "User updated");
        Ok(updated)
    }

    /// Soft-deletes a user. Users may only delete themselves.
    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn delete(&self, actor: &AuthUser, id: UserId) -> Result<(), AppError> {
        ensure_self(actor, id)?;

        let current = self
            .users
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
        self.users.soft_delete(id).await?;
        self.invalidate(id, &[&current.username]).await;

        info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Replaces the caller's password after verifying the old one.
    #[instrument(skip(self, actor, request), fields(user_id = actor.user_id))]
    pub async fn change_password(
        &self,
        actor: &AuthUser,
        request: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        let credentials = self
            .users
            .get_credentials_by_id(actor.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", actor.user_id)))?;

        if !self
            .hasher
            .verify(request.old_password.expose(), &credentials.password_hash)
            .await?
        {
            warn!("Password change rejected: old password mismatch");
            return Err(ValidationError::field("old_password", "is incorrect").into());
        }
        validate_password_strength(request.new_password.expose())?;

        let password_hash = self.hasher.hash(request.new_password.expose()).await?;
        self.users
            .update_password(actor.user_id, &password_hash)
            .await?;
        self.invalidate(actor.user_id, &[&credentials.username])
            .await;

        info!("Password changed");
        Ok(())
    }

    /// Seeds the default admin account unless one already exists.
    ///
    /// Returns the new user, or `None` if nothing was seeded.
    #[instrument(skip(self, password))]
    pub async fn seed_admin(&self, password: Password) -> Result<Option<User>, AppError> {
        if self.users.username_exists(ADMIN_USERNAME, None).await? {
            return Ok(None);
        }

        let user = self
            .create(CreateUserRequest {
                username: ADMIN_USERNAME.to_string(),
                email: ADMIN_EMAIL.to_string(),
                password,
                nickname: Some("Administrator".to_string()),
                avatar: None,
                status: Some(UserStatus::Enabled),
            })
            .await?;
        info!(user_id = user.id, "Seeded admin account");
        Ok(Some(user))
    }

    /// Drops the ID entry and every given username entry.
    pub async fn invalidate(&self, id: UserId, usernames: &[&str]) {
        let mut keys = vec![User::cache_key(id)];
        for username in usernames {
            let key = username_cache_key(username);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        self.cache.invalidate(&keys).await;
    }

    async fn ensure_unique(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        exclude: Option<UserId>,
    ) -> Result<(), AppError> {
        if let Some(username) = username {
            if self.users.username_exists(username, exclude).await? {
                return Err(AppError::Conflict("username already exists".to_string()));
            }
        }
        if let Some(email) = email {
            if self.users.email_exists(email, exclude).await? {
                return Err(AppError::Conflict("email already exists".to_string()));
            }
        }
        Ok(())
    }
}

fn ensure_self(actor: &AuthUser, id: UserId) -> Result<(), AppError> {
    if actor.user_id != id {
        warn!(actor_id = actor.user_id, target_id = id, "Cross-user modification denied");
        return Err(AppError::Forbidden(
            "you may only modify your own account".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockCache, MockDatabase, fast_hasher};
    use std::time::Duration;

    struct Fixture {
        db: Arc<MockDatabase>,
        cache: Arc<MockCache>,
        service: UserService,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(MockDatabase::new());
        let cache = Arc::new(MockCache::new());
        let service = UserService::new(
            db.clone(),
            ReadThroughCache::new(cache.clone(), Duration::from_secs(60)),
            fast_hasher(),
        );
        Fixture { db, cache, service }
    }

    fn request(username: &str, email: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: Password::from(password),
            nickname: None,
            avatar: None,
            status: None,
        }
    }

    fn actor(user: &User) -> AuthUser {
        AuthUser {
            user_id: user.id,
            username: user.username.clone(),
        }
    }

    #[tokio::test]
    async fn test_create_hashes_password() {
        let f = fixture();
        let user = f
            .service
            .create(request("alice", "a@x.com", "Passw0rd!"))
            .await
            .unwrap();
        assert_eq!(user.status, UserStatus::Enabled);

        let creds = f.db.get_credentials_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(creds.password_hash, "Passw0rd!");
        assert!(creds.password_hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_create_duplicate_username_or_email_conflicts() {
        let f = fixture();
        f.service
            .create(request("alice", "a@x.com", "Passw0rd!"))
            .await
            .unwrap();

        let err = f
            .service
            .create(request("alice", "other@x.com", "Passw0rd!"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("username")));

        let err = f
            .service
            .create(request("alice2", "a@x.com", "Passw0rd!"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("email")));
    }

    #[tokio::test]
    async fn test_create_weak_password_creates_nothing() {
        let f = fixture();
        for weak in ["short1!", "password", "PASSWORD1!", "Password1"] {
            let err = f
                .service
                .create(request("bob", "b@x.com", weak))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                AppError::Validation(ValidationError::WeakPassword(_))
            ));
        }
        assert_eq!(f.db.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_invalid_fields_rejected() {
        let f = fixture();
        let err = f
            .service
            .create(request("ab", "not-an-email", "Passw0rd!"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_by_username_populates_cache() {
        let f = fixture();
        f.service
            .create(request("alice", "a@x.com", "Passw0rd!"))
            .await
            .unwrap();

        let user = f.service.get_by_username("alice").await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert!(f.cache.contains("user:username:alice"));

        let err = f.service.get_by_username("nobody").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_self_invalidates_old_and_new_keys() {
        let f = fixture();
        let user = f
            .service
            .create(request("alice", "a@x.com", "Passw0rd!"))
            .await
            .unwrap();
        f.service.get_by_id(user.id).await.unwrap();
        f.service.get_by_username("alice").await.unwrap();
        assert!(f.cache.contains("user:username:alice"));

        let updated = f
            .service
            .update(
                &actor(&user),
                user.id,
                UpdateUserRequest {
                    username: Some("alicia".to_string()),
                    nickname: Some("Al".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.username, "alicia");
        assert_eq!(updated.nickname.as_deref(), Some("Al"));
        assert_eq!(updated.email, "a@x.com");

        assert!(!f.cache.contains(&User::cache_key(user.id)));
        assert!(!f.cache.contains("user:username:alice"));

        let fresh = f.service.get_by_id(user.id).await.unwrap();
        assert_eq!(fresh.username, "alicia");
    }

    #[tokio::test]
    async fn test_update_other_user_forbidden() {
        let f = fixture();
        let alice = f
            .service
            .create(request("alice", "a@x.com", "Passw0rd!"))
            .await
            .unwrap();
        let bob = f
            .service
            .create(request("bob", "b@x.com", "Passw0rd!"))
            .await
            .unwrap();

        let err = f
            .service
            .update(&actor(&bob), alice.id, UpdateUserRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = f.service.delete(&actor(&bob), alice.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_update_to_taken_email_conflicts() {
        let f = fixture();
        let alice = f
            .service
            .create(request("alice", "a@x.com", "Passw0rd!"))
            .await
            .unwrap();
        f.service
            .create(request("bob", "b@x.com", "Passw0rd!"))
            .await
            .unwrap();

        let err = f
            .service
            .update(
                &actor(&alice),
                alice.id,
                UpdateUserRequest {
                    email: Some("b@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_with_own_current_values_is_noop() {
        let f = fixture();
        let alice = f
            .service
            .create(request("alice", "a@x.com", "Passw0rd!"))
            .await
            .unwrap();

        let same = f
            .service
            .update(
                &actor(&alice),
                alice.id,
                UpdateUserRequest {
                    username: Some("alice".to_string()),
                    email: Some("a@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same, alice);
    }

    #[tokio::test]
    async fn test_delete_then_delete_again_is_not_found() {
        let f = fixture();
        let alice = f
            .service
            .create(request("alice", "a@x.com", "Passw0rd!"))
            .await
            .unwrap();

        f.service.delete(&actor(&alice), alice.id).await.unwrap();
        assert!(matches!(
            f.service.get_by_id(alice.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            f.service.delete(&actor(&alice), alice.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));

        // The name is free again once the old row is soft-deleted
        assert!(
            f.service
                .create(request("alice", "a@x.com", "Passw0rd!"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_change_password() {
        let f = fixture();
        let alice = f
            .service
            .create(request("alice", "a@x.com", "Passw0rd!"))
            .await
            .unwrap();

        let err = f
            .service
            .change_password(
                &actor(&alice),
                ChangePasswordRequest {
                    old_password: Password::from("Wrong0ne!"),
                    new_password: Password::from("N3wPassw0rd!"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidField { ref field, .. }) if field == "old_password"
        ));

        let err = f
            .service
            .change_password(
                &actor(&alice),
                ChangePasswordRequest {
                    old_password: Password::from("Passw0rd!"),
                    new_password: Password::from("weak"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::WeakPassword(_))
        ));

        f.service
            .change_password(
                &actor(&alice),
                ChangePasswordRequest {
                    old_password: Password::from("Passw0rd!"),
                    new_password: Password::from("N3wPassw0rd!"),
                },
            )
            .await
            .unwrap();

        let creds = f.db.get_credentials_by_id(alice.id).await.unwrap().unwrap();
        assert!(bcrypt::verify("N3wPassw0rd!", &creds.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_seed_admin_is_idempotent() {
        let f = fixture();
        let first = f
            .service
            .seed_admin(Password::from("Admin123!"))
            .await
            .unwrap();
        assert_eq!(first.map(|u| u.username), Some(ADMIN_USERNAME.to_string()));

        let second = f
            .service
            .seed_admin(Password::from("Admin123!"))
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(f.db.count().await.unwrap(), 1);
    }
}
