//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod password;
pub mod traits;
pub mod types;

pub use error::{AppError, AuthError, CacheError, ConfigError, DatabaseError, ValidationError};
pub use password::{Password, validate_password_strength};
pub use traits::{
    ArticleRepository, CacheStore, CrudRepository, DatabaseClient, PasswordHasher, TokenIssuer,
    UserRepository, WindowCount,
};
pub use types::{
    Article, ArticleChanges, ArticleCounter, ArticleId, ArticleStatus, AuthUser, ChangePasswordRequest,
    CreateArticleRequest, CreateUserRequest, Entity, HealthResponse, HealthStatus, IssuedToken,
    ListParams, ListQuery, LoginRequest, LoginResponse, NewArticle, NewUser, PaginatedResponse,
    RegisterRequest, SortOrder, UpdateArticleRequest, UpdateUserRequest, User, UserChanges,
    UserCredentials, UserId, UserStatus, username_cache_key,
};
