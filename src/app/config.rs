//! Typed application configuration loaded from environment variables.
//!
//! [`AppConfig::from_env`] reads the process environment (after `.env` has
//! been loaded by the binary). Parsing itself goes through
//! [`AppConfig::from_lookup`] so tests can supply a map instead of mutating
//! global state.

use secrecy::SecretString;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::ConfigError;

/// Fallback signing secret for local development only.
pub const DEV_JWT_SECRET: &str = "dev-only-insecure-jwt-secret-change-me";

/// Admin password seeded in development when none is configured.
pub const DEV_ADMIN_PASSWORD: &str = "Admin123!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    /// Empty means any origin
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug)]
pub struct CacheConfig {
    pub url: SecretString,
    pub ttl: Duration,
    pub op_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    /// Set when no `JWT_SECRET` was configured outside production
    pub using_dev_secret: bool,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub seed_admin_password: Option<SecretString>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    /// Token bucket per key in process memory
    Memory,
    /// Fixed-window counter in the cache store
    Cache,
}

impl FromStr for RateLimitBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(RateLimitBackend::Memory),
            "cache" | "redis" => Ok(RateLimitBackend::Cache),
            other => Err(format!("expected 'memory' or 'cache', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKey {
    Ip,
    User,
}

impl FromStr for RateLimitKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ip" => Ok(RateLimitKey::Ip),
            "user" => Ok(RateLimitKey::User),
            other => Err(format!("expected 'ip' or 'user', got '{other}'")),
        }
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests admitted per key per window
    pub max_requests: u32,
    pub window: Duration,
    pub backend: RateLimitBackend,
    pub key: RateLimitKey,
    /// Honour `X-Forwarded-For` / `X-Real-IP` (only behind a trusted proxy)
    pub trust_proxy_headers: bool,
    /// How often idle in-memory buckets are dropped
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window: Duration::from_secs(60),
            backend: RateLimitBackend::Memory,
            key: RateLimitKey::Ip,
            trust_proxy_headers: false,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn secs(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        self.parse(key, default).map(Duration::from_secs)
    }

    fn positive<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: Display,
    {
        let value = self.parse(key, default)?;
        if value <= T::default() {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let environment: Environment = vars.parse("ENV", Environment::Development)?;

        let server = ServerConfig {
            host: vars.string("SERVER_HOST", "0.0.0.0"),
            port: vars.parse("SERVER_PORT", 9999)?,
            request_timeout: Duration::from_secs(vars.positive("REQUEST_TIMEOUT_SECS", 30)?),
            cors_allowed_origins: vars
                .get("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };

        let database = DatabaseConfig {
            url: SecretString::from(vars.get("DATABASE_URL").unwrap_or_else(|| {
                database_url_from_parts(
                    &vars.string("DB_USER", "postgres"),
                    &vars.string("DB_PASSWORD", ""),
                    &vars.string("DB_HOST", "localhost"),
                    &vars.string("DB_PORT", "5432"),
                    &vars.string("DB_NAME", "app"),
                )
            })),
            max_connections: vars.positive("DB_MAX_CONNECTIONS", 10)?,
            min_connections: vars.parse("DB_MIN_CONNECTIONS", 2)?,
            acquire_timeout: vars.secs("DB_ACQUIRE_TIMEOUT_SECS", 3)?,
        };
        if database.min_connections > database.max_connections {
            return Err(ConfigError::InvalidValue {
                key: "DB_MIN_CONNECTIONS".to_string(),
                message: "must not exceed DB_MAX_CONNECTIONS".to_string(),
            });
        }

        let cache = CacheConfig {
            url: SecretString::from(vars.get("REDIS_URL").unwrap_or_else(|| {
                redis_url_from_parts(
                    &vars.string("REDIS_HOST", "localhost"),
                    &vars.string("REDIS_PORT", "6379"),
                    vars.get("REDIS_PASSWORD").as_deref(),
                    &vars.string("REDIS_DB", "0"),
                )
            })),
            ttl: Duration::from_secs(vars.positive("CACHE_TTL_SECS", 600)?),
            op_timeout: Duration::from_millis(vars.positive("CACHE_OP_TIMEOUT_MS", 500)?),
            connect_timeout: vars.secs("CACHE_CONNECT_TIMEOUT_SECS", 3)?,
        };

        let (jwt_secret, using_dev_secret) = match vars.get("JWT_SECRET") {
            Some(secret) => (secret, false),
            None if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
            }
            None => (DEV_JWT_SECRET.to_string(), true),
        };

        let bcrypt_cost: u32 = vars.parse("BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue {
                key: "BCRYPT_COST".to_string(),
                message: "must be between 4 and 31".to_string(),
            });
        }

        let seed_admin_password = match vars.get("SEED_ADMIN_PASSWORD") {
            Some(password) => Some(SecretString::from(password)),
            None if environment.is_production() => None,
            None => Some(SecretString::from(DEV_ADMIN_PASSWORD.to_string())),
        };

        let token_hours: u64 = vars.positive("JWT_EXPIRATION_HOURS", 24)?;
        let token_ttl = token_hours
            .checked_mul(3600)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "JWT_EXPIRATION_HOURS".to_string(),
                message: "too large".to_string(),
            })?;
        let auth = AuthConfig {
            jwt_secret: SecretString::from(jwt_secret),
            using_dev_secret,
            token_ttl,
            bcrypt_cost,
            seed_admin_password,
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            enabled: vars.parse("RATE_LIMIT_ENABLED", defaults.enabled)?,
            max_requests: vars.positive("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests)?,
            window: Duration::from_secs(vars.positive("RATE_LIMIT_WINDOW_SECS", 60)?),
            backend: vars.parse("RATE_LIMIT_BACKEND", defaults.backend)?,
            key: vars.parse("RATE_LIMIT_KEY", defaults.key)?,
            trust_proxy_headers: vars
                .parse("RATE_LIMIT_TRUST_PROXY", defaults.trust_proxy_headers)?,
            sweep_interval: Duration::from_secs(vars.positive("RATE_LIMIT_SWEEP_SECS", 60)?),
        };

        Ok(Self {
            environment,
            server,
            database,
            cache,
            auth,
            rate_limit,
        })
    }

    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub fn default_log_directive(&self) -> &'static str {
        if self.environment.is_production() {
            "info,axum_backend_template=info"
        } else {
            "info,axum_backend_template=debug,tower_http=debug"
        }
    }
}

fn database_url_from_parts(user: &str, password: &str, host: &str, port: &str, name: &str) -> String {
    if password.is_empty() {
        format!("postgres://{user}@{host}:{port}/{name}")
    } else {
        format!("postgres://{user}:{password}@{host}:{port}/{name}")
    }
}

fn redis_url_from_parts(host: &str, port: &str, password: Option<&str>, db: &str) -> String {
    match password {
        Some(password) => format!("redis://:{password}@{host}:{port}/{db}"),
        None => format!("redis://{host}:{port}/{db}"),
    }
}
