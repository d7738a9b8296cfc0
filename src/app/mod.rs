//! Application layer containing business logic and shared state.

pub mod article_service;
pub mod auth_service;
pub mod cache;
pub mod config;
pub mod state;
pub mod user_service;
pub mod worker;

pub use article_service::ArticleService;
pub use auth_service::AuthService;
pub use cache::ReadThroughCache;
pub use config::AppConfig;
pub use state::AppState;
pub use user_service::UserService;
pub use worker::{MaintenanceTask, MaintenanceWorker, WorkerConfig, spawn_worker};
