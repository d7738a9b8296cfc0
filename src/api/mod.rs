//! The API layer, containing web handlers and routing.

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod response;
pub mod router;

pub use rate_limit::RateLimitState;
pub use response::ApiResponse;
pub use router::{RouterConfig, create_router};
