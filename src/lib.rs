pub mod classifier;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod upstream;
pub mod validation;

pub use config::Config;
pub use error::{ApiError, ErrorType, Result};
pub use response::ApiResponse;
pub use server::{create_app, Server};
