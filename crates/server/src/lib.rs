pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError};
pub use routes::create_router;
pub use state::{AppState, SharedPipeline};
