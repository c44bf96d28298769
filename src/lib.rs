pub mod config;
pub mod datalake;
pub mod error;
pub mod monitors;
pub mod registry;
pub mod server;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
