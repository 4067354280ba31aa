//! Automated digit trading bot.
//!
//! Wires the streaming client, statistics engine, and strategy runner
//! together behind a TOML configuration file.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
