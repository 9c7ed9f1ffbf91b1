pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod google_auth;
pub mod middleware;
pub mod models;
pub mod oauth;
pub mod roster;
pub mod services;
pub mod session;
pub mod storage;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
