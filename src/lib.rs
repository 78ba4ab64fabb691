pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod permission;
pub mod resource;
pub mod view;

pub use app::{ApiBuilder, ResourceRoutes};
pub use config::{ApiConfig, AppConfig};
pub use error::ApiError;
pub use resource::Resource;
pub use view::{ResourceView, ViewContext};

#[cfg(test)]
pub mod testing;
