pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

pub use models::config::AppConfig;
pub use services::api::{ApiError, DashboardApi, HttpDashboardApi};
pub use services::dashboard::{Dashboard, DashboardSettings, ViewState};
