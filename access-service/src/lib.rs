pub mod admin_handlers;
pub mod app;
pub mod cache;
pub mod config;
pub mod decision;
pub mod directory;
pub mod gate;
pub mod metrics;
pub mod subscription;

pub use app::{router, AppState};
