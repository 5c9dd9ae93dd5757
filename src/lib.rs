pub mod api;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod menu;
pub mod session;
pub mod ui;

pub use api::server::{AppState, build_router, start_server};
pub use config::Settings;
