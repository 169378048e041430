pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
