mod advisory;
mod routes;
mod server;
mod telemetry;
mod upload;

pub mod app;
pub mod config;

pub use app::start_app;
