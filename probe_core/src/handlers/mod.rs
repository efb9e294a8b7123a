//! HTTP handlers of the monitoring server

pub mod health;
pub mod metrics;
pub mod routes;

pub use routes::create_routes;
