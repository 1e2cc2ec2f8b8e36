//! # ClassSense HTTP Server Module
//!
//! Thin request layer over the class store. Each API request maps to exactly
//! one store operation; store errors map to distinct status codes.
//!
//! # Endpoints
//!
//! - `POST /api/classes` - Create a class, returns its pin
//! - `POST /api/classes/:pin/ingest` - Store a sensor reading
//! - `POST /ingest` - Sensor reading with the pin in `X-Class-Pin` or `class_pin`
//! - `GET  /api/classes/:pin/state` - Polled class state
//! - `POST /api/classes/:pin/emotions` - Record student feedback
//! - `/health` - Health check
//! - `/observability/*` - Metrics and monitoring

pub mod class_routes;
pub mod config;
pub mod errors;
pub mod observability_routes;
pub mod server;

pub use class_routes::ApiState;
pub use config::HttpServerConfig;
pub use errors::ApiError;
pub use server::{build_router, HttpServer};
