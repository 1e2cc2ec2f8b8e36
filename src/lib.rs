//! classsense - classroom feedback collection service
//!
//! Teachers create a class and receive a five-digit pin. Sensor devices push
//! readings and students push feedback under that pin; the teacher dashboard
//! polls the combined class state.
//!
//! - [`class_store`] - class records behind an in-memory or PostgreSQL backend
//! - [`http_server`] - JSON API over the store
//! - [`cli`] - process entry points and configuration
//! - [`observability`] - logging and request metrics

pub mod class_store;
pub mod cli;
pub mod http_server;
pub mod observability;
