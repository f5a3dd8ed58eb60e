//! HTTP API: authentication pipeline, routing, and request/response mapping.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
