//! HTTP API: routing, request/response mapping, and service wiring.

pub mod app;
pub mod context;
pub mod middleware;
