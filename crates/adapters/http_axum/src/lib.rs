//! # hauslink-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the read-only status endpoint: `GET /` → `{devices, harmony}`
//!   with any-origin CORS
//! - Serve the realtime WebSocket channel at `/ws` (the fanout target for
//!   device and hub updates, and the ingress for subscriber commands)
//! - Map everything onto the engine handle; no state lives here
//!
//! ## Dependency rule
//! Depends on `hauslink-app` (for the engine handle and update fanout).
//! Never leaks axum types into the application core.

pub mod router;
pub mod state;
pub mod ws;
