//! # hauslink-domain
//!
//! Pure domain model for the hauslink bridge.
//!
//! ## Responsibilities
//! - Define **device records** (switch, relay, environment) and their
//!   kind-specific mutable state
//! - Define the **hub state** (activities, power pseudo-activity, digest
//!   shapes) and the pure mutations applied to it
//! - Define the **configuration document** — the single persisted state root
//! - Timestamp conventions shared by all of the above
//!
//! The serialized shapes in this crate are the wire contract: they must stay
//! byte-compatible with the persisted `config.json` document and the realtime
//! channel payloads.
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod config;
pub mod device;
pub mod hub;
pub mod time;
