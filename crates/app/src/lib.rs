//! # hauslink-app
//!
//! Application core — the message-routing and state-reconciliation engine.
//!
//! ## Responsibilities
//! - **Topic router**: match an inbound (topic, payload) pair to the owning
//!   device record and message subtype
//! - **Reconciliation policy**: pure per-kind merge of a decoded payload into
//!   a device record
//! - **Hub synchronizer**: derive hub activity state from bootstrap snapshots
//!   and recurring digests, behind an explicit connection state machine
//! - **Engine**: the one serialized event-processing context that owns the
//!   configuration document; issues persistence and fanout as fire-and-forget
//!   side effects of every mutation
//! - **Ports**: traits the adapters implement (persistence, transport
//!   publish, hub commands)
//!
//! ## Dependency rule
//! Depends on `hauslink-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the
//! reverse.

pub mod engine;
pub mod fanout;
pub mod ports;
pub mod reconcile;
pub mod router;
