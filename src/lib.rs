//! netweave - intent-based network reconciliation
//!
//! This library provides the pieces needed to turn declarative network
//! intents into device configuration: shared resource pools, per-type
//! intent handlers, device-family template dispatch and a reconciliation
//! engine that drives every target through its lifecycle.

pub mod cli;
pub mod config;
pub mod engine;
pub mod handlers;
pub mod intent;
pub mod logging;
pub mod platform;
pub mod resource;
pub mod template;
