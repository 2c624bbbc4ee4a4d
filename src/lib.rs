//! Authoritative entity synchronization with client-side prediction.
//!
//! The server owns every entity and advances them on a fixed tick; clients
//! predict their own entity, reconcile against authoritative snapshots and
//! render everyone else interpolated a short delay in the past.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
