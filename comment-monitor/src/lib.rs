//! comment-monitor library crate.
//!
//! Watches the comment section of one video: full history backfill, then
//! incremental polling with credential rotation, SQLite persistence and live
//! fan-out to WebSocket subscribers.

pub mod api;
pub mod config;
pub mod credentials;
pub mod database;
pub mod error;
pub mod hub;
pub mod logging;
pub mod monitor;

pub use error::{Error, Result};
