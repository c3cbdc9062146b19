//! Database module for StatusTrail.
//!
//! Provides SQLite storage of the latest check per source with embedded
//! migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
