//! StatusTrail - vendor status aggregation.
//!
//! Fetches vendor status pages, feeds and APIs, normalizes each into a
//! uniform component list and serves the latest results as a dashboard.

pub mod config;
pub mod db;
pub mod document;
pub mod extract;
pub mod fetch;
pub mod scheduler;
pub mod web;
