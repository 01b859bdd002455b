//! COINWATCH: crypto portfolio and market monitor.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod watchlist;
pub mod storage;
pub mod scraper;
pub mod data;
pub mod engine;
pub mod notify;
