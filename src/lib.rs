//! MeteoSwiss cache library
//!
//! This module exposes the cache, upstream client, aggregator and HTTP server
//! for use by the binary and integration tests.

pub mod cache;
pub mod cli;
pub mod data;
pub mod server;
