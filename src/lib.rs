//! Pixluna - random illustration fetcher
//!
//! This library crate exposes the core functionality for integration testing.

pub mod acquisition;
pub mod config;
pub mod http;
pub mod images;
pub mod source;
