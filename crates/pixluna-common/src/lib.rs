//! Pixluna-Common: shared types and the error taxonomy.
//!
//! This crate provides the pieces every part of pixluna agrees on:
//!
//! - **Error Handling**: the [`Error`] enum and its coarse [`ErrorKind`]
//! - **Core Types**: flip modes, image URL sets, and provider-reported metadata
//!
//! # Examples
//!
//! ```
//! use pixluna_common::{Error, ErrorKind, FlipMode, Result};
//!
//! let mode: FlipMode = "both".parse().unwrap();
//! assert_eq!(mode, FlipMode::Both);
//!
//! fn example() -> Result<()> {
//!     Err(Error::provider_not_found("nope"))
//! }
//! assert_eq!(example().unwrap_err().kind(), ErrorKind::ProviderNotFound);
//! ```

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::*;
