//! FIAS Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the FIAS loader workspace.
//!
//! - **Error Handling**: [`FiasError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Progress**: byte-oriented progress bars for downloads and extraction
//!
//! # Example
//!
//! ```no_run
//! use fias_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> fias_common::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod progress;

pub use error::{FiasError, Result};
