//! bioseq Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the bioseq workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`BioseqError`] type and [`Result`] alias
//! - **Environment**: typed lookups for `.env`-style configuration
//! - **Logging**: console and rotating file output built on `tracing`
//!
//! # Example
//!
//! ```no_run
//! use bioseq_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     info!("Application started");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{BioseqError, Result};
