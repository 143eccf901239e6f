//! # tally-core
//!
//! Core errors and utilities shared by the tally crates.
//!
//! This crate provides:
//! - [`TallyError`] - Error type for configuration, I/O and internal failures
//! - [`logging`] - Tracing setup and log directory helpers
//!
//! ## Example
//!
//! ```no_run
//! use tally_core::{TallyError, logging};
//!
//! fn main() -> tally_core::Result<()> {
//!     let _guard = logging::init_logging(None, false)?;
//!
//!     let config_path = std::path::Path::new("/etc/tally/config.yaml");
//!     if !config_path.exists() {
//!         return Err(TallyError::config_not_found(config_path));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{Result, TallyError};
pub use logging::{LogGuard, init_logging};
