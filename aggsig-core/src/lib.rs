//! aggsig Core
//!
//! Shared building blocks for aggsig signer nodes:
//! - Protocol constants (DST, EIP-2537 sizes, default timers)
//! - Node configuration loaded from `AGGSIG_*` environment variables
//! - Logging setup and conventions
//! - Configuration errors (the only process-fatal error class)

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use logging::*;
