// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # wsvent-bin
//!
//! Command-line front end for the wsvent ventilation driver.
//!
//! - CLI argument parsing with clap
//! - Poll loop orchestration and snapshot reporting
//! - Graceful shutdown on SIGINT/SIGTERM
//! - Logging initialization
//! - One-shot commands (poll, write, registers, validate, version)
//!
//! ## Usage
//!
//! ```bash
//! # Poll the unit until interrupted (default command)
//! wsvent -c /etc/wsvent/wsvent.yaml
//!
//! # One poll cycle as JSON
//! wsvent poll -f json
//!
//! # Set the target room temperature
//! wsvent write target_temperature 21.5
//!
//! # Fan by percentage
//! wsvent write fan_speed 66 --percent
//!
//! # Writable registers
//! wsvent registers --writable
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{DeviceRuntime, RuntimeBuilder};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal, StopReason};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
