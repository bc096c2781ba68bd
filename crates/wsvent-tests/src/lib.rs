// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # wsvent Integration Tests
//!
//! End-to-end tests of the driver against a simulated ventilation unit.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `mocks`: Simulated register bank and scripted transport
//!   - `fixtures`: Seeded devices, connection settings and config files
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p wsvent-tests
//!
//! # Run specific test suite
//! cargo test -p wsvent-tests --test integration_connection
//! cargo test -p wsvent-tests --test integration_polling
//! cargo test -p wsvent-tests --test integration_writes
//! cargo test -p wsvent-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Connection Tests (`integration_connection.rs`)
//! - Retry counts and backoff
//! - Failure threshold and reconnect
//! - FIFO ordering and shutdown
//!
//! ### Polling Tests (`integration_polling.rs`)
//! - Complete and partial snapshots
//! - Staleness and derived metrics
//! - Poll loop ticking and skipping
//!
//! ### Write Tests (`integration_writes.rs`)
//! - Encoding and range validation
//! - Fan percentage mapping
//! - Label and flag writes
//!
//! ### Config Tests (`integration_config.rs`)
//! - YAML, TOML and JSON files
//! - Environment overrides
//! - Building a device from a file

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir};
}
