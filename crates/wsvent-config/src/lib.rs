// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # wsvent-config
//!
//! Configuration management for the wsvent ventilation driver.
//!
//! ## Features
//!
//! - **Schema Definition**: device, connection, code label and logging sections
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `WSVENT_*` variables override file values
//! - **Placeholders**: `${VAR}` and `${VAR:default}` inside files
//!
//! ## Quick Start
//!
//! ```no_run
//! use wsvent_config::loader::load_config;
//!
//! let config = load_config("wsvent.yaml").unwrap();
//!
//! println!("Device: {}", config.device.name);
//! println!("Endpoint: {}", config.endpoint());
//! ```
//!
//! ## Environment Variables
//!
//! ```text
//! WSVENT_HOST=192.168.1.60
//! WSVENT_UNIT_ID=2
//! WSVENT_POLL_INTERVAL=15s
//! WSVENT_LOG_LEVEL=debug
//! ```
//!
//! Values in config files can reference environment variables:
//!
//! ```yaml
//! connection:
//!   transport:
//!     type: tcp
//!     host: "${WS_HOST:192.168.1.50}"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{CodeLabels, DeviceSettings, LogFormat, LogLevel, LoggingConfig, WsventConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
