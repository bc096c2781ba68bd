// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `run`: Poll the unit until interrupted
//! - `poll`: One poll cycle, printed
//! - `write`: Write one value
//! - `registers`: Print the register table
//! - `validate`: Validate configuration file
//! - `version`: Show version information

mod poll;
mod registers;
mod run;
mod validate;
mod version;
mod write;

pub use poll::poll;
pub use registers::registers;
pub use run::run;
pub use validate::validate;
pub use version::version;
pub use write::write;

use wsvent_config::{load_config, WsventConfig};
use wsvent_modbus::DeviceStateAggregator;

use crate::cli::{Cli, Commands};
use crate::error::{BinError, BinResult};
use crate::runtime::DeviceRuntime;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Poll(args) => poll::poll(&cli, args).await,
        Commands::Write(args) => write::write(&cli, args).await,
        Commands::Registers(args) => registers::registers(&cli, args),
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
    }
}

/// Loads the configuration named on the command line.
pub(crate) fn load(cli: &Cli) -> BinResult<WsventConfig> {
    if !cli.config.exists() {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            cli.config.display()
        )));
    }
    Ok(load_config(&cli.config)?)
}

/// Loads the configuration and builds a device for a one-shot command.
pub(crate) fn open_device(cli: &Cli) -> BinResult<DeviceStateAggregator> {
    let config = load(cli)?;
    DeviceRuntime::build_device(&config)
}
