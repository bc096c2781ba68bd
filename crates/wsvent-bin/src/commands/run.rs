// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::RuntimeBuilder;

/// Executes the `run` command: polls until interrupted.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    info!(config = %cli.config.display(), "Starting wsvent...");

    let runtime = RuntimeBuilder::new()
        .config_path(&cli.config)
        .poll_interval(args.interval)
        .build()?;

    runtime.run().await
}
