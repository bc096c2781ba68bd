// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! wsvent - Modbus driver for Maico WS ventilation units
//!
//! Main binary entry point.

use wsvent_bin::cli::Cli;
use wsvent_bin::error::report_error_and_exit;
use wsvent_bin::{commands, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    // The file's logging section applies when the flags leave it open.
    let file_logging = wsvent_config::load_config(&cli.config)
        .ok()
        .map(|config| config.logging);
    init_logging(
        &cli.effective_log_level(file_logging.as_ref()),
        cli.effective_log_format(file_logging.as_ref()),
    );

    if let Err(error) = commands::execute(cli).await {
        report_error_and_exit(error);
    }
}
