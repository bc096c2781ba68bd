// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use std::time::Duration;

use wsvent_config::WsventConfig;
use wsvent_modbus::{DataBits, Parity, StopBits, TransportConfig};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let config = super::load(cli)
        .map_err(|e| e.with_context("Configuration validation failed"))?;

    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Device:        {}", config.device.name);
            println!("  Transport:     {}", config.transport_kind());
            println!("  Endpoint:      {}", config.endpoint());
            println!("  Unit ID:       {}", config.connection.transport.unit_id());
            println!(
                "  Poll interval: {}",
                humantime::format_duration(config.device.poll_interval)
            );
            println!("  Retry:         {} attempt(s)", config.connection.retry.attempts);
            println!(
                "  Extra labels:  {} fault, {} info",
                config.codes.fault_labels.len(),
                config.codes.info_labels.len()
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "device": config.device.name,
                    "transport": config.transport_kind(),
                    "endpoint": config.endpoint(),
                    "unit_id": config.connection.transport.unit_id(),
                    "poll_interval": humantime::format_duration(config.device.poll_interval).to_string(),
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Yaml => {
            // Simple YAML-like format
            println!("valid: true");
            println!("config_path: {}", config_path.display());
            println!("device: {}", config.device.name);
            println!("transport: {}", config.transport_kind());
            println!("endpoint: \"{}\"", config.endpoint());
            println!(
                "poll_interval: {}",
                humantime::format_duration(config.device.poll_interval)
            );
            if !warnings.is_empty() {
                println!("warnings:");
                for warning in &warnings {
                    println!("  - \"{}\"", warning);
                }
            }
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Settings that are valid but likely unintended.
pub(crate) fn collect_warnings(config: &WsventConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let connection = &config.connection;

    let worst_case = connection.transport.timeout() * connection.retry.attempts.max(1)
        + connection.retry.max_delay * connection.retry.attempts.saturating_sub(1);
    if config.device.poll_interval < worst_case {
        warnings.push(format!(
            "Poll interval {} is shorter than one request's worst case {}; ticks will be skipped",
            humantime::format_duration(config.device.poll_interval),
            humantime::format_duration(worst_case)
        ));
    }

    if connection.retry.attempts <= 1 {
        warnings.push("Retries are disabled; every timeout fails the request".to_string());
    }

    if connection.failure_threshold <= 1 {
        warnings.push("Failure threshold of 1 reconnects after two failed requests in a row".to_string());
    }

    match &connection.transport {
        TransportConfig::Rtu(rtu) => {
            if rtu.data_bits != DataBits::Eight
                || rtu.parity != Parity::Even
                || rtu.stop_bits != StopBits::One
            {
                warnings.push(format!(
                    "Serial frame {} differs from the unit's factory setting 8E1",
                    rtu.frame_format()
                ));
            }
        }
        TransportConfig::Tcp(tcp) => {
            if tcp.timeout > Duration::from_secs(10) {
                warnings.push(format!(
                    "Response timeout {} is unusually long for Modbus TCP",
                    humantime::format_duration(tcp.timeout)
                ));
            }
        }
    }

    warnings
}
