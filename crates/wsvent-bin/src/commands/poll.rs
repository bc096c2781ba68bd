// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `poll` command.

use serde_json::json;
use wsvent_modbus::{DeviceSnapshot, DeviceStateAggregator, PollOutcome, RangeFailure};

use crate::cli::{Cli, OutputFormat, PollArgs};
use crate::error::{BinError, BinResult};

/// Executes the `poll` command: one cycle, printed, then disconnect.
pub async fn poll(cli: &Cli, args: PollArgs) -> BinResult<()> {
    let device = super::open_device(cli)?;

    let outcome = device.poll().await;
    device.shutdown().await;
    let outcome = outcome?;

    if let PollOutcome::Unavailable(failures) = &outcome {
        return Err(BinError::Unavailable(describe_failures(failures)));
    }

    match args.format {
        OutputFormat::Text => print_text(&device, &outcome, args.detailed),
        OutputFormat::Json => print_json(&device, &outcome)?,
        OutputFormat::Yaml => print_yaml(&device, &outcome, args.detailed),
    }
    Ok(())
}

fn describe_failures(failures: &[RangeFailure]) -> String {
    match failures.first() {
        Some(first) => format!(
            "{} range(s) failed, first {}: {}",
            failures.len(),
            first.range,
            first.error
        ),
        None => "no data".to_string(),
    }
}

fn unit_of<'a>(device: &'a DeviceStateAggregator, name: &str) -> &'a str {
    device
        .register_map()
        .get(name)
        .and_then(|d| d.unit)
        .unwrap_or("")
}

// =============================================================================
// Text
// =============================================================================

fn print_text(device: &DeviceStateAggregator, outcome: &PollOutcome, detailed: bool) {
    let health = device.health();
    println!("State: {}  Link: {}", device.state(), health.state.as_str());

    if let Some(snapshot) = outcome.snapshot() {
        println!(
            "Snapshot #{} taken {}",
            snapshot.sequence,
            snapshot.taken_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!();
        print_fields(device, snapshot, detailed);
    }

    let failures = outcome.failures();
    if !failures.is_empty() {
        println!();
        println!("Failed reads:");
        for failure in failures {
            println!(
                "  ✗ {} ({}): {}",
                failure.range,
                failure.range.names.join(", "),
                failure.error
            );
        }
    }
}

fn print_fields(device: &DeviceStateAggregator, snapshot: &DeviceSnapshot, detailed: bool) {
    let width = snapshot.fields.keys().map(String::len).max().unwrap_or(0);
    for (name, field) in &snapshot.fields {
        let value = format!("{} {}", field.value, unit_of(device, name));
        if detailed {
            println!(
                "  {name:<width$}  {:<16} {:<5} {}",
                value.trim_end(),
                if field.stale { "stale" } else { "" },
                field.updated_at.format("%H:%M:%S"),
            );
        } else {
            let marker = if field.stale { " (stale)" } else { "" };
            println!("  {name:<width$}  {}{marker}", value.trim_end());
        }
    }
}

// =============================================================================
// JSON
// =============================================================================

fn print_json(device: &DeviceStateAggregator, outcome: &PollOutcome) -> BinResult<()> {
    let failures: Vec<_> = outcome
        .failures()
        .iter()
        .map(|f| {
            json!({
                "range": f.range.to_string(),
                "registers": f.range.names,
                "error": f.error.to_string(),
            })
        })
        .collect();

    let output = json!({
        "state": device.state(),
        "health": device.health(),
        "snapshot": outcome.snapshot().map(|s| s.as_ref()),
        "failures": failures,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// =============================================================================
// YAML
// =============================================================================

fn print_yaml(device: &DeviceStateAggregator, outcome: &PollOutcome, detailed: bool) {
    // Simple YAML-like format
    let health = device.health();
    println!("state: {}", device.state());
    println!("link: {}", health.state.as_str());
    println!("consecutive_failures: {}", health.consecutive_failures);

    if let Some(snapshot) = outcome.snapshot() {
        println!("sequence: {}", snapshot.sequence);
        println!("taken_at: {}", snapshot.taken_at.to_rfc3339());
        println!("fields:");
        for (name, field) in &snapshot.fields {
            if detailed {
                println!("  {name}:");
                println!("    value: {}", yaml_value(&field.value.to_string()));
                println!("    stale: {}", field.stale);
                println!("    updated_at: {}", field.updated_at.to_rfc3339());
            } else {
                println!("  {name}: {}", yaml_value(&field.value.to_string()));
            }
        }
    }

    let failures = outcome.failures();
    if !failures.is_empty() {
        println!("failures:");
        for failure in failures {
            println!("  - range: {}", failure.range);
            println!("    error: \"{}\"", failure.error.to_string().replace('"', "'"));
        }
    }
}

fn yaml_value(value: &str) -> &str {
    if value == "unavailable" {
        "null"
    } else {
        value
    }
}
