// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `registers` command.

use wsvent_modbus::{RegisterDescriptor, RegisterMap};

use crate::cli::{Cli, OutputFormat, RegistersArgs};
use crate::error::BinResult;

/// Executes the `registers` command: prints the register table.
///
/// Needs no configuration file and never touches the device.
pub fn registers(_cli: &Cli, args: RegistersArgs) -> BinResult<()> {
    let map = RegisterMap::standard()?;
    let rows = select(&map, args.writable);

    match args.format {
        OutputFormat::Text => print_text(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Yaml => print_yaml(&rows),
    }
    Ok(())
}

fn select(map: &RegisterMap, writable_only: bool) -> Vec<&RegisterDescriptor> {
    map.iter()
        .filter(|d| !writable_only || d.access.is_writable())
        .collect()
}

fn range_of(descriptor: &RegisterDescriptor) -> String {
    descriptor.range.map(|r| r.to_string()).unwrap_or_default()
}

fn print_text(rows: &[&RegisterDescriptor]) {
    let width = rows.iter().map(|d| d.name.len()).max().unwrap_or(0);
    println!(
        "{:<width$}  {:>7}  {:<2}  {:<20}  {:>5}  {:<12}  UNIT",
        "NAME", "ADDRESS", "RW", "TYPE", "SCALE", "RANGE"
    );
    for d in rows {
        let address = if d.words > 1 {
            format!("{}+{}", d.address, d.words - 1)
        } else {
            d.address.to_string()
        };
        println!(
            "{:<width$}  {:>7}  {:<2}  {:<20}  {:>5}  {:<12}  {}",
            d.name,
            address,
            d.access.as_str(),
            d.value.label(),
            d.scale,
            range_of(d),
            d.unit.unwrap_or(""),
        );
    }
    println!();
    println!("{} register(s)", rows.len());
}

fn print_yaml(rows: &[&RegisterDescriptor]) {
    // Simple YAML-like format
    println!("registers:");
    for d in rows {
        println!("  - name: {}", d.name);
        println!("    address: {}", d.address);
        println!("    words: {}", d.words);
        println!("    access: {}", d.access.as_str());
        println!("    type: {}", d.value.label());
        println!("    scale: {}", d.scale);
        if let Some(range) = d.range {
            println!("    min: {}", range.min);
            println!("    max: {}", range.max);
        }
        if let Some(step) = d.step {
            println!("    step: {}", step);
        }
        if let Some(unit) = d.unit {
            println!("    unit: \"{}\"", unit);
        }
    }
}
