// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `write` command.

use tracing::info;
use wsvent_modbus::{CommandValue, Unit, WriteCommand};

use crate::cli::{Cli, WriteArgs};
use crate::error::BinResult;

/// Builds the command described by the arguments.
pub(crate) fn command_from(args: &WriteArgs) -> WriteCommand {
    let command = WriteCommand::new(args.name.trim(), CommandValue::parse(&args.value));
    if args.percent {
        command.with_unit(Unit::Percent)
    } else {
        command
    }
}

/// Executes the `write` command.
pub async fn write(cli: &Cli, args: WriteArgs) -> BinResult<()> {
    let device = super::open_device(cli)?;
    let command = command_from(&args);
    info!(name = %command.name, value = %command.value, "Writing");

    let result = device.write(command).await;
    device.shutdown().await;
    let receipt = result?;

    let words: Vec<String> = receipt.words.iter().map(|w| format!("0x{w:04X}")).collect();
    println!(
        "✓ {} = {} (register {}, words [{}])",
        receipt.name,
        receipt.value,
        receipt.address,
        words.join(", ")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(name: &str, value: &str, percent: bool) -> WriteArgs {
        WriteArgs {
            name: name.to_string(),
            value: value.to_string(),
            percent,
        }
    }

    #[test]
    fn test_command_from_args() {
        let command = command_from(&args("target_temperature", "21.5", false));
        assert_eq!(command.value, CommandValue::Number(21.5));
        assert_eq!(command.unit, None);

        let command = command_from(&args("fan_speed", "50", true));
        assert_eq!(command.unit, Some(Unit::Percent));

        let command = command_from(&args("operation_mode", "auto_time", false));
        assert_eq!(command.value, CommandValue::State("auto_time".to_string()));

        let command = command_from(&args("boost_ventilation", "on", false));
        assert_eq!(command.value, CommandValue::Bool(true));
    }
}
