// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Poll the unit until interrupted (default)
//! - `poll`: Run one poll cycle and print the snapshot
//! - `write`: Write one value
//! - `registers`: Print the register table
//! - `validate`: Validate the configuration file
//! - `version`: Show version information

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use wsvent_config::{LogLevel, LoggingConfig};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// wsvent - Modbus driver for Maico WS ventilation units
#[derive(Parser, Debug)]
#[command(
    name = "wsvent",
    author = "Sylvex",
    version = wsvent_modbus::VERSION,
    about = "Modbus driver for Maico WS ventilation units",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "wsvent.yaml",
        env = "WSVENT_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact); defaults to the configured format
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Poll the unit periodically until interrupted
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Run a single poll cycle and print the snapshot
    Poll(PollArgs),

    /// Write one value to the unit
    ///
    /// Values are numbers in physical units, `on`/`off`, or labels such as
    /// `auto_time`. Use `fan_speed <percent>` to set the fan by percentage.
    Write(WriteArgs),

    /// Print the register table
    Registers(RegistersArgs),

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Override the configured poll interval (e.g. `15s`)
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,
}

/// Arguments for the `poll` command.
#[derive(Args, Debug, Default, Clone)]
pub struct PollArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Include stale-flag and timestamp columns
    #[arg(long)]
    pub detailed: bool,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Register name, or `fan_speed`
    pub name: String,

    /// Value to write
    #[arg(allow_hyphen_values = true)]
    pub value: String,

    /// Interpret the value as a fan percentage (`fan_speed` only)
    #[arg(long)]
    pub percent: bool,
}

/// Arguments for the `registers` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RegistersArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Only list writable registers
    #[arg(short, long)]
    pub writable: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<wsvent_config::LogFormat> for LogFormat {
    fn from(format: wsvent_config::LogFormat) -> Self {
        match format {
            wsvent_config::LogFormat::Text => LogFormat::Text,
            wsvent_config::LogFormat::Json => LogFormat::Json,
            wsvent_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
    /// YAML format
    Yaml,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Check if verbose logging is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Effective log level: flags, then `--log-level`, then the file.
    pub fn effective_log_level(&self, file: Option<&LoggingConfig>) -> String {
        if self.quiet {
            "warn".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else if let Some(level) = &self.log_level {
            level.clone()
        } else {
            file.map_or(LogLevel::Info, |l| l.level).as_str().to_string()
        }
    }

    /// Effective log format: `--log-format`, then the file.
    pub fn effective_log_format(&self, file: Option<&LoggingConfig>) -> LogFormat {
        self.log_format
            .or_else(|| file.map(|l| l.format.into()))
            .unwrap_or_default()
    }
}

// =============================================================================
// Tests
// =============================================================================
