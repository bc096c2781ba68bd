// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file; pick the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders
//! 3. Parse YAML, TOML or JSON into [`WsventConfig`]
//! 4. Apply `WSVENT_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! WSVENT_HOST=192.168.1.60
//! WSVENT_PORT=5020
//! WSVENT_UNIT_ID=2
//! WSVENT_SERIAL_PORT=/dev/ttyAMA0
//! WSVENT_BAUD_RATE=19200
//! WSVENT_POLL_INTERVAL=15s
//! WSVENT_LOG_LEVEL=debug
//! ```

use std::env;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use wsvent_modbus::TransportConfig;

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogLevel, WsventConfig};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "WSVENT";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// # Examples
///
/// ```no_run
/// use wsvent_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("wsvent.yaml").unwrap();
/// println!("{}", config.endpoint());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `WSVENT` prefix and env resolution on.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format is determined by the extension: `.yaml`/`.yml`, `.toml`
    /// or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<WsventConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let format = ConfigFormat::from_path(path)?;
        let content = read_file(path)?;
        let content = self.preprocess(&content);

        let mut config: WsventConfig = parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        self.finish(&mut config)?;

        info!("Configuration loaded successfully");
        debug!(
            device = %config.device.name,
            endpoint = %config.endpoint(),
            poll_interval = %humantime::format_duration(config.device.poll_interval),
            "Loaded device configuration"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<WsventConfig> {
        let content = self.preprocess(content);
        let mut config: WsventConfig = parse_str(&content, format)?;
        self.finish(&mut config)?;
        Ok(config)
    }

    fn preprocess(&self, content: &str) -> String {
        if self.resolve_env_vars {
            resolve_env_placeholders(content, |name| env::var(name).ok())
        } else {
            content.to_string()
        }
    }

    fn finish(&self, config: &mut WsventConfig) -> ConfigResult<()> {
        if self.resolve_env_vars {
            self.apply_overrides(config, |name| env::var(name).ok())?;
        }
        config.validate()
    }

    /// Applies `<PREFIX>_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&self, config: &mut WsventConfig, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{}_{}", self.env_prefix, suffix);
            lookup(&name).map(|value| (name, value))
        };

        if let Some((name, value)) = var("HOST") {
            match &mut config.connection.transport {
                TransportConfig::Tcp(tcp) => tcp.host = value,
                TransportConfig::Rtu(_) => warn!("{} ignored: transport is rtu", name),
            }
        }
        if let Some((name, value)) = var("PORT") {
            let port = parse_var::<u16>(&name, &value, "expected valid port number")?;
            match &mut config.connection.transport {
                TransportConfig::Tcp(tcp) => tcp.port = port,
                TransportConfig::Rtu(_) => warn!("{} ignored: transport is rtu", name),
            }
        }
        if let Some((name, value)) = var("SERIAL_PORT") {
            match &mut config.connection.transport {
                TransportConfig::Rtu(rtu) => rtu.port = value,
                TransportConfig::Tcp(_) => warn!("{} ignored: transport is tcp", name),
            }
        }
        if let Some((name, value)) = var("BAUD_RATE") {
            let baud_rate = parse_var::<u32>(&name, &value, "expected baud rate")?;
            match &mut config.connection.transport {
                TransportConfig::Rtu(rtu) => rtu.baud_rate = baud_rate,
                TransportConfig::Tcp(_) => warn!("{} ignored: transport is tcp", name),
            }
        }
        if let Some((name, value)) = var("UNIT_ID") {
            let unit_id = parse_var::<u8>(&name, &value, "expected unit id 1-247")?;
            match &mut config.connection.transport {
                TransportConfig::Tcp(tcp) => tcp.unit_id = unit_id,
                TransportConfig::Rtu(rtu) => rtu.unit_id = unit_id,
            }
        }
        if let Some((name, value)) = var("POLL_INTERVAL") {
            config.device.poll_interval = humantime::parse_duration(value.trim())
                .map_err(|e| ConfigError::invalid_env_var(&name, e.to_string()))?;
        }
        if let Some((name, value)) = var("LOG_LEVEL") {
            config.logging.level = LogLevel::parse(&value)
                .ok_or_else(|| ConfigError::invalid_env_var(&name, "expected trace|debug|info|warn|error"))?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn read_file(path: &Path) -> ConfigResult<String> {
    if !path.exists() {
        return Err(ConfigError::file_not_found(path));
    }
    fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
}

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => {
            let source = config::Config::builder()
                .add_source(config::File::from_str(content, config::FileFormat::Yaml))
                .build()
                .map_err(|e| ConfigError::serialization(e.to_string()))?;
            source
                .try_deserialize()
                .map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str, expected: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_env_var(name, expected))
}

/// Replaces `${VAR}` and `${VAR:default}` placeholders.
///
/// Unset variables without a default are left in place.
pub fn resolve_env_placeholders<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let inner = &after[..end];
        let (name, default) = match inner.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (inner, None),
        };

        match (lookup(name), default) {
            (Some(value), _) => result.push_str(&value),
            (None, Some(default)) => result.push_str(default),
            (None, None) => {
                warn!("Environment variable '{}' not found", name);
                result.push_str(&rest[start..start + end + 3]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<WsventConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<WsventConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================
