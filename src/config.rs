//! Configuration module for the turnstile server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the message server
#[derive(Parser, Debug, Default)]
#[command(name = "turnstile")]
#[command(author = "turnstile authors")]
#[command(version = "0.1.0")]
#[command(about = "A multi-threaded TCP message server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Port on which clients connect
    #[arg(short, long)]
    pub port: Option<u16>,

    /// File that received messages are written to
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Number of worker threads processing client connections
    #[arg(short = 'n', long)]
    pub threads: Option<usize>,

    /// Number of continuous messages served from one client before yielding it
    #[arg(short = 'm', long)]
    pub max_msgs: Option<u32>,

    /// Seconds without data before a client is disconnected (0 = never)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Idle timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Continuous-message cap per turn
    #[serde(default = "default_max_continuous_msgs")]
    pub max_continuous_msgs: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            threads: default_threads(),
            timeout: default_timeout(),
            max_continuous_msgs: default_max_continuous_msgs(),
        }
    }
}

/// Message log output configuration
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_file")]
    pub file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_file(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    55555
}

fn default_threads() -> usize {
    5
}

fn default_timeout() -> u64 {
    180
}

fn default_max_continuous_msgs() -> u32 {
    100
}

fn default_file() -> PathBuf {
    PathBuf::from("file")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub threads: usize,
    /// Idle-receive timeout in seconds; 0 disables it
    pub timeout: u64,
    pub max_continuous_msgs: u32,
    pub file: PathBuf,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::default(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Self::merge(cli, toml_config);
        config.validate()?;
        Ok(config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            threads: cli.threads.unwrap_or(toml_config.server.threads),
            timeout: cli.timeout.unwrap_or(toml_config.server.timeout),
            max_continuous_msgs: cli
                .max_msgs
                .unwrap_or(toml_config.server.max_continuous_msgs),
            file: cli.file.unwrap_or(toml_config.output.file),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }

    /// Reject values the dispatch engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.max_continuous_msgs == 0 {
            return Err(ConfigError::ZeroMessageCap);
        }
        Ok(())
    }

    /// Receive deadline applied to every accepted connection.
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Address string the listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("number of worker threads must be at least 1")]
    NoWorkers,
    #[error("continuous message cap must be at least 1")]
    ZeroMessageCap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 55555);
        assert_eq!(config.threads, 5);
        assert_eq!(config.timeout, 180);
        assert_eq!(config.max_continuous_msgs, 100);
        assert_eq!(config.file, PathBuf::from("file"));
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 6000
            threads = 2
            timeout = 30
            max_continuous_msgs = 10

            [output]
            file = "messages.log"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.threads, 2);
        assert_eq!(config.server.timeout, 30);
        assert_eq!(config.server.max_continuous_msgs, 10);
        assert_eq!(config.output.file, PathBuf::from("messages.log"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let cli = CliArgs::parse_from(["turnstile", "-p", "7000", "-n", "3", "-m", "2"]);
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            port = 6000
            threads = 8
            timeout = 42
        "#,
        )
        .unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.port, 7000);
        assert_eq!(config.threads, 3);
        assert_eq!(config.max_continuous_msgs, 2);
        assert_eq!(config.timeout, 42);
    }

    #[test]
    fn test_cli_log_level_overrides_toml() {
        let toml_config = || -> TomlConfig {
            toml::from_str(
                r#"
                [logging]
                level = "debug"
            "#,
            )
            .unwrap()
        };

        let cli = CliArgs::parse_from(["turnstile", "--log-level", "info"]);
        assert_eq!(Config::merge(cli, toml_config()).log_level, "info");

        let cli = CliArgs::parse_from(["turnstile"]);
        assert_eq!(Config::merge(cli, toml_config()).log_level, "debug");
    }

    #[test]
    fn test_validation() {
        let config = Config {
            threads: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoWorkers)));

        let config = Config {
            max_continuous_msgs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroMessageCap)));
    }

    #[test]
    fn test_idle_timeout() {
        let config = Config::default();
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(180)));

        let config = Config {
            timeout: 0,
            ..Config::default()
        };
        assert_eq!(config.idle_timeout(), None);
    }
}
