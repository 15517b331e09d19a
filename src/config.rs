//! Dispatcher configuration
//!
//! Loaded from YAML or from environment variables:
//!
//! ```yaml
//! scheme: https
//! host: api.example.com
//! port: 443
//! execution:
//!   max_concurrent: 8
//!   stack_size: 0x40000
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `BRRTD_SCHEME` | `scheme` |
//! | `BRRTD_HOST` | `host` |
//! | `BRRTD_PORT` | `port` |
//! | `BRRTD_EXEC_WORKERS` | `execution.max_concurrent` |
//! | `BRRTD_STACK_SIZE` | `execution.stack_size` |

use crate::queue::{parse_stack_size, ExecutionConfig, DEFAULT_STACK_SIZE};
use crate::request::Addressing;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::env;
use std::path::Path;

/// Default addressing plus execution queue sizing
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(deserialize_with = "deserialize_execution")]
    pub execution: ExecutionConfig,
}

impl DispatcherConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse dispatcher config")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let port = match env::var("BRRTD_PORT") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u16>()
                    .with_context(|| format!("BRRTD_PORT is not a valid port: {raw}"))?,
            ),
            Err(_) => None,
        };
        Ok(Self {
            scheme: non_empty_var("BRRTD_SCHEME"),
            host: non_empty_var("BRRTD_HOST"),
            port,
            execution: ExecutionConfig::from_env(),
        })
    }

    /// The addressing merged into requests that carry none of their own
    pub fn defaults(&self) -> Addressing {
        Addressing {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// `execution` with `stack_size` given either as an integer or a `0x` hex string
fn deserialize_execution<'de, D>(deserializer: D) -> Result<ExecutionConfig, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StackSize {
        Bytes(usize),
        Text(String),
    }

    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct Raw {
        max_concurrent: Option<usize>,
        stack_size: Option<StackSize>,
    }

    let raw = Raw::deserialize(deserializer)?;
    let defaults = ExecutionConfig::default();
    let stack_size = match raw.stack_size {
        None => DEFAULT_STACK_SIZE,
        Some(StackSize::Bytes(n)) => n,
        Some(StackSize::Text(s)) => parse_stack_size(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid stack_size '{s}'"))
        })?,
    };
    Ok(ExecutionConfig {
        max_concurrent: raw
            .max_concurrent
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_concurrent),
        stack_size,
    })
}
