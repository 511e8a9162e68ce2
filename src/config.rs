//! Runtime configuration, read from a TOML file.
//!
//! Every key is optional:
//!
//! ```toml
//! [runtime]
//! mailbox_capacity = 100
//! handle_signals = true
//!
//! [batch]
//! flush_interval_ms = 1000
//! max_count = 100
//!
//! [logging]
//! spec = "info"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// The `[runtime]` table.
    pub runtime: RuntimeSection,
    /// The `[batch]` table.
    pub batch: BatchSection,
    /// The `[logging]` table.
    pub logging: LoggingSection,
}

/// Actor and registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Capacity of every actor's mailbox. Senders wait while it's full.
    pub mailbox_capacity: usize,
    /// Whether SIGINT / SIGTERM should shut the registry down.
    pub handle_signals: bool,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        RuntimeSection {
            mailbox_capacity: 100,
            handle_signals: true,
        }
    }
}

/// Default thresholds of a [Batcher](crate::batch::Batcher).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Longest time a message waits in a batch.
    pub flush_interval_ms: u64,
    /// Batch size which triggers an immediate flush.
    pub max_count: usize,
}

impl Default for BatchSection {
    fn default() -> Self {
        BatchSection {
            flush_interval_ms: 1000,
            max_count: 100,
        }
    }
}

/// Logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// A [flexi_logger] log specification, like `info` or `mailroom=debug`.
    pub spec: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            spec: "info".to_owned(),
        }
    }
}

impl RuntimeConfig {
    /// Parses and validates a configuration.
    pub fn from_toml_str(text: &str) -> Result<RuntimeConfig> {
        let config: RuntimeConfig = toml::from_str(text).context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates the configuration file at `path`.
    pub fn load(path: &Path) -> Result<RuntimeConfig> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Couldn't read configuration from {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Couldn't load configuration from {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.runtime.mailbox_capacity == 0 {
            bail!("runtime.mailbox_capacity must be at least 1");
        }
        if self.batch.max_count == 0 {
            bail!("batch.max_count must be at least 1");
        }
        Ok(())
    }
}
