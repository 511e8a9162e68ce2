//! Logger bootstrap.

use anyhow::{Context, Result};
use flexi_logger::{Logger, LoggerHandle};

/// Starts logging to stderr with the given specification, which `RUST_LOG`
/// overrides when set. Panics, including the ones in actor tasks, are logged
/// too.
///
/// The returned handle must be kept alive for as long as logging is needed.
pub fn init(spec: &str) -> Result<LoggerHandle> {
    let handle = Logger::try_with_env_or_str(spec)
        .with_context(|| format!("Invalid log specification {:?}", spec))?
        .format(flexi_logger::detailed_format)
        .start()
        .context("Couldn't start the logger")?;
    log_panics::init();
    Ok(handle)
}
