//! Tracing subscriber setup.
//!
//! Logs go to stderr so command output on stdout stays machine readable.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The configured level is not a valid filter directive
    #[error("Invalid log filter '{directive}': {message}")]
    Filter { directive: String, message: String },
    /// Another global subscriber is already installed
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(String),
}

/// Install the global fmt subscriber. `RUST_LOG` overrides `level`.
///
/// Subsequent calls are no-ops.
pub fn init(level: &str) -> Result<(), LoggingError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|err| LoggingError::Filter {
            directive: level.to_string(),
            message: err.to_string(),
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| LoggingError::SetGlobal(err.to_string()))?;

    let _ = INITIALIZED.set(());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_noop() {
        init("debug").unwrap();
        init("info").unwrap();
    }
}
