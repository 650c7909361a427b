//! Tracing subscriber setup.

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The fallback directive is not a valid filter.
    #[error("invalid log directive {directive:?}: {source}")]
    InvalidDirective {
        /// Directive that failed to parse.
        directive: String,
        /// Parser error.
        #[source]
        source: ParseError,
    },

    /// A global subscriber is already installed.
    #[error("tracing subscriber already initialised: {0}")]
    AlreadyInitialised(String),
}

/// Installs a stderr `fmt` subscriber.
///
/// `RUST_LOG` takes precedence; `default_directive` (for example
/// `"task_audit=info"`) applies when it is unset or invalid.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] when `default_directive` does
/// not parse and [`TelemetryError::AlreadyInitialised`] on a second call.
pub fn init_tracing(default_directive: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|source| TelemetryError::InvalidDirective {
            directive: default_directive.to_owned(),
            source,
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| TelemetryError::AlreadyInitialised(err.to_string()))
}
