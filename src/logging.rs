//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence; otherwise the configured `log_level` applies
//! to this crate and `warn` to everything else.

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::ScriptingConfig;

/// Install the global fmt subscriber described by `config`.
///
/// Returns `Ok(false)` if a subscriber was already installed, which happens
/// when the library is embedded in a host that set up tracing itself.
pub fn init_from_config(config: &ScriptingConfig) -> Result<bool, ParseError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "warn,bus_scripting={level},script_runner={level}",
            level = config.application.log_level
        ))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.application.json_logs {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    Ok(installed)
}
