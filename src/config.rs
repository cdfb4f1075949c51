//! Configuration for script filters and transformers using Figment
//!
//! Configuration is loaded from (in order of precedence):
//! 1. Environment variables prefixed with `BUS_SCRIPTING_` (`__` separates
//!    nested keys)
//! 2. TOML configuration file (default: `config/scripting.toml`)
//!
//! # Example File
//!
//! ```toml
//! [application]
//! name = "orders-bus"
//! log_level = "debug"
//!
//! [scripting]
//! validate_on_load = true
//!
//! [[filters]]
//! name = "large-orders"
//! language_id = "rhai"
//! code = "request.body.total > 100"
//!
//! [[transformers]]
//! name = "tag-route"
//! language_id = "rhai"
//! source_kind = "Statements"
//! code = '''
//! let Execute = || { request.headers.route = "large"; request };
//! '''
//! ```
//!
//! # Environment Variables
//!
//! ```text
//! BUS_SCRIPTING_APPLICATION__LOG_LEVEL=trace
//! BUS_SCRIPTING_SCRIPTING__VALIDATE_ON_LOAD=false
//! ```

use std::collections::HashSet;
use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::ScriptResult;
use crate::scripting::{ScriptDefinition, ScriptFilter, ScriptHost, ScriptTransformer};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/scripting.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "BUS_SCRIPTING_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptingConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Script loading behaviour
    #[serde(default)]
    pub scripting: ScriptSettings,
    /// Named filter scripts
    #[serde(default)]
    pub filters: Vec<NamedScript>,
    /// Named transformer scripts
    #[serde(default)]
    pub transformers: Vec<NamedScript>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// How configured scripts are turned into filters and transformers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSettings {
    /// Compile every script while building adapters instead of on first use
    #[serde(default = "default_validate_on_load")]
    pub validate_on_load: bool,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            validate_on_load: default_validate_on_load(),
        }
    }
}

/// A script definition with the name it is referenced by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedScript {
    /// Unique name within its list
    pub name: String,
    /// Disabled scripts are skipped when building adapters
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Language, code and source kind
    #[serde(flatten)]
    pub definition: ScriptDefinition,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_name() -> String {
    "bus-scripting".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_validate_on_load() -> bool {
    true
}

fn default_enabled() -> bool {
    true
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl ScriptingConfig {
    /// Load configuration from the default file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file cannot be loaded or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file (relative or absolute)
    ///
    /// # Errors
    ///
    /// A missing file is a `ConfigError::ValidationError`, not an empty config.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::ValidationError(format!(
                "Configuration file '{}' not found",
                path.display()
            )));
        }

        let config: Self = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::LoadError)?;

        config.validate()?;
        info!(
            path = %path.display(),
            filters = config.filters.len(),
            transformers = config.transformers.len(),
            "Loaded scripting configuration"
        );
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Script names are non-empty and unique within each list
    /// - Script code is non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        validate_scripts("filter", &self.filters)?;
        validate_scripts("transformer", &self.transformers)?;
        Ok(())
    }

    /// Find a filter script by name.
    pub fn filter(&self, name: &str) -> Option<&NamedScript> {
        self.filters.iter().find(|s| s.name == name)
    }

    /// Find a transformer script by name.
    pub fn transformer(&self, name: &str) -> Option<&NamedScript> {
        self.transformers.iter().find(|s| s.name == name)
    }

    /// Build a filter for every enabled filter script, in file order.
    ///
    /// With `validate_on_load` set, each script is compiled here and the first
    /// failure is returned.
    pub fn build_filters(&self, host: &ScriptHost) -> ScriptResult<Vec<(String, ScriptFilter)>> {
        self.filters
            .iter()
            .filter(|s| s.enabled)
            .map(|s| {
                let filter = ScriptFilter::from_definition(host, s.definition.clone());
                if self.scripting.validate_on_load {
                    filter.script().check()?;
                }
                Ok((s.name.clone(), filter))
            })
            .collect()
    }

    /// Build a transformer for every enabled transformer script, in file order.
    pub fn build_transformers(
        &self,
        host: &ScriptHost,
    ) -> ScriptResult<Vec<(String, ScriptTransformer)>> {
        self.transformers
            .iter()
            .filter(|s| s.enabled)
            .map(|s| {
                let transformer = ScriptTransformer::from_definition(host, s.definition.clone());
                if self.scripting.validate_on_load {
                    transformer.script().check()?;
                }
                Ok((s.name.clone(), transformer))
            })
            .collect()
    }
}

fn validate_scripts(kind: &str, scripts: &[NamedScript]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for script in scripts {
        if script.name.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "A {} script has an empty name",
                kind
            )));
        }
        if !names.insert(&script.name) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate {} name: '{}'",
                kind, script.name
            )));
        }
        if script.definition.code.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} '{}': 'code' cannot be empty",
                kind, script.name
            )));
        }
    }
    Ok(())
}
