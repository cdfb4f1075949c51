use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use super::rhai_engine::RhaiEngine;
use super::script_engine::ScriptEngine;
use crate::error::{ScriptError, ScriptResult};

static CURRENT: Lazy<ScriptHost> = Lazy::new(|| {
    debug!("Creating process-wide script host");
    ScriptHost::new(ScriptRuntime::with_default_engines())
});

/// Registry of scripting engines keyed by language identifier.
///
/// Built up front and then handed to a [`ScriptHost`], which never mutates it.
#[derive(Default)]
pub struct ScriptRuntime {
    engines: HashMap<String, Arc<dyn ScriptEngine>>,
}

impl ScriptRuntime {
    /// An empty runtime with no languages registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime with the built-in engines (Rhai) registered.
    pub fn with_default_engines() -> Self {
        let mut runtime = Self::new();
        runtime.register(RhaiEngine::new());
        runtime
    }

    /// Register `engine` under every identifier it reports.
    ///
    /// Identifiers are case-insensitive. Registering a name twice replaces the
    /// earlier engine.
    pub fn register(&mut self, engine: impl ScriptEngine + 'static) -> &mut Self {
        self.register_shared(Arc::new(engine))
    }

    /// Register an engine that is already shared elsewhere.
    pub fn register_shared(&mut self, engine: Arc<dyn ScriptEngine>) -> &mut Self {
        for id in engine.language_ids() {
            let key = id.to_ascii_lowercase();
            if self.engines.insert(key, Arc::clone(&engine)).is_some() {
                warn!(
                    language = %id,
                    backend = engine.backend_name(),
                    "Replacing previously registered script engine"
                );
            }
        }
        self
    }
}

/// Holder of the scripting runtime shared by every [`Script`](super::Script).
///
/// Cloning is cheap; clones share the same runtime.
#[derive(Clone)]
pub struct ScriptHost {
    runtime: Arc<ScriptRuntime>,
}

impl ScriptHost {
    /// Host over an explicitly configured runtime.
    pub fn new(runtime: ScriptRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }

    /// The process-wide host, created on first call with the default engines.
    ///
    /// Prefer passing an explicitly built host where one is available; this
    /// exists for call sites that have no way to receive one.
    pub fn current() -> &'static ScriptHost {
        &CURRENT
    }

    /// Resolve the engine registered for `language_id`.
    ///
    /// # Errors
    ///
    /// * `ScriptError::UnknownLanguage` - nothing registered under that name
    pub fn engine_for(&self, language_id: &str) -> ScriptResult<Arc<dyn ScriptEngine>> {
        self.runtime
            .engines
            .get(&language_id.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ScriptError::UnknownLanguage(language_id.to_string()))
    }

    /// Registered language identifiers, sorted.
    pub fn languages(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.runtime.engines.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new(ScriptRuntime::with_default_engines())
    }
}

impl std::fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHost")
            .field("languages", &self.languages())
            .finish()
    }
}
