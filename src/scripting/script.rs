//! Compile-once, execute-many units of user-supplied logic.
//!
//! A [`Script`] pairs source text with the language it is written in and the
//! [`SourceKind`] that says how to run it. Compilation is deferred until the
//! script is first checked or executed and then happens exactly once per
//! instance, even when many bus workers hit a fresh script at the same time.
//! Every execution gets its own scope; nothing a script binds survives the
//! call.
//!
//! # Persisted Form
//!
//! Scripts are stored and transmitted as a [`ScriptDefinition`]:
//!
//! ```json
//! { "language_id": "rhai", "code": "request.topic == \"orders\"", "source_kind": "Expression" }
//! ```
//!
//! `source_kind` may be omitted and defaults to `Expression`. The compiled
//! form is never persisted; it is rebuilt on first use.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::engine::ScriptHost;
use super::script_engine::{Binding, CompiledHandle, ScriptValue, SourceKind};
use crate::error::{ScriptError, ScriptResult};

/// Name of the binding a statements script must define.
pub const ENTRY_POINT: &str = "Execute";

/// Serializable description of a script: everything except the compiled form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDefinition")]
pub struct ScriptDefinition {
    /// Identifier of the engine that runs the code
    pub language_id: String,
    /// Source text
    pub code: String,
    /// How the code is compiled
    pub source_kind: SourceKind,
}

/// Wire shape of a definition before the source kind is validated.
#[derive(Deserialize)]
struct RawDefinition {
    language_id: String,
    code: String,
    #[serde(default)]
    source_kind: Option<String>,
}

impl TryFrom<RawDefinition> for ScriptDefinition {
    type Error = ScriptError;

    fn try_from(raw: RawDefinition) -> Result<Self, Self::Error> {
        let source_kind = match raw.source_kind {
            Some(name) => name.parse()?,
            None => SourceKind::default(),
        };
        Ok(Self {
            language_id: raw.language_id,
            code: raw.code,
            source_kind,
        })
    }
}

impl ScriptDefinition {
    /// Create a definition from its parts.
    pub fn new(
        language_id: impl Into<String>,
        code: impl Into<String>,
        source_kind: SourceKind,
    ) -> Self {
        Self {
            language_id: language_id.into(),
            code: code.into(),
            source_kind,
        }
    }

    /// Parse a definition from JSON.
    ///
    /// # Errors
    ///
    /// * `ScriptError::InvalidSourceKind` - `source_kind` names no known kind
    /// * `ScriptError::Definition` - any other malformed input
    pub fn from_json(json: &str) -> ScriptResult<Self> {
        let raw: RawDefinition = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Serialize to JSON, with the source kind by name.
    pub fn to_json(&self) -> ScriptResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A unit of user-supplied logic in some hosted scripting language.
pub struct Script {
    host: ScriptHost,
    definition: ScriptDefinition,
    compiled: OnceCell<CompiledHandle>,
}

impl Script {
    /// Create an uncompiled script. The language is not resolved until the
    /// script is checked or executed.
    pub fn new(
        host: &ScriptHost,
        language_id: impl Into<String>,
        code: impl Into<String>,
        source_kind: SourceKind,
    ) -> Self {
        Self::from_definition(
            host,
            ScriptDefinition::new(language_id, code, source_kind),
        )
    }

    /// Create an uncompiled script from its persisted form.
    pub fn from_definition(host: &ScriptHost, definition: ScriptDefinition) -> Self {
        Self {
            host: host.clone(),
            definition,
            compiled: OnceCell::new(),
        }
    }

    /// Identifier of the engine that runs this script.
    pub fn language_id(&self) -> &str {
        &self.definition.language_id
    }

    /// Source text.
    pub fn code(&self) -> &str {
        &self.definition.code
    }

    /// How the code is compiled.
    pub fn source_kind(&self) -> SourceKind {
        self.definition.source_kind
    }

    /// The persisted form of this script.
    pub fn definition(&self) -> &ScriptDefinition {
        &self.definition
    }

    /// Whether a successful compilation is cached.
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Compile now, without executing, so malformed source fails fast.
    ///
    /// # Errors
    ///
    /// * `ScriptError::UnknownLanguage` - no engine for the language
    /// * `ScriptError::Compile` - malformed source
    pub fn check(&self) -> ScriptResult<()> {
        self.compiled().map(|_| ())
    }

    /// Execute with no bindings.
    pub fn execute(&self) -> ScriptResult<ScriptValue> {
        self.execute_with_variables(HashMap::<String, ScriptValue>::new())
    }

    /// Execute against a fresh scope holding `bindings`.
    ///
    /// Expression scripts return their value. Statements scripts are run and
    /// then their `Execute` binding is invoked with no arguments; its return
    /// value is the result.
    ///
    /// # Errors
    ///
    /// * `ScriptError::UnknownLanguage` / `ScriptError::Compile` - on first use
    /// * `ScriptError::MissingEntryPoint` - statements did not bind `Execute`
    /// * `ScriptError::ResultType` - `Execute` is bound but not callable
    /// * `ScriptError::Execution` - the script faulted
    pub fn execute_with_variables<I, K>(&self, bindings: I) -> ScriptResult<ScriptValue>
    where
        I: IntoIterator<Item = (K, ScriptValue)>,
        K: AsRef<str>,
    {
        let compiled = self.compiled()?;
        let mut scope = compiled.create_scope();
        for (name, value) in bindings {
            scope.bind(name.as_ref(), value)?;
        }

        trace!(
            language = %self.definition.language_id,
            kind = %self.definition.source_kind,
            "Executing script"
        );

        match self.definition.source_kind {
            SourceKind::Expression => scope.evaluate(),
            SourceKind::Statements => {
                scope.execute()?;
                let entry_point = scope.lookup(ENTRY_POINT);
                match entry_point {
                    None => Err(ScriptError::MissingEntryPoint {
                        name: ENTRY_POINT.to_string(),
                    }),
                    Some(Binding::Value { type_name }) => {
                        Err(ScriptError::result_type("a callable", type_name))
                    }
                    Some(Binding::Invocable(entry)) => entry.invoke(),
                }
            }
        }
    }

    /// The compiled unit, compiling on first call.
    ///
    /// `OnceCell` gives the double-checked behaviour: a lock-free read once
    /// set, otherwise one thread compiles while the others wait for its
    /// result. A failed compile leaves the cell empty.
    fn compiled(&self) -> ScriptResult<&CompiledHandle> {
        self.compiled.get_or_try_init(|| -> ScriptResult<CompiledHandle> {
            let def = &self.definition;
            let engine = self.host.engine_for(&def.language_id)?;
            let started = Instant::now();
            let unit = engine.compile(&def.code, def.source_kind)?;
            debug!(
                language = %def.language_id,
                backend = engine.backend_name(),
                kind = %def.source_kind,
                elapsed_us = started.elapsed().as_micros() as u64,
                "Compiled script"
            );
            Ok(unit)
        })
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("language_id", &self.definition.language_id)
            .field("source_kind", &self.definition.source_kind)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}
