//! Runtime contract for pluggable scripting backends
//!
//! This module defines the traits a scripting language must implement to be
//! hosted by the bus. The design splits a backend into the three things the
//! host needs from it:
//!
//! 1. **[`ScriptEngine`]** - compiles source text of a declared [`SourceKind`]
//!    into an opaque [`CompiledUnit`]
//! 2. **[`CompiledUnit`]** - an immutable, shareable compilation result that
//!    creates a fresh [`ExecutionScope`] per call
//! 3. **[`ExecutionScope`]** - name/value bindings visible to exactly one call,
//!    plus evaluation, execution and entry-point lookup
//!
//! # Values
//!
//! Values cross the host/script boundary as [`ScriptValue`] (a JSON value).
//! Each backend converts to and from its native representation, which keeps
//! the bus adapters independent of the language a script is written in.
//!
//! # Thread Safety
//!
//! Engines and compiled units must be `Send + Sync`: one compiled unit is
//! executed concurrently from several bus worker threads, each call against
//! its own scope. Scopes themselves never leave the calling thread.
//!
//! # Implementation Guide
//!
//! To host a new language:
//!
//! 1. Implement [`ScriptEngine::compile`] for both source kinds
//! 2. Have the compiled unit create an empty scope per call
//! 3. Convert [`ScriptValue`]s in [`ExecutionScope::bind`] and back on results
//! 4. Report the entry point through [`ExecutionScope::lookup`]
//!
//! See `RhaiEngine` for a reference implementation.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ScriptError, ScriptResult};

/// Engine-neutral value passed into and returned from scripts.
pub type ScriptValue = serde_json::Value;

/// Shared handle to a compiled script.
pub type CompiledHandle = Arc<dyn CompiledUnit>;

// =============================================================================
// SourceKind
// =============================================================================

/// How a script's source text is to be compiled and run.
///
/// Serialized by name (`"Expression"` / `"Statements"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceKind {
    /// A single expression whose value is the script's result.
    #[default]
    Expression,
    /// A block of statements that must bind an `Execute` entry point.
    Statements,
}

impl SourceKind {
    /// Name used when persisting the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Expression => "Expression",
            SourceKind::Statements => "Statements",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Expression" => Ok(SourceKind::Expression),
            "Statements" => Ok(SourceKind::Statements),
            other => Err(ScriptError::InvalidSourceKind(other.to_string())),
        }
    }
}

impl TryFrom<String> for SourceKind {
    type Error = ScriptError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.as_str().to_string()
    }
}

// =============================================================================
// Runtime traits
// =============================================================================

/// A scripting language backend.
pub trait ScriptEngine: Send + Sync {
    /// Identifiers this engine is registered under (language names, file
    /// extensions). The first one is the canonical name.
    fn language_ids(&self) -> &[&str];

    /// Compile `code` as the given kind of source.
    ///
    /// Compilation must be deterministic: the same inputs produce an
    /// equivalent unit or the same error.
    ///
    /// # Errors
    ///
    /// * `ScriptError::Compile` - malformed source
    fn compile(&self, code: &str, kind: SourceKind) -> ScriptResult<CompiledHandle>;

    /// Canonical name, used in logs and error messages.
    fn backend_name(&self) -> &str {
        self.language_ids().first().copied().unwrap_or("unknown")
    }
}

/// An immutable compilation result.
pub trait CompiledUnit: Send + Sync {
    /// The kind of source this unit was compiled from.
    fn source_kind(&self) -> SourceKind;

    /// Create an empty scope for one call. Nothing bound in one scope is
    /// visible in another.
    fn create_scope(&self) -> Box<dyn ExecutionScope + '_>;
}

/// Name/value bindings for exactly one execution.
pub trait ExecutionScope {
    /// Bind `value` under `name`, replacing any previous binding.
    fn bind(&mut self, name: &str, value: ScriptValue) -> ScriptResult<()>;

    /// Evaluate an expression unit against this scope.
    fn evaluate(&mut self) -> ScriptResult<ScriptValue>;

    /// Run a statements unit against this scope. Statements may add bindings.
    fn execute(&mut self) -> ScriptResult<()>;

    /// Resolve a binding by name.
    fn lookup(&self, name: &str) -> Option<Binding<'_>>;
}

/// Result of resolving a name in an [`ExecutionScope`].
pub enum Binding<'a> {
    /// The name is bound to something callable with zero arguments.
    Invocable(Box<dyn Invocable + 'a>),
    /// The name is bound to a plain value of the given type.
    Value {
        /// Engine-specific type name of the value
        type_name: String,
    },
}

impl fmt::Debug for Binding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Invocable(_) => f.write_str("Binding::Invocable"),
            Binding::Value { type_name } => write!(f, "Binding::Value({})", type_name),
        }
    }
}

/// A zero-argument callable found in a scope.
pub trait Invocable {
    /// Call it and convert the result to a [`ScriptValue`].
    fn invoke(&self) -> ScriptResult<ScriptValue>;
}

/// Human-readable JSON type name for error messages.
pub(crate) fn value_type_name(value: &ScriptValue) -> &'static str {
    match value {
        ScriptValue::Null => "null",
        ScriptValue::Bool(_) => "bool",
        ScriptValue::Number(_) => "number",
        ScriptValue::String(_) => "string",
        ScriptValue::Array(_) => "array",
        ScriptValue::Object(_) => "object",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parse() {
        assert_eq!(
            "Expression".parse::<SourceKind>().unwrap(),
            SourceKind::Expression
        );
        assert_eq!(
            "Statements".parse::<SourceKind>().unwrap(),
            SourceKind::Statements
        );
    }

    #[test]
    fn test_source_kind_parse_is_exact() {
        let result = "statements".parse::<SourceKind>();
        assert!(matches!(result, Err(ScriptError::InvalidSourceKind(s)) if s == "statements"));
    }

    #[test]
    fn test_source_kind_default() {
        assert_eq!(SourceKind::default(), SourceKind::Expression);
    }

    #[test]
    fn test_source_kind_serializes_by_name() {
        let json = serde_json::to_string(&SourceKind::Statements).unwrap();
        assert_eq!(json, "\"Statements\"");

        let back: SourceKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SourceKind::Statements);
    }

    #[test]
    fn test_source_kind_rejects_unknown_name() {
        let result: Result<SourceKind, _> = serde_json::from_str("\"Program\"");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Unrecognized source kind 'Program'"));
    }

    #[test]
    fn test_value_type_name() {
        assert_eq!(value_type_name(&serde_json::json!(true)), "bool");
        assert_eq!(value_type_name(&serde_json::json!({"a": 1})), "object");
        assert_eq!(value_type_name(&ScriptValue::Null), "null");
    }
}
