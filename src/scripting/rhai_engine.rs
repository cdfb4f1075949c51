//! Rhai Implementation of the Script Runtime
//!
//! This module provides `RhaiEngine`, the built-in scripting backend. Rhai is
//! a fast, embedded scripting language with Rust-like syntax and excellent
//! Rust integration.
//!
//! # Source Kinds
//!
//! - **Expression** - compiled with `Engine::compile_expression`, so statements
//!   such as `let` are rejected at compile time
//! - **Statements** - compiled with `Engine::compile`; the script must bind
//!   `Execute` to a function pointer or closure
//!
//! # Example
//!
//! ```rust,ignore
//! // Filter: deliver only order events
//! request.topic == "orders"
//!
//! // Transformer (Statements): tag the request before dispatch
//! let Execute = || {
//!     request.headers.routed_by = "script";
//!     request
//! };
//! ```
//!
//! Bindings pushed by the host are visible to closures through Rhai's
//! automatic variable capture.

use std::sync::Arc;

use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, ParseError, Scope, AST};

use super::script_engine::{
    Binding, CompiledHandle, CompiledUnit, ExecutionScope, Invocable, ScriptEngine, ScriptValue,
    SourceKind,
};
use crate::error::{ScriptError, ScriptResult};

const LANGUAGE_IDS: &[&str] = &["rhai", ".rhai"];

// =============================================================================
// RhaiEngine Implementation
// =============================================================================

/// Rhai-based implementation of [`ScriptEngine`].
///
/// # Thread Safety
///
/// Built with Rhai's `sync` feature, so `Engine` and `AST` are `Send + Sync`
/// and are shared between compiled units through an `Arc` without locking.
pub struct RhaiEngine {
    engine: Arc<Engine>,
}

impl RhaiEngine {
    /// Create a new RhaiEngine with Rhai's standard packages.
    pub fn new() -> Self {
        Self::with_engine(Engine::new())
    }

    /// Wrap a pre-configured Rhai engine, e.g. one with extra functions
    /// registered.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut engine = rhai::Engine::new();
    /// engine.register_fn("is_priority", |topic: &str| topic.starts_with("urgent."));
    /// let backend = RhaiEngine::with_engine(engine);
    /// ```
    pub fn with_engine(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

impl Default for RhaiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for RhaiEngine {
    fn language_ids(&self) -> &[&str] {
        LANGUAGE_IDS
    }

    fn compile(&self, code: &str, kind: SourceKind) -> ScriptResult<CompiledHandle> {
        let ast = match kind {
            SourceKind::Expression => self.engine.compile_expression(code),
            SourceKind::Statements => self.engine.compile(code),
        }
        .map_err(convert_parse_error)?;

        Ok(Arc::new(RhaiUnit {
            engine: Arc::clone(&self.engine),
            ast,
            kind,
        }))
    }

    fn backend_name(&self) -> &str {
        "Rhai"
    }
}

// =============================================================================
// Compiled unit and scope
// =============================================================================

struct RhaiUnit {
    engine: Arc<Engine>,
    ast: AST,
    kind: SourceKind,
}

impl CompiledUnit for RhaiUnit {
    fn source_kind(&self) -> SourceKind {
        self.kind
    }

    fn create_scope(&self) -> Box<dyn ExecutionScope + '_> {
        Box::new(RhaiScope {
            unit: self,
            scope: Scope::new(),
        })
    }
}

struct RhaiScope<'a> {
    unit: &'a RhaiUnit,
    scope: Scope<'static>,
}

impl ExecutionScope for RhaiScope<'_> {
    fn bind(&mut self, name: &str, value: ScriptValue) -> ScriptResult<()> {
        // Rhai integers are i64; larger values would silently become floats.
        if let Some((path, number)) = find_wide_integer(&value, String::new()) {
            return Err(ScriptError::UnrepresentableValue {
                name: name.to_string(),
                path,
                value: number.to_string(),
            });
        }
        let dynamic = rhai::serde::to_dynamic(value).map_err(convert_rhai_error)?;
        // `set_value` replaces an existing binding instead of shadowing it.
        self.scope.set_value(name.to_string(), dynamic);
        Ok(())
    }

    fn evaluate(&mut self) -> ScriptResult<ScriptValue> {
        let result: Dynamic = self
            .unit
            .engine
            .eval_ast_with_scope(&mut self.scope, &self.unit.ast)
            .map_err(convert_rhai_error)?;
        to_script_value(result)
    }

    fn execute(&mut self) -> ScriptResult<()> {
        self.unit
            .engine
            .run_ast_with_scope(&mut self.scope, &self.unit.ast)
            .map_err(convert_rhai_error)
    }

    fn lookup(&self, name: &str) -> Option<Binding<'_>> {
        let value = self.scope.get_value::<Dynamic>(name)?;
        let type_name = value.type_name().to_string();
        match value.try_cast::<FnPtr>() {
            Some(fn_ptr) => Some(Binding::Invocable(Box::new(RhaiEntryPoint {
                unit: self.unit,
                fn_ptr,
            }))),
            None => Some(Binding::Value { type_name }),
        }
    }
}

struct RhaiEntryPoint<'a> {
    unit: &'a RhaiUnit,
    fn_ptr: FnPtr,
}

impl Invocable for RhaiEntryPoint<'_> {
    fn invoke(&self) -> ScriptResult<ScriptValue> {
        let result: Dynamic = self
            .fn_ptr
            .call(&self.unit.engine, &self.unit.ast, ())
            .map_err(convert_rhai_error)?;
        to_script_value(result)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Convert a Rhai result into the engine-neutral value type.
fn to_script_value(value: Dynamic) -> ScriptResult<ScriptValue> {
    // Captured variables come back as shared values; unwrap them first.
    let value = value.flatten();
    rhai::serde::from_dynamic::<ScriptValue>(&value)
        .map_err(|_| ScriptError::result_type("a serializable value", value.type_name()))
}

/// Locate the first integer in `value` that does not fit in an `i64`.
fn find_wide_integer(value: &ScriptValue, path: String) -> Option<(String, u64)> {
    match value {
        ScriptValue::Number(n) if n.as_i64().is_none() => n.as_u64().map(|n| (path, n)),
        ScriptValue::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| find_wide_integer(item, format!("{}[{}]", path, i))),
        ScriptValue::Object(fields) => fields.iter().find_map(|(key, field)| {
            let child = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };
            find_wide_integer(field, child)
        }),
        _ => None,
    }
}

fn convert_parse_error(error: ParseError) -> ScriptError {
    let ParseError(kind, pos) = error;
    ScriptError::Compile {
        language: "Rhai".to_string(),
        message: kind.to_string(),
        line: pos.line(),
        column: pos.position(),
    }
}

/// Convert Rhai's EvalAltResult to our ScriptError type.
///
/// Every fault raised while running maps to `Execution`, including parse
/// errors from `eval` inside a script.
fn convert_rhai_error(error: Box<EvalAltResult>) -> ScriptError {
    match *error {
        EvalAltResult::ErrorRuntime(message, _) => ScriptError::Execution {
            language: "Rhai".to_string(),
            message: message.to_string(),
        },
        other => ScriptError::Execution {
            language: "Rhai".to_string(),
            message: other.to_string(),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run_expression(code: &str, bindings: &[(&str, ScriptValue)]) -> ScriptResult<ScriptValue> {
        let engine = RhaiEngine::new();
        let unit = engine.compile(code, SourceKind::Expression)?;
        let mut scope = unit.create_scope();
        for (name, value) in bindings {
            scope.bind(name, value.clone())?;
        }
        scope.evaluate()
    }

    #[test]
    fn test_rhai_engine_ids() {
        let engine = RhaiEngine::new();
        assert_eq!(engine.language_ids(), &["rhai", ".rhai"]);
        assert_eq!(engine.backend_name(), "Rhai");
    }

    #[test]
    fn test_evaluate_simple_expression() {
        let result = run_expression("1 + 2 + 3", &[]).unwrap();
        assert_eq!(result, json!(6));
    }

    #[test]
    fn test_evaluate_string_expression() {
        let result = run_expression(r#""Hello, " + "World!""#, &[]).unwrap();
        assert_eq!(result, json!("Hello, World!"));
    }

    #[test]
    fn test_bound_object_fields() {
        let request = json!({"topic": "orders", "headers": {"priority": "high"}});
        let result = run_expression(
            r#"request.topic == "orders" && request.headers.priority == "high""#,
            &[("request", request)],
        )
        .unwrap();
        assert_eq!(result, json!(true));
    }

    #[test]
    fn test_expression_rejects_statements() {
        let engine = RhaiEngine::new();
        let result = engine.compile("let x = 1; x", SourceKind::Expression);
        assert!(matches!(result, Err(ScriptError::Compile { .. })));
    }

    #[test]
    fn test_compile_error_has_position() {
        let engine = RhaiEngine::new();
        let result = engine.compile("let x = ;", SourceKind::Statements);
        match result {
            Err(ScriptError::Compile { message, line, .. }) => {
                assert!(!message.is_empty());
                assert_eq!(line, Some(1));
            }
            _ => panic!("Expected Compile error"),
        }
    }

    #[test]
    fn test_runtime_error_handling() {
        let engine = RhaiEngine::new();
        let unit = engine
            .compile(r#"throw "boom";"#, SourceKind::Statements)
            .unwrap();
        let result = unit.create_scope().execute();
        match result {
            Err(ScriptError::Execution { message, .. }) => assert!(message.contains("boom")),
            other => panic!("Expected Execution error, got {:?}", other),
        }
    }

    #[test]
    fn test_eval_parse_fault_is_execution_error() {
        let engine = RhaiEngine::new();
        let unit = engine
            .compile(r#"eval("1 +");"#, SourceKind::Statements)
            .unwrap();
        let result = unit.create_scope().execute();
        assert!(matches!(result, Err(ScriptError::Execution { .. })));
    }

    #[test]
    fn test_division_by_zero_is_execution_error() {
        let result = run_expression("1 / 0", &[]);
        assert!(matches!(result, Err(ScriptError::Execution { .. })));
    }

    #[test]
    fn test_statements_entry_point_closure() {
        let engine = RhaiEngine::new();
        let unit = engine
            .compile("let Execute = || x * 2;", SourceKind::Statements)
            .unwrap();
        let mut scope = unit.create_scope();
        scope.bind("x", json!(21)).unwrap();
        scope.execute().unwrap();

        let entry_point = scope.lookup("Execute");
        match entry_point {
            Some(Binding::Invocable(entry)) => assert_eq!(entry.invoke().unwrap(), json!(42)),
            other => panic!("Expected invocable binding, got {:?}", other),
        }
    }

    #[test]
    fn test_lookup_plain_value() {
        let engine = RhaiEngine::new();
        let unit = engine
            .compile("let Execute = 5;", SourceKind::Statements)
            .unwrap();
        let mut scope = unit.create_scope();
        scope.execute().unwrap();

        assert!(matches!(
            scope.lookup("Execute"),
            Some(Binding::Value { .. })
        ));
        assert!(scope.lookup("missing").is_none());
    }

    #[test]
    fn test_scopes_are_isolated() {
        let engine = RhaiEngine::new();
        let unit = engine
            .compile("let leaked = 1;", SourceKind::Statements)
            .unwrap();

        let mut first = unit.create_scope();
        first.execute().unwrap();
        assert!(first.lookup("leaked").is_some());

        let second = unit.create_scope();
        assert!(second.lookup("leaked").is_none());
    }

    #[test]
    fn test_function_pointer_result_is_type_error() {
        let engine = RhaiEngine::new();
        let unit = engine
            .compile("let Execute = || (|| 1);", SourceKind::Statements)
            .unwrap();
        let mut scope = unit.create_scope();
        scope.execute().unwrap();

        let entry_point = scope.lookup("Execute");
        match entry_point {
            Some(Binding::Invocable(entry)) => assert!(matches!(
                entry.invoke(),
                Err(ScriptError::ResultType { ref found, .. }) if found == "Fn"
            )),
            other => panic!("Expected invocable binding, got {:?}", other),
        }
    }

    #[test]
    fn test_throw_inside_entry_point_is_execution_error() {
        let engine = RhaiEngine::new();
        let unit = engine
            .compile(r#"let Execute = || { throw "late"; };"#, SourceKind::Statements)
            .unwrap();
        let mut scope = unit.create_scope();
        scope.execute().unwrap();

        let entry_point = scope.lookup("Execute");
        match entry_point {
            Some(Binding::Invocable(entry)) => match entry.invoke() {
                Err(ScriptError::Execution { message, .. }) => assert!(message.contains("late")),
                other => panic!("Expected Execution error, got {:?}", other),
            },
            other => panic!("Expected invocable binding, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_rejects_integer_beyond_i64() {
        let engine = RhaiEngine::new();
        let unit = engine.compile("request", SourceKind::Expression).unwrap();
        let mut scope = unit.create_scope();

        let result = scope.bind("request", json!({ "ids": [1, u64::MAX] }));
        match result {
            Err(ScriptError::UnrepresentableValue { name, path, .. }) => {
                assert_eq!(name, "request");
                assert_eq!(path, "ids[1]");
            }
            other => panic!("Expected UnrepresentableValue, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_keeps_i64_extremes_exact() {
        let value = json!({ "max": i64::MAX, "min": i64::MIN, "ratio": 0.5 });
        let result = run_expression("request", &[("request", value.clone())]).unwrap();
        assert_eq!(result, value);
    }
}
