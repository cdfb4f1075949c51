//! Bus adapters backed by scripts.
//!
//! [`ScriptFilter`] and [`ScriptTransformer`] each own one [`Script`] and run
//! it with the request bound as `request`. The script result is cast strictly:
//! a filter must produce a boolean and a transformer must produce something
//! that converts back into a [`Request`].

use super::engine::ScriptHost;
use super::script::{Script, ScriptDefinition};
use super::script_engine::{value_type_name, ScriptValue, SourceKind};
use crate::bus::{Request, RequestFilter, RequestTransformer};
use crate::error::{ScriptError, ScriptResult};

/// Name the request is bound under in the script scope.
pub const REQUEST_VARIABLE: &str = "request";

fn execute_for(script: &Script, request: &Request) -> ScriptResult<ScriptValue> {
    let value = serde_json::to_value(request)
        .map_err(|e| ScriptError::result_type("a serializable request", e.to_string()))?;
    script.execute_with_variables([(REQUEST_VARIABLE, value)])
}

// =============================================================================
// ScriptFilter
// =============================================================================

/// Filter whose decision is made by a script.
///
/// # Example
///
/// ```rust,ignore
/// let filter = ScriptFilter::new(&host, "rhai", r#"request.headers.tenant == "acme""#);
/// if filter.include(&request)? {
///     // deliver
/// }
/// ```
#[derive(Debug)]
pub struct ScriptFilter {
    script: Script,
}

impl ScriptFilter {
    /// Filter from an expression script.
    pub fn new(host: &ScriptHost, language_id: impl Into<String>, code: impl Into<String>) -> Self {
        Self::with_kind(host, language_id, code, SourceKind::Expression)
    }

    /// Build from source of the given kind.
    pub fn with_kind(
        host: &ScriptHost,
        language_id: impl Into<String>,
        code: impl Into<String>,
        source_kind: SourceKind,
    ) -> Self {
        Self::from_script(Script::new(host, language_id, code, source_kind))
    }

    /// Build from a persisted definition.
    pub fn from_definition(host: &ScriptHost, definition: ScriptDefinition) -> Self {
        Self::from_script(Script::from_definition(host, definition))
    }

    /// Wrap an existing script, keeping any compilation it already has.
    pub fn from_script(script: Script) -> Self {
        Self { script }
    }

    /// The underlying script.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Run the script against `request`.
    ///
    /// # Errors
    ///
    /// * `ScriptError::ResultType` - the script returned something other than a boolean
    /// * any error from [`Script::execute_with_variables`]
    pub fn include(&self, request: &Request) -> ScriptResult<bool> {
        match execute_for(&self.script, request)? {
            ScriptValue::Bool(include) => Ok(include),
            other => Err(ScriptError::result_type("bool", value_type_name(&other))),
        }
    }
}

impl RequestFilter for ScriptFilter {
    type Error = ScriptError;

    fn include(&self, request: &Request) -> Result<bool, Self::Error> {
        ScriptFilter::include(self, request)
    }
}

// =============================================================================
// ScriptTransformer
// =============================================================================

/// Transformer whose output request is produced by a script.
///
/// The script may return the bound request modified or an entirely new one.
#[derive(Debug)]
pub struct ScriptTransformer {
    script: Script,
}

impl ScriptTransformer {
    /// Transformer from an expression script.
    pub fn new(host: &ScriptHost, language_id: impl Into<String>, code: impl Into<String>) -> Self {
        Self::with_kind(host, language_id, code, SourceKind::Expression)
    }

    /// Build from source of the given kind.
    pub fn with_kind(
        host: &ScriptHost,
        language_id: impl Into<String>,
        code: impl Into<String>,
        source_kind: SourceKind,
    ) -> Self {
        Self::from_script(Script::new(host, language_id, code, source_kind))
    }

    /// Build from a persisted definition.
    pub fn from_definition(host: &ScriptHost, definition: ScriptDefinition) -> Self {
        Self::from_script(Script::from_definition(host, definition))
    }

    /// Wrap an existing script, keeping any compilation it already has.
    pub fn from_script(script: Script) -> Self {
        Self { script }
    }

    /// The underlying script.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Run the script against `request` and return the request to dispatch.
    ///
    /// # Errors
    ///
    /// * `ScriptError::ResultType` - the result does not describe a request
    /// * any error from [`Script::execute_with_variables`]
    pub fn transform(&self, request: Request) -> ScriptResult<Request> {
        let value = execute_for(&self.script, &request)?;
        let found = value_type_name(&value);
        serde_json::from_value(value).map_err(|e| {
            ScriptError::result_type("a request", format!("{} ({})", found, e))
        })
    }
}

impl RequestTransformer for ScriptTransformer {
    type Error = ScriptError;

    fn transform(&self, request: Request) -> Result<Request, Self::Error> {
        ScriptTransformer::transform(self, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders() -> Request {
        Request::new("orders", json!({"total": 250})).with_header("tenant", "acme")
    }

    #[test]
    fn test_filter_true_and_false() {
        let host = ScriptHost::default();
        let big = ScriptFilter::new(&host, "rhai", "request.body.total > 100");
        let small = ScriptFilter::new(&host, "rhai", "request.body.total < 100");
        assert!(big.include(&orders()).unwrap());
        assert!(!small.include(&orders()).unwrap());
    }

    #[test]
    fn test_filter_rejects_non_bool() {
        let host = ScriptHost::default();
        let filter = ScriptFilter::new(&host, "rhai", "request.body.total");
        match filter.include(&orders()) {
            Err(ScriptError::ResultType { expected, found }) => {
                assert_eq!(expected, "bool");
                assert_eq!(found, "number");
            }
            other => panic!("Expected ResultType error, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_error_is_not_false() {
        let host = ScriptHost::default();
        let filter = ScriptFilter::new(&host, "rhai", "request.body.total / 0 > 1");
        assert!(filter.include(&orders()).is_err());
    }

    #[test]
    fn test_transform_statements() {
        let host = ScriptHost::default();
        let transformer = ScriptTransformer::with_kind(
            &host,
            "rhai",
            r#"
                let Execute = || {
                    request.headers.routed_by = "script";
                    request.topic = "orders.audited";
                    request
                };
            "#,
            SourceKind::Statements,
        );
        let input = orders();
        let output = transformer.transform(input.clone()).unwrap();
        assert_eq!(output.id, input.id);
        assert_eq!(output.topic, "orders.audited");
        assert_eq!(output.headers.get("routed_by").map(String::as_str), Some("script"));
        assert_eq!(output.headers.get("tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_transform_identity_expression() {
        let host = ScriptHost::default();
        let transformer = ScriptTransformer::new(&host, "rhai", "request");
        let input = orders();
        assert_eq!(transformer.transform(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_transform_refuses_lossy_integer() {
        let host = ScriptHost::default();
        let transformer = ScriptTransformer::new(&host, "rhai", "request");
        let input = Request::new("orders", json!({ "account": u64::MAX }));
        let result = transformer.transform(input);
        assert!(matches!(
            result,
            Err(ScriptError::UnrepresentableValue { ref path, .. }) if path == "body.account"
        ));
    }

    #[test]
    fn test_transform_identity_keeps_large_integer() {
        let host = ScriptHost::default();
        let transformer = ScriptTransformer::new(&host, "rhai", "request");
        let input = Request::new("orders", json!({ "account": i64::MAX }));
        assert_eq!(transformer.transform(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_transform_rejects_non_request() {
        let host = ScriptHost::default();
        let transformer = ScriptTransformer::new(&host, "rhai", "42");
        let result = transformer.transform(orders());
        assert!(matches!(result, Err(ScriptError::ResultType { .. })));
    }
}
