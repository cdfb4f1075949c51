use bus_scripting::scripting::{Script, ScriptDefinition, ScriptFilter, ScriptHost, ScriptTransformer};
use bus_scripting::{Request, RequestFilter, RequestTransformer, ScriptError, SourceKind};
use serde_json::json;

/// The slice of dispatch the bus performs with a subscription's filter.
fn deliverable<'a, F: RequestFilter>(
    filter: &F,
    requests: &'a [Request],
) -> Result<Vec<&'a Request>, F::Error> {
    let mut out = Vec::new();
    for request in requests {
        if filter.include(request)? {
            out.push(request);
        }
    }
    Ok(out)
}

fn pipeline<T: RequestTransformer>(stages: &[T], request: Request) -> Result<Request, T::Error> {
    stages.iter().try_fold(request, |req, stage| stage.transform(req))
}

#[test]
fn test_filter_through_capability_trait() {
    let host = ScriptHost::default();
    let filter = ScriptFilter::new(&host, "rhai", r#"request.headers.tenant == "acme""#);

    let requests = vec![
        Request::new("orders", json!({})).with_header("tenant", "acme"),
        Request::new("orders", json!({})).with_header("tenant", "globex"),
        Request::new("orders", json!({})).with_header("tenant", "acme"),
    ];

    let admitted = deliverable(&filter, &requests).unwrap();
    assert_eq!(admitted.len(), 2);
    assert!(admitted.iter().all(|r| r.headers["tenant"] == "acme"));
}

#[test]
fn test_filter_failure_stops_dispatch() {
    let host = ScriptHost::default();
    let filter = ScriptFilter::new(&host, "rhai", "request.body.count.abs() > 0");

    let requests = vec![
        Request::new("orders", json!({ "count": 1 })),
        Request::new("orders", json!({ "count": "many" })),
    ];

    assert!(deliverable(&filter, &requests).is_err());
}

#[test]
fn test_statements_filter() {
    let host = ScriptHost::default();
    let filter = ScriptFilter::with_kind(
        &host,
        "rhai",
        r#"
            let allowed = ["orders", "refunds"];
            let Execute = || allowed.contains(request.topic);
        "#,
        SourceKind::Statements,
    );

    assert!(filter.include(&Request::new("refunds", json!(null))).unwrap());
    assert!(!filter.include(&Request::new("audit", json!(null))).unwrap());
}

#[test]
fn test_filter_non_bool_is_result_type_error() {
    let host = ScriptHost::default();
    let filter = ScriptFilter::new(&host, "rhai", r#""yes""#);
    let result = filter.include(&Request::new("orders", json!(null)));
    assert!(matches!(
        result,
        Err(ScriptError::ResultType { ref expected, ref found }) if expected == "bool" && found == "string"
    ));
}

#[test]
fn test_transform_pipeline() {
    let host = ScriptHost::default();
    let stages = vec![
        ScriptTransformer::with_kind(
            &host,
            "rhai",
            "let Execute = || { request.body.total *= 2; request };",
            SourceKind::Statements,
        ),
        ScriptTransformer::with_kind(
            &host,
            "rhai",
            r#"let Execute = || { request.headers.doubled = "true"; request };"#,
            SourceKind::Statements,
        ),
    ];

    let input = Request::new("orders", json!({ "total": 21 }));
    let output = pipeline(&stages, input.clone()).unwrap();

    assert_eq!(output.id, input.id);
    assert_eq!(output.body, json!({ "total": 42 }));
    assert_eq!(output.headers["doubled"], "true");
}

#[test]
fn test_transform_can_replace_request() {
    let host = ScriptHost::default();
    let transformer = ScriptTransformer::new(
        &host,
        "rhai",
        r#"#{ id: request.id, topic: "dead-letter", created_at: request.created_at, body: request.topic }"#,
    );

    let input = Request::new("orders", json!({ "total": 1 })).with_header("tenant", "acme");
    let output = transformer.transform(input.clone()).unwrap();

    assert_eq!(output.topic, "dead-letter");
    assert_eq!(output.body, json!("orders"));
    assert!(output.headers.is_empty());
    assert_eq!(output.created_at, input.created_at);
}

#[test]
fn test_transform_result_missing_fields() {
    let host = ScriptHost::default();
    let transformer = ScriptTransformer::new(&host, "rhai", r#"#{ topic: "x" }"#);
    let result = transformer.transform(Request::new("orders", json!(null)));
    assert!(matches!(result, Err(ScriptError::ResultType { .. })));
}

#[test]
fn test_adapter_from_definition() {
    let host = ScriptHost::default();
    let definition = ScriptDefinition::from_json(
        r#"{ "language_id": "rhai", "code": "request.topic.starts_with(\"ord\")" }"#,
    )
    .unwrap();
    let filter = ScriptFilter::from_definition(&host, definition);
    assert!(filter.include(&Request::new("orders", json!(null))).unwrap());
}

#[test]
fn test_adapter_wraps_script() {
    let host = ScriptHost::default();
    let script = Script::new(&host, "rhai", "true", SourceKind::Expression);
    let filter = ScriptFilter::from_script(script);
    assert_eq!(filter.script().code(), "true");
    assert!(!filter.script().is_compiled());
    filter.include(&Request::new("orders", json!(null))).unwrap();
    assert!(filter.script().is_compiled());
}

#[test]
fn test_unknown_language_surfaces_from_include() {
    let host = ScriptHost::default();
    let filter = ScriptFilter::new(&host, "python", "True");
    let result = filter.include(&Request::new("orders", json!(null)));
    assert!(matches!(result, Err(ScriptError::UnknownLanguage(ref l)) if l == "python"));
}
