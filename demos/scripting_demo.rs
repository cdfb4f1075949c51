//! Standalone demo of script filters and transformers.
//!
//! Run with: cargo run --example scripting_demo

use bus_scripting::scripting::{Script, ScriptFilter, ScriptHost, ScriptTransformer};
use bus_scripting::{Request, SourceKind};
use serde_json::json;

fn main() {
    println!("=== Script Filter Demo ===\n");

    let host = ScriptHost::default();
    let order = Request::new("orders", json!({ "total": 250 })).with_header("tenant", "acme");

    // Test 1: Simple expression
    println!("Test 1: Expression script (5 + 5)");
    match Script::new(&host, "rhai", "5 + 5", SourceKind::Expression).execute() {
        Ok(result) => println!("  ✓ Result: {}\n", result),
        Err(e) => println!("  ✗ Error: {}\n", e),
    }

    // Test 2: Fail-fast validation
    println!("Test 2: Invalid script validation");
    match Script::new(&host, "rhai", "let x = ;", SourceKind::Statements).check() {
        Ok(_) => println!("  ✗ Should have failed\n"),
        Err(e) => println!("  ✓ Correctly caught syntax error: {}\n", e),
    }

    // Test 3: Filter
    println!("Test 3: Filter (request.body.total > 100)");
    let filter = ScriptFilter::new(&host, "rhai", "request.body.total > 100");
    match filter.include(&order) {
        Ok(include) => println!("  ✓ Include: {}\n", include),
        Err(e) => println!("  ✗ Error: {}\n", e),
    }

    // Test 4: Filter returning the wrong type
    println!("Test 4: Filter returning a number");
    let filter = ScriptFilter::new(&host, "rhai", "request.body.total");
    match filter.include(&order) {
        Ok(include) => println!("  ✗ Should have failed but got: {}\n", include),
        Err(e) => println!("  ✓ Rejected: {}\n", e),
    }

    // Test 5: Statements transformer with an Execute entry point
    println!("Test 5: Transformer tagging the request");
    let transformer = ScriptTransformer::with_kind(
        &host,
        "rhai",
        r#"let Execute = || { request.headers.route = "large"; request };"#,
        SourceKind::Statements,
    );
    match transformer.transform(order.clone()) {
        Ok(out) => println!("  ✓ Headers: {:?}\n", out.headers),
        Err(e) => println!("  ✗ Error: {}\n", e),
    }

    // Test 6: Statements without an entry point
    println!("Test 6: Statements missing Execute");
    match Script::new(&host, "rhai", "let y = 1;", SourceKind::Statements).execute() {
        Ok(result) => println!("  ✗ Should have failed but got: {}\n", result),
        Err(e) => println!("  ✓ {}\n", e),
    }

    println!("=== Demo Complete ===");
}
