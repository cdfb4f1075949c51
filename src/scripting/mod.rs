//! Script execution for bus filters and transformers.
//!
//! This module lets operators supply routing and rewriting logic as source
//! text loaded at runtime, in any language the host has an engine for, without
//! rebuilding the bus.
//!
//! # Architecture
//!
//! ```text
//! ScriptHost
//!     └── ScriptRuntime (language id -> ScriptEngine)
//!             └── RhaiEngine (built in)
//!
//! Script (language id, code, source kind)
//!     ├── compiled once, on first use  -> CompiledUnit
//!     └── per call                     -> ExecutionScope
//!
//! Bus adapters
//!     ├── ScriptFilter       (RequestFilter)
//!     └── ScriptTransformer  (RequestTransformer)
//! ```
//!
//! # Source Kinds
//!
//! - **Expression**: the script is a single expression; its value is the result
//! - **Statements**: the script binds a zero-argument callable named `Execute`,
//!   which the host invokes after running the statements
//!
//! # Example: Routing Filter
//!
//! ```rust,ignore
//! use bus_scripting::bus::Request;
//! use bus_scripting::scripting::{ScriptFilter, ScriptHost};
//!
//! let host = ScriptHost::default();
//! let filter = ScriptFilter::new(&host, "rhai", r#"request.topic == "orders""#);
//!
//! let request = Request::new("orders", serde_json::json!({ "total": 12 }));
//! assert!(filter.include(&request)?);
//! ```
//!
//! # Example: Statements With an Entry Point
//!
//! ```rust,ignore
//! use bus_scripting::scripting::{Script, ScriptHost, SourceKind};
//!
//! let host = ScriptHost::default();
//! let script = Script::new(&host, "rhai", "let Execute = || x + 1;", SourceKind::Statements);
//! let six = script.execute_with_variables([("x", serde_json::json!(5))])?;
//! ```

pub mod engine;
pub mod filter;
pub mod rhai_engine;
pub mod script;
pub mod script_engine;

pub use engine::{ScriptHost, ScriptRuntime};
pub use filter::{ScriptFilter, ScriptTransformer, REQUEST_VARIABLE};
pub use rhai_engine::RhaiEngine;
pub use script::{Script, ScriptDefinition, ENTRY_POINT};
pub use script_engine::{
    Binding, CompiledHandle, CompiledUnit, ExecutionScope, Invocable, ScriptEngine, ScriptValue,
    SourceKind,
};
