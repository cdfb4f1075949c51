//! Runtime-loaded script filters and transformers for a message bus.
//!
//! This library lets an operator attach routing and rewriting logic to bus
//! subscriptions as source text, compiled lazily by an embedded scripting
//! engine. It implements the bus's filter and transform capabilities and
//! nothing else: transport, retries and delivery persistence belong to the
//! bus.
//!
//! - [`scripting`]: scripts, the engine runtime and the bus adapters
//! - [`bus`]: the request envelope and capability traits
//! - [`config`]: Figment-based loading of named scripts
//! - [`logging`]: tracing subscriber setup

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;
pub mod scripting;

pub use bus::{Request, RequestFilter, RequestTransformer};
pub use error::{ScriptError, ScriptResult};
pub use scripting::{Script, ScriptFilter, ScriptHost, ScriptTransformer, SourceKind};
