//! Error types for script compilation and execution.
//!
//! This module defines `ScriptError`, the single error type raised by the
//! scripting subsystem. Using the `thiserror` crate, it gives every failure a
//! distinct variant so the bus dispatch layer can decide on its own whether a
//! failing filter or transformer is a permanent rejection, a retryable fault,
//! or fatal to the pipeline.
//!
//! ## Error Hierarchy
//!
//! - **`UnknownLanguage`**: No engine is registered under the requested language
//!   identifier. Detected lazily, when a script is first checked or executed.
//! - **`Compile`**: The source text could not be compiled. Carries the engine's
//!   message and, when known, the line and column of the fault.
//! - **`MissingEntryPoint`**: A statements script ran but did not bind the entry
//!   point the host invokes (`Execute`).
//! - **`ResultType`**: A value had the wrong shape: the entry point exists but is
//!   not callable, or the script's result cannot be cast to what the caller
//!   expects (a boolean for filters, a request for transformers).
//! - **`UnrepresentableValue`**: A variable could not be bound without losing
//!   information, e.g. an integer wider than the engine's integer type.
//! - **`Execution`**: The script faulted while running.
//! - **`InvalidSourceKind`** / **`Definition`**: A persisted script definition
//!   could not be reconstructed.
//!
//! Nothing in this crate catches these errors. A filter that fails is not a
//! filter that returned `false`.

use thiserror::Error;

/// Convenience alias for results using the scripting error type.
pub type ScriptResult<T> = std::result::Result<T, ScriptError>;

/// Errors raised while compiling, running or reconstructing a script.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// No engine is registered under this language identifier.
    #[error("No script engine registered for language '{0}'")]
    UnknownLanguage(String),

    /// The source text failed to compile.
    #[error("{}", format_compile(.language, .message, .line, .column))]
    Compile {
        /// Backend that rejected the source
        language: String,
        /// Engine-provided description
        message: String,
        /// 1-based line of the fault, if known
        line: Option<usize>,
        /// 1-based column of the fault, if known
        column: Option<usize>,
    },

    /// A statements script did not bind its entry point.
    #[error("Script did not define the entry point '{name}'")]
    MissingEntryPoint {
        /// Name the host looked up
        name: String,
    },

    /// A value did not have the shape the caller required.
    #[error("Result type error: expected {expected}, found {found}")]
    ResultType {
        /// Shape the caller required
        expected: String,
        /// Shape actually produced
        found: String,
    },

    /// A host value has no exact representation in the script language.
    #[error("Cannot bind '{name}': value {value} at '{path}' is not representable")]
    UnrepresentableValue {
        /// Variable being bound
        name: String,
        /// Location inside the value, empty for the value itself
        path: String,
        /// The offending value
        value: String,
    },

    /// The script faulted while running.
    #[error("{language} execution error: {message}")]
    Execution {
        /// Backend that raised the fault
        language: String,
        /// Engine-provided description
        message: String,
    },

    /// A persisted definition named a source kind that does not exist.
    #[error("Unrecognized source kind '{0}' (expected 'Expression' or 'Statements')")]
    InvalidSourceKind(String),

    /// A persisted definition could not be parsed.
    #[error("Malformed script definition: {0}")]
    Definition(#[from] serde_json::Error),
}

impl ScriptError {
    /// Shorthand for a [`ScriptError::ResultType`] naming the expected and actual types.
    pub fn result_type(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ScriptError::ResultType {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

fn format_compile(
    language: &str,
    message: &str,
    line: &Option<usize>,
    column: &Option<usize>,
) -> String {
    let mut out = format!("{} compilation error: {}", language, message);
    if let Some(line) = line {
        out.push_str(&format!(" at line {}", line));
    }
    if let Some(col) = column {
        out.push_str(&format!(", column {}", col));
    }
    out
}
