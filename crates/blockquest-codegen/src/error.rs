//! Codegen error types.
//!
//! Compilation itself never fails: malformed graphs produce diagnostics and
//! safe defaults. These errors come from the stricter entry points that
//! callers opt into.

use crate::CompileDiagnostic;

/// Errors raised by [`compile_with_options`](crate::compile_with_options) and
/// [`ProgramSource`](crate::ProgramSource) lookups.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// `deny_diagnostics` was set and the graph needed repairs.
    #[error("compilation produced {count} diagnostic(s), first: {first}")]
    Rejected {
        count: usize,
        first: String,
        diagnostics: Vec<CompileDiagnostic>,
    },

    /// No procedure with this name was emitted.
    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),
}
