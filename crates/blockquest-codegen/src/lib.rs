//! Program compiler for blockquest block graphs.
//!
//! Turns a [`BlockGraph`](blockquest_core::BlockGraph) into script source in
//! one of two [`GenerationMode`]s from a single traversal:
//!
//! - **Instrumented**: procedures are `async`, calls are awaited, and every
//!   domain or visualization operation becomes an awaited host call. These
//!   awaits are the only points where a running program yields.
//! - **Pure**: the same logic with every side effect removed, evaluable
//!   synchronously for function tests and predicates.
//!
//! # Modules
//!
//! - [`compiler`] -- Program layout: globals, procedures, top-level code
//! - [`emit`] -- Per-kind emission rules for statements and expressions
//! - [`helpers`] -- Allow-list of algorithm helper procedures
//! - [`ident`] -- Identifier sanitizing
//! - [`error`] -- Error types for the strict entry points

pub mod compiler;
pub mod emit;
pub mod error;
pub mod helpers;
pub mod ident;

pub use compiler::{compile, compile_with_options};
pub use error::CodegenError;
pub use helpers::AlgorithmFamily;

use blockquest_core::NodeId;
use serde::{Deserialize, Serialize};

/// Which of the two emission rule sets to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Side-effecting, suspension-bearing code for animated runs.
    Instrumented,
    /// Side-effect-free code for static checks.
    Pure,
}

impl Default for GenerationMode {
    fn default() -> Self {
        GenerationMode::Instrumented
    }
}

/// Options for [`compile_with_options`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Spaces per indentation level.
    pub indent: usize,

    /// Emit a leading comment naming the generation mode.
    pub header_comment: bool,

    /// Fold [`BlockGraph::validate`](blockquest_core::BlockGraph::validate)
    /// findings into the diagnostics.
    pub include_validation: bool,

    /// Fail with [`CodegenError::Rejected`] instead of returning repaired
    /// source when any diagnostic was produced.
    pub deny_diagnostics: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            indent: 2,
            header_comment: true,
            include_validation: true,
            deny_diagnostics: false,
        }
    }
}

/// A repair the compiler made while emitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileDiagnostic {
    pub node: Option<NodeId>,
    pub message: String,
}

/// Signature of an emitted procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureSignature {
    /// Name as authored on the definition block.
    pub name: String,
    /// Identifier used in the emitted source.
    pub ident: String,
    /// Sanitized canonical parameters, in order.
    pub params: Vec<String>,
    pub family: Option<AlgorithmFamily>,
    pub definition: NodeId,
}

/// Compiled program text with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSource {
    pub mode: GenerationMode,
    pub text: String,
    /// blake3 hex digest of `text`.
    pub fingerprint: String,
    pub procedures: Vec<ProcedureSignature>,
    /// Sanitized global variable names, sorted.
    pub globals: Vec<String>,
    pub diagnostics: Vec<CompileDiagnostic>,
}

impl ProgramSource {
    /// Finds an emitted procedure by its authored name. Falls back to a
    /// case-insensitive match.
    pub fn procedure(&self, name: &str) -> Result<&ProcedureSignature, CodegenError> {
        self.procedures
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.procedures.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
            .ok_or_else(|| CodegenError::UnknownProcedure(name.to_string()))
    }

    /// Returns `true` if the text hashes to the recorded fingerprint.
    pub fn verify_fingerprint(&self) -> bool {
        fingerprint(&self.text) == self.fingerprint
    }
}

/// blake3 hex digest of emitted source.
pub fn fingerprint(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_instrumented() {
        assert_eq!(GenerationMode::default(), GenerationMode::Instrumented);
    }

    #[test]
    fn default_compile_options() {
        let opts = CompileOptions::default();
        assert_eq!(opts.indent, 2);
        assert!(opts.header_comment);
        assert!(opts.include_validation);
        assert!(!opts.deny_diagnostics);
    }

    #[test]
    fn mode_serde_names() {
        assert_eq!(serde_json::to_string(&GenerationMode::Pure).unwrap(), "\"pure\"");
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = fingerprint("let x = null;\n");
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint("let x = null;\n"));
        assert_ne!(a, fingerprint("let y = null;\n"));
    }
}
