//! Concat Type Checker Library
//!
//! Static checking for Concat, a concatenative language in which every word
//! is a function from stacks to stacks. The checker infers a stack effect for
//! each word, checks words with declared types against their declarations,
//! and resolves operators such as `+` through structural protocols.
//!
//! # Extending the Checker
//!
//! Host types and words can be declared without changing the checker, using
//! [`CheckerConfig`]:
//!
//! ```rust,ignore
//! use concat_check::{CheckerConfig, TypeChecker, WordDecl};
//!
//! let config = CheckerConfig::default_config()?
//!     .with_type("path", &[("exists", "(-- bool)")])
//!     .with_word(WordDecl::new("cwd", "(*s -- *s path)"));
//!
//! let typed = TypeChecker::new(config)?.check_program(&program)?;
//! ```

pub mod annotations;
pub mod ast;
pub mod builtins;
mod combinators;
pub mod config;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod kinds;
pub mod protocols;
pub mod signature;
pub mod substitution;
pub mod subsumption;
pub mod typechecker;
pub mod types;

pub use ast::{Program, Span};
pub use config::{CheckerConfig, TypeDecl, WordDecl};
pub use diagnostics::{Diagnostic, render_all, report};
pub use error::{CheckError, CheckResult, InternalError, TypeError, TypeErrorKind};
pub use kinds::Kind;
pub use subsumption::Solver;
pub use typechecker::{TypeChecker, TypedProgram, check_program};
pub use types::{StackEffect, StackType, Type};

/// Parse a program tree written out as JSON
pub fn parse_program(json: &str) -> Result<Program, String> {
    serde_json::from_str(json).map_err(|e| format!("Failed to parse program tree: {}", e))
}

/// Check a JSON program tree, rendering a type error against `source`
///
/// The outer error is for trees that cannot be read and for defects in the
/// checker; a type error in the program is the inner `Err`.
pub fn check_json(
    json: &str,
    source: &str,
    config: CheckerConfig,
) -> Result<Result<TypedProgram, Diagnostic>, String> {
    let program = parse_program(json)?;
    let mut checker = TypeChecker::new(config).map_err(|e| e.to_string())?;
    match checker.check_program(&program) {
        Ok(typed) => Ok(Ok(typed)),
        Err(err) => report(err, source)
            .map(Err)
            .map_err(|internal| internal.to_string()),
    }
}
