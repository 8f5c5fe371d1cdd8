//! Grammar-driven checker for dual-naming conventions.
//!
//! Each source file is parsed with a compiled [`Grammar`], reduced to
//! [`FunctionSignature`]s, and merged into a [`SignatureRegistry`]. Once every
//! file is in, the registry is validated against [`NamingRule`]s such as
//! `_id <-> _name`: a `get_node_id` without a `get_node_name` is a
//! [`Violation`].

pub mod config;
pub mod error;
pub mod extractor;
pub mod grammar;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod reporter;
pub mod scanner;
pub mod validator;

pub use error::{FileFailure, GrammarCompileError, ParseError, StructuralExtractionError};
pub use extractor::FunctionSignature;
pub use grammar::Grammar;
pub use pipeline::{Analysis, CheckOptions, Checker, Report, SourceFile};
pub use registry::SignatureRegistry;
pub use validator::{NamingRule, SkipPredicate, Violation};
