//! Error taxonomy for a checking run.
//!
//! Only [`GrammarCompileError`] and [`StructuralExtractionError`] abort a run.
//! [`FileFailure`] is collected per file and reported next to the violations.

use serde::Serialize;
use std::path::PathBuf;

/// The grammar definition could not be turned into a usable [`crate::grammar::Grammar`].
#[derive(Debug, thiserror::Error)]
pub enum GrammarCompileError {
    #[error("cannot read grammar {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed grammar definition {origin}: {source}")]
    Syntax {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("grammar {origin}: unknown language `{language}`")]
    UnknownLanguage { origin: String, language: String },

    #[error("grammar {origin}: language `{language}` has no node kind `{kind}` (listed as {role})")]
    UnknownNodeKind {
        origin: String,
        language: String,
        kind: String,
        role: &'static str,
    },

    #[error("grammar {origin}: language `{language}` has no field `{field}`")]
    UnknownField {
        origin: String,
        language: String,
        field: String,
    },

    #[error("grammar {origin}: node kind `{kind}` is listed as both {first} and {second}")]
    Ambiguous {
        origin: String,
        kind: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("grammar {origin}: no function declaration kinds given")]
    NoFunctionKinds { origin: String },

    #[error("grammar {origin}: {source}")]
    Language {
        origin: String,
        #[source]
        source: tree_sitter::LanguageError,
    },
}

/// A source file that does not conform to the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{file}:{line}:{column}: {detail}")]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub detail: String,
}

/// The lowered syntax tree does not have the shape the extractor relies on
/// (a function declaration without a name token).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{file}:{line}:{column}: `{kind}` declaration has no name token")]
pub struct StructuralExtractionError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub kind: String,
}

/// Why a single file was skipped. Never fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FileFailure {
    #[error("{file}: unreadable: {detail}")]
    Unreadable { file: String, detail: String },

    #[error("{file}: {bytes} bytes exceeds the {limit} byte limit")]
    TooLarge { file: String, bytes: u64, limit: u64 },

    #[error("{0}")]
    Parse(ParseError),
}

impl FileFailure {
    pub fn file(&self) -> &str {
        match self {
            FileFailure::Unreadable { file, .. } | FileFailure::TooLarge { file, .. } => file,
            FileFailure::Parse(e) => &e.file,
        }
    }
}

impl From<ParseError> for FileFailure {
    fn from(e: ParseError) -> Self {
        FileFailure::Parse(e)
    }
}

/// A naming rule that cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("naming rule suffixes must not be empty")]
    EmptySuffix,

    #[error("naming rule pairs `{0}` with itself")]
    SameSuffix(String),

    #[error("naming rule `{0}` must have the form SUFFIX_A:SUFFIX_B")]
    Malformed(String),
}
