use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Language, Parser};

use crate::error::GrammarCompileError;

/// A tree-sitter language the checker can bind a grammar definition to.
pub trait LanguageDriver: Send + Sync {
    fn name(&self) -> &'static str;
    /// File extensions (lowercase, without dot) used when a grammar definition lists none.
    fn extensions(&self) -> &'static [&'static str];
    fn language(&self) -> Language;
    /// Grammar definition shipped with the binary for this language.
    fn builtin_grammar(&self) -> &'static str;
}

struct RustDriver;
impl LanguageDriver for RustDriver {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn language(&self) -> Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn builtin_grammar(&self) -> &'static str {
        include_str!("../grammars/rust.toml")
    }
}

struct PythonDriver;
impl LanguageDriver for PythonDriver {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn language(&self) -> Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn builtin_grammar(&self) -> &'static str {
        include_str!("../grammars/python.toml")
    }
}

struct TypeScriptDriver;
impl LanguageDriver for TypeScriptDriver {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "mts", "cts"]
    }

    fn language(&self) -> Language {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }

    fn builtin_grammar(&self) -> &'static str {
        include_str!("../grammars/typescript.toml")
    }
}

struct TsxDriver;
impl LanguageDriver for TsxDriver {
    fn name(&self) -> &'static str {
        "tsx"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tsx"]
    }

    fn language(&self) -> Language {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    }

    fn builtin_grammar(&self) -> &'static str {
        include_str!("../grammars/tsx.toml")
    }
}

#[cfg(feature = "lang-go")]
struct GoDriver;
#[cfg(feature = "lang-go")]
impl LanguageDriver for GoDriver {
    fn name(&self) -> &'static str {
        "go"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn language(&self) -> Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn builtin_grammar(&self) -> &'static str {
        include_str!("../grammars/go.toml")
    }
}

#[cfg(feature = "lang-java")]
struct JavaDriver;
#[cfg(feature = "lang-java")]
impl LanguageDriver for JavaDriver {
    fn name(&self) -> &'static str {
        "java"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn language(&self) -> Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn builtin_grammar(&self) -> &'static str {
        include_str!("../grammars/java.toml")
    }
}

fn drivers() -> Vec<Box<dyn LanguageDriver>> {
    #[allow(unused_mut)]
    let mut drivers: Vec<Box<dyn LanguageDriver>> = vec![
        Box::new(RustDriver),
        Box::new(PythonDriver),
        Box::new(TypeScriptDriver),
        Box::new(TsxDriver),
    ];

    #[cfg(feature = "lang-go")]
    drivers.push(Box::new(GoDriver));

    #[cfg(feature = "lang-java")]
    drivers.push(Box::new(JavaDriver));

    drivers
}

fn driver_for_name(name: &str) -> Option<Box<dyn LanguageDriver>> {
    let name = name.trim().to_ascii_lowercase();
    drivers().into_iter().find(|d| d.name() == name)
}

/// Names of every language this build can parse.
pub fn driver_names() -> Vec<&'static str> {
    drivers().iter().map(|d| d.name()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Grammar definition (TOML)
// ─────────────────────────────────────────────────────────────────────────────

/// On-disk grammar definition: which node kinds of a tree-sitter language
/// play which role for signature extraction.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrammarDefinition {
    pub name: String,
    pub language: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    pub function: FunctionProduction,
    #[serde(default)]
    pub scope: ScopeProduction,
    #[serde(default)]
    pub opaque: OpaqueProduction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionProduction {
    pub kinds: Vec<String>,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// Node kind holding the ordered generic parameter list, if the language has one.
    #[serde(default)]
    pub generics_kind: Option<String>,
}

fn default_name_field() -> String {
    "name".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeProduction {
    pub kinds: Vec<String>,
    /// Fields tried in order to label a scope (first one present wins).
    pub label_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpaqueProduction {
    pub kinds: Vec<String>,
}

/// Role a node kind plays during lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Production {
    Function,
    Scope,
    /// Subtree is never searched for declarations.
    Opaque,
}

impl Production {
    fn role(self) -> &'static str {
        match self {
            Production::Function => "function",
            Production::Scope => "scope",
            Production::Opaque => "opaque",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compiled grammar
// ─────────────────────────────────────────────────────────────────────────────

/// A compiled grammar. Immutable; share it by reference across parse calls
/// (and threads).
#[derive(Debug, Clone)]
pub struct Grammar {
    name: String,
    language: Language,
    extensions: Vec<String>,
    productions: HashMap<String, Production>,
    name_field: String,
    generics_kind: Option<String>,
    label_fields: Vec<String>,
}

impl Grammar {
    /// Compile grammar definition text. `origin` names the definition in errors.
    pub fn compile(text: &str, origin: &str) -> Result<Self, GrammarCompileError> {
        let def: GrammarDefinition = toml::from_str(text).map_err(|source| GrammarCompileError::Syntax {
            origin: origin.to_string(),
            source,
        })?;
        Self::from_definition(def, origin)
    }

    /// Read and compile a grammar definition file.
    pub fn load(path: &Path) -> Result<Self, GrammarCompileError> {
        let text = std::fs::read_to_string(path).map_err(|source| GrammarCompileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::compile(&text, &path.display().to_string())
    }

    /// Compile the grammar shipped for `language`.
    pub fn builtin(language: &str) -> Result<Self, GrammarCompileError> {
        let origin = format!("builtin:{language}");
        let driver = driver_for_name(language).ok_or_else(|| GrammarCompileError::UnknownLanguage {
            origin: origin.clone(),
            language: language.to_string(),
        })?;
        Self::compile(driver.builtin_grammar(), &origin)
    }

    pub fn from_definition(def: GrammarDefinition, origin: &str) -> Result<Self, GrammarCompileError> {
        let driver = driver_for_name(&def.language).ok_or_else(|| GrammarCompileError::UnknownLanguage {
            origin: origin.to_string(),
            language: def.language.clone(),
        })?;
        let language = driver.language();

        // Catches ABI mismatches between the tree-sitter runtime and the grammar crate.
        Parser::new()
            .set_language(&language)
            .map_err(|source| GrammarCompileError::Language {
                origin: origin.to_string(),
                source,
            })?;

        if def.function.kinds.is_empty() {
            return Err(GrammarCompileError::NoFunctionKinds {
                origin: origin.to_string(),
            });
        }

        let mut productions: HashMap<String, Production> = HashMap::new();
        let groups = [
            (Production::Function, &def.function.kinds),
            (Production::Scope, &def.scope.kinds),
            (Production::Opaque, &def.opaque.kinds),
        ];
        for (production, kinds) in groups {
            for kind in kinds {
                check_kind(&language, &def.language, kind, production.role(), origin)?;
                if let Some(previous) = productions.insert(kind.clone(), production) {
                    return Err(GrammarCompileError::Ambiguous {
                        origin: origin.to_string(),
                        kind: kind.clone(),
                        first: previous.role(),
                        second: production.role(),
                    });
                }
            }
        }

        if let Some(kind) = &def.function.generics_kind {
            check_kind(&language, &def.language, kind, "generics", origin)?;
        }

        for field in std::iter::once(&def.function.name_field).chain(def.scope.label_fields.iter()) {
            if language.field_id_for_name(field).is_none() {
                return Err(GrammarCompileError::UnknownField {
                    origin: origin.to_string(),
                    language: def.language.clone(),
                    field: field.clone(),
                });
            }
        }

        let extensions = if def.extensions.is_empty() {
            driver.extensions().iter().map(|e| e.to_string()).collect()
        } else {
            def.extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect()
        };

        Ok(Self {
            name: def.name,
            language,
            extensions,
            productions,
            name_field: def.function.name_field,
            generics_kind: def.function.generics_kind,
            label_fields: def.scope.label_fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn handles_path(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }

    pub fn production(&self, kind: &str) -> Option<Production> {
        self.productions.get(kind).copied()
    }

    pub fn name_field(&self) -> &str {
        &self.name_field
    }

    pub fn generics_kind(&self) -> Option<&str> {
        self.generics_kind.as_deref()
    }

    pub fn label_fields(&self) -> &[String] {
        &self.label_fields
    }
}

fn check_kind(
    language: &Language,
    language_name: &str,
    kind: &str,
    role: &'static str,
    origin: &str,
) -> Result<(), GrammarCompileError> {
    if language.id_for_node_kind(kind, true) == 0 {
        return Err(GrammarCompileError::UnknownNodeKind {
            origin: origin.to_string(),
            language: language_name.to_string(),
            kind: kind.to_string(),
            role,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINI: &str = r#"
name = "mini"
language = "rust"

[function]
kinds = ["function_item"]
"#;

    #[test]
    fn builtin_grammars_compile() {
        for name in driver_names() {
            let g = Grammar::builtin(name).unwrap_or_else(|e| panic!("{name}: {e}"));
            assert_eq!(g.name(), name);
            assert!(!g.extensions().is_empty());
        }
    }

    #[test]
    fn rust_grammar_classifies_productions() {
        let g = Grammar::builtin("rust").unwrap();
        assert_eq!(g.production("function_item"), Some(Production::Function));
        assert_eq!(g.production("impl_item"), Some(Production::Scope));
        assert_eq!(g.production("line_comment"), Some(Production::Opaque));
        assert_eq!(g.production("block"), None);
        assert_eq!(g.generics_kind(), Some("type_parameters"));
    }

    #[test]
    fn minimal_definition_uses_defaults() {
        let g = Grammar::compile(MINI, "mini").unwrap();
        assert_eq!(g.name_field(), "name");
        assert_eq!(g.extensions(), ["rs".to_string()]);
        assert!(g.handles_path(Path::new("src/lib.RS")));
        assert!(!g.handles_path(Path::new("src/lib.py")));
        assert!(g.generics_kind().is_none());
    }

    #[test]
    fn unknown_node_kind_is_rejected() {
        let text = MINI.replace("function_item", "function_definition_xyz");
        let err = Grammar::compile(&text, "bad").unwrap_err();
        assert!(matches!(err, GrammarCompileError::UnknownNodeKind { ref kind, .. } if kind == "function_definition_xyz"));
    }

    #[test]
    fn kind_listed_twice_is_ambiguous() {
        let text = format!("{MINI}\n[scope]\nkinds = [\"function_item\"]\n");
        let err = Grammar::compile(&text, "dup").unwrap_err();
        assert!(matches!(err, GrammarCompileError::Ambiguous { .. }), "{err}");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let text = MINI.replace("kinds = [\"function_item\"]", "kinds = [\"function_item\"]\nname_field = \"title\"");
        let err = Grammar::compile(&text, "field").unwrap_err();
        assert!(matches!(err, GrammarCompileError::UnknownField { ref field, .. } if field == "title"));
    }

    #[test]
    fn malformed_and_unknown_language_fail() {
        assert!(matches!(
            Grammar::compile("name = ", "broken").unwrap_err(),
            GrammarCompileError::Syntax { .. }
        ));
        assert!(matches!(
            Grammar::compile(&MINI.replace("\"rust\"", "\"cobol\""), "cobol").unwrap_err(),
            GrammarCompileError::UnknownLanguage { .. }
        ));
        assert!(matches!(
            Grammar::builtin("cobol").unwrap_err(),
            GrammarCompileError::UnknownLanguage { .. }
        ));
    }

    #[test]
    fn empty_function_kinds_fail() {
        let text = MINI.replace("[\"function_item\"]", "[]");
        assert!(matches!(
            Grammar::compile(&text, "empty").unwrap_err(),
            GrammarCompileError::NoFunctionKinds { .. }
        ));
    }
}
