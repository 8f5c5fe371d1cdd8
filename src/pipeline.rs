//! One checking run: parse → extract → ingest for every file, then validate once.

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::ABSOLUTE_MAX_FILE_BYTES;
use crate::error::{FileFailure, StructuralExtractionError};
use crate::extractor::{extract, FunctionSignature};
use crate::grammar::Grammar;
use crate::parser::parse;
use crate::registry::SignatureRegistry;
use crate::scanner::display_path;
use crate::validator::{validate, NamingRule, SkipPredicate, Validation};

/// Contents of one source file, named the way it should appear in reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub contents: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Parse and extract on the rayon pool. Ingestion order is unaffected.
    pub parallel: bool,
    pub max_file_bytes: u64,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            max_file_bytes: 512 * 1024,
        }
    }
}

/// Registry and per-file failures once every file has been ingested.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub registry: SignatureRegistry,
    pub failures: Vec<FileFailure>,
    pub files_analyzed: usize,
}

impl Analysis {
    pub fn validate(&self, rules: &[NamingRule], skip: &SkipPredicate) -> Report {
        let validation = validate(&self.registry, rules, skip);
        tracing::info!(
            violations = validation.violations.len(),
            names = self.registry.len(),
            skipped_files = self.failures.len(),
            "validation finished"
        );
        Report {
            validation,
            failures: self.failures.clone(),
            files_analyzed: self.files_analyzed,
            signatures: self.registry.occurrence_count(),
        }
    }
}

/// Everything the reporter renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub validation: Validation,
    pub failures: Vec<FileFailure>,
    pub files_analyzed: usize,
    pub signatures: usize,
}

impl Report {
    pub fn has_violations(&self) -> bool {
        !self.validation.violations.is_empty()
    }
}

pub struct Checker<'g> {
    grammar: &'g Grammar,
    options: CheckOptions,
    progress: Option<ProgressBar>,
}

impl<'g> Checker<'g> {
    pub fn new(grammar: &'g Grammar, options: CheckOptions) -> Self {
        Self {
            grammar,
            options,
            progress: None,
        }
    }

    /// Tick `bar` once per processed file.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Read `paths` (reported relative to `base`) and analyze them in order.
    /// Unreadable and oversized files become [`FileFailure`]s.
    pub fn check_paths(&self, paths: &[PathBuf], base: &Path) -> Result<Analysis, StructuralExtractionError> {
        let limit = self.options.max_file_bytes.min(ABSOLUTE_MAX_FILE_BYTES);
        let read = |p: &PathBuf| read_source(p, &display_path(p, base), limit);
        let inputs: Vec<Result<SourceFile, FileFailure>> = if self.options.parallel {
            paths.par_iter().map(read).collect()
        } else {
            paths.iter().map(read).collect()
        };
        self.run(inputs)
    }

    /// Analyze in-memory sources in the order given.
    pub fn check_sources(&self, sources: Vec<SourceFile>) -> Result<Analysis, StructuralExtractionError> {
        self.run(sources.into_iter().map(Ok).collect())
    }

    fn run(&self, inputs: Vec<Result<SourceFile, FileFailure>>) -> Result<Analysis, StructuralExtractionError> {
        if let Some(bar) = &self.progress {
            bar.set_length(inputs.len() as u64);
        }

        // Parsing fans out; `collect` keeps input order.
        let outcomes: Vec<FileOutcome> = if self.options.parallel {
            inputs.into_par_iter().map(|i| self.process(i)).collect()
        } else {
            inputs.into_iter().map(|i| self.process(i)).collect()
        };

        let analysis = ingest(outcomes);
        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }
        analysis
    }

    fn process(&self, input: Result<SourceFile, FileFailure>) -> FileOutcome {
        let outcome = match input {
            Err(failure) => FileOutcome::Skipped(failure),
            Ok(src) => match parse(self.grammar, &src.path, &src.contents) {
                Err(e) => FileOutcome::Skipped(e.into()),
                // The tree is dropped right after extraction.
                Ok(tree) => match extract(&tree) {
                    Ok(signatures) => {
                        tracing::debug!(file = %src.path, count = signatures.len(), "extracted signatures");
                        FileOutcome::Extracted(signatures)
                    }
                    Err(e) => FileOutcome::Inconsistent(e),
                },
            },
        };
        if let Some(bar) = &self.progress {
            bar.inc(1);
        }
        outcome
    }
}

enum FileOutcome {
    Extracted(Vec<FunctionSignature>),
    Skipped(FileFailure),
    Inconsistent(StructuralExtractionError),
}

/// Single writer: ingestion is sequential, in input order.
fn ingest(outcomes: Vec<FileOutcome>) -> Result<Analysis, StructuralExtractionError> {
    let mut analysis = Analysis::default();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Extracted(signatures) => {
                analysis.registry.ingest(signatures);
                analysis.files_analyzed += 1;
            }
            FileOutcome::Skipped(failure) => {
                tracing::warn!("skipping {failure}");
                analysis.failures.push(failure);
            }
            FileOutcome::Inconsistent(e) => {
                tracing::error!("syntax tree does not match the grammar: {e}");
                return Err(e);
            }
        }
    }
    Ok(analysis)
}

fn read_source(path: &Path, display: &str, limit: u64) -> Result<SourceFile, FileFailure> {
    let unreadable = |e: std::io::Error| FileFailure::Unreadable {
        file: display.to_string(),
        detail: e.to_string(),
    };
    let bytes = std::fs::metadata(path).map_err(unreadable)?.len();
    if bytes > limit {
        return Err(FileFailure::TooLarge {
            file: display.to_string(),
            bytes,
            limit,
        });
    }
    let contents = std::fs::read_to_string(path).map_err(unreadable)?;
    Ok(SourceFile::new(display, contents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rust() -> Grammar {
        Grammar::builtin("rust").unwrap()
    }

    fn id_name() -> Vec<NamingRule> {
        vec![NamingRule::new("_id", "_name").unwrap()]
    }

    fn sources() -> Vec<SourceFile> {
        vec![
            SourceFile::new("src/nodes.rs", "impl Graph {\n    pub fn get_node_id(&self) {}\n    pub fn get_node_name(&self) {}\n}\n"),
            SourceFile::new("src/edges.rs", "fn get_edge_type_id() {}\nfn get_edge_ids() {}\n"),
            SourceFile::new("src/types.rs", "fn get_node_type_name() {}\n"),
        ]
    }

    #[test]
    fn sequential_and_parallel_runs_agree() {
        let g = rust();
        let seq = Checker::new(&g, CheckOptions::default()).check_sources(sources()).unwrap();
        let par = Checker::new(
            &g,
            CheckOptions {
                parallel: true,
                ..CheckOptions::default()
            },
        )
        .check_sources(sources())
        .unwrap();

        let skip = SkipPredicate::new();
        assert_eq!(seq.validate(&id_name(), &skip), par.validate(&id_name(), &skip));
        let names: Vec<&str> = seq.registry.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            ["get_node_id", "get_node_name", "get_edge_type_id", "get_edge_ids", "get_node_type_name"]
        );
    }

    #[test]
    fn parse_failure_is_isolated() {
        let g = rust();
        let checker = Checker::new(&g, CheckOptions::default());
        let skip = SkipPredicate::new();

        let clean = checker.check_sources(sources()).unwrap().validate(&id_name(), &skip);

        let mut with_bad = sources();
        with_bad.insert(1, SourceFile::new("src/broken.rs", "fn get_broken_id( {\n"));
        let analysis = checker.check_sources(with_bad).unwrap();
        assert_eq!(analysis.files_analyzed, 3);
        let report = analysis.validate(&id_name(), &skip);

        assert_eq!(report.validation, clean.validation);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file(), "src/broken.rs");
        assert!(matches!(report.failures[0], FileFailure::Parse(_)));
    }

    #[test]
    fn ingesting_the_same_file_twice_does_not_duplicate_violations() {
        let g = rust();
        let checker = Checker::new(&g, CheckOptions::default());
        let once = checker.check_sources(sources()).unwrap();
        let mut doubled = sources();
        doubled.extend(sources());
        let twice = checker.check_sources(doubled).unwrap();

        assert!(twice.registry.occurrence_count() > once.registry.occurrence_count());
        let skip = SkipPredicate::new();
        assert_eq!(
            once.validate(&id_name(), &skip).validation.violations,
            twice.validate(&id_name(), &skip).validation.violations
        );
    }

    #[test]
    fn check_paths_reports_unreadable_and_oversized_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/a.rs"), "fn get_node_id() {}\n").unwrap();
        std::fs::write(root.join("src/big.rs"), format!("// {}\nfn f() {{}}\n", "x".repeat(200))).unwrap();

        let g = rust();
        let checker = Checker::new(
            &g,
            CheckOptions {
                parallel: false,
                max_file_bytes: 100,
            },
        );
        let paths = vec![root.join("src/a.rs"), root.join("src/big.rs"), root.join("src/gone.rs")];
        let analysis = checker.check_paths(&paths, root).unwrap();

        assert_eq!(analysis.files_analyzed, 1);
        assert_eq!(analysis.registry.get("get_node_id").unwrap().first().source_file, "src/a.rs");
        let failed: Vec<&str> = analysis.failures.iter().map(|f| f.file()).collect();
        assert_eq!(failed, ["src/big.rs", "src/gone.rs"]);
        assert!(matches!(analysis.failures[0], FileFailure::TooLarge { limit: 100, .. }));
        assert!(matches!(analysis.failures[1], FileFailure::Unreadable { .. }));
    }

    #[test]
    fn nameless_declaration_aborts_and_clears_progress() {
        // Closures have no `name` field, so every closure lowers to a nameless declaration.
        let g = Grammar::compile(
            r#"
name = "closures"
language = "rust"

[function]
kinds = ["function_item", "closure_expression"]
"#,
            "closures",
        )
        .unwrap();
        let bar = ProgressBar::hidden();
        let checker = Checker::new(&g, CheckOptions::default()).with_progress(bar.clone());

        let err = checker
            .check_sources(vec![
                SourceFile::new("src/ok.rs", "fn get_node_id() {}\n"),
                SourceFile::new("src/closure.rs", "fn f() {\n    let c = |x: u32| x;\n}\n"),
            ])
            .unwrap_err();
        assert_eq!(err.file, "src/closure.rs");
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, "closure_expression");
        assert!(bar.is_finished());
    }

    #[test]
    fn violations_follow_file_order() {
        let g = rust();
        let report = Checker::new(&g, CheckOptions::default())
            .check_sources(sources())
            .unwrap()
            .validate(&id_name(), &SkipPredicate::new());
        let got: Vec<(&str, &str)> = report
            .validation
            .violations
            .iter()
            .map(|v| (v.function.as_str(), v.missing_counterpart.as_str()))
            .collect();
        assert_eq!(
            got,
            [("get_edge_type_id", "get_edge_type_name"), ("get_node_type_name", "get_node_type_id")]
        );
        assert_eq!(report.files_analyzed, 3);
        assert_eq!(report.signatures, 5);
    }
}
