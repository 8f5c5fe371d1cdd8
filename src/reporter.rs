use serde::Serialize;
use serde_json::json;
use std::io::{self, Write};

use crate::extractor::FunctionSignature;
use crate::pipeline::Report;
use crate::validator::Violation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Writes reports to a stream. Only I/O errors surface.
pub struct Reporter<W: Write> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self, report: &Report) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => self.render_text(report),
            OutputFormat::Json => {
                let doc = json!({
                    "violations": report.validation.violations,
                    "skipped_files": report.failures,
                    "summary": Summary::of(report),
                });
                self.write_json(&doc)
            }
        }
    }

    fn render_text(&mut self, report: &Report) -> io::Result<()> {
        for v in &report.validation.violations {
            writeln!(self.out, "{}", violation_line(v))?;
        }
        for failure in &report.failures {
            writeln!(self.out, "skipped {failure}")?;
        }
        let s = Summary::of(report);
        writeln!(
            self.out,
            "{} violation(s) in {} function(s); {} file(s) analyzed, {} skipped",
            s.violations, s.functions, s.files_analyzed, s.files_skipped
        )
    }

    /// Diagnostic dump of every extracted signature.
    pub fn render_signatures<'a, I>(&mut self, signatures: I) -> io::Result<()>
    where
        I: IntoIterator<Item = &'a FunctionSignature>,
    {
        match self.format {
            OutputFormat::Text => {
                for sig in signatures {
                    writeln!(self.out, "{}:{} {}", sig.source_file, sig.line, sig.display_name())?;
                }
                Ok(())
            }
            OutputFormat::Json => {
                let all: Vec<&FunctionSignature> = signatures.into_iter().collect();
                self.write_json(&all)
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, value)?;
        writeln!(self.out)
    }
}

/// `<function> expected counterpart <counterpart> (missing)  [rule a <-> b, file:line]`
pub fn violation_line(v: &Violation) -> String {
    format!(
        "{} expected counterpart {} (missing)  [rule {}, {}:{}]",
        v.function, v.missing_counterpart, v.rule, v.source_file, v.line
    )
}

#[derive(Debug, Serialize)]
struct Summary {
    violations: usize,
    functions: usize,
    names_checked: usize,
    names_skipped: usize,
    signatures: usize,
    files_analyzed: usize,
    files_skipped: usize,
}

impl Summary {
    fn of(report: &Report) -> Self {
        let mut functions: Vec<&str> = report.validation.violations.iter().map(|v| v.function.as_str()).collect();
        functions.dedup();
        Self {
            violations: report.validation.violations.len(),
            functions: functions.len(),
            names_checked: report.validation.checked,
            names_skipped: report.validation.skipped,
            signatures: report.signatures,
            files_analyzed: report.files_analyzed,
            files_skipped: report.failures.len(),
        }
    }
}
