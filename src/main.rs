use anyhow::{Context, Result};
use clap::Parser;
use dualname::config::load_config;
use dualname::grammar::{driver_names, Grammar};
use dualname::pipeline::{CheckOptions, Checker};
use dualname::reporter::{OutputFormat, Reporter};
use dualname::scanner::{collect_sources, ScanOptions};
use dualname::validator::NamingRule;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Violations were found but the run completed.
const EXIT_VIOLATIONS: u8 = 1;
/// Grammar, configuration or internal-consistency failure.
const EXIT_FATAL: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "dualname")]
#[command(version)]
#[command(about = "Check that by-id / by-name style function pairs exist on both sides")]
struct Cli {
    /// Files, directories or glob patterns to analyze (relative to --root)
    #[arg(value_name = "PATHS", default_value = ".")]
    paths: Vec<String>,

    /// Repository root: base for relative inputs, reported paths and `.dualname.json`
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Configuration file (default: {root}/.dualname.json when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Grammar definition (TOML); overrides --language
    #[arg(long, value_name = "FILE")]
    grammar: Option<PathBuf>,

    /// Built-in grammar to use (see --list-languages)
    #[arg(long, short = 'l', value_name = "NAME")]
    language: Option<String>,

    /// Naming rule as SUFFIX_A:SUFFIX_B. Repeatable; replaces the configured rules.
    /// Example: --rule _id:_name --rule _ids:_names
    #[arg(long = "rule", value_name = "A:B")]
    rules: Vec<NamingRule>,

    /// Skip names containing this substring (added to the configured markers)
    #[arg(long = "skip", value_name = "MARKER")]
    skip_markers: Vec<String>,

    /// Skip names matching this regular expression
    #[arg(long = "skip-pattern", value_name = "REGEX")]
    skip_patterns: Vec<String>,

    /// Skip names declared only in files matching this glob
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude_files: Vec<String>,

    /// Drop the configured skip markers before applying --skip
    #[arg(long)]
    no_default_skips: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print every extracted signature instead of validating
    #[arg(long)]
    list_signatures: bool,

    /// List the built-in grammars and exit
    #[arg(long)]
    list_languages: bool,

    /// Parse files in parallel
    #[arg(long)]
    parallel: bool,

    /// Skip files larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    max_file_bytes: Option<u64>,

    /// No progress bar, errors only on stderr
    #[arg(long, short = 'q')]
    quiet: bool,

    /// More logging on stderr (-v info, -vv debug); RUST_LOG wins when set
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

enum Outcome {
    Clean,
    Violations,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn progress_bar(len: usize, quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} analyzing [{bar:30}] {pos}/{len} files") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn run(cli: Cli) -> Result<Outcome> {
    if cli.list_languages {
        for name in driver_names() {
            println!("{name}");
        }
        return Ok(Outcome::Clean);
    }

    let repo_root = match cli.root.clone() {
        Some(r) => r,
        None => std::env::current_dir().context("Failed to get current dir")?,
    };

    let mut cfg = load_config(&repo_root, cli.config.as_deref())?;
    if let Some(lang) = &cli.language {
        cfg.language = lang.clone();
        cfg.grammar = None;
    }
    if !cli.rules.is_empty() {
        cfg.rules = cli.rules.clone();
    }
    if cli.no_default_skips {
        cfg.skip.name_markers.clear();
    }
    cfg.skip.name_markers.extend(cli.skip_markers.iter().cloned());
    cfg.skip.name_patterns.extend(cli.skip_patterns.iter().cloned());
    cfg.skip.exclude_files.extend(cli.exclude_files.iter().cloned());
    cfg.parallel |= cli.parallel;
    if let Some(bytes) = cli.max_file_bytes {
        cfg.scan.max_file_bytes = bytes;
    }

    // Fatal before any file is touched.
    let grammar = match (&cli.grammar, &cfg.grammar) {
        (Some(path), _) => Grammar::load(path)?,
        (None, Some(path)) => Grammar::load(&repo_root.join(path))?,
        (None, None) => Grammar::builtin(&cfg.language)?,
    };
    let skip = cfg.skip.predicate()?;

    let scan = ScanOptions {
        root: repo_root.clone(),
        extensions: grammar.extensions().to_vec(),
        exclude_dir_names: cfg.scan.exclude_dir_names.clone(),
    };
    let paths = collect_sources(&cli.paths, &scan)?;
    tracing::info!(files = paths.len(), grammar = grammar.name(), "collected sources");

    let checker = Checker::new(
        &grammar,
        CheckOptions {
            parallel: cfg.parallel,
            max_file_bytes: cfg.scan.effective_max_file_bytes(),
        },
    )
    .with_progress(progress_bar(paths.len(), cli.quiet));
    let analysis = checker.check_paths(&paths, &repo_root)?;

    let stdout = std::io::stdout().lock();
    let mut reporter = Reporter::new(std::io::BufWriter::new(stdout), cli.format);

    if cli.list_signatures {
        reporter.render_signatures(analysis.registry.signatures())?;
        reporter.into_inner().flush()?;
        return Ok(Outcome::Clean);
    }

    let report = analysis.validate(&cfg.rules, &skip);
    reporter.render(&report)?;
    reporter.into_inner().flush()?;

    Ok(if report.has_violations() {
        Outcome::Violations
    } else {
        Outcome::Clean
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(Outcome::Clean) => ExitCode::SUCCESS,
        Ok(Outcome::Violations) => ExitCode::from(EXIT_VIOLATIONS),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
