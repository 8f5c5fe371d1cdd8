use anyhow::{Context, Result};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

fn default_overrides(root: &Path, exclude_dir_names: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);

    // Note: For directories, include patterns for both the directory entry and its descendants,
    // otherwise walkers may still descend into the directory.
    for d in [".git", "node_modules", "target", "dist", "build", ".venv", "__pycache__"] {
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    // Project-specific excluded dirs
    for d in exclude_dir_names {
        let d = d.trim().trim_matches('/');
        if d.is_empty() {
            continue;
        }
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Base for relative inputs.
    pub root: PathBuf,
    /// Extensions kept when walking directories (lowercase, without dot).
    pub extensions: Vec<String>,
    pub exclude_dir_names: Vec<String>,
}

fn is_glob(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    extensions.iter().any(|e| *e == ext)
}

/// Resolve CLI inputs into a sorted, deduplicated file list.
///
/// - glob patterns expand to the files they match,
/// - directories are walked (`.gitignore` respected) keeping files with a known extension,
/// - anything else is passed through as a file, even if it does not exist, so
///   the run reports it as unreadable instead of silently dropping it.
pub fn collect_sources(inputs: &[String], opts: &ScanOptions) -> Result<Vec<PathBuf>> {
    let mut out: BTreeSet<PathBuf> = BTreeSet::new();

    for input in inputs {
        if is_glob(input) {
            let pattern = if Path::new(input).is_absolute() {
                input.clone()
            } else {
                opts.root.join(input).to_string_lossy().to_string()
            };
            let paths = glob::glob(&pattern).with_context(|| format!("Invalid glob pattern: {input}"))?;
            for entry in paths {
                match entry {
                    Ok(p) if p.is_file() => {
                        out.insert(p);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("glob {input}: {e}"),
                }
            }
            continue;
        }

        let path = if input == "." {
            opts.root.clone()
        } else if Path::new(input).is_absolute() {
            PathBuf::from(input)
        } else {
            opts.root.join(input)
        };

        if path.is_dir() {
            out.extend(walk_dir(&path, opts)?);
        } else {
            out.insert(path);
        }
    }

    Ok(out.into_iter().collect())
}

fn walk_dir(dir: &Path, opts: &ScanOptions) -> Result<Vec<PathBuf>> {
    let overrides = default_overrides(dir, &opts.exclude_dir_names)?;
    let walker = WalkBuilder::new(dir)
        .standard_filters(true) // .gitignore, .ignore, hidden, etc.
        .overrides(overrides)
        .build();

    let mut files = Vec::new();
    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("walking {}: {e}", dir.display());
                continue;
            }
        };

        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let path = dent.into_path();
        if has_extension(&path, &opts.extensions) {
            files.push(path);
        }
    }
    Ok(files)
}

/// `path` relative to `base` with '/' separators, or the path itself when outside `base`.
pub fn display_path(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
