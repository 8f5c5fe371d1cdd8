use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::validator::{NamingRule, SkipPredicate};

/// Name of the per-repository configuration file.
pub const CONFIG_FILE_NAME: &str = ".dualname.json";

/// Hard safety ceiling: files larger than this are **always** skipped, regardless of config.
pub const ABSOLUTE_MAX_FILE_BYTES: u64 = 1_000_000; // 1 MB

/// Controls input discovery (what to skip).
///
/// Note: `.gitignore` is always respected when walking directories; these are
/// additional hard skips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory *names* to skip anywhere in the tree (e.g. "generated", "bindings").
    ///
    /// These are compared against path components, not full paths.
    pub exclude_dir_names: Vec<String>,
    /// Files above this size are reported as skipped instead of parsed.
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_dir_names: vec![],
            max_file_bytes: 512 * 1024,
        }
    }
}

impl ScanConfig {
    /// Configured limit, clamped to [`ABSOLUTE_MAX_FILE_BYTES`].
    pub fn effective_max_file_bytes(&self) -> u64 {
        self.max_file_bytes.min(ABSOLUTE_MAX_FILE_BYTES)
    }
}

/// Which names never produce a violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipConfig {
    /// Substrings; a name containing any of them is skipped.
    pub name_markers: Vec<String>,
    /// Regular expressions matched against names.
    pub name_patterns: Vec<String>,
    /// Glob patterns over source paths; names declared only in matching files are skipped.
    pub exclude_files: Vec<String>,
}

impl Default for SkipConfig {
    fn default() -> Self {
        Self {
            // Historical exclusions of the graph accessor API.
            name_markers: vec!["unchecked".to_string(), "node_name".to_string()],
            name_patterns: vec![],
            exclude_files: vec![],
        }
    }
}

impl SkipConfig {
    pub fn predicate(&self) -> Result<SkipPredicate> {
        let mut skip = SkipPredicate::new();
        for marker in &self.name_markers {
            skip = skip.with_marker(marker.as_str());
        }
        for pattern in &self.name_patterns {
            skip = skip
                .with_pattern(pattern)
                .with_context(|| format!("invalid skip pattern `{pattern}`"))?;
        }
        for pattern in &self.exclude_files {
            skip = skip
                .with_excluded_files(pattern)
                .with_context(|| format!("invalid exclude glob `{pattern}`"))?;
        }
        Ok(skip)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Built-in grammar to use when `grammar` is not set.
    pub language: String,
    /// Grammar definition file (TOML), relative to the repository root.
    pub grammar: Option<PathBuf>,
    pub rules: Vec<NamingRule>,
    pub skip: SkipConfig,
    /// Settings that govern file discovery and exclusion.
    pub scan: ScanConfig,
    /// Parse files on the rayon pool. Ingestion stays sequential either way.
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "rust".to_string(),
            grammar: None,
            rules: default_rules(),
            skip: SkipConfig::default(),
            scan: ScanConfig::default(),
            parallel: false,
        }
    }
}

fn default_rules() -> Vec<NamingRule> {
    vec![
        NamingRule {
            suffix_a: "_id".to_string(),
            suffix_b: "_name".to_string(),
        },
        NamingRule {
            suffix_a: "_ids".to_string(),
            suffix_b: "_names".to_string(),
        },
    ]
}

impl Config {
    fn check(&self) -> Result<()> {
        for rule in &self.rules {
            rule.check().with_context(|| format!("invalid naming rule `{rule}`"))?;
        }
        Ok(())
    }
}

/// Load configuration.
///
/// An explicit path must exist. Without one, `{repo_root}/.dualname.json` is
/// used when present and defaults otherwise.
pub fn load_config(repo_root: &Path, explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let primary = repo_root.join(CONFIG_FILE_NAME);
            if !primary.exists() {
                tracing::debug!("no {} in {}, using defaults", CONFIG_FILE_NAME, repo_root.display());
                return Ok(Config::default());
            }
            primary
        }
    };

    let text = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let cfg: Config = serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
    cfg.check().with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(cfg)
}
