//! Dual-naming validation over a complete [`SignatureRegistry`].
//!
//! A [`NamingRule`] `(a, b)` expects every function ending in `a` to have a
//! sibling that is identical except for ending in `b`, and vice versa. Each
//! (name, rule, direction) is evaluated independently:
//!
//! ```text
//! Unchecked ──skip predicate──────────────────────────────▶ Skipped
//!     │
//!     ├─ ends with `from` and does not contain `to` ──┬─ counterpart present ─▶ Satisfied
//!     │                                               └─ counterpart absent ──▶ Violated
//!     └─ otherwise ───────────────────────────────────────▶ NotApplicable
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RuleError;
use crate::registry::{RegistryEntry, SignatureRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamingRule {
    pub suffix_a: String,
    pub suffix_b: String,
}

impl NamingRule {
    pub fn new(suffix_a: impl Into<String>, suffix_b: impl Into<String>) -> Result<Self, RuleError> {
        let rule = Self {
            suffix_a: suffix_a.into(),
            suffix_b: suffix_b.into(),
        };
        rule.check()?;
        Ok(rule)
    }

    /// Deserialized rules bypass `new`; call this before using them.
    pub fn check(&self) -> Result<(), RuleError> {
        if self.suffix_a.is_empty() || self.suffix_b.is_empty() {
            return Err(RuleError::EmptySuffix);
        }
        if self.suffix_a == self.suffix_b {
            return Err(RuleError::SameSuffix(self.suffix_a.clone()));
        }
        Ok(())
    }

    fn suffixes(&self, direction: Direction) -> (&str, &str) {
        match direction {
            Direction::AtoB => (&self.suffix_a, &self.suffix_b),
            Direction::BtoA => (&self.suffix_b, &self.suffix_a),
        }
    }
}

impl FromStr for NamingRule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s.split_once(':').ok_or_else(|| RuleError::Malformed(s.to_string()))?;
        Self::new(a.trim(), b.trim())
    }
}

impl fmt::Display for NamingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.suffix_a, self.suffix_b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// `suffix_a` demands `suffix_b`.
    #[serde(rename = "a_to_b")]
    AtoB,
    #[serde(rename = "b_to_a")]
    BtoA,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::AtoB, Direction::BtoA];
}

/// Names excluded from every rule.
#[derive(Debug, Clone, Default)]
pub struct SkipPredicate {
    markers: Vec<String>,
    patterns: Vec<Regex>,
    excluded_files: Vec<glob::Pattern>,
}

impl SkipPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip names containing `marker` as a substring.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        if !marker.is_empty() {
            self.markers.push(marker);
        }
        self
    }

    /// Skip names matching a regular expression.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Skip names declared only in files matching a glob.
    pub fn with_excluded_files(mut self, pattern: &str) -> Result<Self, glob::PatternError> {
        self.excluded_files.push(glob::Pattern::new(pattern)?);
        Ok(self)
    }

    pub fn skips_name(&self, name: &str) -> bool {
        self.markers.iter().any(|m| name.contains(m.as_str())) || self.patterns.iter().any(|re| re.is_match(name))
    }

    pub fn skips_file(&self, file: &str) -> bool {
        self.excluded_files.iter().any(|p| p.matches(file))
    }

    pub fn skips(&self, entry: &RegistryEntry) -> bool {
        if self.skips_name(&entry.name) {
            return true;
        }
        !self.excluded_files.is_empty() && entry.occurrences.iter().all(|o| self.skips_file(&o.source_file))
    }
}

/// Outcome of one (name, rule, direction) evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Skipped,
    NotApplicable,
    Satisfied,
    Violated { counterpart: String },
}

/// Expected dual of `name` under `rule` in `direction`, if the rule applies.
///
/// A name that already contains the target suffix anywhere is not a
/// candidate (`get_node_name_from_node_id` does not demand
/// `get_node_name_from_node_name`).
pub fn counterpart(name: &str, rule: &NamingRule, direction: Direction) -> Option<String> {
    let (from, to) = rule.suffixes(direction);
    let stem = name.strip_suffix(from)?;
    if name.contains(to) {
        return None;
    }
    Some(format!("{stem}{to}"))
}

pub fn evaluate(
    entry: &RegistryEntry,
    rule: &NamingRule,
    direction: Direction,
    registry: &SignatureRegistry,
    skip: &SkipPredicate,
) -> Check {
    if skip.skips(entry) {
        return Check::Skipped;
    }
    check_counterpart(&entry.name, rule, direction, registry)
}

/// [`evaluate`] for a name already known not to be skipped.
fn check_counterpart(name: &str, rule: &NamingRule, direction: Direction, registry: &SignatureRegistry) -> Check {
    match counterpart(name, rule, direction) {
        None => Check::NotApplicable,
        Some(c) if registry.contains(&c) => Check::Satisfied,
        Some(c) => Check::Violated { counterpart: c },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub function: String,
    pub missing_counterpart: String,
    pub rule: NamingRule,
    pub direction: Direction,
    /// First declaration of `function`.
    pub source_file: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub violations: Vec<Violation>,
    /// Distinct names examined.
    pub checked: usize,
    /// Names excluded by the skip predicate.
    pub skipped: usize,
    /// (name, rule, direction) checks whose counterpart exists.
    pub satisfied: usize,
}

/// Check every registry entry against every rule, both directions.
///
/// Output order: registry insertion order, then rule order, then `AtoB` before `BtoA`.
pub fn validate(registry: &SignatureRegistry, rules: &[NamingRule], skip: &SkipPredicate) -> Validation {
    let mut out = Validation::default();

    for entry in registry.iter() {
        out.checked += 1;
        if skip.skips(entry) {
            out.skipped += 1;
            continue;
        }
        for rule in rules {
            for direction in Direction::BOTH {
                // The skip predicate was settled once for this entry above.
                match check_counterpart(&entry.name, rule, direction, registry) {
                    Check::Skipped | Check::NotApplicable => {}
                    Check::Satisfied => out.satisfied += 1,
                    Check::Violated { counterpart } => {
                        let first = entry.first();
                        out.violations.push(Violation {
                            function: entry.name.clone(),
                            missing_counterpart: counterpart,
                            rule: rule.clone(),
                            direction,
                            source_file: first.source_file.clone(),
                            line: first.line,
                        });
                    }
                }
            }
        }
    }

    out
}
