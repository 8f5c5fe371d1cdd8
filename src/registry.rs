use std::collections::HashMap;

use crate::extractor::FunctionSignature;

/// Every occurrence of one logical function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub occurrences: Vec<FunctionSignature>,
}

impl RegistryEntry {
    /// Declaration reported for this name (first ingested).
    pub fn first(&self) -> &FunctionSignature {
        &self.occurrences[0]
    }
}

/// Insertion-ordered `name -> occurrences` map, built fresh for each run.
///
/// Single writer: only [`SignatureRegistry::ingest`] mutates it, and validation
/// only starts once every file has been ingested.
#[derive(Debug, Clone, Default)]
pub struct SignatureRegistry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
    /// `(entry, occurrence)` positions in ingestion order.
    order: Vec<(usize, usize)>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a file's signatures. A name seen before gains an occurrence instead
    /// of being replaced. Returns how many new names were added.
    pub fn ingest<I>(&mut self, signatures: I) -> usize
    where
        I: IntoIterator<Item = FunctionSignature>,
    {
        let mut added = 0;
        for sig in signatures {
            match self.index.get(&sig.name) {
                Some(&idx) => {
                    let occurrences = &mut self.entries[idx].occurrences;
                    self.order.push((idx, occurrences.len()));
                    occurrences.push(sig);
                }
                None => {
                    self.order.push((self.entries.len(), 0));
                    self.index.insert(sig.name.clone(), self.entries.len());
                    self.entries.push(RegistryEntry {
                        name: sig.name.clone(),
                        occurrences: vec![sig],
                    });
                    added += 1;
                }
            }
        }
        added
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.index.get(name).map(|&idx| &self.entries[idx])
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    /// Every occurrence in the order it was ingested.
    pub fn signatures(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.order
            .iter()
            .map(|&(entry, occurrence)| &self.entries[entry].occurrences[occurrence])
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn occurrence_count(&self) -> usize {
        self.order.len()
    }
}
