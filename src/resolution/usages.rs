use std::collections::HashMap;

use crate::types::BiblioEntry;

/// What a build actually linked to, in first-use order. Drives the
/// References section.
#[derive(Debug, Clone, Default)]
pub struct Usages {
    /// `(spec_id, normative)`.
    specs: Vec<(String, bool)>,
    normative: Vec<String>,
    informative: Vec<String>,
    entries: HashMap<String, BiblioEntry>,
}

impl Usages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a link into `spec_id`. A spec used normatively anywhere stays
    /// normative.
    pub fn record_spec(&mut self, spec_id: &str, normative: bool) {
        match self.specs.iter_mut().find(|(s, _)| s == spec_id) {
            Some((_, n)) => *n |= normative,
            None => self.specs.push((spec_id.to_string(), normative)),
        }
    }

    /// Records a citation. A normative citation moves an entry out of the
    /// informative list; an informative one never demotes it.
    pub fn record_biblio(&mut self, entry: &BiblioEntry, normative: bool) {
        let key = entry.display_key().to_lowercase();
        self.entries.entry(key.clone()).or_insert_with(|| entry.clone());
        if normative {
            self.informative.retain(|k| *k != key);
            if !self.normative.contains(&key) {
                self.normative.push(key);
            }
        } else if !self.normative.contains(&key) && !self.informative.contains(&key) {
            self.informative.push(key);
        }
    }

    pub fn specs(&self) -> &[(String, bool)] {
        &self.specs
    }

    pub fn normative_biblio(&self) -> Vec<&BiblioEntry> {
        self.normative.iter().filter_map(|k| self.entries.get(k)).collect()
    }

    pub fn informative_biblio(&self) -> Vec<&BiblioEntry> {
        self.informative.iter().filter_map(|k| self.entries.get(k)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty() && self.entries.is_empty()
    }
}
