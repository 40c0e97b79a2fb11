use std::collections::{BTreeSet, HashMap};

use crate::errors::{RefError, Result};
use crate::types::{Candidate, DfnType, LinkType, Origin};

use super::variants::normalize_text;

/// Lifecycle of a [`DefinitionIndex`]. Definitions may only be added while
/// collecting; lookups are only answered once sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Sealed,
}

/// A definition found in the current document, before it is split into one
/// candidate per linking text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDefinition {
    /// Element id; the resolved URL is `#id`.
    pub id: String,
    pub kind: DfnType,
    /// Pipe-separated linking texts. The first is the primary one.
    pub lt: String,
    /// Pipe-separated texts that link only within this document.
    pub local_lt: Option<String>,
    pub for_scope: BTreeSet<String>,
    pub line: Option<u32>,
}

impl LocalDefinition {
    pub fn new(id: impl Into<String>, kind: DfnType, lt: impl Into<String>) -> Self {
        LocalDefinition {
            id: id.into(),
            kind,
            lt: lt.into(),
            local_lt: None,
            for_scope: BTreeSet::new(),
            line: None,
        }
    }

    pub fn with_for(mut self, scope: impl Into<String>) -> Self {
        self.for_scope.insert(scope.into());
        self
    }

    pub fn with_local_lt(mut self, local_lt: impl Into<String>) -> Self {
        self.local_lt = Some(local_lt.into());
        self
    }
}

fn split_texts(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(normalize_text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Saying a value is for `@foo/bar` also makes it for the bare `bar`.
fn expand_for_scope(scope: &BTreeSet<String>) -> BTreeSet<String> {
    let mut expanded = scope.clone();
    for value in scope {
        if let Some(rest) = value.strip_prefix('@') {
            if let Some((_, descriptor)) = rest.split_once('/') {
                let descriptor = descriptor.trim();
                if !descriptor.is_empty() {
                    expanded.insert(descriptor.to_string());
                }
            }
        }
    }
    expanded
}

/// Text → candidates index of the document's own definitions.
#[derive(Debug)]
pub struct DefinitionIndex {
    entries: HashMap<String, Vec<Candidate>>,
    phase: Phase,
    count: usize,
}

impl Default for DefinitionIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DefinitionIndex {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            phase: Phase::Collecting,
            count: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Ends collection. Further inserts fail; lookups become available.
    pub fn seal(&mut self) {
        self.phase = Phase::Sealed;
    }

    /// Number of candidates indexed (one per linking text).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Inserts one candidate per linking text of `dfn`.
    ///
    /// Returns the number of candidates added.
    ///
    /// # Errors
    ///
    /// - `Phase` if the index has been sealed.
    /// - `ConflictingLinkText` if a text appears in both `lt` and `local_lt`.
    /// - `DuplicateDefinition` if another local definition already claims the
    ///   same `(kind, text, for_scope)`.
    pub fn insert(&mut self, dfn: &LocalDefinition) -> Result<usize> {
        if self.phase != Phase::Collecting {
            return Err(RefError::Phase {
                message: format!(
                    "cannot add definition '#{}' after the definition index was sealed",
                    dfn.id
                ),
            });
        }

        let primary = split_texts(&dfn.lt);
        let local = dfn.local_lt.as_deref().map(split_texts).unwrap_or_default();
        if let Some(text) = primary.iter().find(|t| local.contains(t)) {
            return Err(RefError::ConflictingLinkText {
                text: text.clone(),
                site: format!("#{}", dfn.id),
            });
        }

        let for_scope = expand_for_scope(&dfn.for_scope);
        let texts = primary
            .into_iter()
            .map(|t| (t, true))
            .chain(local.into_iter().map(|t| (t, false)));

        let mut added = 0;
        for (text, exported) in texts {
            let existing = self.entries.entry(text.clone()).or_default();
            let mut same_element = false;
            for other in existing.iter() {
                if other.kind != dfn.kind || other.for_scope != for_scope {
                    continue;
                }
                if let Origin::Local { id, .. } = &other.origin {
                    if *id == dfn.id {
                        same_element = true;
                        continue;
                    }
                }
                let message = if for_scope.is_empty() {
                    format!(
                        "Multiple local '{}' <dfn>s have the same linking text '{}'.",
                        dfn.kind, text
                    )
                } else {
                    let scopes: Vec<&str> = for_scope.iter().map(|s| s.as_str()).collect();
                    format!(
                        "Multiple local '{}' <dfn>s for '{}' have the same linking text '{}'.",
                        dfn.kind,
                        scopes.join(", "),
                        text
                    )
                };
                let second = match dfn.line {
                    Some(line) => format!("#{} (line {line})", dfn.id),
                    None => format!("#{}", dfn.id),
                };
                return Err(RefError::DuplicateDefinition {
                    message,
                    first: other.site(),
                    second,
                });
            }
            if same_element {
                continue;
            }

            existing.push(Candidate {
                text,
                kind: dfn.kind,
                origin: Origin::Local {
                    id: dfn.id.clone(),
                    line: dfn.line,
                },
                for_scope: for_scope.clone(),
                exported,
                normative: true,
            });
            added += 1;
        }

        self.count += added;
        Ok(added)
    }

    /// Exact, normalized lookup of candidates whose kind `kind` accepts.
    ///
    /// Candidates are returned in insertion order.
    ///
    /// # Errors
    ///
    /// `Phase` if collection has not finished yet.
    pub fn find(&self, kind: LinkType, text: &str) -> Result<Vec<&Candidate>> {
        if self.phase != Phase::Sealed {
            return Err(RefError::Phase {
                message: format!(
                    "definition index queried for '{}' while definitions are still being collected",
                    text
                ),
            });
        }
        Ok(self
            .entries
            .get(&normalize_text(text))
            .map(|cands| cands.iter().filter(|c| kind.accepts(c.kind)).collect())
            .unwrap_or_default())
    }

    /// Returns `true` if any local definition uses `text`, regardless of
    /// kind. Usable in any phase.
    pub fn contains_text(&self, text: &str) -> bool {
        self.entries.contains_key(&normalize_text(text))
    }
}
