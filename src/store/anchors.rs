use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::errors::{RefError, Result};
use crate::index::normalize_text;
use crate::types::{Candidate, CandidateUrls, DfnType, LinkType, Origin, SpecData, SpecLevel};

use super::headings::SpecHeadings;
use super::source::{group_from_key, parse_json, DataSource};

/// Path of the specs table inside the data directory.
pub const SPECS_FILE: &str = "specs.json";

fn default_true() -> bool {
    true
}

/// One anchor as persisted in `anchors/anchors-<group>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub kind: String,
    pub spec_id: String,
    pub shortname: String,
    #[serde(default)]
    pub level: Option<SpecLevel>,
    #[serde(default, rename = "for")]
    pub for_scope: Vec<String>,
    #[serde(default = "default_true")]
    pub exported: bool,
    #[serde(default = "default_true")]
    pub normative: bool,
    #[serde(default)]
    pub current_url: Option<String>,
    #[serde(default)]
    pub snapshot_url: Option<String>,
}

impl AnchorRecord {
    /// `None` for anchor kinds this build does not know; newer anchor data
    /// can carry kinds that older builds skip.
    fn into_candidate(self, text: &str) -> Option<Candidate> {
        let kind = DfnType::from_str(&self.kind)?;
        Some(Candidate {
            text: normalize_text(text),
            kind,
            origin: Origin::External {
                spec_id: self.spec_id,
                shortname: self.shortname,
                level: self.level,
                urls: CandidateUrls {
                    current: self.current_url,
                    snapshot: self.snapshot_url,
                },
            },
            for_scope: self.for_scope.into_iter().map(|f| f.trim().to_string()).collect::<BTreeSet<_>>(),
            exported: self.exported,
            normative: self.normative,
        })
    }
}

/// Anchors drawn from other specs, loaded lazily from the anchor database.
pub struct ExternalAnchorStore {
    source: Rc<dyn DataSource>,
    specs: HashMap<String, SpecData>,
    anchors: HashMap<String, Vec<Candidate>>,
    loaded_groups: HashSet<String>,
    headings: HashMap<String, SpecHeadings>,
    /// Anchors with this shortname belong to the document being built and are
    /// never exported to it.
    own_shortname: Option<String>,
}

impl ExternalAnchorStore {
    /// Opens the store, loading the specs table eagerly.
    ///
    /// # Errors
    ///
    /// `MissingData` if `specs.json` is absent from the data source.
    pub fn open(source: Rc<dyn DataSource>) -> Result<Self> {
        let contents = source.fetch(SPECS_FILE)?.ok_or_else(|| RefError::MissingData {
            message: format!("no '{}' in spec data at {}", SPECS_FILE, source.describe()),
            hint: "run the spec-data update to download the anchor database".to_string(),
        })?;
        let specs: HashMap<String, SpecData> = parse_json(SPECS_FILE, &contents)?;
        tracing::debug!("loaded {} specs from {}", specs.len(), source.describe());
        Ok(Self::with_specs(source, specs))
    }

    /// Creates a store over an explicit specs table.
    pub fn with_specs(source: Rc<dyn DataSource>, specs: HashMap<String, SpecData>) -> Self {
        Self {
            source,
            specs,
            anchors: HashMap::new(),
            loaded_groups: HashSet::new(),
            headings: HashMap::new(),
            own_shortname: None,
        }
    }

    /// Marks anchors from the document's own spec as unexported, so terms
    /// removed from the local copy don't resurrect from the published one.
    pub fn suppress_shortname(&mut self, shortname: &str) {
        let shortname = shortname.trim();
        if shortname.is_empty() {
            return;
        }
        self.own_shortname = Some(shortname.to_string());
        for cands in self.anchors.values_mut() {
            for c in cands.iter_mut() {
                if c.shortname() == Some(shortname) {
                    c.exported = false;
                }
            }
        }
    }

    /// Adds a single anchor directly, bypassing the database.
    pub fn add_candidate(&mut self, mut candidate: Candidate) {
        candidate.text = normalize_text(&candidate.text);
        if self.own_shortname.is_some() && candidate.shortname() == self.own_shortname.as_deref() {
            candidate.exported = false;
        }
        self.anchors
            .entry(candidate.text.clone())
            .or_default()
            .push(candidate);
    }

    pub fn add_spec(&mut self, spec_id: &str, data: SpecData) {
        self.specs.insert(spec_id.to_string(), data);
    }

    pub fn spec(&self, spec_id: &str) -> Option<&SpecData> {
        self.specs.get(spec_id)
    }

    pub fn specs(&self) -> &HashMap<String, SpecData> {
        &self.specs
    }

    /// Returns `true` if the spec publishes a current (editor's draft) URL.
    /// Unknown specs count as snapshot-only.
    pub fn spec_has_current_url(&self, spec_id: &str) -> bool {
        self.specs
            .get(spec_id)
            .map(|s| s.current_url.is_some())
            .unwrap_or(false)
    }

    /// Exact, normalized lookup of anchors whose kind `kind` accepts, loading
    /// the text's group from the database on first use.
    pub fn find(&mut self, kind: LinkType, text: &str) -> Result<Vec<Candidate>> {
        let key = normalize_text(text);
        self.ensure_group(&key)?;
        Ok(self
            .anchors
            .get(&key)
            .map(|cands| {
                cands
                    .iter()
                    .filter(|c| kind.accepts(c.kind))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn ensure_group(&mut self, key: &str) -> Result<()> {
        let group = group_from_key(key);
        if self.loaded_groups.contains(&group) {
            return Ok(());
        }
        let path = format!("anchors/anchors-{group}.json");
        if let Some(contents) = self.source.fetch(&path)? {
            let records: BTreeMap<String, Vec<AnchorRecord>> = parse_json(&path, &contents)?;
            let mut candidates = Vec::new();
            let mut skipped = 0;
            for (text, anchors) in records {
                for record in anchors {
                    let kind = record.kind.clone();
                    match record.into_candidate(&text) {
                        Some(candidate) => candidates.push(candidate),
                        None => {
                            tracing::warn!("skipping anchor '{}' in {}: unknown type '{}'", text, path, kind);
                            skipped += 1;
                        }
                    }
                }
            }
            tracing::debug!(
                "loaded {} anchors from {} ({} skipped)",
                candidates.len(),
                path,
                skipped
            );
            for candidate in candidates {
                self.add_candidate(candidate);
            }
        }
        self.loaded_groups.insert(group);
        Ok(())
    }

    /// Returns the section headings of `spec`, loading them on first use.
    /// A spec without heading data yields an empty set.
    pub fn fetch_headings(&mut self, spec: &str) -> Result<&SpecHeadings> {
        if !self.headings.contains_key(spec) {
            let path = format!("headings/headings-{spec}.json");
            let headings = match self.source.fetch(&path)? {
                Some(contents) if !contents.trim().is_empty() => {
                    SpecHeadings::new(spec, parse_json(&path, &contents)?)
                }
                _ => SpecHeadings::new(spec, BTreeMap::new()),
            };
            self.headings.insert(spec.to_string(), headings);
        }
        Ok(&self.headings[spec])
    }
}
