use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;

use crate::config::{DocumentMetadata, RefsConfig};
use crate::errors::{FailureStage, RefError, Result};
use crate::index::{link_text_variations, normalize_text, DefinitionIndex, LocalDefinition};
use crate::messages::Messages;
use crate::store::{BiblioStore, DataSource, ExternalAnchorStore, Heading};
use crate::types::*;

use super::defaults::{
    parse_ignored_specs_block, parse_link_default_block, parse_link_defaults, DefaultSpecTable,
};
use super::report::{multiple_local_message, multiple_refs_message, simplify};
use super::usages::Usages;

/// Lifecycle of a resolver. Definitions are accepted only while collecting;
/// links are answered only after sealing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Collecting,
    Sealed,
    Resolving,
}

/// A request for a bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiblioRequest {
    pub key: String,
    pub status: Option<Status>,
    pub allow_obsolete: bool,
    pub generate_fake: bool,
    pub quiet: bool,
    pub normative: bool,
}

impl BiblioRequest {
    pub fn new(key: impl Into<String>) -> Self {
        BiblioRequest {
            key: key.into(),
            status: None,
            allow_obsolete: false,
            generate_fake: false,
            quiet: false,
            normative: false,
        }
    }

    pub fn normative(mut self) -> Self {
        self.normative = true;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn allow_obsolete(mut self) -> Self {
        self.allow_obsolete = true;
        self
    }

    pub fn generate_fake(mut self) -> Self {
        self.generate_fake = true;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}

/// The fully-defaulted form of a [`LinkRequest`], after `Link Defaults`
/// have been applied.
struct Query {
    kind: LinkType,
    text: String,
    spec: Option<String>,
    status: Status,
    for_scope: BTreeSet<String>,
}

/// Resolves autolinks and biblio references for one document build.
///
/// Owns the document's definition index and the external stores. A build
/// adds every local definition, calls [`seal`](Self::seal), and only then
/// resolves links; the order is checked at runtime.
pub struct ReferenceResolver {
    state: ResolverState,
    local: DefinitionIndex,
    external: ExternalAnchorStore,
    biblio: BiblioStore,
    defaults: DefaultSpecTable,
    ignored_specs: HashSet<String>,
    replaced_specs: Vec<(String, String)>,
    default_status: Status,
    shortname: String,
    vshortname: String,
    messages: Messages,
    usages: Usages,
}

impl ReferenceResolver {
    /// Creates a resolver over already-opened stores.
    ///
    /// Malformed `Link Defaults` metadata or blocks are reported as fatal
    /// messages; the well-formed parts still apply.
    pub fn new(
        mut external: ExternalAnchorStore,
        mut biblio: BiblioStore,
        config: &RefsConfig,
        metadata: &DocumentMetadata,
    ) -> Self {
        let mut messages = Messages::new(config.die_on);
        external.suppress_shortname(&metadata.shortname);
        biblio.set_specs(external.specs().clone());

        let mut defaults = DefaultSpecTable::new();
        for value in &metadata.link_defaults {
            match parse_link_defaults(value) {
                Ok(rules) => defaults.extend(rules),
                Err(e) => {
                    messages.fatal(e.to_string(), None);
                }
            }
        }
        if !metadata.link_default_blocks.is_empty() {
            match parse_link_default_block(&metadata.link_default_blocks, None) {
                Ok(rules) => defaults.extend(rules),
                Err(e) => {
                    messages.fatal(e.to_string(), None);
                }
            }
        }

        let mut ignored_specs: HashSet<String> =
            config.ignored_specs.iter().map(|s| s.to_lowercase()).collect();
        let mut replaced_specs = config.replaced_specs.clone();
        if !metadata.ignored_spec_blocks.is_empty() {
            match parse_ignored_specs_block(&metadata.ignored_spec_blocks, None) {
                Ok(block) => {
                    ignored_specs.extend(block.ignored);
                    for pair in block.replaced {
                        if !replaced_specs.contains(&pair) {
                            replaced_specs.push(pair);
                        }
                    }
                }
                Err(e) => {
                    messages.fatal(e.to_string(), None);
                }
            }
        }

        tracing::debug!(
            "resolver for '{}': {} link defaults, {} ignored specs",
            metadata.vshortname(),
            defaults.len(),
            ignored_specs.len()
        );

        Self {
            state: ResolverState::Collecting,
            local: DefinitionIndex::new(),
            external,
            biblio,
            defaults,
            ignored_specs,
            replaced_specs,
            default_status: metadata.ref_status(),
            shortname: metadata.shortname.trim().to_lowercase(),
            vshortname: metadata.vshortname().to_lowercase(),
            messages,
            usages: Usages::new(),
        }
    }

    /// Opens the stores from `source` and creates a resolver over them.
    ///
    /// # Errors
    ///
    /// `MissingData` if the source has no specs table.
    pub fn open(
        source: Rc<dyn DataSource>,
        config: &RefsConfig,
        metadata: &DocumentMetadata,
    ) -> Result<Self> {
        let external = ExternalAnchorStore::open(source.clone())?;
        let biblio = BiblioStore::open(source)?;
        Ok(Self::new(external, biblio, config, metadata))
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut Messages {
        &mut self.messages
    }

    pub fn usages(&self) -> &Usages {
        &self.usages
    }

    pub fn local_definitions(&self) -> &DefinitionIndex {
        &self.local
    }

    pub fn biblio_mut(&mut self) -> &mut BiblioStore {
        &mut self.biblio
    }

    pub fn default_status(&self) -> Status {
        self.default_status
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Registers one of the document's own definitions.
    ///
    /// # Errors
    ///
    /// - `Phase` once the resolver has been sealed.
    /// - `DuplicateDefinition` / `ConflictingLinkText` from the index.
    pub fn add_local_definition(&mut self, dfn: &LocalDefinition) -> Result<usize> {
        if self.state != ResolverState::Collecting {
            return Err(RefError::Phase {
                message: format!(
                    "cannot add definition '#{}' once link resolution has started",
                    dfn.id
                ),
            });
        }
        self.local.insert(dfn)
    }

    /// Ends definition collection. Calling it again is a no-op.
    pub fn seal(&mut self) {
        if self.state == ResolverState::Collecting {
            self.local.seal();
            self.state = ResolverState::Sealed;
            tracing::debug!("sealed {} local definitions", self.local.len());
        }
    }

    fn begin_resolving(&mut self, what: &str) -> Result<()> {
        match self.state {
            ResolverState::Collecting => Err(RefError::Phase {
                message: format!(
                    "'{what}' was looked up while local definitions are still being collected"
                ),
            }),
            ResolverState::Sealed => {
                self.state = ResolverState::Resolving;
                Ok(())
            }
            ResolverState::Resolving => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Autolinks
    // ------------------------------------------------------------------

    /// Resolves an autolink to a single URL.
    ///
    /// Applies `Link Defaults`, gathers candidates (trying spelling variants
    /// for `dfn` and `maybe` links), filters them by for-scope, spec,
    /// ignored specs and status, then picks one. Ambiguity is never an
    /// error: a warning is emitted and the first candidate in stable order
    /// wins.
    ///
    /// # Errors
    ///
    /// - `Phase` if called before [`seal`](Self::seal).
    /// - `NotFound` if nothing survives filtering. A link error is reported
    ///   unless the request is silent or a `maybe` link.
    pub fn get_ref(&mut self, req: &LinkRequest) -> Result<ResolvedRef> {
        self.begin_resolving(&req.text)?;
        let query = self.apply_defaults(req);

        if matches!(
            query.kind,
            LinkType::Propdesc
                | LinkType::Exact(DfnType::Property)
                | LinkType::Exact(DfnType::Descriptor)
        ) && query.text.starts_with("--")
        {
            // Custom properties are never defined anywhere.
            return Err(RefError::NotFound {
                kind: query.kind.to_string(),
                text: query.text,
                stage: FailureStage::Text,
            });
        }

        let mut candidates = self.gather(&query)?;
        if candidates.is_empty() {
            return Err(self.fail(req, &query, FailureStage::Text));
        }

        if query.for_scope.is_empty() {
            candidates.retain(|c| c.for_scope.is_empty());
        } else {
            candidates.retain(|c| query.for_scope.is_subset(&c.for_scope));
        }
        if candidates.is_empty() {
            return Err(self.fail(req, &query, FailureStage::For));
        }

        match &query.spec {
            Some(spec) => {
                candidates.retain(|c| {
                    c.is_local()
                        || c.spec_id() == Some(spec.as_str())
                        || c.shortname() == Some(spec.as_str())
                });
                if candidates.is_empty() {
                    return Err(self.fail(req, &query, FailureStage::Spec));
                }
            }
            None => {
                candidates.retain(|c| c.is_local() || c.exported);
                if candidates.is_empty() {
                    return Err(self.fail(req, &query, FailureStage::Export));
                }
            }
        }

        self.filter_obsolete(&mut candidates, query.spec.is_none());
        if candidates.is_empty() {
            return Err(self.fail(req, &query, FailureStage::IgnoredSpecs));
        }

        let resolved: Vec<ResolvedRef> = candidates
            .into_iter()
            .filter_map(|c| self.url_for(c, query.status))
            .collect();
        if resolved.is_empty() {
            return Err(self.fail(req, &query, FailureStage::Status));
        }

        let winner = self.disambiguate(req, &query, resolved);
        if let Origin::External { spec_id, .. } = &winner.candidate.origin {
            let normative = req.normative && winner.candidate.normative;
            self.usages.record_spec(spec_id, normative);
            // The spec reached here belongs in the references list; specs
            // without bibliography data get an entry built from the specs table.
            let entry = self.biblio.get_biblio(
                spec_id,
                query.status,
                false,
                true,
                true,
                &mut self.messages,
            )?;
            if let Some(entry) = entry {
                self.usages.record_biblio(&entry, normative);
            }
        }
        tracing::debug!(
            "resolved {} '{}' to {}",
            query.kind,
            query.text,
            winner.url
        );
        Ok(winner)
    }

    fn apply_defaults(&self, req: &LinkRequest) -> Query {
        let mut query = Query {
            kind: req.kind,
            text: normalize_text(&req.text),
            spec: req.spec.as_ref().map(|s| s.trim().to_lowercase()),
            status: self.default_status,
            for_scope: req
                .for_scope
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty() && f != "/")
                .collect(),
        };
        let mut status = req.status;

        if query.spec.is_none() || status.is_none() {
            if let Some(rule) = self.defaults.lookup(&query.text, query.kind, &query.for_scope) {
                tracing::debug!(
                    "link default for '{}': {} ({})",
                    query.text,
                    rule.spec_id,
                    rule.kind
                );
                if query.spec.is_none() {
                    query.spec = Some(rule.spec_id.to_lowercase());
                }
                status = status.or(rule.status);
                if query.for_scope.is_empty() {
                    if let Some(f) = &rule.for_scope {
                        query.for_scope.insert(f.clone());
                    }
                }
                query.kind = LinkType::Exact(rule.kind);
            }
        }

        query.status = status.unwrap_or(self.default_status);
        query
    }

    /// Local and external hits for the first text variant that has any.
    fn gather(&mut self, query: &Query) -> Result<Vec<Candidate>> {
        let texts = if query.kind.uses_variants() {
            link_text_variations(&query.text)
        } else {
            vec![query.text.clone()]
        };
        for text in texts {
            let mut hits: Vec<Candidate> = self
                .local
                .find(query.kind, &text)?
                .into_iter()
                .cloned()
                .collect();
            hits.extend(self.external.find(query.kind, &text)?);
            if !hits.is_empty() {
                if text != query.text {
                    tracing::debug!("'{}' matched via variant '{}'", query.text, text);
                }
                return Ok(hits);
            }
        }
        Ok(Vec::new())
    }

    /// Drops ignored specs, the document's own published copy, and
    /// replaced specs whose replacement is also on offer.
    fn filter_obsolete(&self, candidates: &mut Vec<Candidate>, apply_replacements: bool) {
        let mut dropped: HashSet<String> = HashSet::new();
        if apply_replacements {
            let mut present: HashSet<&str> =
                candidates.iter().filter_map(|c| c.spec_id()).collect();
            present.insert(self.vshortname.as_str());
            for (old, new) in &self.replaced_specs {
                if present.contains(new.as_str()) {
                    dropped.insert(old.clone());
                }
            }
        }
        candidates.retain(|c| match (c.spec_id(), c.shortname()) {
            (Some(spec_id), Some(shortname)) => {
                !self.ignored_specs.contains(spec_id)
                    && !dropped.contains(spec_id)
                    && (self.shortname.is_empty() || shortname != self.shortname)
            }
            _ => true,
        });
    }

    fn url_for(&self, candidate: Candidate, status: Status) -> Option<ResolvedRef> {
        let url = match &candidate.origin {
            Origin::Local { id, .. } => Some(format!("#{id}")),
            Origin::External { spec_id, urls, .. } => match status {
                Status::Current => urls.current.clone().or_else(|| {
                    if self.external.spec_has_current_url(spec_id) {
                        None
                    } else {
                        urls.snapshot.clone()
                    }
                }),
                Status::Snapshot => urls.snapshot.clone().or_else(|| urls.current.clone()),
            },
        }?;
        Some(ResolvedRef { url, candidate })
    }

    fn disambiguate(
        &mut self,
        req: &LinkRequest,
        query: &Query,
        mut resolved: Vec<ResolvedRef>,
    ) -> ResolvedRef {
        let locals: Vec<ResolvedRef> = resolved
            .iter()
            .filter(|r| r.candidate.is_local())
            .cloned()
            .collect();
        if let Some(first) = locals.first() {
            if locals.len() > 1 && req.allow_error {
                let message = multiple_local_message(&query.text, query.kind, &first.url, &locals);
                self.messages.warn(message, req.line);
            }
            return first.clone();
        }

        if resolved.len() > 1 {
            let first_shortname = resolved[0].candidate.shortname().map(|s| s.to_string());
            let same_shortname = resolved
                .iter()
                .all(|r| r.candidate.shortname().map(|s| s.to_string()) == first_shortname);
            if same_shortname {
                let max_level = resolved
                    .iter()
                    .map(|r| r.candidate.level().cloned())
                    .max()
                    .flatten();
                resolved.retain(|r| r.candidate.level().cloned() == max_level);
            }
        }
        if resolved.len() == 1 {
            return resolved.remove(0);
        }

        let mut chosen = 0;
        if query.kind == LinkType::Propdesc {
            if let Some(i) = resolved
                .iter()
                .position(|r| r.candidate.kind == DfnType::Property)
            {
                chosen = i;
            }
        }
        if req.allow_error {
            let message = multiple_refs_message(
                &query.text,
                query.kind,
                &query.for_scope,
                &resolved[chosen].url,
                &simplify(&resolved, false),
            );
            self.messages.warn(message, req.line);
        }
        resolved.swap_remove(chosen)
    }

    fn fail(&mut self, req: &LinkRequest, query: &Query, stage: FailureStage) -> RefError {
        tracing::debug!(
            "no {} ref for '{}' ({})",
            query.kind,
            query.text,
            stage
        );
        let reportable = req.allow_error
            && req.kind != LinkType::Maybe
            && query.kind != LinkType::Exact(DfnType::ExtendedAttribute);
        if reportable {
            let (kind, text) = (query.kind, &query.text);
            let in_spec = match &query.spec {
                Some(spec) => format!(" in spec '{spec}'"),
                None => String::new(),
            };
            let message = match stage {
                FailureStage::Text => format!("No '{kind}' refs found for '{text}'."),
                FailureStage::Export => {
                    format!("No '{kind}' refs found for '{text}' that are marked for export.")
                }
                FailureStage::Spec => format!(
                    "No '{kind}' refs found for '{text}' with spec '{}'.",
                    query.spec.as_deref().unwrap_or_default()
                ),
                FailureStage::For => {
                    let scopes: Vec<&str> = query.for_scope.iter().map(|s| s.as_str()).collect();
                    format!(
                        "No '{kind}' refs found for '{text}' with for='{}'{in_spec}.",
                        scopes.join(", ")
                    )
                }
                FailureStage::Status => format!(
                    "No '{kind}' refs found for '{text}' compatible with status '{}'{in_spec}.",
                    query.status
                ),
                FailureStage::IgnoredSpecs => {
                    format!("The only '{kind}' refs for '{text}' were in ignored specs.")
                }
            };
            self.messages.link_error(message, req.line);
        }
        RefError::NotFound {
            kind: query.kind.to_string(),
            text: query.text.clone(),
            stage,
        }
    }

    // ------------------------------------------------------------------
    // Bibliography and sections
    // ------------------------------------------------------------------

    /// Looks up a bibliography entry and records its use.
    ///
    /// Failures are reported by the store unless the request is quiet;
    /// `Ok(None)` means nothing usable was found.
    pub fn get_biblio_ref(&mut self, req: &BiblioRequest) -> Result<Option<BiblioEntry>> {
        let status = req.status.unwrap_or(self.default_status);
        let entry = self.biblio.get_biblio(
            &req.key,
            status,
            req.allow_obsolete,
            req.generate_fake,
            req.quiet,
            &mut self.messages,
        )?;
        if let Some(entry) = &entry {
            self.usages.record_biblio(entry, req.normative);
        }
        Ok(entry)
    }

    /// Looks up a section heading of another spec, preferring `status` (or
    /// the document's default) and falling back to the other.
    ///
    /// # Errors
    ///
    /// `UnknownSection` or `AmbiguousSection`.
    pub fn get_section_ref(&mut self, spec: &str, id: &str, status: Option<Status>) -> Result<Heading> {
        let status = status.unwrap_or(self.default_status);
        let spec = spec.trim().to_lowercase();
        let heading = self.external.fetch_headings(&spec)?.get(id, status)?.clone();
        self.usages.record_spec(&spec, false);
        Ok(heading)
    }
}
