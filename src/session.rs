use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::{get_config_path, load_config, save_config, DocumentMetadata, RefsConfig};
use crate::errors::{RefError, Result};
use crate::linker::{collect_definitions, process_autolinks, LinkReport};
use crate::messages::Diagnostic;
use crate::resolution::ReferenceResolver;
use crate::store::{DataSource, DirectorySource, ORDER_LOCAL};
use crate::types::{BiblioEntry, Element};

/// Name of the optional document-local bibliography, in specref format.
pub const LOCAL_BIBLIO_FILE: &str = "biblio.json";

/// A document as handed over by the parsing stages: its metadata plus the
/// definition and autolink elements found in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub dfns: Vec<Element>,
    #[serde(default)]
    pub autolinks: Vec<Element>,
}

/// Result of linking one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResult {
    pub report: LinkReport,
    /// The document with its autolinks rewritten.
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
    /// `(spec_id, normative)` for every external spec linked to.
    pub specs_used: Vec<(String, bool)>,
    pub normative_references: Vec<BiblioEntry>,
    pub informative_references: Vec<BiblioEntry>,
    /// `true` if a diagnostic reached the configured die-on level.
    pub aborted: bool,
    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

/// Ties a project's configuration to its spec data.
pub struct LinkSession {
    config: RefsConfig,
    project_root: PathBuf,
    source: Rc<dyn DataSource>,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

impl LinkSession {
    /// Writes a default configuration for the project and opens it.
    ///
    /// The spec-data directory is not created; it is populated by the data
    /// update outside this crate.
    pub fn init(project_root: &Path) -> Result<Self> {
        let config = RefsConfig::default();
        save_config(project_root, &config)?;
        let source = Rc::new(DirectorySource::new(&config.data_path(project_root)));
        Ok(Self {
            config,
            project_root: project_root.to_path_buf(),
            source,
        })
    }

    /// Opens a project, loading its configuration (or the defaults).
    ///
    /// # Errors
    ///
    /// `MissingData` if the configured spec-data directory does not exist.
    pub fn open(project_root: &Path) -> Result<Self> {
        let config = load_config(project_root)?;
        let data_path = config.data_path(project_root);
        if !data_path.is_dir() {
            return Err(RefError::MissingData {
                message: format!("spec-data directory '{}' not found", data_path.display()),
                hint: format!(
                    "set 'data_dir' in '{}' or download the spec data into that directory",
                    get_config_path(project_root).display()
                ),
            });
        }
        let source = Rc::new(DirectorySource::new(&data_path));
        Ok(Self {
            config,
            project_root: project_root.to_path_buf(),
            source,
        })
    }

    /// Creates a session over an explicit data source.
    pub fn with_source(project_root: &Path, config: RefsConfig, source: Rc<dyn DataSource>) -> Self {
        Self {
            config,
            project_root: project_root.to_path_buf(),
            source,
        }
    }

    /// Returns `true` if the project has a configuration file.
    pub fn is_initialized(project_root: &Path) -> bool {
        get_config_path(project_root).exists()
    }

    pub fn config(&self) -> &RefsConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}

// ---------------------------------------------------------------------------
// Linking
// ---------------------------------------------------------------------------

impl LinkSession {
    /// Builds a resolver for a document with the given metadata, including
    /// the project's own `biblio.json` if there is one.
    pub fn resolver(&self, metadata: &DocumentMetadata) -> Result<ReferenceResolver> {
        let mut resolver = ReferenceResolver::open(self.source.clone(), &self.config, metadata)?;

        let local_biblio = self.project_root.join(LOCAL_BIBLIO_FILE);
        if local_biblio.is_file() {
            let contents = fs::read_to_string(&local_biblio)?;
            let added = resolver.biblio_mut().add_specref_json(
                &contents,
                &local_biblio.display().to_string(),
                ORDER_LOCAL,
            )?;
            tracing::debug!("loaded {} local biblio entries", added);
        }

        Ok(resolver)
    }

    /// Collects the document's definitions, then resolves all of its
    /// autolinks.
    pub fn link_document(&self, document: Document) -> Result<LinkResult> {
        let start = Instant::now();
        let mut document = document;
        let mut resolver = self.resolver(&document.metadata)?;

        let definitions = collect_definitions(&mut resolver, &document.dfns)?;
        resolver.seal();
        let mut report = process_autolinks(&mut resolver, &mut document.autolinks)?;
        report.definitions = definitions;

        let usages = resolver.usages();
        let result = LinkResult {
            report,
            diagnostics: resolver.messages().diagnostics().to_vec(),
            specs_used: usages.specs().to_vec(),
            normative_references: usages.normative_biblio().into_iter().cloned().collect(),
            informative_references: usages.informative_biblio().into_iter().cloned().collect(),
            aborted: resolver.messages().should_abort(),
            duration_ms: start.elapsed().as_millis() as u64,
            document,
        };

        tracing::info!(
            "linked '{}': {} definitions, {} links resolved, {} failed",
            result.document.metadata.vshortname(),
            result.report.definitions,
            result.report.resolved,
            result.report.failed
        );
        Ok(result)
    }
}
