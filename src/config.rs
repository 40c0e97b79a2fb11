use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{RefError, Result};
use crate::messages::DieOn;
use crate::types::{SpecLevel, Status};

/// Name of the configuration file stored inside the `.bikeshed` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory holding per-project settings.
pub const BIKESHED_DIR: &str = ".bikeshed";

/// Build-wide settings for the reference engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefsConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Directory holding the spec-data databases (`specs.json`, `anchors/`,
    /// `biblio/`, `headings/`). Relative paths are resolved against the
    /// project root.
    pub data_dir: String,
    /// Lowest message level that aborts the build.
    #[serde(default)]
    pub die_on: DieOn,
    /// Specs whose anchors are never linked to.
    #[serde(default)]
    pub ignored_specs: Vec<String>,
    /// `[old, new]` pairs: anchors from `old` are dropped whenever `new` is
    /// also a candidate.
    #[serde(default)]
    pub replaced_specs: Vec<(String, String)>,
    /// Retained for file compatibility; resolution is always deterministic.
    #[serde(default = "default_testing")]
    pub testing: bool,
}

fn default_testing() -> bool {
    true
}

impl Default for RefsConfig {
    fn default() -> Self {
        Self {
            version: 1,
            data_dir: default_data_dir().to_string_lossy().to_string(),
            die_on: DieOn::default(),
            ignored_specs: Vec::new(),
            replaced_specs: vec![("css21".to_string(), "css-display-3".to_string())],
            testing: true,
        }
    }
}

impl RefsConfig {
    /// Resolves `data_dir` against the project root.
    pub fn data_path(&self, project_root: &Path) -> PathBuf {
        let dir = Path::new(&self.data_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            project_root.join(dir)
        }
    }
}

/// The spec-data directory used when no configuration names one.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bikeshed-refs")
        .join("spec-data")
}

/// Metadata of the document being built that the engine needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub shortname: String,
    #[serde(default)]
    pub level: Option<SpecLevel>,
    /// Document status such as `ED`, `WD` or `CR`.
    #[serde(default)]
    pub status: String,
    /// Overrides the status derived from `status`.
    #[serde(default)]
    pub default_ref_status: Option<Status>,
    /// Raw `Link Defaults` metadata values.
    #[serde(default)]
    pub link_defaults: Vec<String>,
    /// Lines of `<pre class=link-defaults>` blocks.
    #[serde(default)]
    pub link_default_blocks: Vec<String>,
    /// Lines of `<pre class=ignored-specs>` blocks.
    #[serde(default)]
    pub ignored_spec_blocks: Vec<String>,
}

impl DocumentMetadata {
    /// The status unqualified links resolve against.
    pub fn ref_status(&self) -> Status {
        self.default_ref_status
            .unwrap_or_else(|| Status::for_document_status(&self.status))
    }

    /// Versioned shortname, e.g. `css-foo-3`.
    pub fn vshortname(&self) -> String {
        match &self.level {
            Some(level) => format!("{}-{}", self.shortname, level),
            None => self.shortname.clone(),
        }
    }
}

/// Returns the path to the `.bikeshed` directory within the given project root.
pub fn get_bikeshed_dir(project_root: &Path) -> PathBuf {
    project_root.join(BIKESHED_DIR)
}

/// Returns the path to the configuration file within the `.bikeshed` directory.
pub fn get_config_path(project_root: &Path) -> PathBuf {
    get_bikeshed_dir(project_root).join(CONFIG_FILENAME)
}

/// Loads the configuration from disk.
///
/// If the configuration file does not exist, returns the default
/// configuration.
pub fn load_config(project_root: &Path) -> Result<RefsConfig> {
    let config_path = get_config_path(project_root);

    if !config_path.exists() {
        return Ok(RefsConfig::default());
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| RefError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    let config: RefsConfig = serde_json::from_str(&contents).map_err(|e| RefError::Config {
        message: format!(
            "failed to parse config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    Ok(config)
}

/// Saves the configuration to disk using an atomic write.
///
/// Writes to a temporary file first and then renames it into place.
pub fn save_config(project_root: &Path, config: &RefsConfig) -> Result<()> {
    let bikeshed_dir = get_bikeshed_dir(project_root);
    fs::create_dir_all(&bikeshed_dir).map_err(|e| RefError::Config {
        message: format!(
            "failed to create directory '{}': {}",
            bikeshed_dir.display(),
            e
        ),
    })?;

    let config_path = get_config_path(project_root);
    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config).map_err(|e| RefError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;

    fs::write(&tmp_path, &json).map_err(|e| RefError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, &config_path).map_err(|e| RefError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
    })?;

    Ok(())
}
