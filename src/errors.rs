use thiserror::Error;

/// Errors that can occur while indexing definitions or resolving references.
#[derive(Error, Debug)]
pub enum RefError {
    /// A link or definition kind that the engine does not know about.
    #[error("unknown link type '{kind}'")]
    UnknownKind { kind: String },

    #[error("unknown spec status '{status}'; status must be 'current' or 'snapshot'")]
    UnknownStatus { status: String },

    /// Two local definitions share `(kind, text, for_scope)`.
    #[error("{message} (first: {first}, second: {second})")]
    DuplicateDefinition {
        message: String,
        first: String,
        second: String,
    },

    #[error("the term '{text}' is in both lt and local-lt of the element '{site}'")]
    ConflictingLinkText { text: String, site: String },

    /// No candidate survived filtering. `stage` names the filter that
    /// eliminated the last candidates.
    #[error("no '{kind}' refs found for '{text}' ({stage})")]
    NotFound {
        kind: String,
        text: String,
        stage: FailureStage,
    },

    #[error("couldn't find section '{id}' in spec '{spec}'")]
    UnknownSection { spec: String, id: String },

    #[error("multiple headings with id '{id}' for spec '{spec}'; please specify one of: {}", candidates.join(", "))]
    AmbiguousSection {
        spec: String,
        id: String,
        candidates: Vec<String>,
    },

    #[error("phase error: {message}")]
    Phase { message: String },

    #[error("missing data: {message}; {hint}")]
    MissingData { message: String, hint: String },

    #[error("parse error: {message} (source: {source_name}, line: {line:?})")]
    Parse {
        message: String,
        source_name: String,
        line: Option<usize>,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The resolution stage at which a lookup ran out of candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Text,
    Export,
    For,
    Spec,
    IgnoredSpecs,
    Status,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Text => "no matching text",
            FailureStage::Export => "none exported",
            FailureStage::For => "for-scope mismatch",
            FailureStage::Spec => "spec mismatch",
            FailureStage::IgnoredSpecs => "only in ignored specs",
            FailureStage::Status => "incompatible status",
        }
    }
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RefError {
    /// Returns `true` for errors that must halt the build regardless of the
    /// caller's error policy.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RefError::NotFound { .. })
    }
}

/// Convenience alias for results using `RefError`.
pub type Result<T> = std::result::Result<T, RefError>;
