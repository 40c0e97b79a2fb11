//! Diagnostic sink shared by every stage of a build.
//!
//! Messages are deduplicated by their exact text: the same failure reported
//! for a hundred autolinks is emitted once. Each emitted message is forwarded
//! to `tracing` and counted, and the configured [`DieOn`] level decides
//! whether the build should stop.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    Fatal,
    LinkError,
    Warning,
    Message,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Fatal => "fatal",
            Level::LinkError => "link-error",
            Level::Warning => "warning",
            Level::Message => "message",
        }
    }
}

/// The lowest level that aborts a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DieOn {
    Nothing,
    #[default]
    Fatal,
    LinkError,
    Warning,
    Everything,
}

impl DieOn {
    /// Returns `true` if a message at `level` is severe enough to abort.
    pub fn triggers(&self, level: Level) -> bool {
        match self {
            DieOn::Nothing => false,
            DieOn::Fatal => level <= Level::Fatal,
            DieOn::LinkError => level <= Level::LinkError,
            DieOn::Warning => level <= Level::Warning,
            DieOn::Everything => true,
        }
    }
}

/// A single emitted diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub text: String,
    pub line: Option<u32>,
}

/// Collects and deduplicates diagnostics for one build.
#[derive(Debug, Default)]
pub struct Messages {
    die_on: DieOn,
    seen: HashSet<String>,
    emitted: Vec<Diagnostic>,
    tripped: bool,
}

impl Messages {
    pub fn new(die_on: DieOn) -> Self {
        Self {
            die_on,
            ..Self::default()
        }
    }

    /// Records a diagnostic. Returns `false` if an identical message was
    /// already emitted.
    pub fn report(&mut self, level: Level, text: impl Into<String>, line: Option<u32>) -> bool {
        let text = text.into();
        let formatted = match line {
            Some(line) => format!("LINE {line}: {text}"),
            None => text.clone(),
        };
        if !self.seen.insert(format!("{}|{}", level.as_str(), formatted)) {
            return false;
        }

        match level {
            Level::Fatal => tracing::error!("FATAL ERROR: {}", formatted),
            Level::LinkError => tracing::error!("LINK ERROR: {}", formatted),
            Level::Warning => tracing::warn!("{}", formatted),
            Level::Message => tracing::info!("{}", formatted),
        }

        if self.die_on.triggers(level) {
            self.tripped = true;
        }
        self.emitted.push(Diagnostic { level, text, line });
        true
    }

    pub fn fatal(&mut self, text: impl Into<String>, line: Option<u32>) -> bool {
        self.report(Level::Fatal, text, line)
    }

    pub fn link_error(&mut self, text: impl Into<String>, line: Option<u32>) -> bool {
        self.report(Level::LinkError, text, line)
    }

    pub fn warn(&mut self, text: impl Into<String>, line: Option<u32>) -> bool {
        self.report(Level::Warning, text, line)
    }

    /// Returns `true` once any message at or above the die-on level has been
    /// emitted.
    pub fn should_abort(&self) -> bool {
        self.tripped
    }

    pub fn count(&self, level: Level) -> usize {
        self.emitted.iter().filter(|d| d.level == level).count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.emitted
    }
}
