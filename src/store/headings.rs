use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{RefError, Result};
use crate::types::Status;

/// A section heading in another spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub spec: Option<String>,
    pub text: String,
    pub url: String,
}

/// A value in a spec's heading file.
///
/// Single-page specs key `#id` directly to per-status headings. Multipage
/// specs key `#id` to the list of `/page#id` keys that share the fragment,
/// and each `/page#id` to its per-status headings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeadingEntry {
    Pages(Vec<String>),
    Statuses {
        #[serde(default)]
        current: Option<Heading>,
        #[serde(default)]
        snapshot: Option<Heading>,
    },
}

/// All section headings of one spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecHeadings {
    spec: String,
    data: BTreeMap<String, HeadingEntry>,
}

impl SpecHeadings {
    pub fn new(spec: &str, data: BTreeMap<String, HeadingEntry>) -> Self {
        Self {
            spec: spec.to_string(),
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Looks up the heading for `id` (`#frag` or `/page#frag`; a bare
    /// fragment gets a `#` prepended), preferring `status` and falling back to
    /// the other status.
    ///
    /// # Errors
    ///
    /// - `UnknownSection` if the spec has no such heading.
    /// - `AmbiguousSection` if a fragment appears on several pages.
    pub fn get(&self, id: &str, status: Status) -> Result<&Heading> {
        let key = if id.starts_with('#') || id.starts_with('/') {
            id.to_string()
        } else {
            format!("#{id}")
        };

        let unknown = || RefError::UnknownSection {
            spec: self.spec.clone(),
            id: key.clone(),
        };

        let (current, snapshot) = match self.data.get(&key) {
            Some(HeadingEntry::Statuses { current, snapshot }) => (current, snapshot),
            Some(HeadingEntry::Pages(pages)) => {
                if pages.len() != 1 {
                    return Err(RefError::AmbiguousSection {
                        spec: self.spec.clone(),
                        id: key.clone(),
                        candidates: pages.iter().map(|p| format!("{}{}", self.spec, p)).collect(),
                    });
                }
                match self.data.get(&pages[0]) {
                    Some(HeadingEntry::Statuses { current, snapshot }) => (current, snapshot),
                    _ => return Err(unknown()),
                }
            }
            None => return Err(unknown()),
        };

        let found = match status {
            Status::Current => current.as_ref().or(snapshot.as_ref()),
            Status::Snapshot => snapshot.as_ref().or(current.as_ref()),
        };
        found.ok_or_else(unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(url: &str) -> Heading {
        Heading {
            number: Some("2".to_string()),
            spec: Some("Foo 1".to_string()),
            text: "Intro".to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn falls_back_to_other_status() {
        let mut data = BTreeMap::new();
        data.insert(
            "#intro".to_string(),
            HeadingEntry::Statuses {
                current: None,
                snapshot: Some(heading("https://tr/foo/#intro")),
            },
        );
        let h = SpecHeadings::new("foo", data);
        assert_eq!(h.get("intro", Status::Current).unwrap().url, "https://tr/foo/#intro");
    }

    #[test]
    fn multipage_collisions_are_reported() {
        let mut data = BTreeMap::new();
        data.insert(
            "#x".to_string(),
            HeadingEntry::Pages(vec!["/a#x".to_string(), "/b#x".to_string()]),
        );
        let h = SpecHeadings::new("html", data);
        match h.get("#x", Status::Current) {
            Err(RefError::AmbiguousSection { candidates, .. }) => {
                assert_eq!(candidates, vec!["html/a#x", "html/b#x"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }
}
