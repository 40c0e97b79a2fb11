use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::errors::{RefError, Result};
use crate::messages::Messages;
use crate::types::{BiblioEntry, SpecData, Status};

use super::source::{group_from_key, parse_json, DataSource};

/// Path of the optional list of every known biblio key.
pub const BIBLIO_KEYS_FILE: &str = "biblio-keys.json";

/// Priority of entries from the document's own `biblio.json`.
pub const ORDER_LOCAL: u32 = 0;
/// Priority of entries from the refer-format database.
pub const ORDER_REFER: u32 = 1;
/// Priority of specref-format files shipped in the data directory.
pub const ORDER_SPECREF: u32 = 2;
/// Priority of entries built into the engine.
pub const ORDER_BUILTIN: u32 = 3;

fn refer_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*%(\w)\s+(.*?)\s*$").expect("valid regex"))
}

fn versioned_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+)-\d+$").expect("valid regex"))
}

/// Parses refer-format bibliography data.
///
/// Each record is a block of `%X value` lines ended by a blank line. `%A`
/// and `%Q` accumulate; every other code sets one field. Lines starting with
/// `#` or `%#` are comments. Records without a key (`%L`) or title (`%T`)
/// are skipped.
pub fn parse_refer(text: &str, source_name: &str) -> Result<Vec<BiblioEntry>> {
    let mut entries = Vec::new();
    let mut current: Option<BiblioEntry> = None;

    let finish = |entry: Option<BiblioEntry>, entries: &mut Vec<BiblioEntry>| {
        if let Some(entry) = entry {
            if entry.valid() {
                entries.push(entry);
            } else {
                tracing::debug!(
                    "skipping incomplete biblio record '{}' in {}",
                    entry.key,
                    source_name
                );
            }
        }
    };

    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            finish(current.take(), &mut entries);
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with("%#") {
            continue;
        }

        let caps = refer_line_re().captures(line).ok_or_else(|| RefError::Parse {
            message: format!("biblio line in unexpected format: {trimmed}"),
            source_name: source_name.to_string(),
            line: Some(i + 1),
        })?;
        let value = caps[2].to_string();
        let entry = current.get_or_insert_with(|| BiblioEntry {
            order: ORDER_REFER,
            ..BiblioEntry::default()
        });

        match &caps[1] {
            "A" => entry.authors.push(value),
            "Q" => entry.foreign_authors.push(value),
            "B" => entry.book_name = Some(value),
            "C" => entry.city = Some(value),
            "D" => entry.date = Some(value),
            "I" => entry.publisher = Some(value),
            "J" => entry.journal = Some(value),
            "L" => entry.key = value.to_lowercase(),
            "N" => entry.number_in_volume = Some(value),
            "O" => entry.other = Some(value),
            "P" => entry.page_number = Some(value),
            "R" => entry.report_number = Some(value),
            "S" => entry.status = Some(value),
            "T" => entry.title = value,
            "U" => entry.url = Some(value),
            "V" => entry.volume_number = Some(value),
            "X" => entry.abstract_text = Some(value),
            other => {
                return Err(RefError::Parse {
                    message: format!("unknown biblio field code '%{other}'"),
                    source_name: source_name.to_string(),
                    line: Some(i + 1),
                })
            }
        }
    }
    finish(current.take(), &mut entries);

    Ok(entries)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpecrefRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    et_al: bool,
    #[serde(default)]
    raw_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(default)]
    alias_of: Option<String>,
    #[serde(default)]
    obsoleted_by: Vec<String>,
    #[serde(default)]
    preferred_alias: Option<String>,
}

/// Entries and alias pairs parsed from a specref-format JSON file.
#[derive(Debug, Default)]
pub struct SpecrefData {
    pub entries: Vec<BiblioEntry>,
    /// `(alias, target)` pairs from `aliasOf` records.
    pub aliases: Vec<(String, String)>,
}

/// Parses specref-format JSON: an object of key → record.
pub fn parse_specref_json(text: &str, source_name: &str, order: u32) -> Result<SpecrefData> {
    let records: BTreeMap<String, SpecrefRecord> = parse_json(source_name, text)?;
    let mut data = SpecrefData::default();

    for (key, record) in records {
        let key = key.to_lowercase();
        if let Some(target) = record.alias_of {
            data.aliases.push((key, target.to_lowercase()));
            continue;
        }
        let Some(title) = record.title else {
            tracing::warn!("biblio entry '{}' in {} has no title; skipping", key, source_name);
            continue;
        };
        data.entries.push(BiblioEntry {
            key,
            title,
            url: record.href,
            authors: record.authors,
            et_al: record.et_al,
            date: record.raw_date,
            status: record.status,
            publisher: record.publisher,
            preferred_alias: record.preferred_alias,
            superseded_by: record.obsoleted_by.first().map(|k| k.to_lowercase()),
            order,
            ..BiblioEntry::default()
        });
    }

    Ok(data)
}

/// Result of finding a key, before obsoletion is considered.
enum KeyMatch {
    Found(BiblioEntry),
    /// `foo-N` was asked for but only other numbered versions of `foo` exist.
    WrongVersion(Vec<String>),
    Missing,
}

/// Bibliography entries keyed by lowercase key, loaded lazily from the
/// refer-format database.
pub struct BiblioStore {
    source: Rc<dyn DataSource>,
    entries: HashMap<String, Vec<BiblioEntry>>,
    /// Alternate key → target key.
    aliases: HashMap<String, String>,
    loaded_groups: HashSet<String>,
    known_keys: BTreeSet<String>,
    specs: HashMap<String, SpecData>,
}

impl BiblioStore {
    /// Opens the store: loads the key list and every specref JSON file in
    /// `biblio/`; refer data loads lazily per key group.
    pub fn open(source: Rc<dyn DataSource>) -> Result<Self> {
        let mut store = Self::empty(source.clone());

        if let Some(contents) = source.fetch(BIBLIO_KEYS_FILE)? {
            let keys: Vec<String> = parse_json(BIBLIO_KEYS_FILE, &contents)?;
            store
                .known_keys
                .extend(keys.into_iter().map(|k| k.to_lowercase()));
        }

        for name in source.list("biblio")? {
            if !name.ends_with(".json") {
                continue;
            }
            let path = format!("biblio/{name}");
            if let Some(contents) = source.fetch(&path)? {
                store.add_specref_json(&contents, &path, ORDER_SPECREF)?;
            }
        }

        Ok(store)
    }

    /// A store with only the built-in entries.
    pub fn empty(source: Rc<dyn DataSource>) -> Self {
        let mut store = Self {
            source,
            entries: HashMap::new(),
            aliases: HashMap::new(),
            loaded_groups: HashSet::new(),
            known_keys: BTreeSet::new(),
            specs: HashMap::new(),
        };
        // Used by nearly every boilerplate; avoids loading the whole `rf` group.
        store.add_entry(BiblioEntry {
            key: "rfc2119".to_string(),
            title: "Key words for use in RFCs to Indicate Requirement Levels".to_string(),
            snapshot_url: Some("https://datatracker.ietf.org/doc/html/rfc2119".to_string()),
            authors: vec!["S. Bradner".to_string()],
            date: Some("March 1997".to_string()),
            status: Some("Best Current Practice".to_string()),
            order: ORDER_BUILTIN,
            ..BiblioEntry::default()
        });
        store
    }

    /// Supplies the specs table used to synthesize entries for specs that
    /// have anchor data but no bibliography record.
    pub fn set_specs(&mut self, specs: HashMap<String, SpecData>) {
        self.specs = specs;
    }

    pub fn add_entry(&mut self, entry: BiblioEntry) {
        let key = entry.key.to_lowercase();
        if let Some(alias) = &entry.preferred_alias {
            let alias = alias.to_lowercase();
            if alias != key {
                self.aliases.entry(alias.clone()).or_insert_with(|| key.clone());
                self.known_keys.insert(alias);
            }
        }
        self.known_keys.insert(key.clone());
        let bucket = self.entries.entry(key).or_default();
        bucket.push(entry);
        bucket.sort_by_key(|e| e.order);
    }

    pub fn add_alias(&mut self, alias: &str, target: &str) {
        let alias = alias.to_lowercase();
        self.known_keys.insert(alias.clone());
        self.aliases.insert(alias, target.to_lowercase());
    }

    /// Adds every entry and alias from a specref-format JSON document.
    pub fn add_specref_json(&mut self, text: &str, source_name: &str, order: u32) -> Result<usize> {
        let data = parse_specref_json(text, source_name, order)?;
        let count = data.entries.len();
        for entry in data.entries {
            self.add_entry(entry);
        }
        for (alias, target) in data.aliases {
            self.add_alias(&alias, &target);
        }
        Ok(count)
    }

    fn ensure_group(&mut self, key: &str) -> Result<()> {
        let group = group_from_key(key);
        if !self.loaded_groups.insert(group.clone()) {
            return Ok(());
        }
        let path = format!("biblio/biblio-{group}.data");
        if let Some(contents) = self.source.fetch(&path)? {
            let entries = parse_refer(&contents, &path)?;
            tracing::debug!("loaded {} biblio entries from {}", entries.len(), path);
            for entry in entries {
                self.add_entry(entry);
            }
        }
        Ok(())
    }

    fn exact(&mut self, key: &str) -> Result<Option<BiblioEntry>> {
        self.ensure_group(key)?;
        Ok(self.entries.get(key).and_then(|b| b.first()).cloned())
    }

    /// Exact key, then alias.
    fn direct(&mut self, key: &str) -> Result<Option<BiblioEntry>> {
        if let Some(entry) = self.exact(key)? {
            return Ok(Some(entry));
        }
        match self.aliases.get(key).cloned() {
            Some(target) => self.exact(&target),
            None => Ok(None),
        }
    }

    fn find_key(&mut self, key: &str) -> Result<KeyMatch> {
        if let Some(entry) = self.direct(key)? {
            return Ok(KeyMatch::Found(entry));
        }

        // `[[foo-1]]` when only the unversioned `foo` exists. If numbered
        // versions of `foo` exist, the requested one is simply wrong.
        if let Some(caps) = versioned_key_re().captures(key) {
            let base = caps[1].to_string();
            let prefix = format!("{base}-");
            let versions: Vec<String> = self
                .known_keys
                .iter()
                .filter(|k| {
                    k.strip_prefix(&prefix)
                        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            if let Some(entry) = self.direct(&base)? {
                if versions.is_empty() {
                    return Ok(KeyMatch::Found(entry));
                }
                return Ok(KeyMatch::WrongVersion(versions));
            }
        }

        Ok(KeyMatch::Missing)
    }

    /// Looks up a bibliography entry.
    ///
    /// Tries the exact key, then aliases, then the unversioned key. Unless
    /// `allow_obsolete`, an entry that is superseded is replaced by its
    /// successor (one hop only). If nothing is found and `generate_fake` is
    /// set, an entry is synthesized from the specs table or, failing that, a
    /// placeholder titled with the key. Failures are reported to `messages`
    /// unless `quiet`.
    pub fn get_biblio(
        &mut self,
        key: &str,
        status: Status,
        allow_obsolete: bool,
        generate_fake: bool,
        quiet: bool,
        messages: &mut Messages,
    ) -> Result<Option<BiblioEntry>> {
        let key = key.trim().to_lowercase();

        let found = match self.find_key(&key)? {
            KeyMatch::Found(entry) => entry,
            KeyMatch::WrongVersion(versions) => {
                if generate_fake {
                    return Ok(Some(self.fake_entry(&key, status)));
                }
                if !quiet {
                    messages.fatal(
                        format!(
                            "A biblio link references {}, but only {} exists in the bibliography data.",
                            key,
                            english_list(&versions)
                        ),
                        None,
                    );
                }
                return Ok(None);
            }
            KeyMatch::Missing => {
                if generate_fake {
                    return Ok(Some(self.fake_entry(&key, status)));
                }
                if !quiet {
                    let suggestions = self.suggest(&key, 5);
                    let mut text = format!("Couldn't find '{key}' in bibliography data.");
                    if !suggestions.is_empty() {
                        text.push_str(" Did you mean:");
                        for s in suggestions {
                            text.push_str(&format!("\n  {s}"));
                        }
                    }
                    messages.link_error(text, None);
                }
                return Ok(None);
            }
        };

        let Some(next) = found.superseded_by.clone() else {
            return Ok(Some(found));
        };
        if allow_obsolete {
            return Ok(Some(found));
        }
        match self.direct(&next)? {
            Some(replacement) => {
                if !quiet {
                    messages.link_error(
                        format!(
                            "Obsolete biblio ref: [{}] is replaced by [{}]. Either update the reference, or use [{} obsolete] if this is an intentionally-obsolete reference.",
                            found.key, replacement.key, found.key
                        ),
                        None,
                    );
                }
                Ok(Some(replacement))
            }
            None => {
                if !quiet {
                    messages.fatal(
                        format!(
                            "[{}] claims to be obsoleted by [{}], which doesn't exist. Either change the reference, or use [{} obsolete] to ignore the obsoletion chain.",
                            found.key, next, found.key
                        ),
                        None,
                    );
                }
                Ok(None)
            }
        }
    }

    fn fake_entry(&self, key: &str, status: Status) -> BiblioEntry {
        match self.specs.get(key) {
            Some(spec) => BiblioEntry {
                key: key.to_string(),
                title: spec.title.clone().unwrap_or_else(|| key.to_string()),
                url: spec.current_url.clone(),
                snapshot_url: spec.snapshot_url.clone(),
                status: Some(
                    match status {
                        Status::Current => "Editor's Draft",
                        Status::Snapshot => "Snapshot",
                    }
                    .to_string(),
                ),
                generated: true,
                ..BiblioEntry::default()
            },
            None => BiblioEntry {
                key: key.to_string(),
                title: key.to_string(),
                generated: true,
                ..BiblioEntry::default()
            },
        }
    }

    /// Known keys closest to `key` by edit distance, nearest first.
    pub fn suggest(&self, key: &str, limit: usize) -> Vec<String> {
        let max_distance = (key.chars().count() / 3).max(2);
        let mut scored: Vec<(usize, &String)> = self
            .known_keys
            .iter()
            .map(|k| (strsim::levenshtein(key, k), k))
            .filter(|(d, _)| *d <= max_distance)
            .collect();
        scored.sort();
        scored.into_iter().take(limit).map(|(_, k)| k.clone()).collect()
    }
}

fn english_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
