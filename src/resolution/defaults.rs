use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{RefError, Result};
use crate::index::{link_text_variations, normalize_text};
use crate::types::{DefaultSpecRule, DfnType, LinkType, Status};

const METADATA_SOURCE: &str = "Link Defaults";

fn metadata_clause_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([\w\d-]+)\s+\(\s*([\w-]+)(?:\s*,?\s*(snapshot|current))?\s*\)\s+(.*)$")
            .expect("valid regex")
    })
}

fn info_piece_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^:]+):\s*(.*)$").expect("valid regex"))
}

/// One record of a `key: value; key: value` block. Keys may repeat.
pub type InfoRecord = BTreeMap<String, Vec<String>>;

/// Splits on `sep` except inside parentheses.
pub(crate) fn split_top_level(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Parses a `Link Defaults` metadata value:
/// `<spec> (<kind>[, <status>]) <term>/<term>, ...`.
pub fn parse_link_defaults(value: &str) -> Result<Vec<DefaultSpecRule>> {
    let mut rules = Vec::new();
    for clause in split_top_level(value, ',') {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        let caps = metadata_clause_re()
            .captures(clause)
            .ok_or_else(|| RefError::Parse {
                message: format!(
                    "'Link Defaults' is a comma-separated list of '<spec> (<dfn-type>) <terms>'. Got:\n{clause}"
                ),
                source_name: METADATA_SOURCE.to_string(),
                line: None,
            })?;
        let spec_id = caps[1].to_lowercase();
        let kind = DfnType::parse(&caps[2])?;
        let status = caps.get(3).map(|s| Status::parse(s.as_str())).transpose()?;
        for term in caps[4].split('/') {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            rules.push(DefaultSpecRule {
                term: term.to_string(),
                spec_id: spec_id.clone(),
                kind,
                status,
                for_scope: None,
            });
        }
    }
    Ok(rules)
}

/// Parses an info-tree block.
///
/// Each line holds `key: value` pieces separated by `;`. A line indented one
/// level (4 spaces or a tab) deeper than the previous one inherits that
/// line's pieces, so shared keys can be written once:
///
/// ```text
/// spec: css-foo-1; type: property
///     text: foo
///     text: bar
/// ```
///
/// Lines starting with `#` are comments. `first_line` is the line number of
/// the block's first line, used in errors.
pub fn parse_info_tree(lines: &[String], first_line: Option<usize>) -> Result<Vec<InfoRecord>> {
    const INDENT: usize = 4;

    fn flatten(levels: &[InfoRecord]) -> InfoRecord {
        let mut out = InfoRecord::new();
        for level in levels {
            for (k, v) in level {
                out.entry(k.clone()).or_default().extend(v.iter().cloned());
            }
        }
        out
    }

    let mut records = Vec::new();
    let mut levels: Vec<InfoRecord> = Vec::new();
    let mut last_depth: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        let line_no = first_line.map(|n| n + i);
        let text = line.trim_start();
        if text.trim().is_empty() || text.starts_with('#') {
            continue;
        }
        let ws = &line[..line.len() - text.len()];
        let width: usize = ws.chars().map(|c| if c == '\t' { INDENT } else { 1 }).sum();
        if width % INDENT != 0 {
            return Err(RefError::Parse {
                message: format!("line has inconsistent indentation; use tabs or {INDENT} spaces:\n{}", line.trim_end()),
                source_name: "info block".to_string(),
                line: line_no,
            });
        }
        let depth = width / INDENT;
        let max_depth = last_depth.map(|d| d + 1).unwrap_or(0);
        if depth > max_depth {
            return Err(RefError::Parse {
                message: format!("line jumps {} indent levels:\n{}", depth - max_depth + 1, text.trim_end()),
                source_name: "info block".to_string(),
                line: line_no,
            });
        }
        if let Some(last) = last_depth {
            if depth <= last {
                records.push(flatten(&levels[..=last]));
            }
        }

        let mut record = InfoRecord::new();
        for piece in text.split(';') {
            if piece.trim().is_empty() {
                continue;
            }
            let caps = info_piece_re().captures(piece.trim()).ok_or_else(|| RefError::Parse {
                message: format!("line doesn't match the grammar `k:v; k:v; k:v`:\n{}", text.trim_end()),
                source_name: "info block".to_string(),
                line: line_no,
            })?;
            record
                .entry(caps[1].trim().to_string())
                .or_default()
                .push(caps[2].trim().to_string());
        }
        levels.truncate(depth);
        levels.push(record);
        last_depth = Some(depth);
    }
    if let Some(last) = last_depth {
        records.push(flatten(&levels[..=last]));
    }

    Ok(records)
}

fn single<'a>(record: &'a InfoRecord, key: &str, what: &str, line: Option<usize>) -> Result<&'a str> {
    match record.get(key).map(|v| v.as_slice()) {
        Some([value]) => Ok(value.as_str()),
        _ => Err(RefError::Parse {
            message: format!("every {what} needs exactly one '{key}'. Got: {record:?}"),
            source_name: "info block".to_string(),
            line,
        }),
    }
}

/// Parses the lines of a `<pre class=link-defaults>` block.
///
/// Every record needs exactly one `spec`, `type` and `text`; `status` is
/// optional, and each `for` value yields its own rule.
pub fn parse_link_default_block(lines: &[String], first_line: Option<usize>) -> Result<Vec<DefaultSpecRule>> {
    let mut rules = Vec::new();
    for record in parse_info_tree(lines, first_line)? {
        let kind = DfnType::parse(single(&record, "type", "link default", first_line)?)?;
        let spec_id = single(&record, "spec", "link default", first_line)?.to_lowercase();
        let text = single(&record, "text", "link default", first_line)?.to_string();
        let status = match record.get("status").and_then(|v| v.first()) {
            Some(s) => Some(Status::parse(s)?),
            None => None,
        };
        let fors: Vec<Option<String>> = match record.get("for") {
            Some(values) if !values.is_empty() => values.iter().cloned().map(Some).collect(),
            _ => vec![None],
        };
        for for_scope in fors {
            rules.push(DefaultSpecRule {
                term: text.clone(),
                spec_id: spec_id.clone(),
                kind,
                status,
                for_scope,
            });
        }
    }
    Ok(rules)
}

/// Specs named in a `<pre class=ignored-specs>` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoredSpecs {
    pub ignored: Vec<String>,
    /// `(old, new)` pairs.
    pub replaced: Vec<(String, String)>,
}

/// Parses `spec: A; [replacedBy: B]` lines. Without `replacedBy` the spec is
/// ignored outright; with it, the spec is dropped only when `B` also offers
/// candidates.
pub fn parse_ignored_specs_block(lines: &[String], first_line: Option<usize>) -> Result<IgnoredSpecs> {
    let mut out = IgnoredSpecs::default();
    for record in parse_info_tree(lines, first_line)? {
        let specs = match record.get("spec") {
            Some(specs) if !specs.is_empty() => specs,
            _ => {
                return Err(RefError::Parse {
                    message: format!("every ignored spec line needs at least one 'spec' value. Got: {record:?}"),
                    source_name: "info block".to_string(),
                    line: first_line,
                })
            }
        };
        let replaced_by = match record.get("replacedBy").map(|v| v.as_slice()) {
            None | Some([]) => None,
            Some([one]) => Some(one.to_lowercase()),
            Some(_) => {
                return Err(RefError::Parse {
                    message: format!("every ignored spec line needs at most one 'replacedBy' value. Got: {record:?}"),
                    source_name: "info block".to_string(),
                    line: first_line,
                })
            }
        };
        for spec in specs {
            match &replaced_by {
                Some(new) => out.replaced.push((spec.to_lowercase(), new.clone())),
                None => out.ignored.push(spec.to_lowercase()),
            }
        }
    }
    Ok(out)
}

/// Term → ordered override rules.
#[derive(Debug, Clone, Default)]
pub struct DefaultSpecTable {
    rules: HashMap<String, Vec<DefaultSpecRule>>,
    count: usize,
}

impl DefaultSpecTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Appends a rule; rules for the same term are tried in the order added.
    pub fn add_rule(&mut self, rule: DefaultSpecRule) {
        self.rules
            .entry(normalize_text(&rule.term))
            .or_default()
            .push(rule);
        self.count += 1;
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = DefaultSpecRule>) {
        for rule in rules {
            self.add_rule(rule);
        }
    }

    /// Finds the first rule for `text` whose kind `kind` accepts and whose
    /// `for` value, if any, is among `for_scope` (when the link names one).
    ///
    /// Links that use spelling variants check each variant in turn and use
    /// the first that has rules at all.
    pub fn lookup(
        &self,
        text: &str,
        kind: LinkType,
        for_scope: &BTreeSet<String>,
    ) -> Option<&DefaultSpecRule> {
        let texts = if kind.uses_variants() {
            link_text_variations(text)
        } else {
            vec![normalize_text(text)]
        };
        let rules = texts.iter().find_map(|t| self.rules.get(t))?;
        rules.iter().find(|rule| {
            if !kind.accepts(rule.kind) {
                return false;
            }
            match &rule.for_scope {
                Some(f) if !for_scope.is_empty() => for_scope.contains(f),
                _ => true,
            }
        })
    }
}
