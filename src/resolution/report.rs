use std::collections::BTreeSet;

use crate::types::{DfnType, LinkType, ResolvedRef};

/// A candidate reduced to what a reader needs to pick it in a
/// `link-defaults` block. `for_value` is only filled in when the same
/// `(text, kind, spec)` appears with several `for` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplifiedRef {
    pub text: String,
    pub kind: DfnType,
    pub spec: String,
    pub for_value: Option<String>,
    pub url: String,
}

impl SimplifiedRef {
    /// The `<pre class=link-defaults>` line that would select this ref.
    pub fn block_line(&self) -> String {
        match &self.for_value {
            Some(f) => format!(
                "spec:{}; type:{}; for:{}; text:{}",
                self.spec, self.kind, f, self.text
            ),
            None => format!("spec:{}; type:{}; text:{}", self.spec, self.kind, self.text),
        }
    }

    /// The `Link Defaults` metadata clause that would select this ref.
    pub fn metadata_clause(&self) -> String {
        format!("{} ({}) {}", self.spec, self.kind, self.text)
    }
}

/// Collapses candidates by `(text, kind, spec)`, keeping the `for` values
/// only where they are needed to tell entries apart.
pub fn simplify(refs: &[ResolvedRef], always_show_for: bool) -> Vec<SimplifiedRef> {
    let mut groups: Vec<((String, DfnType, String), Vec<(String, String)>)> = Vec::new();
    for r in refs {
        let key = (
            r.candidate.text.clone(),
            r.candidate.kind,
            r.candidate.spec_label().to_string(),
        );
        let fors: Vec<String> = if r.candidate.for_scope.is_empty() {
            vec!["/".to_string()]
        } else {
            r.candidate.for_scope.iter().cloned().collect()
        };
        let slot = match groups.iter().position(|(k, _)| *k == key) {
            Some(i) => i,
            None => {
                groups.push((key, Vec::new()));
                groups.len() - 1
            }
        };
        for f in fors {
            groups[slot].1.push((f, r.url.clone()));
        }
    }

    let mut out = Vec::new();
    for ((text, kind, spec), fors) in groups {
        if fors.len() >= 2 || always_show_for {
            for (f, url) in fors {
                out.push(SimplifiedRef {
                    text: text.clone(),
                    kind,
                    spec: spec.clone(),
                    for_value: Some(f),
                    url,
                });
            }
        } else if let Some((_, url)) = fors.into_iter().next() {
            out.push(SimplifiedRef {
                text,
                kind,
                spec,
                for_value: None,
                url,
            });
        }
    }
    out
}

/// Warning text for a link with several equally good external candidates.
///
/// Refs whose hint lines are unique are offered as `link-defaults` lines;
/// refs that are indistinguishable within their spec are listed with their
/// URLs instead.
pub fn multiple_refs_message(
    text: &str,
    kind: LinkType,
    for_scope: &BTreeSet<String>,
    chosen_url: &str,
    refs: &[SimplifiedRef],
) -> String {
    let mut by_line: Vec<(String, Vec<&SimplifiedRef>)> = Vec::new();
    for r in refs {
        let line = r.block_line();
        match by_line.iter_mut().find(|(l, _)| *l == line) {
            Some((_, group)) => group.push(r),
            None => by_line.push((line, vec![r])),
        }
    }

    let mut message = if for_scope.is_empty() {
        format!("Multiple possible '{text}' {kind} refs.")
    } else {
        let scopes: Vec<&str> = for_scope.iter().map(|s| s.as_str()).collect();
        format!("Multiple possible '{text}' {kind} refs for '{}'.", scopes.join(", "))
    };
    message.push_str(&format!("\nArbitrarily chose {chosen_url}"));

    let unique: Vec<&SimplifiedRef> = by_line
        .iter()
        .filter(|(_, g)| g.len() == 1)
        .map(|(_, g)| g[0])
        .collect();
    if !unique.is_empty() {
        message.push_str(
            "\nTo auto-select one of the following refs, insert one of these lines into a <pre class=link-defaults> block:",
        );
        for r in &unique {
            message.push_str(&format!("\n{}", r.block_line()));
        }
        message.push_str("\nor add one of these clauses to the 'Link Defaults' metadata:");
        for r in &unique {
            message.push_str(&format!("\n{}", r.metadata_clause()));
        }
    }

    let merged: Vec<&(String, Vec<&SimplifiedRef>)> =
        by_line.iter().filter(|(_, g)| g.len() > 1).collect();
    if !merged.is_empty() {
        message.push_str(
            "\nThe following refs show up multiple times in their spec, in a way that can't be told apart. Either create a manual link, or ask the spec maintainer to add disambiguating attributes (usually a for='' attribute to all of them).",
        );
        for (line, group) in merged {
            message.push_str(&format!("\n{line}"));
            for r in group {
                message.push_str(&format!("\n  {}", r.url));
            }
        }
    }

    message
}

/// Warning text for a link that matched several local definitions.
pub fn multiple_local_message(text: &str, kind: LinkType, chosen_url: &str, refs: &[ResolvedRef]) -> String {
    let mut message = format!(
        "Multiple possible '{kind}' local refs for '{text}'.\nChose {chosen_url}; add a for='' value to the link to pick one of:"
    );
    for r in simplify(refs, true) {
        message.push_str(&format!("\n{} ({})", r.block_line(), r.url));
    }
    message
}
