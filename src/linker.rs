//! Applies the resolver to document elements.
//!
//! The HTML stages that run earlier hand over two flat lists: the `<dfn>`
//! elements the document defines and the autolink elements it uses. This
//! module turns the former into [`LocalDefinition`]s and rewrites the latter
//! in place: `href` on success, `data-link-failed` otherwise.

use serde::{Deserialize, Serialize};

use crate::errors::{RefError, Result};
use crate::index::LocalDefinition;
use crate::resolution::{split_top_level, BiblioRequest, ReferenceResolver};
use crate::types::{DfnType, Element, LinkRequest, LinkType, Status};

/// Marks an autolink the resolver could not resolve.
pub const FAILED_ATTR: &str = "data-link-failed";

/// Counts from one linking pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReport {
    pub definitions: usize,
    pub resolved: usize,
    pub failed: usize,
    pub biblio: usize,
    pub sections: usize,
}

/// Splits a `for` attribute value on commas that are not inside
/// parentheses, so method signatures like `foo(a, b)` stay whole.
pub fn split_for_values(value: &str) -> Vec<String> {
    split_top_level(value, ',')
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Builds the definition a `<dfn>` element declares.
///
/// Returns `Ok(None)` for elements marked `no-ref`. Linking texts come from
/// `data-lt` (an empty value means the element has only local texts), or the
/// element's text when the attribute is absent.
pub fn local_definition_from_element(el: &Element) -> Result<Option<LocalDefinition>> {
    if el.has_class("no-ref") {
        return Ok(None);
    }
    let kind = match el.attr("data-dfn-type") {
        Some(kind) => DfnType::parse(kind)?,
        None => DfnType::Dfn,
    };
    let id = el.attr("id").filter(|id| !id.trim().is_empty()).ok_or_else(|| RefError::Parse {
        message: format!("definition has no id: {}", el.describe()),
        source_name: "document".to_string(),
        line: el.line.map(|l| l as usize),
    })?;

    let lt = el.attr("data-lt").unwrap_or(&el.text);
    let mut dfn = LocalDefinition::new(id.trim(), kind, lt);
    dfn.line = el.line;
    if let Some(local_lt) = el.attr("data-local-lt") {
        dfn = dfn.with_local_lt(local_lt);
    }
    if let Some(for_attr) = el.attr("data-dfn-for") {
        for value in split_for_values(for_attr) {
            dfn = dfn.with_for(value);
        }
    }
    Ok(Some(dfn))
}

/// Registers every definition in `dfns` with the resolver.
///
/// Bad definitions (unknown kind, missing id, duplicates) are reported as
/// fatal messages and skipped. Returns the number of definitions added.
pub fn collect_definitions(resolver: &mut ReferenceResolver, dfns: &[Element]) -> Result<usize> {
    let mut count = 0;
    for el in dfns {
        let dfn = match local_definition_from_element(el) {
            Ok(Some(dfn)) => dfn,
            Ok(None) => continue,
            Err(e) => {
                resolver.messages_mut().fatal(e.to_string(), el.line);
                continue;
            }
        };
        match resolver.add_local_definition(&dfn) {
            Ok(_) => count += 1,
            Err(e @ RefError::Phase { .. }) => return Err(e),
            Err(e) => {
                resolver.messages_mut().fatal(e.to_string(), el.line);
            }
        }
    }
    tracing::debug!("collected {} local definitions", count);
    Ok(count)
}

/// Classes marking an element as sitting in informative prose. The document
/// stage copies them from the nearest enclosing section or block.
const INFORMATIVE_CLASSES: [&str; 4] = ["note", "example", "non-normative", "informative"];

/// Whether an autolink counts toward normative references.
pub fn is_normative(el: &Element) -> bool {
    !INFORMATIVE_CLASSES.iter().any(|c| el.has_class(c))
}

/// Reads the link request an autolink element carries.
///
/// Without `data-link-type`, a legacy `<i>` autolink is a `maybe` link and
/// everything else is a `dfn` link.
pub fn link_request_from_element(el: &Element) -> Result<LinkRequest> {
    let kind = match el.attr("data-link-type") {
        Some(kind) => LinkType::parse(kind)?,
        None if el.tag == "i" => LinkType::Maybe,
        None => LinkType::Exact(DfnType::Dfn),
    };
    let text = el.attr("data-lt").unwrap_or(&el.text);
    let mut req = LinkRequest::new(kind, text).at_line(el.line);
    if let Some(spec) = el.attr("data-link-spec").filter(|s| !s.trim().is_empty()) {
        req = req.with_spec(spec.trim());
    }
    if let Some(status) = el.attr("data-link-status") {
        req = req.with_status(Status::parse(status)?);
    }
    if let Some(for_attr) = el.attr("data-link-for") {
        for value in split_for_values(for_attr) {
            req = req.with_for(value);
        }
    }
    if el.has_class("no-error") {
        req = req.silent();
    }
    if !is_normative(el) {
        req = req.informative();
    }
    Ok(req)
}

fn mark_failed(el: &mut Element) {
    el.set_attr(FAILED_ATTR, "");
}

/// Shorthand autolinks become real links once they resolve.
fn promote(el: &mut Element) {
    if el.tag == "bs-link" || el.tag == "i" {
        el.tag = "a".to_string();
    }
}

/// Resolves every autolink in `elements`, rewriting them in place.
///
/// Elements that already carry an `href` are left alone. Link failures are
/// reported through the resolver's messages; only a phase error (linking
/// before collection finished) aborts the pass.
pub fn process_autolinks(resolver: &mut ReferenceResolver, elements: &mut [Element]) -> Result<LinkReport> {
    let mut report = LinkReport::default();

    for el in elements.iter_mut() {
        if el.attr("href").is_some() {
            continue;
        }
        let link_type = el.attr("data-link-type").map(|t| t.to_string());
        let ok = match link_type.as_deref() {
            Some("biblio") => link_biblio(resolver, el, &mut report)?,
            Some("section") => link_section(resolver, el, &mut report)?,
            _ => link_autolink(resolver, el)?,
        };
        if ok {
            report.resolved += 1;
        } else {
            mark_failed(el);
            report.failed += 1;
        }
    }

    tracing::debug!(
        "linked {} autolinks, {} failed",
        report.resolved,
        report.failed
    );
    Ok(report)
}

fn link_autolink(resolver: &mut ReferenceResolver, el: &mut Element) -> Result<bool> {
    let req = match link_request_from_element(el) {
        Ok(req) => req,
        Err(e) => {
            resolver
                .messages_mut()
                .fatal(format!("{}:\n  {}", e, el.describe()), el.line);
            return Ok(false);
        }
    };
    match resolver.get_ref(&req) {
        Ok(resolved) => {
            el.set_attr("href", resolved.url);
            promote(el);
            Ok(true)
        }
        Err(RefError::NotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// `[[KEY]]` and `[[!KEY]]` links.
fn link_biblio(resolver: &mut ReferenceResolver, el: &mut Element, report: &mut LinkReport) -> Result<bool> {
    let raw = el.attr("data-lt").unwrap_or(&el.text).to_string();
    let key = raw.trim().trim_start_matches("[[").trim_end_matches("]]").trim_start_matches('!').trim();
    let mut req = BiblioRequest::new(key);
    match el.attr("data-biblio-type") {
        Some("normative") => req = req.normative(),
        Some("informative") | None => {}
        Some(other) => {
            resolver.messages_mut().fatal(
                format!(
                    "Unknown data-biblio-type value '{}' on {}. Only 'normative' and 'informative' allowed.",
                    other,
                    el.describe()
                ),
                el.line,
            );
            return Ok(false);
        }
    }
    if el.attr("data-okay-to-fail").is_some() {
        req = req.generate_fake().quiet();
    }
    if let Some(status) = el.attr("data-biblio-status") {
        match Status::parse(status) {
            Ok(status) => req = req.with_status(status),
            Err(e) => {
                resolver.messages_mut().fatal(e.to_string(), el.line);
                return Ok(false);
            }
        }
    }
    if el.attr("data-biblio-obsolete").is_some() {
        req = req.allow_obsolete();
    }

    let Some(entry) = resolver.get_biblio_ref(&req)? else {
        return Ok(false);
    };
    // Keys are stored lowercased; keep the author's spelling when it names
    // the entry that was found.
    let display = match &entry.preferred_alias {
        Some(alias) => alias.clone(),
        None if entry.key.eq_ignore_ascii_case(key) => key.to_string(),
        None => entry.key.clone(),
    };
    el.set_attr("href", format!("#biblio-{}", display.to_lowercase()));
    if el.text.trim().is_empty() {
        el.text = format!("[{display}]");
    }
    el.set_attr("data-biblio-display", display);
    promote(el);
    report.biblio += 1;
    Ok(true)
}

/// `[[spec#id]]` links to another spec's headings.
fn link_section(resolver: &mut ReferenceResolver, el: &mut Element, report: &mut LinkReport) -> Result<bool> {
    let Some(spec) = el.attr("data-link-spec").map(|s| s.to_string()) else {
        resolver.messages_mut().link_error(
            format!("Section autolink is missing its spec: {}", el.describe()),
            el.line,
        );
        return Ok(false);
    };
    let id = el.attr("data-lt").unwrap_or(&el.text).trim().to_string();
    let status = match el.attr("data-link-status").map(Status::parse).transpose() {
        Ok(status) => status,
        Err(e) => {
            resolver.messages_mut().fatal(e.to_string(), el.line);
            return Ok(false);
        }
    };

    match resolver.get_section_ref(&spec, &id, status) {
        Ok(heading) => {
            el.set_attr("href", heading.url.clone());
            if el.text.trim().is_empty() || el.text.trim() == id {
                el.text = match &heading.number {
                    Some(number) => format!("§ {} {}", number, heading.text),
                    None => format!("§ {}", heading.text),
                };
            }
            promote(el);
            report.sections += 1;
            Ok(true)
        }
        Err(e @ (RefError::UnknownSection { .. } | RefError::AmbiguousSection { .. })) => {
            resolver.messages_mut().link_error(e.to_string(), el.line);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
