use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{RefError, Result};

/// Kinds of definitions a `<dfn>` or anchor can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DfnType {
    Dfn,
    AbstractOp,
    Property,
    Descriptor,
    Value,
    Type,
    AtRule,
    Function,
    Selector,
    Token,
    Element,
    ElementAttr,
    AttrValue,
    ElementState,
    Event,
    Interface,
    Namespace,
    ExtendedAttribute,
    Constructor,
    Method,
    Argument,
    Attribute,
    Callback,
    Dictionary,
    DictMember,
    Enum,
    EnumValue,
    Exception,
    Const,
    Typedef,
    Stringifier,
    Serializer,
    Iterator,
    Maplike,
    Setlike,
    Permission,
    Grammar,
    Scheme,
    State,
    Mode,
    Context,
    Facet,
    HttpHeader,
}

#[allow(clippy::should_implement_trait)]
impl DfnType {
    /// Every definition kind, in declaration order.
    pub const ALL: &'static [DfnType] = &[
        DfnType::Dfn,
        DfnType::AbstractOp,
        DfnType::Property,
        DfnType::Descriptor,
        DfnType::Value,
        DfnType::Type,
        DfnType::AtRule,
        DfnType::Function,
        DfnType::Selector,
        DfnType::Token,
        DfnType::Element,
        DfnType::ElementAttr,
        DfnType::AttrValue,
        DfnType::ElementState,
        DfnType::Event,
        DfnType::Interface,
        DfnType::Namespace,
        DfnType::ExtendedAttribute,
        DfnType::Constructor,
        DfnType::Method,
        DfnType::Argument,
        DfnType::Attribute,
        DfnType::Callback,
        DfnType::Dictionary,
        DfnType::DictMember,
        DfnType::Enum,
        DfnType::EnumValue,
        DfnType::Exception,
        DfnType::Const,
        DfnType::Typedef,
        DfnType::Stringifier,
        DfnType::Serializer,
        DfnType::Iterator,
        DfnType::Maplike,
        DfnType::Setlike,
        DfnType::Permission,
        DfnType::Grammar,
        DfnType::Scheme,
        DfnType::State,
        DfnType::Mode,
        DfnType::Context,
        DfnType::Facet,
        DfnType::HttpHeader,
    ];

    /// Returns the string representation of this definition kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            DfnType::Dfn => "dfn",
            DfnType::AbstractOp => "abstract-op",
            DfnType::Property => "property",
            DfnType::Descriptor => "descriptor",
            DfnType::Value => "value",
            DfnType::Type => "type",
            DfnType::AtRule => "at-rule",
            DfnType::Function => "function",
            DfnType::Selector => "selector",
            DfnType::Token => "token",
            DfnType::Element => "element",
            DfnType::ElementAttr => "element-attr",
            DfnType::AttrValue => "attr-value",
            DfnType::ElementState => "element-state",
            DfnType::Event => "event",
            DfnType::Interface => "interface",
            DfnType::Namespace => "namespace",
            DfnType::ExtendedAttribute => "extended-attribute",
            DfnType::Constructor => "constructor",
            DfnType::Method => "method",
            DfnType::Argument => "argument",
            DfnType::Attribute => "attribute",
            DfnType::Callback => "callback",
            DfnType::Dictionary => "dictionary",
            DfnType::DictMember => "dict-member",
            DfnType::Enum => "enum",
            DfnType::EnumValue => "enum-value",
            DfnType::Exception => "exception",
            DfnType::Const => "const",
            DfnType::Typedef => "typedef",
            DfnType::Stringifier => "stringifier",
            DfnType::Serializer => "serializer",
            DfnType::Iterator => "iterator",
            DfnType::Maplike => "maplike",
            DfnType::Setlike => "setlike",
            DfnType::Permission => "permission",
            DfnType::Grammar => "grammar",
            DfnType::Scheme => "scheme",
            DfnType::State => "state",
            DfnType::Mode => "mode",
            DfnType::Context => "context",
            DfnType::Facet => "facet",
            DfnType::HttpHeader => "http-header",
        }
    }

    /// Parses a string into a `DfnType`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<DfnType> {
        DfnType::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Parses a definition kind, treating unknown values as a configuration error.
    pub fn parse(s: &str) -> Result<DfnType> {
        DfnType::from_str(s.trim()).ok_or_else(|| RefError::UnknownKind {
            kind: s.trim().to_string(),
        })
    }

    pub fn is_idl(&self) -> bool {
        matches!(
            self,
            DfnType::Event
                | DfnType::Interface
                | DfnType::Namespace
                | DfnType::ExtendedAttribute
                | DfnType::Constructor
                | DfnType::Method
                | DfnType::Argument
                | DfnType::Attribute
                | DfnType::Callback
                | DfnType::Dictionary
                | DfnType::DictMember
                | DfnType::Enum
                | DfnType::EnumValue
                | DfnType::Exception
                | DfnType::Const
                | DfnType::Typedef
                | DfnType::Stringifier
                | DfnType::Serializer
                | DfnType::Iterator
                | DfnType::Maplike
                | DfnType::Setlike
                | DfnType::Permission
        )
    }

    /// Kinds that an unmarked CSS-ish `maybe` autolink may land on.
    pub fn is_maybe(&self) -> bool {
        matches!(
            self,
            DfnType::Value | DfnType::Type | DfnType::AtRule | DfnType::Function | DfnType::Selector
        )
    }
}

impl fmt::Display for DfnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind requested by an autolink: either a concrete definition kind or a
/// shorthand that expands into several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    Exact(DfnType),
    /// `property` or `descriptor`.
    Propdesc,
    /// `function`, `method`, `constructor` or `stringifier`.
    Functionish,
    /// Any IDL kind.
    Idl,
    /// IDL kinds that name a top-level construct.
    IdlName,
    /// `element-attr` or `element-state`.
    ElementSub,
    /// The CSS maybe-kinds plus `dfn`.
    Maybe,
    /// Markup kinds plus every IDL kind.
    Codelike,
}

#[allow(clippy::should_implement_trait)]
impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Exact(t) => t.as_str(),
            LinkType::Propdesc => "propdesc",
            LinkType::Functionish => "functionish",
            LinkType::Idl => "idl",
            LinkType::IdlName => "idl-name",
            LinkType::ElementSub => "element-sub",
            LinkType::Maybe => "maybe",
            LinkType::Codelike => "codelike",
        }
    }

    pub fn from_str(s: &str) -> Option<LinkType> {
        match s {
            "propdesc" => Some(LinkType::Propdesc),
            "functionish" => Some(LinkType::Functionish),
            "idl" => Some(LinkType::Idl),
            "idl-name" => Some(LinkType::IdlName),
            "element-sub" => Some(LinkType::ElementSub),
            "maybe" => Some(LinkType::Maybe),
            "codelike" => Some(LinkType::Codelike),
            other => DfnType::from_str(other).map(LinkType::Exact),
        }
    }

    /// Parses a link kind, treating unknown values as a configuration error.
    pub fn parse(s: &str) -> Result<LinkType> {
        LinkType::from_str(s.trim()).ok_or_else(|| RefError::UnknownKind {
            kind: s.trim().to_string(),
        })
    }

    /// Returns `true` if a definition of kind `dfn_type` can satisfy this link.
    pub fn accepts(&self, dfn_type: DfnType) -> bool {
        match self {
            LinkType::Exact(t) => *t == dfn_type,
            LinkType::Propdesc => matches!(dfn_type, DfnType::Property | DfnType::Descriptor),
            LinkType::Functionish => matches!(
                dfn_type,
                DfnType::Function | DfnType::Method | DfnType::Constructor | DfnType::Stringifier
            ),
            LinkType::Idl => dfn_type.is_idl(),
            LinkType::IdlName => matches!(
                dfn_type,
                DfnType::Interface
                    | DfnType::Namespace
                    | DfnType::Dictionary
                    | DfnType::Enum
                    | DfnType::Typedef
                    | DfnType::Callback
            ),
            LinkType::ElementSub => {
                matches!(dfn_type, DfnType::ElementAttr | DfnType::ElementState)
            }
            LinkType::Maybe => dfn_type.is_maybe() || dfn_type == DfnType::Dfn,
            LinkType::Codelike => {
                dfn_type.is_idl()
                    || matches!(
                        dfn_type,
                        DfnType::Element
                            | DfnType::ElementAttr
                            | DfnType::ElementState
                            | DfnType::AttrValue
                    )
            }
        }
    }

    /// The concrete definition kinds this link kind expands into.
    pub fn expansion(&self) -> Vec<DfnType> {
        DfnType::ALL
            .iter()
            .copied()
            .filter(|t| self.accepts(*t))
            .collect()
    }

    /// `dfn` and `maybe` links also try spelling variants of their text.
    pub fn uses_variants(&self) -> bool {
        matches!(self, LinkType::Exact(DfnType::Dfn) | LinkType::Maybe)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DfnType> for LinkType {
    fn from(t: DfnType) -> Self {
        LinkType::Exact(t)
    }
}

/// Publication state to link against: the live editor's draft or the dated
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Current,
    Snapshot,
}

#[allow(clippy::should_implement_trait)]
impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Current => "current",
            Status::Snapshot => "snapshot",
        }
    }

    /// Accepts the modern names plus the legacy `ED`/`TR`/`dated` spellings.
    pub fn from_str(s: &str) -> Option<Status> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" | "ed" => Some(Status::Current),
            "snapshot" | "tr" | "dated" => Some(Status::Snapshot),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Status> {
        Status::from_str(s).ok_or_else(|| RefError::UnknownStatus {
            status: s.trim().to_string(),
        })
    }

    /// Maps a document status (`ED`, `WD`, `CR`, ...) to the reference status
    /// used when a link does not ask for one.
    pub fn for_document_status(doc_status: &str) -> Status {
        match doc_status.trim().to_ascii_uppercase().as_str() {
            "ED" | "DREAM" | "UD" | "LS" | "" => Status::Current,
            _ => Status::Snapshot,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A spec level such as `1`, `2` or `3.1`, ordered numerically component by
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "LevelRepr", into = "String")]
pub struct SpecLevel(Vec<u32>);

impl SpecLevel {
    /// Parses a dotted level. Returns `None` for empty or non-numeric input.
    pub fn parse(s: &str) -> Option<SpecLevel> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        s.split('.')
            .map(|part| part.parse::<u32>().ok())
            .collect::<Option<Vec<u32>>>()
            .map(SpecLevel)
    }
}

impl fmt::Display for SpecLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

impl From<SpecLevel> for String {
    fn from(level: SpecLevel) -> String {
        level.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Int(u32),
    Text(String),
}

impl TryFrom<LevelRepr> for SpecLevel {
    type Error = String;

    fn try_from(repr: LevelRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            LevelRepr::Int(n) => Ok(SpecLevel(vec![n])),
            LevelRepr::Text(s) => {
                SpecLevel::parse(&s).ok_or_else(|| format!("invalid spec level '{s}'"))
            }
        }
    }
}

/// URLs an external anchor publishes for each status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateUrls {
    pub current: Option<String>,
    pub snapshot: Option<String>,
}

/// Where a candidate definition lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum Origin {
    /// Defined in the document being built.
    Local { id: String, line: Option<u32> },
    /// Defined in another spec, drawn from the anchor database.
    External {
        spec_id: String,
        shortname: String,
        level: Option<SpecLevel>,
        urls: CandidateUrls,
    },
}

/// A definition or anchor that an autolink may resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Normalized (lowercase, whitespace-folded) linking text.
    pub text: String,
    pub kind: DfnType,
    pub origin: Origin,
    /// Empty means global.
    pub for_scope: BTreeSet<String>,
    pub exported: bool,
    pub normative: bool,
}

impl Candidate {
    pub fn is_local(&self) -> bool {
        matches!(self.origin, Origin::Local { .. })
    }

    pub fn spec_id(&self) -> Option<&str> {
        match &self.origin {
            Origin::Local { .. } => None,
            Origin::External { spec_id, .. } => Some(spec_id),
        }
    }

    pub fn shortname(&self) -> Option<&str> {
        match &self.origin {
            Origin::Local { .. } => None,
            Origin::External { shortname, .. } => Some(shortname),
        }
    }

    pub fn level(&self) -> Option<&SpecLevel> {
        match &self.origin {
            Origin::Local { .. } => None,
            Origin::External { level, .. } => level.as_ref(),
        }
    }

    /// Human-readable location, used when citing definition sites in
    /// diagnostics.
    pub fn site(&self) -> String {
        match &self.origin {
            Origin::Local { id, line: Some(line) } => format!("#{id} (line {line})"),
            Origin::Local { id, line: None } => format!("#{id}"),
            Origin::External { spec_id, urls, .. } => match urls.current.as_ref().or(urls.snapshot.as_ref()) {
                Some(url) => format!("{spec_id} {url}"),
                None => spec_id.clone(),
            },
        }
    }

    /// The label used for this candidate's spec in hints: the spec id for
    /// external anchors, `local` otherwise.
    pub fn spec_label(&self) -> &str {
        self.spec_id().unwrap_or("local")
    }
}

/// Per-spec metadata from the anchor database's specs table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecData {
    #[serde(default)]
    pub current_url: Option<String>,
    #[serde(default)]
    pub snapshot_url: Option<String>,
    #[serde(default)]
    pub shortname: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub level: Option<SpecLevel>,
}

/// A request to resolve one autolink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub kind: LinkType,
    pub text: String,
    pub spec: Option<String>,
    pub status: Option<Status>,
    pub for_scope: BTreeSet<String>,
    /// When `false`, a failed lookup is silent: no diagnostic is emitted and
    /// the caller degrades the link to plain text.
    pub allow_error: bool,
    /// Source line of the autolink, for diagnostics.
    pub line: Option<u32>,
    /// `false` when the link sits in a note, example or other informative
    /// section. Usage is normative only if this and the anchor agree.
    pub normative: bool,
}

impl LinkRequest {
    pub fn new(kind: impl Into<LinkType>, text: impl Into<String>) -> Self {
        LinkRequest {
            kind: kind.into(),
            text: text.into(),
            spec: None,
            status: None,
            for_scope: BTreeSet::new(),
            allow_error: true,
            line: None,
            normative: true,
        }
    }

    pub fn with_spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = Some(spec.into());
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_for(mut self, scope: impl Into<String>) -> Self {
        self.for_scope.insert(scope.into());
        self
    }

    /// Marks the lookup as speculative: failures produce no diagnostic.
    pub fn silent(mut self) -> Self {
        self.allow_error = false;
        self
    }

    pub fn at_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }

    pub fn informative(mut self) -> Self {
        self.normative = false;
        self
    }
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRef {
    pub url: String,
    pub candidate: Candidate,
}

/// One `Link Defaults` override: links to `term` of a compatible kind go to
/// `spec_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSpecRule {
    pub term: String,
    pub spec_id: String,
    pub kind: DfnType,
    pub status: Option<Status>,
    pub for_scope: Option<String>,
}

/// A bibliography entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiblioEntry {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub snapshot_url: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub foreign_authors: Vec<String>,
    #[serde(default)]
    pub et_al: bool,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub other: Option<String>,
    #[serde(default)]
    pub book_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub volume_number: Option<String>,
    #[serde(default)]
    pub number_in_volume: Option<String>,
    #[serde(default)]
    pub page_number: Option<String>,
    #[serde(default)]
    pub report_number: Option<String>,
    #[serde(default)]
    pub abstract_text: Option<String>,
    /// Canonical display name for this entry, if it differs from `key`.
    #[serde(default)]
    pub preferred_alias: Option<String>,
    /// Key of the entry that obsoletes this one.
    #[serde(default)]
    pub superseded_by: Option<String>,
    /// Lower sorts first when several sources define the same key.
    #[serde(default)]
    pub order: u32,
    /// Set on entries synthesized because nothing real was found.
    #[serde(default)]
    pub generated: bool,
}

impl BiblioEntry {
    pub fn valid(&self) -> bool {
        !self.key.is_empty() && !self.title.is_empty()
    }

    /// The name the References section should list this entry under.
    pub fn display_key(&self) -> &str {
        self.preferred_alias.as_deref().unwrap_or(&self.key)
    }

    /// The URL to cite for the given status, falling back to whichever
    /// exists.
    pub fn url_for(&self, status: Status) -> Option<&str> {
        match status {
            Status::Current => self.url.as_deref().or(self.snapshot_url.as_deref()),
            Status::Snapshot => self.snapshot_url.as_deref().or(self.url.as_deref()),
        }
    }

    /// Renders the entry as an HTML citation line.
    pub fn citation(&self, status: Status) -> String {
        let mut out = String::new();
        let authors: Vec<&str> = self
            .authors
            .iter()
            .chain(self.foreign_authors.iter())
            .map(|a| a.as_str())
            .collect();
        let mut et_al = self.et_al;

        match authors.len() {
            0 => out.push_str("???"),
            1 => out.push_str(authors[0]),
            2 | 3 => out.push_str(&authors.join("; ")),
            _ => {
                out.push_str(authors[0]);
                et_al = true;
            }
        }
        out.push_str(if et_al { "; et al. " } else { ". " });

        let url = self.url_for(status);
        match url {
            Some(url) => out.push_str(&format!("<a href=\"{url}\">{}</a>. ", self.title)),
            None => out.push_str(&format!("{}. ", self.title)),
        }
        if let Some(date) = &self.date {
            out.push_str(&format!("{date}. "));
        }
        if let Some(st) = &self.status {
            out.push_str(&format!("{st}. "));
        }
        if let Some(other) = &self.other {
            out.push_str(&format!("{other} "));
        }
        if let Some(url) = url {
            out.push_str(&format!("URL: <a href=\"{url}\">{url}</a>"));
        }
        out.trim_end().to_string()
    }
}

/// Minimal stand-in for a DOM element, as produced by the HTML and markdown
/// stages that run before linking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub line: Option<u32>,
}

impl Element {
    pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            text: text.into(),
            ..Element::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// A short, outer-HTML-like rendering used in diagnostics.
    pub fn describe(&self) -> String {
        if let Some(syntax) = self.attr("bs-autolink-syntax") {
            return syntax.to_string();
        }
        let attrs: Vec<String> = self
            .attributes
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect();
        if attrs.is_empty() {
            format!("<{0}>{1}</{0}>", self.tag, self.text)
        } else {
            format!("<{0} {2}>{1}</{0}>", self.tag, self.text, attrs.join(" "))
        }
    }
}
