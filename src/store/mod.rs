/// Spec-data stores.
///
/// Read-only access to the persisted databases built from other specs:
/// the anchor index with its specs table, per-spec section headings, and the
/// bibliography. Everything past the specs table loads lazily, one shard at
/// a time, the first time a lookup needs it.
mod anchors;
mod biblio;
mod headings;
mod source;

pub use anchors::{AnchorRecord, ExternalAnchorStore, SPECS_FILE};
pub use biblio::{
    parse_refer, parse_specref_json, BiblioStore, SpecrefData, BIBLIO_KEYS_FILE, ORDER_BUILTIN,
    ORDER_LOCAL, ORDER_REFER, ORDER_SPECREF,
};
pub use headings::{Heading, HeadingEntry, SpecHeadings};
pub use source::{group_from_key, DataSource, DirectorySource, MemorySource};
