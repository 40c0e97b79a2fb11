/// Reference resolution module.
///
/// Turns autolink requests into URLs by combining the document's own
/// definitions, the external anchor database and the `Link Defaults`
/// overrides, and looks up bibliography entries and section headings.
mod defaults;
mod report;
mod resolver;
mod usages;

pub use defaults::{
    parse_ignored_specs_block, parse_info_tree, parse_link_default_block, parse_link_defaults,
    DefaultSpecTable, IgnoredSpecs, InfoRecord,
};
pub(crate) use defaults::split_top_level;
pub use report::{multiple_local_message, multiple_refs_message, simplify, SimplifiedRef};
pub use resolver::{BiblioRequest, ReferenceResolver, ResolverState};
pub use usages::Usages;
