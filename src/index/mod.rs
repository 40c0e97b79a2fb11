/// Local definition index.
///
/// Holds every definition the current document makes, keyed by normalized
/// linking text, plus the spelling-variant generator the resolver uses to
/// retry lookups.
mod definitions;
mod variants;

pub use definitions::{DefinitionIndex, LocalDefinition, Phase};
pub use variants::{link_text_variations, normalize_text};
