/// Normalizes linking text for indexing and lookup: typographic apostrophes
/// become ASCII, runs of whitespace collapse to one space, and the result is
/// trimmed and lowercased.
pub fn normalize_text(text: &str) -> String {
    text.replace('\u{2019}', "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Generates spelling variants of `text`, most literal first.
///
/// The original text always comes first, followed by singularizing
/// rewrites: `ies`→`y`, dropping a trailing `es`, `'s`, `s` or `'`.
/// Duplicates are removed while preserving order, so callers can stop at the
/// first variant that yields a hit.
pub fn link_text_variations(text: &str) -> Vec<String> {
    let text = normalize_text(text);
    let mut variants: Vec<String> = vec![text.clone()];
    if text.is_empty() {
        return variants;
    }

    let mut push = |v: String| {
        if !v.is_empty() && !variants.contains(&v) {
            variants.push(v);
        }
    };

    if let Some(stem) = text.strip_suffix("ies") {
        push(format!("{stem}y"));
    }
    if let Some(stem) = text.strip_suffix("es") {
        push(stem.to_string());
    }
    if let Some(stem) = text.strip_suffix("'s") {
        push(stem.to_string());
    }
    if let Some(stem) = text.strip_suffix('s') {
        push(stem.to_string());
    }
    if let Some(stem) = text.strip_suffix('\'') {
        push(stem.to_string());
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_whitespace() {
        assert_eq!(normalize_text("  Event\n  Loop "), "event loop");
        assert_eq!(normalize_text("user\u{2019}s agent"), "user's agent");
    }

    #[test]
    fn original_text_comes_first() {
        let v = link_text_variations("boxes");
        assert_eq!(v[0], "boxes");
        assert_eq!(v[1], "box");
        assert!(v.contains(&"boxe".to_string()));
    }

    #[test]
    fn ies_becomes_y() {
        let v = link_text_variations("Berries");
        assert_eq!(v, vec!["berries", "berry", "berri", "berrie"]);
    }

    #[test]
    fn possessives_and_plurals() {
        assert_eq!(link_text_variations("bikeshed's"), vec!["bikeshed's", "bikeshed", "bikeshed'"]);
        assert_eq!(link_text_variations("bikesheds'"), vec!["bikesheds'", "bikesheds"]);
    }

    #[test]
    fn empty_text_has_only_itself() {
        assert_eq!(link_text_variations("   "), vec![String::new()]);
    }
}
