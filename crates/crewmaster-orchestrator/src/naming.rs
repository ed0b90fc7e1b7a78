use std::collections::HashSet;

/// Most words a generated name keeps.
const MAX_NAME_WORDS: usize = 4;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "the", "of", "on", "in", "for", "to", "with", "about", "from", "by", "at",
    "into", "as", "or", "me", "my", "our", "your", "please", "some", "this", "that", "it", "is",
    "be", "write", "create", "make", "do", "give", "build",
];

/// Slug from the significant words of a description, e.g.
/// `"Write a market report on electric vehicles"` → `"market-report-electric-vehicles"`.
pub fn slug_from_description(description: &str) -> String {
    let words: Vec<String> = description
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .take(MAX_NAME_WORDS)
        .map(String::from)
        .collect();

    if words.is_empty() {
        "crew".to_string()
    } else {
        words.join("-")
    }
}

/// Normalize a caller-supplied name the same way generated names are.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// First of `base`, `base-2`, `base-3`, ... not in `taken`.
pub fn disambiguate(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}
