//! Display-name normalization
//!
//! Every name entering the hierarchy goes through [`normalize_name`] so that
//! "port authority", "Port  Authority" and "PORT AUTHORITY" all address the
//! same entity.

/// Normalizes an analyst-entered name to its stored display form.
///
/// Leading/trailing whitespace is dropped, interior whitespace runs collapse
/// to a single space, and each word is title-cased (first character upper,
/// the rest lower).
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
