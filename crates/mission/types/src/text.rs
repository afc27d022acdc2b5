//! Keyword matching over free-text labels

/// Lowercase `text`, turn punctuation into spaces and pad with a space on
/// each side so whole-word phrases can be matched with [`mentions`].
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

/// Whether a normalized text contains `phrase` as whole words.
pub fn mentions(normalized: &str, phrase: &str) -> bool {
    normalized.contains(&format!(" {} ", phrase))
}

/// Whether a normalized text contains any of `phrases` as whole words.
pub fn mentions_any(normalized: &str, phrases: &[impl AsRef<str>]) -> bool {
    phrases.iter().any(|p| mentions(normalized, p.as_ref()))
}
