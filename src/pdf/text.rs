//! Text helpers for the standard Type 1 fonts, which only cover printable ASCII here.

/// Replace everything outside printable ASCII with `?`.
pub fn pdf_text(s: &str) -> String {
    s.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

/// First `max` characters of `s`, trimmed.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect::<String>().trim().to_string()
}
