//! Small helpers shared across the codebase.

/// Escape text for interpolation into HTML-mode Telegram messages.
///
/// Channel identities and link URLs are admin-supplied and end up inside
/// `<code>`/`<a>` tags, so the three HTML metacharacters must be neutralized.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Truncates a string to at most `max_chars` characters, adding "..." if
/// truncated. UTF-8 safe: counts characters, not bytes.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    // Byte length <= max_chars implies char count <= max_chars.
    if s.len() <= max_chars {
        return s.to_string();
    }
    if s.chars().count() <= max_chars {
        return s.to_string();
    }

    let suffix = "...";
    if max_chars <= suffix.len() {
        return suffix.chars().take(max_chars).collect();
    }
    let kept: String = s.chars().take(max_chars - suffix.len()).collect();
    format!("{kept}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(html_escape("a&b"), "a&amp;b");
        assert_eq!(html_escape("<b>x</b>"), "&lt;b&gt;x&lt;/b&gt;");
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn truncates_long_strings() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_str("привет мир!", 9), "привет...");
    }
}
