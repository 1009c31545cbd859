//! Channel identity normalization.
//!
//! Admins paste channel references in several shapes: `@name`, a bare
//! username, a `t.me` link, or a numeric chat id. All of them are collapsed
//! into one canonical form (`@name` or the numeric id) that is used for
//! equality and uniqueness everywhere else.

use once_cell::sync::Lazy;
use regex::Regex;

static TME_LINK: Lazy<Regex> = Lazy::new(|| {
    // Safe: pattern is a literal.
    Regex::new(r"t\.me/([\w@]+)").unwrap()
});

static NUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").unwrap());

/// Canonicalize a channel reference. Pure and idempotent:
/// `normalize_channel(normalize_channel(x)) == normalize_channel(x)`.
///
/// Rules, first match wins:
/// 1. `https://t.me/<name>` or `t.me/<name>` -> `@<name>`
/// 2. already `@`-prefixed -> unchanged
/// 3. numeric chat id (negative for broadcast/supergroup ids) -> unchanged
/// 4. bare username -> `@`-prefixed
/// 5. anything else -> unchanged
pub fn normalize_channel(input: &str) -> String {
    if input.contains("t.me/") {
        if let Some(caps) = TME_LINK.captures(input) {
            let name = &caps[1];
            return if name.starts_with('@') {
                name.to_string()
            } else {
                format!("@{name}")
            };
        }
    }

    if input.starts_with('@') {
        return input.to_string();
    }

    if NUMERIC_ID.is_match(input) {
        return input.to_string();
    }

    if !input.starts_with('-') {
        return format!("@{input}");
    }

    input.to_string()
}
