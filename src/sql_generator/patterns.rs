//! LIKE pattern construction: escaping of pattern metacharacters in
//! compile-time-constant patterns and wildcard placement for the
//! Contains/StartsWith/EndsWith family.

/// The fixed escape character, used both when auto-escaping constant
/// patterns and when the caller asks for an ignore-case match.
pub const LIKE_ESCAPE_CHAR: char = '\\';

/// The `ESCAPE '...'` clause text emitted after every LIKE.
pub fn escape_clause() -> String {
    format!("ESCAPE '{}'", LIKE_ESCAPE_CHAR)
}

/// Escape `%`, `_` and the escape character itself so the input matches
/// literally inside a LIKE pattern.
pub fn escape_like_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        if ch == '%' || ch == '_' || ch == LIKE_ESCAPE_CHAR {
            out.push(LIKE_ESCAPE_CHAR);
        }
        out.push(ch);
    }
    out
}

/// Add match wildcards at the configured end(s).
pub fn add_wildcards(pattern: String, leading: bool, trailing: bool) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    if leading {
        out.push('%');
    }
    out.push_str(&pattern);
    if trailing {
        out.push('%');
    }
    out
}
