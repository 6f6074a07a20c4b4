//! Linux file name sanitization.

/// Longest file name most Linux filesystems accept, in bytes.
const NAME_MAX: usize = 255;

/// Make `name` safe to use as a single path component.
///
/// Separators, NUL, control characters and whitespace become `_` (runs
/// collapse to one), leading and trailing dots and underscores are stripped,
/// and the result is cut to `NAME_MAX` bytes on a char boundary. May return
/// an empty string.
pub fn sanitize_for_linux(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let bad = matches!(c, '/' | '\\' | '\0') || c.is_control() || c.is_whitespace();
        if !bad {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
