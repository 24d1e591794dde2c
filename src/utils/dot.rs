//! DOT format utilities for graph visualization.
//!
//! Shared by the alias tree printer; the output can be rendered with Graphviz.

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// Handles every character with a special meaning inside a quoted DOT label: quotes,
/// backslashes, newlines and the angle brackets of record labels.
///
/// # Arguments
///
/// * `s` - The string to escape
///
/// # Returns
///
/// A new string with all special characters properly escaped.
///
/// # Examples
///
/// ```rust,ignore
/// let escaped = escape_dot("<4: int a, 4>");
/// assert_eq!(escaped, "\\<4: int a, 4\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}
