//! Output truncation for size-bounded tool results.

/// Marker appended to truncated output.
pub const TRUNCATION_MARKER: &str = "\n... truncated";

/// Bound `output` to `max_bytes`, appending [`TRUNCATION_MARKER`] when cut.
///
/// A `max_bytes` of zero disables truncation. Output of exactly
/// `max_bytes` is returned untouched. The cut never splits a UTF-8
/// character, so multi-byte text may keep slightly fewer bytes.
///
/// # Examples
///
/// ```
/// use nexus_core::truncate_output;
///
/// assert_eq!(truncate_output("hello", 5), "hello");
/// assert_eq!(truncate_output("hello!", 5), "hello\n... truncated");
/// ```
#[must_use]
pub fn truncate_output(output: &str, max_bytes: usize) -> String {
    if max_bytes == 0 || output.len() <= max_bytes {
        return output.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !output.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    let mut truncated = String::with_capacity(end.saturating_add(TRUNCATION_MARKER.len()));
    truncated.push_str(&output[..end]);
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Boundaries ----

    #[test]
    fn test_under_limit_unchanged() {
        assert_eq!(truncate_output("abc", 10), "abc");
    }

    #[test]
    fn test_exact_limit_unchanged() {
        let s = "x".repeat(64);
        assert_eq!(truncate_output(&s, 64), s);
    }

    #[test]
    fn test_one_over_limit_truncated() {
        let s = "x".repeat(65);
        let out = truncate_output(&s, 64);
        assert_eq!(out, format!("{}{TRUNCATION_MARKER}", "x".repeat(64)));
    }

    #[test]
    fn test_zero_limit_disables() {
        let s = "x".repeat(1000);
        assert_eq!(truncate_output(&s, 0), s);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(truncate_output("", 1), "");
    }

    // ---- UTF-8 ----

    #[test]
    fn test_multibyte_not_split() {
        // "é" is two bytes; a cut at byte 2 lands inside it.
        let s = "aéb";
        let out = truncate_output(s, 2);
        assert_eq!(out, format!("a{TRUNCATION_MARKER}"));
    }
}
