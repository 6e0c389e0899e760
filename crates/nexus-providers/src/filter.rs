//! Log line filtering.

/// Substrings that mark a log line as error-related. Matched lowercase.
pub(crate) const ERROR_KEYWORDS: &[&str] = &[
    "error",
    "failed",
    "panic",
    "fatal",
    "exception",
    "crash",
    "backoff",
    "oom",
    "terminated",
    "refused",
    "timeout",
];

/// Whether an already-lowercased line contains an error keyword.
pub(crate) fn matches_error_pattern(lower: &str) -> bool {
    ERROR_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Line filter over a block of log text.
#[derive(Debug, Clone, Default)]
pub(crate) struct LineFilter {
    needle: Option<String>,
    case_sensitive: bool,
    error_only: bool,
    max_lines: Option<usize>,
}

impl LineFilter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Keep only lines containing `needle`. Blank needles are ignored.
    pub(crate) fn containing(mut self, needle: &str, case_sensitive: bool) -> Self {
        let needle = needle.trim();
        if !needle.is_empty() {
            self.needle = Some(if case_sensitive {
                needle.to_string()
            } else {
                needle.to_lowercase()
            });
        }
        self.case_sensitive = case_sensitive;
        self
    }

    /// Keep only lines with an error keyword.
    pub(crate) fn error_only(mut self, error_only: bool) -> Self {
        self.error_only = error_only;
        self
    }

    /// Stop after `max` kept lines.
    pub(crate) fn limit(mut self, max: usize) -> Self {
        self.max_lines = Some(max);
        self
    }

    pub(crate) fn is_noop(&self) -> bool {
        self.needle.is_none() && !self.error_only && self.max_lines.is_none()
    }

    /// Apply the filter, joining kept lines with `\n`.
    pub(crate) fn apply(&self, content: &str) -> String {
        if self.is_noop() {
            return content.to_string();
        }
        let limit = self.max_lines.unwrap_or(usize::MAX);
        content
            .lines()
            .filter(|line| self.keep(line))
            .take(limit)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn keep(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        if let Some(needle) = &self.needle {
            let hay = if self.case_sensitive { line } else { lower.as_str() };
            if !hay.contains(needle.as_str()) {
                return false;
            }
        }
        !self.error_only || matches_error_pattern(&lower)
    }
}
