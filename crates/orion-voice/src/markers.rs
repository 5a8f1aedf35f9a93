use orion_core::{OrionError, OrionResult};
use regex::Regex;

/// Paired tags whose whole span (tags and body) is out-of-band data.
pub const DEFAULT_CONTROL_TAGS: &[&str] = &["LOCKED_QA", "EXTRACTION_DATA"];

/// Standalone status markers.
pub const DEFAULT_STATUS_MARKERS: &[&str] = &["CHAT_STATUS:COMPLETE", "CHAT_STATUS:FINAL"];

/// Removes control markers the voice agent embeds for the backend.
///
/// `[TAG]...[/TAG]` spans are removed non-greedily across lines; standalone
/// `[MARKER]`s are removed wherever they appear. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct MarkerStripper {
    patterns: Vec<Regex>,
}

impl MarkerStripper {
    /// Compile patterns for the given paired tags and standalone markers.
    pub fn new<S: AsRef<str>>(paired: &[S], standalone: &[S]) -> OrionResult<Self> {
        let paired = paired.iter().map(|tag| {
            let tag = regex::escape(tag.as_ref());
            format!(r"(?is)\[{tag}\].*?\[/{tag}\]")
        });
        let standalone = standalone.iter().map(|marker| {
            let marker = regex::escape(marker.as_ref());
            format!(r"(?i)\[{marker}\]")
        });

        let patterns = paired
            .chain(standalone)
            .map(|p| {
                Regex::new(&p).map_err(|e| OrionError::Config(format!("Invalid marker pattern {p}: {e}")))
            })
            .collect::<OrionResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Strip every marker and trim the result.
    pub fn strip(&self, text: &str) -> String {
        let mut out = text.to_string();
        for pattern in &self.patterns {
            if pattern.is_match(&out) {
                out = pattern.replace_all(&out, "").into_owned();
            }
        }
        out.trim().to_string()
    }
}

impl Default for MarkerStripper {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_TAGS, DEFAULT_STATUS_MARKERS).unwrap_or(Self {
            patterns: Vec::new(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_paired_spans_across_lines() {
        let s = MarkerStripper::default();
        let text = "Great, noted.\n[EXTRACTION_DATA]\n{\"city\":\"Lisbon\"}\n[/EXTRACTION_DATA]\nAnything else?";
        assert_eq!(s.strip(text), "Great, noted.\n\nAnything else?");
    }

    #[test]
    fn test_paired_spans_are_non_greedy() {
        let s = MarkerStripper::default();
        let text = "[locked_qa]a[/LOCKED_QA] keep [LOCKED_QA]b[/locked_qa]";
        assert_eq!(s.strip(text), "keep");
    }

    #[test]
    fn test_strips_status_markers() {
        let s = MarkerStripper::default();
        assert_eq!(s.strip("All done! [CHAT_STATUS:COMPLETE]"), "All done!");
        assert_eq!(s.strip("[chat_status:final]"), "");
    }

    #[test]
    fn test_plain_text_untouched() {
        let s = MarkerStripper::default();
        assert_eq!(s.strip("  [not a marker] hello "), "[not a marker] hello");
    }

    #[test]
    fn test_custom_tags_are_escaped() {
        let s = MarkerStripper::new(&["NOTE.V1"], &["DONE+"]).unwrap();
        assert_eq!(s.strip("a [NOTE.V1]x[/NOTE.V1] b [DONE+]"), "a  b");
        // The dot is literal.
        assert_eq!(s.strip("[NOTEXV1]x[/NOTEXV1]"), "[NOTEXV1]x[/NOTEXV1]");
    }
}
