//! Best-effort detection of "waiting for approval" prompts in output.

use regex::{Regex, RegexBuilder};

/// CSI, OSC and two-byte escape sequences.
const ANSI_PATTERN: &str = r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]";

/// Longest excerpt carried in a notification body.
const MAX_EXCERPT: usize = 120;

/// Matches terminal output against case-insensitive prompt patterns.
#[derive(Debug, Clone)]
pub struct ApprovalDetector {
    ansi: Regex,
    patterns: Vec<Regex>,
}

impl ApprovalDetector {
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            ansi: Regex::new(ANSI_PATTERN)?,
            patterns,
        })
    }

    /// A detector that never matches.
    pub fn disabled() -> Result<Self, regex::Error> {
        Self::new(&[])
    }

    pub fn strip_ansi(&self, text: &str) -> String {
        self.ansi.replace_all(text, "").into_owned()
    }

    /// The line containing the first prompt match in `chunk`, if any.
    pub fn detect(&self, chunk: &[u8]) -> Option<String> {
        if self.patterns.is_empty() {
            return None;
        }
        let text = self.strip_ansi(&String::from_utf8_lossy(chunk));
        for line in text.lines() {
            if self.patterns.iter().any(|p| p.is_match(line)) {
                let line = line.trim();
                return Some(line.chars().take(MAX_EXCERPT).collect());
            }
        }
        None
    }
}
