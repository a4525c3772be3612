use crate::{config::Config, error::PipelineError};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Category of one engine log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Error,
    Correction,
    Warning,
    Success,
    Info,
}

/// One classified line from the engine's log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub raw: String,
    pub category: Category,
}

impl LogEvent {
    pub fn new(category: Category, raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            category,
        }
    }
}

const CORRECTION_KEYWORDS: [&str; 4] = ["auto-filled", "auto-corrected", "fixed", "cleaned"];
const SUCCESS_KEYWORDS: [&str; 2] = ["success", "saved"];

/// Turns raw log lines into categorized events.
///
/// Built-in rules are fixed case-insensitive keyword sets, first match wins:
/// error, correction, warning, success, then info. Config may add extra
/// regex rules per category; those run after the built-ins, before the
/// info fallback. Classification is pure and order-preserving; blank lines
/// are dropped.
#[derive(Debug)]
pub struct LogClassifier {
    extra: Vec<(Category, Regex)>,
}

impl LogClassifier {
    pub fn new() -> Self {
        Self { extra: Vec::new() }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, PipelineError> {
        let sections = [
            (Category::Error, &cfg.classify.error_patterns),
            (Category::Correction, &cfg.classify.correction_patterns),
            (Category::Warning, &cfg.classify.warning_patterns),
            (Category::Success, &cfg.classify.success_patterns),
        ];

        let mut extra = Vec::new();
        for (category, patterns) in sections {
            for pattern in patterns {
                let re = Regex::new(pattern).map_err(|source| PipelineError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                extra.push((category, re));
            }
        }
        Ok(Self { extra })
    }

    /// Classify a single line. Returns `None` for blank-after-trim lines.
    pub fn classify_line(&self, raw: &str) -> Option<LogEvent> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let lower = trimmed.to_lowercase();
        let category = if lower.contains("error") {
            Category::Error
        } else if CORRECTION_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Category::Correction
        } else if lower.contains("warning") {
            Category::Warning
        } else if SUCCESS_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Category::Success
        } else if let Some(cat) = self.extra_match(trimmed) {
            cat
        } else {
            Category::Info
        };

        Some(LogEvent::new(category, trimmed))
    }

    fn extra_match(&self, line: &str) -> Option<Category> {
        self.extra
            .iter()
            .find(|(_, re)| re.is_match(line))
            .map(|(cat, _)| *cat)
    }

    /// Classify lines in order, dropping blanks.
    pub fn classify<'a, I, S>(&'a self, lines: I) -> impl Iterator<Item = LogEvent> + 'a
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: 'a,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .filter_map(move |line| self.classify_line(line.as_ref()))
    }
}

impl Default for LogClassifier {
    fn default() -> Self {
        Self::new()
    }
}
