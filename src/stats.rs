//! The persisted statistics table bridging the trainer and the scorer.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordFreq {
    pub word: String,
    pub count: u32,
    /// Document frequency as a percentage of the class's emails.
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinguisticStats {
    pub total_emails: u32,
    pub avg_word_count: f64,
    pub avg_sentence_length: f64,
    pub avg_shouting_score: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub top_body_words: Vec<WordFreq>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub top_subject_words: Vec<WordFreq>,
}

/// Tables written for a class with no emails carry `null` word lists.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<WordFreq>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<WordFreq>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinguisticReport {
    pub safe_stats: LinguisticStats,
    pub scam_stats: LinguisticStats,
}

impl LinguisticReport {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read statistics file: {}", path.display()))?;
        let report = serde_json::from_str(&content)
            .with_context(|| format!("Invalid statistics file: {}", path.display()))?;
        Ok(report)
    }

    /// Load the table, degrading to an empty one (no linguistic scoring)
    /// when the file is missing or unreadable.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(report) => {
                log::info!(
                    "Loaded linguistic statistics from {} ({} safe / {} scam emails)",
                    path.display(),
                    report.safe_stats.total_emails,
                    report.scam_stats.total_emails
                );
                report
            }
            Err(e) if path.exists() => {
                log::error!("Linguistic scoring disabled: {e:#}");
                Self::default()
            }
            Err(e) => {
                log::warn!("Linguistic scoring disabled: {e:#}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write statistics file: {}", path.display()))?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.scam_stats.top_body_words.is_empty() && self.scam_stats.top_subject_words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_trainer_output_format() {
        let json = r#"{
  "safe_stats": {
    "total_emails": 10, "avg_word_count": 120.5, "avg_sentence_length": 14.0,
    "avg_shouting_score": 0.04, "top_body_words": [], "top_subject_words": null
  },
  "scam_stats": {
    "total_emails": 8, "avg_word_count": 90.0, "avg_sentence_length": 11.0,
    "avg_shouting_score": 0.11,
    "top_body_words": [{"word": "suspended", "count": 6, "percent": 75.0}],
    "top_subject_words": []
  }
}"#;
        let report: LinguisticReport = serde_json::from_str(json).unwrap();
        assert!(report.safe_stats.top_subject_words.is_empty());
        assert_eq!(report.scam_stats.top_body_words[0].word, "suspended");
        assert_eq!(report.safe_stats.total_emails, 10);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_missing_and_invalid_files_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(LinguisticReport::load_or_empty(&missing).is_empty());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(LinguisticReport::load(&broken).is_err());
        assert_eq!(LinguisticReport::load_or_empty(&broken), LinguisticReport::default());
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("linguistic_stats.json");
        let mut report = LinguisticReport::default();
        report.scam_stats.total_emails = 3;
        report.save(&path).unwrap();
        assert_eq!(LinguisticReport::load(&path).unwrap(), report);
    }
}
