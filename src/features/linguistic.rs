use crate::config::Tables;
use crate::features::LinguisticTrigger;
use crate::metrics::shouting_ratio;
use crate::normalization::{Alphabet, Field, TextNormalizer};
use crate::stats::LinguisticReport;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// Minimum scam-class document frequency (percent) for a body word to count.
pub const BODY_PERCENT_THRESHOLD: f64 = 7.0;
pub const SUBJECT_PERCENT_THRESHOLD: f64 = 5.0;
pub const BODY_WORD_PENALTY_CAP: f64 = 15.0;
/// Uppercase share of the body's letters, in percent.
pub const SHOUTING_THRESHOLD: f64 = 25.0;
pub const SHOUTING_PENALTY: f64 = 15.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinguisticFindings {
    pub body_triggers: Vec<LinguisticTrigger>,
    pub subject_triggers: Vec<LinguisticTrigger>,
    /// Body word penalties plus the shouting penalty.
    pub linguistic_penalty: f64,
    pub subject_linguistic_penalty: f64,
    /// Percentage of uppercase letters in the body.
    pub shouting_score: f64,
}

pub struct LinguisticMatcher {
    normalizer: TextNormalizer,
    report: Arc<LinguisticReport>,
    body_ignore: HashSet<String>,
    subject_ignore: HashSet<String>,
}

impl LinguisticMatcher {
    pub fn new(tables: &Tables, report: Arc<LinguisticReport>) -> Result<Self> {
        let lower = |list: &[String]| list.iter().map(|w| w.to_lowercase()).collect();
        Ok(Self {
            normalizer: TextNormalizer::new(tables, Alphabet::Unicode)?,
            report,
            body_ignore: lower(&tables.body_ignore_words),
            subject_ignore: lower(&tables.subject_ignore_words),
        })
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// Match an already stripped body and a decoded subject against the
    /// scam-class word tables.
    pub fn analyze(&self, clean_body: &str, subject: &str) -> LinguisticFindings {
        let mut findings = LinguisticFindings::default();
        let scam = &self.report.scam_stats;

        let body_tokens = self.normalizer.normalize_clean(clean_body, Field::Body);
        let body_words = body_tokens.unique();
        for entry in &scam.top_body_words {
            if entry.percent <= BODY_PERCENT_THRESHOLD
                || !body_words.contains(entry.word.as_str())
                || self.body_ignore.contains(&entry.word)
            {
                continue;
            }
            findings.body_triggers.push(LinguisticTrigger::body(
                format!("Contains '{}'", entry.word),
                format!("Appears in {:.0}% of known phishing emails.", entry.percent),
            ));
            findings.linguistic_penalty += (entry.percent / 2.0).min(BODY_WORD_PENALTY_CAP);
        }

        let subject_tokens = self.normalizer.normalize(subject, Field::Subject);
        let subject_words = subject_tokens.unique();
        for entry in &scam.top_subject_words {
            if entry.percent <= SUBJECT_PERCENT_THRESHOLD
                || !subject_words.contains(entry.word.as_str())
                || self.subject_ignore.contains(&entry.word)
            {
                continue;
            }
            findings.subject_triggers.push(LinguisticTrigger::subject(
                format!("Subject: '{}'", entry.word),
                format!("Appears in {:.0}% of phishing subject lines.", entry.percent),
            ));
            findings.subject_linguistic_penalty += entry.percent / 3.0;
        }

        findings.shouting_score = shouting_ratio(clean_body) * 100.0;
        if findings.shouting_score > SHOUTING_THRESHOLD {
            findings.linguistic_penalty += SHOUTING_PENALTY;
            findings.body_triggers.push(LinguisticTrigger::body(
                "Excessive capitalization (shouting)".to_string(),
                format!(
                    "{:.0}% uppercase letters is typical of aggressive scam attempts.",
                    findings.shouting_score
                ),
            ));
        }

        log::debug!(
            "Linguistic analysis: {} body / {} subject triggers, shouting {:.1}%",
            findings.body_triggers.len(),
            findings.subject_triggers.len(),
            findings.shouting_score
        );
        findings
    }
}
