//! Per-document linguistic metrics computed while building the statistics table.

use crate::config::Tables;
use crate::normalization::{NormalizedText, TextNormalizer};
use serde::Serialize;
use std::collections::HashSet;

/// Segments shorter than this (after trimming) are not counted as sentences.
const MIN_SENTENCE_CHARS: usize = 10;
const SENTIMENT_SCALE: f64 = 10.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMetrics {
    pub lexical_richness: f64,
    pub sentiment: f64,
    pub readability: f64,
    pub shouting_ratio: f64,
    pub trigger_density: f64,
}

/// One analyzed corpus row.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub subject: String,
    pub body: String,
    /// Letter runs of the stripped body before any filtering.
    pub raw_word_count: usize,
    pub token_count: usize,
    pub unique_token_count: usize,
    pub sentence_count: usize,
    pub avg_sentence_len: f64,
    pub metrics: DocumentMetrics,
}

pub struct MetricsCalculator {
    positive: HashSet<String>,
    negative: HashSet<String>,
    triggers: Vec<String>,
}

impl MetricsCalculator {
    pub fn new(tables: &Tables) -> Self {
        Self {
            positive: tables.positive_words.iter().map(|w| w.to_lowercase()).collect(),
            negative: tables.negative_words.iter().map(|w| w.to_lowercase()).collect(),
            triggers: tables
                .trigger_phrases
                .iter()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Build a [`Document`] from a stripped body and its normalized tokens.
    pub fn analyze(
        &self,
        normalizer: &TextNormalizer,
        subject: &str,
        clean_body: &str,
        tokens: &NormalizedText,
    ) -> Document {
        let raw_words = normalizer.words(clean_body);
        let sentence_count = sentence_count(clean_body);
        let token_count = tokens.token_count();

        Document {
            subject: subject.to_string(),
            body: clean_body.to_string(),
            raw_word_count: raw_words.len(),
            token_count,
            unique_token_count: tokens.unique_count(),
            sentence_count,
            avg_sentence_len: raw_words.len() as f64 / sentence_count as f64,
            metrics: DocumentMetrics {
                lexical_richness: lexical_richness(tokens.unique_count(), token_count),
                sentiment: self.sentiment(&raw_words),
                readability: readability(clean_body, token_count, sentence_count),
                shouting_ratio: shouting_ratio(clean_body),
                trigger_density: self.trigger_density(clean_body),
            },
        }
    }

    pub fn sentiment(&self, words: &[String]) -> f64 {
        if words.is_empty() {
            return 0.0;
        }
        let score: f64 = words
            .iter()
            .map(|w| {
                if self.positive.contains(w) {
                    1.0
                } else if self.negative.contains(w) {
                    -1.0
                } else {
                    0.0
                }
            })
            .sum();
        score / words.len() as f64 * SENTIMENT_SCALE
    }

    /// Trigger phrase occurrences per 100 whitespace-delimited words.
    pub fn trigger_density(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let word_count = lower.split_whitespace().count();
        if word_count == 0 {
            return 0.0;
        }
        let matches: usize = self
            .triggers
            .iter()
            .map(|t| lower.matches(t.as_str()).count())
            .sum();
        matches as f64 / word_count as f64 * 100.0
    }
}

/// Type-token ratio scaled by the log of the document length.
pub fn lexical_richness(unique: usize, total: usize) -> f64 {
    if total <= 1 {
        return 0.0;
    }
    (unique as f64 / total as f64) * (total as f64).ln()
}

/// Automated Readability Index approximation.
pub fn readability(text: &str, word_count: usize, sentence_count: usize) -> f64 {
    if word_count == 0 || sentence_count == 0 {
        return 0.0;
    }
    let chars = text.chars().filter(|c| *c != ' ').count() as f64;
    4.71 * (chars / word_count as f64) + 0.5 * (word_count as f64 / sentence_count as f64) - 21.43
}

/// Fraction of letters that are uppercase, in `0.0..=1.0`.
pub fn shouting_ratio(text: &str) -> f64 {
    let mut letters = 0usize;
    let mut upper = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if c.is_uppercase() {
            upper += 1;
        }
    }
    if letters == 0 {
        return 0.0;
    }
    upper as f64 / letters as f64
}

/// Number of `.`/`!`/`?` delimited segments longer than ten characters,
/// never less than one.
pub fn sentence_count(text: &str) -> usize {
    let count = text
        .split(['.', '!', '?'])
        .filter(|s| s.trim().chars().count() > MIN_SENTENCE_CHARS)
        .count();
    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::{Alphabet, Field};

    #[test]
    fn test_shouting_ratio_extremes() {
        assert_eq!(shouting_ratio("URGENT"), 1.0);
        assert_eq!(shouting_ratio("A"), 1.0);
        assert_eq!(shouting_ratio("all quiet here"), 0.0);
        assert_eq!(shouting_ratio("1234 !!"), 0.0);
        assert_eq!(shouting_ratio("AbCd"), 0.5);
    }

    #[test]
    fn test_lexical_richness_short_documents() {
        assert_eq!(lexical_richness(0, 0), 0.0);
        assert_eq!(lexical_richness(1, 1), 0.0);
        let r = lexical_richness(2, 4);
        assert!((r - 0.5 * 4f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_sentence_count_never_zero() {
        assert_eq!(sentence_count(""), 1);
        assert_eq!(sentence_count("Hi. Ok!"), 1);
        assert_eq!(
            sentence_count("This is the first sentence. And here comes another one! Short?"),
            2
        );
    }

    #[test]
    fn test_readability_zero_guards() {
        assert_eq!(readability("text", 0, 1), 0.0);
        assert_eq!(readability("text", 1, 0), 0.0);
        let ari = readability("ab cd", 2, 1);
        assert!((ari - (4.71 * 2.0 + 0.5 * 2.0 - 21.43)).abs() < 1e-9);
    }

    #[test]
    fn test_sentiment_and_trigger_density() {
        let calc = MetricsCalculator::new(&Tables::default());
        let words: Vec<String> = ["great", "scam", "fraud", "table"]
            .iter()
            .map(|w| w.to_string())
            .collect();
        assert!((calc.sentiment(&words) - (-1.0 / 4.0 * 10.0)).abs() < 1e-9);
        assert_eq!(calc.sentiment(&[]), 0.0);

        let density = calc.trigger_density("Click HERE to verify your account now");
        // "click here", "verify", "account" over 7 words
        assert!((density - 3.0 / 7.0 * 100.0).abs() < 1e-9);
        assert_eq!(calc.trigger_density("   "), 0.0);
    }

    #[test]
    fn test_analyze_document() {
        let tables = Tables::default();
        let normalizer = TextNormalizer::new(&tables, Alphabet::Ascii).unwrap();
        let calc = MetricsCalculator::new(&tables);
        let body = "Your account has been suspended today. Verify your banking details immediately!";
        let tokens = normalizer.normalize_clean(body, Field::Body);
        let doc = calc.analyze(&normalizer, "Alert", body, &tokens);

        assert_eq!(doc.sentence_count, 2);
        assert_eq!(doc.raw_word_count, 11);
        assert_eq!(doc.token_count, tokens.token_count());
        assert!(doc.metrics.lexical_richness > 0.0);
        assert!(doc.metrics.trigger_density > 0.0);
        assert!(doc.metrics.shouting_ratio > 0.0 && doc.metrics.shouting_ratio < 0.1);
    }
}
