use crate::config::Tables;
use crate::metrics::{Document, MetricsCalculator};
use crate::normalization::{Alphabet, Dictionary, Field, NormalizedText, TextNormalizer};
use crate::stats::{LinguisticReport, LinguisticStats, WordFreq};
use crate::trainer::ingest::{CorpusRow, Label};
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;

/// Words must appear in more than this many documents of a class to be kept.
pub const MIN_DOCUMENT_FREQUENCY: u32 = 2;
/// Entries kept per class and field.
pub const TOP_WORDS: usize = 100;

const PROGRESS_EVERY: u64 = 1000;

#[derive(Debug, Default)]
struct ClassAccumulator {
    emails: u32,
    word_sum: u64,
    sentence_len_sum: f64,
    shouting_sum: f64,
    richness_sum: f64,
    sentiment_sum: f64,
    readability_sum: f64,
    density_sum: f64,
    body_df: HashMap<String, u32>,
    subject_df: HashMap<String, u32>,
}

impl ClassAccumulator {
    fn add(&mut self, doc: &Document, body: &NormalizedText, subject: &NormalizedText) {
        self.emails += 1;
        self.word_sum += doc.raw_word_count as u64;
        self.sentence_len_sum += doc.avg_sentence_len;
        self.shouting_sum += doc.metrics.shouting_ratio;
        self.richness_sum += doc.metrics.lexical_richness;
        self.sentiment_sum += doc.metrics.sentiment;
        self.readability_sum += doc.metrics.readability;
        self.density_sum += doc.metrics.trigger_density;

        // Document frequency: each distinct token once per document.
        for word in body.unique() {
            *self.body_df.entry(word.to_string()).or_insert(0) += 1;
        }
        for word in subject.unique() {
            *self.subject_df.entry(word.to_string()).or_insert(0) += 1;
        }
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.emails == 0 {
            0.0
        } else {
            sum / self.emails as f64
        }
    }

    fn stats(&self) -> LinguisticStats {
        LinguisticStats {
            total_emails: self.emails,
            avg_word_count: self.mean(self.word_sum as f64),
            avg_sentence_length: self.mean(self.sentence_len_sum),
            avg_shouting_score: self.mean(self.shouting_sum),
            top_body_words: top_words(&self.body_df, self.emails),
            top_subject_words: top_words(&self.subject_df, self.emails),
        }
    }

    fn summary(&self) -> ClassSummary {
        ClassSummary {
            emails: self.emails,
            avg_lexical_richness: self.mean(self.richness_sum),
            avg_sentiment: self.mean(self.sentiment_sum),
            avg_readability: self.mean(self.readability_sum),
            avg_trigger_density: self.mean(self.density_sum),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassSummary {
    pub emails: u32,
    pub avg_lexical_richness: f64,
    pub avg_sentiment: f64,
    pub avg_readability: f64,
    pub avg_trigger_density: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub ingested_rows: u64,
    pub malformed_rows: u64,
    pub safe: ClassSummary,
    pub scam: ClassSummary,
}

/// Filter, rank and truncate one document-frequency map.
pub fn top_words(document_frequency: &HashMap<String, u32>, class_total: u32) -> Vec<WordFreq> {
    if class_total == 0 {
        return Vec::new();
    }
    let mut entries: Vec<WordFreq> = document_frequency
        .iter()
        .filter(|&(_, &count)| count > MIN_DOCUMENT_FREQUENCY)
        .map(|(word, &count)| WordFreq {
            word: word.clone(),
            count,
            percent: count as f64 / class_total as f64 * 100.0,
        })
        .collect();
    // percent is proportional to count; ties are broken alphabetically so
    // the artifact is reproducible.
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    entries.truncate(TOP_WORDS);
    entries
}

pub struct CorpusAggregator {
    normalizer: TextNormalizer,
    metrics: MetricsCalculator,
    safe: ClassAccumulator,
    scam: ClassAccumulator,
    ingested: u64,
    malformed: u64,
}

impl CorpusAggregator {
    pub fn new(tables: &Tables, dictionary: Dictionary) -> Result<Self> {
        Ok(Self {
            normalizer: TextNormalizer::new(tables, Alphabet::Ascii)?.with_dictionary(dictionary),
            metrics: MetricsCalculator::new(tables),
            safe: ClassAccumulator::default(),
            scam: ClassAccumulator::default(),
            ingested: 0,
            malformed: 0,
        })
    }

    pub fn add_row(&mut self, row: &CorpusRow) -> Document {
        let clean_body = self.normalizer.strip_html(&row.body);
        let body_tokens = self.normalizer.normalize_clean(&clean_body, Field::Body);
        let subject_tokens = self.normalizer.normalize(&row.subject, Field::Subject);
        let doc = self
            .metrics
            .analyze(&self.normalizer, &row.subject, &clean_body, &body_tokens);

        let class = match row.label {
            Label::Safe => &mut self.safe,
            Label::Scam => &mut self.scam,
        };
        class.add(&doc, &body_tokens, &subject_tokens);
        self.ingested += 1;
        doc
    }

    pub fn record_malformed(&mut self, reason: &anyhow::Error) {
        self.malformed += 1;
        log::debug!("Skipping malformed row: {reason:#}");
    }

    /// Consume every row of a source, skipping malformed ones.
    pub fn ingest<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = Result<CorpusRow>>,
    {
        for row in rows {
            match row {
                Ok(row) => {
                    self.add_row(&row);
                    if self.ingested % PROGRESS_EVERY == 0 {
                        log::info!("Processed {} emails...", self.ingested);
                    }
                }
                Err(e) => self.record_malformed(&e),
            }
        }
    }

    pub fn finish(self) -> (LinguisticReport, TrainingSummary) {
        let report = LinguisticReport {
            safe_stats: self.safe.stats(),
            scam_stats: self.scam.stats(),
        };
        let summary = TrainingSummary {
            ingested_rows: self.ingested,
            malformed_rows: self.malformed,
            safe: self.safe.summary(),
            scam: self.scam.summary(),
        };
        (report, summary)
    }
}
