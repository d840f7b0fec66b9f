//! Offline statistics builder.

pub mod aggregate;
pub mod dictionary;
pub mod ingest;

pub use aggregate::{ClassSummary, CorpusAggregator, TrainingSummary};
pub use ingest::{CorpusFormat, CorpusReader, CorpusRow, Label};

use crate::config::Tables;
use crate::normalization::Dictionary;
use crate::stats::LinguisticReport;
use anyhow::Result;
use std::path::Path;

/// Stream one corpus file through the aggregator.
pub fn train(
    path: &Path,
    format: CorpusFormat,
    tables: &Tables,
    dictionary: Dictionary,
) -> Result<(LinguisticReport, TrainingSummary)> {
    log::info!("Processing dataset {} ({format:?})", path.display());
    let reader = CorpusReader::open(path, format)?;
    let mut aggregator = CorpusAggregator::new(tables, dictionary)?;
    aggregator.ingest(reader);
    let (report, summary) = aggregator.finish();

    if summary.malformed_rows > 0 {
        log::warn!("Skipped {} malformed rows", summary.malformed_rows);
    }
    log::info!(
        "Finished: {} safe, {} scam emails",
        report.safe_stats.total_emails,
        report.scam_stats.total_emails
    );
    Ok((report, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_from_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        let mut csv = String::from("subject,body,label\n");
        for _ in 0..3 {
            csv.push_str("Urgent,\"Your mailbox is suspended, verify now\",1\n");
            csv.push_str("Minutes,\"Minutes from the budget meeting\",0\n");
        }
        csv.push_str("only-one-column\n");
        std::fs::write(&path, csv).unwrap();

        let (report, summary) =
            train(&path, CorpusFormat::Delimited, &Tables::default(), Dictionary::empty()).unwrap();
        assert_eq!(summary.ingested_rows, 6);
        assert_eq!(summary.malformed_rows, 1);
        assert_eq!(report.scam_stats.total_emails, 3);
        assert!(report
            .scam_stats
            .top_body_words
            .iter()
            .any(|w| w.word == "mailbox" && (w.percent - 100.0).abs() < 1e-9));
        assert!(report
            .safe_stats
            .top_body_words
            .iter()
            .any(|w| w.word == "budget"));
    }

    #[test]
    fn test_train_from_truncated_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        std::fs::write(
            &path,
            r#"[{"text":"win a prize now","label":1},{"text":"lunch at noon","label":0},{"text":"trunc"#,
        )
        .unwrap();

        let (report, summary) =
            train(&path, CorpusFormat::Structured, &Tables::default(), Dictionary::empty()).unwrap();
        assert_eq!(summary.ingested_rows, 2);
        assert_eq!(summary.malformed_rows, 1);
        assert_eq!(report.scam_stats.total_emails, 1);
        assert_eq!(report.safe_stats.total_emails, 1);
    }

    #[test]
    fn test_train_missing_file_is_an_error() {
        let result = train(
            Path::new("no/such/corpus.csv"),
            CorpusFormat::Delimited,
            &Tables::default(),
            Dictionary::empty(),
        );
        assert!(result.is_err());
    }
}
