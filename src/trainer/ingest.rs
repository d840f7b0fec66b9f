//! Corpus ingestion strategies.
//!
//! Both the delimited and the structured reader yield the same
//! [`CorpusRow`] items, so aggregation never branches on the input format.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Safe,
    Scam,
}

impl Label {
    /// `1`, `phish` and `spam` mark a scam row; anything else is safe.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "1" | "phish" | "spam" => Label::Scam,
            _ => Label::Safe,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorpusRow {
    pub subject: String,
    pub body: String,
    pub label: Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    Delimited,
    Structured,
}

impl CorpusFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("json") | Some("jsonl") | Some("ndjson") => CorpusFormat::Structured,
            _ => CorpusFormat::Delimited,
        }
    }
}

/// Column positions of a delimited corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub label: usize,
    pub body: usize,
    pub subject: Option<usize>,
}

impl ColumnLayout {
    /// Positional defaults of the Nazario phishing corpus.
    const DEFAULT_SUBJECT: usize = 3;
    const DEFAULT_BODY: usize = 4;

    /// Find the label, body and subject columns by header name, falling back
    /// to positional defaults for whatever could not be identified.
    pub fn sniff<'a, I>(header: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<String> = header
            .into_iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        if names.is_empty() {
            return Err(anyhow!("Corpus header is empty"));
        }

        let mut label = None;
        let mut body = None;
        let mut subject = None;
        for (i, name) in names.iter().enumerate() {
            match name.as_str() {
                "label" | "class" => label = Some(i),
                "body" | "text" => body = Some(i),
                "subject" => subject = Some(i),
                _ => {}
            }
        }

        let label = label.unwrap_or(names.len() - 1);
        let body = body
            .or_else(|| (names.len() > Self::DEFAULT_BODY).then_some(Self::DEFAULT_BODY))
            .ok_or_else(|| anyhow!("Could not determine the body column from header {names:?}"))?;
        let subject =
            subject.or_else(|| (names.len() > Self::DEFAULT_SUBJECT).then_some(Self::DEFAULT_SUBJECT));

        Ok(Self {
            label,
            body,
            subject,
        })
    }

    fn row(&self, record: &csv::StringRecord) -> Result<CorpusRow> {
        let field = |idx: usize| record.get(idx);
        let (Some(label), Some(body)) = (field(self.label), field(self.body)) else {
            return Err(anyhow!(
                "Row has {} columns, expected label at {} and body at {}",
                record.len(),
                self.label,
                self.body
            ));
        };
        Ok(CorpusRow {
            subject: self
                .subject
                .and_then(field)
                .map(str::to_string)
                .unwrap_or_default(),
            body: body.to_string(),
            label: Label::parse(label),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StructuredEntry {
    text: String,
    #[serde(default)]
    subject: Option<String>,
    label: StructuredLabel,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StructuredLabel {
    Number(i64),
    Text(String),
}

impl StructuredEntry {
    fn into_row(self) -> CorpusRow {
        let label = match self.label {
            StructuredLabel::Number(1) => Label::Scam,
            StructuredLabel::Number(_) => Label::Safe,
            StructuredLabel::Text(s) => Label::parse(&s),
        };
        CorpusRow {
            subject: self.subject.unwrap_or_default(),
            body: self.text,
            label,
        }
    }
}

/// Row source over one corpus file; malformed rows surface as `Err` items.
pub enum CorpusReader {
    Delimited {
        records: csv::StringRecordsIntoIter<Box<dyn Read>>,
        layout: ColumnLayout,
    },
    JsonLines {
        lines: std::io::Lines<BufReader<Box<dyn Read>>>,
    },
    /// Elements are deserialized one at a time; `done` is set at the
    /// closing bracket or after a syntax error.
    JsonArray {
        reader: BufReader<Box<dyn Read>>,
        done: bool,
    },
}

impl CorpusReader {
    pub fn open(path: &Path, format: CorpusFormat) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Unable to open corpus file: {}", path.display()))?;
        Self::from_reader(Box::new(file), format)
    }

    pub fn from_reader(reader: Box<dyn Read>, format: CorpusFormat) -> Result<Self> {
        match format {
            CorpusFormat::Delimited => Self::delimited(reader),
            CorpusFormat::Structured => Self::structured(reader),
        }
    }

    fn delimited(reader: Box<dyn Read>) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);
        let header = csv_reader
            .headers()
            .context("Unable to read corpus header")?
            .clone();
        let layout = ColumnLayout::sniff(header.iter())?;
        log::info!(
            "Columns - Subject: {:?}, Body: {}, Label: {}",
            layout.subject,
            layout.body,
            layout.label
        );
        Ok(CorpusReader::Delimited {
            records: csv_reader.into_records(),
            layout,
        })
    }

    fn structured(reader: Box<dyn Read>) -> Result<Self> {
        let mut buffered = BufReader::new(reader);
        let starts_with_array = loop {
            let buf = buffered.fill_buf().context("Unable to read corpus")?;
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(pos) => {
                    let is_array = buf[pos] == b'[';
                    buffered.consume(if is_array { pos + 1 } else { pos });
                    break is_array;
                }
                None if buf.is_empty() => break false,
                None => {
                    let len = buf.len();
                    buffered.consume(len);
                }
            }
        };

        if starts_with_array {
            Ok(CorpusReader::JsonArray {
                reader: buffered,
                done: false,
            })
        } else {
            Ok(CorpusReader::JsonLines {
                lines: buffered.lines(),
            })
        }
    }
}

impl Iterator for CorpusReader {
    type Item = Result<CorpusRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            CorpusReader::Delimited { records, layout } => {
                let record = records.next()?;
                Some(
                    record
                        .context("Unreadable corpus row")
                        .and_then(|record| layout.row(&record)),
                )
            }
            CorpusReader::JsonLines { lines } => loop {
                let line = match lines.next()? {
                    Ok(line) => line,
                    Err(e) => return Some(Err(anyhow!("Unreadable corpus line: {e}"))),
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                return Some(
                    serde_json::from_str::<StructuredEntry>(trimmed)
                        .map(StructuredEntry::into_row)
                        .context("Malformed corpus entry"),
                );
            },
            CorpusReader::JsonArray { reader, done } => next_array_entry(reader, done),
        }
    }
}

fn next_array_entry(reader: &mut BufReader<Box<dyn Read>>, done: &mut bool) -> Option<Result<CorpusRow>> {
    if *done {
        return None;
    }
    match skip_to_element(reader) {
        Ok(true) => {}
        Ok(false) => {
            *done = true;
            return None;
        }
        Err(e) => {
            *done = true;
            return Some(Err(e));
        }
    }

    let mut deserializer = serde_json::Deserializer::from_reader(&mut *reader);
    match serde_json::Value::deserialize(&mut deserializer) {
        Ok(value) => Some(
            serde_json::from_value::<StructuredEntry>(value)
                .map(StructuredEntry::into_row)
                .context("Malformed corpus entry"),
        ),
        Err(e) => {
            // The stream position is unknown after a syntax error.
            *done = true;
            Some(Err(anyhow!(e).context("Corpus array is truncated or not valid JSON")))
        }
    }
}

/// Skip whitespace and separators up to the next array element. Returns
/// `false` at the closing bracket or end of input.
fn skip_to_element(reader: &mut BufReader<Box<dyn Read>>) -> Result<bool> {
    loop {
        let buf = reader.fill_buf().context("Unable to read corpus")?;
        let Some(&byte) = buf.first() else {
            return Ok(false);
        };
        match byte {
            b']' => {
                reader.consume(1);
                return Ok(false);
            }
            b',' => reader.consume(1),
            b if b.is_ascii_whitespace() => reader.consume(1),
            _ => return Ok(true),
        }
    }
}
