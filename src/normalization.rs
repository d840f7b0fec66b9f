//! Text normalization shared by the trainer and the scorer.
//!
//! Raw text goes through HTML stripping, lowercasing, tokenization into
//! letter runs and a filter chain (length, numeric, stop words, dataset
//! artifacts and an optional reference dictionary).

use crate::config::Tables;
use anyhow::Result;
use regex::Regex;
use std::collections::HashSet;

/// Which characters count as letters when splitting text into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    /// `[a-zA-Z]` only. Used when building the statistics table.
    Ascii,
    /// Any Unicode letter. Used when scoring a message.
    Unicode,
}

impl Alphabet {
    fn is_letter(self, c: char) -> bool {
        match self {
            Alphabet::Ascii => c.is_ascii_alphabetic(),
            Alphabet::Unicode => c.is_alphabetic(),
        }
    }
}

/// Field a text belongs to; subjects keep shorter tokens than bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Body,
    Subject,
}

impl Field {
    pub fn min_token_len(self) -> usize {
        match self {
            Field::Body => 3,
            Field::Subject => 2,
        }
    }
}

/// Reference word list. An empty dictionary disables dictionary filtering.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    words: HashSet<String>,
}

impl Dictionary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| w.chars().count() > 1)
            .collect();
        Self { words }
    }

    pub fn is_loaded(&self) -> bool {
        !self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }
}

/// Ordered tokens of one normalized text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedText {
    pub tokens: Vec<String>,
}

impl NormalizedText {
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn unique(&self) -> HashSet<&str> {
        self.tokens.iter().map(String::as_str).collect()
    }

    pub fn unique_count(&self) -> usize {
        self.unique().len()
    }
}

pub struct TextNormalizer {
    script_style_regex: Regex,
    block_tag_regex: Regex,
    tag_regex: Regex,
    html_entity_regex: Regex,
    blank_lines_regex: Regex,
    stop_words: HashSet<String>,
    artifacts: HashSet<String>,
    dictionary: Dictionary,
    alphabet: Alphabet,
}

impl TextNormalizer {
    pub fn new(tables: &Tables, alphabet: Alphabet) -> Result<Self> {
        Ok(Self {
            script_style_regex: Regex::new(r"(?si)<(script|style)[^>]*>.*?</(script|style)\s*>")?,
            block_tag_regex: Regex::new(r"(?i)<(br|p|div|/div|tr|/tr)\b[^>]*>")?,
            tag_regex: Regex::new(r"<[^>]*>")?,
            html_entity_regex: Regex::new(
                r"&(?:#(\d+)|#[xX]([0-9A-Fa-f]+)|([a-zA-Z][a-zA-Z0-9]*));",
            )?,
            blank_lines_regex: Regex::new(r"\n\s*\n")?,
            stop_words: tables.stop_words.iter().map(|w| w.to_lowercase()).collect(),
            artifacts: tables
                .dataset_artifacts
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
            dictionary: Dictionary::empty(),
            alphabet,
        })
    }

    pub fn with_dictionary(mut self, dictionary: Dictionary) -> Self {
        if dictionary.is_loaded() {
            log::debug!("Dictionary filter enabled ({} words)", dictionary.len());
        } else {
            log::debug!("Dictionary empty, dictionary filter disabled");
        }
        self.dictionary = dictionary;
        self
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Remove markup, keeping block boundaries as line breaks so sentence
    /// detection still works on the result.
    pub fn strip_html(&self, input: &str) -> String {
        let text = self.script_style_regex.replace_all(input, "");
        let text = self.block_tag_regex.replace_all(&text, "\n");
        let text = self.tag_regex.replace_all(&text, " ");
        let text = self.decode_html_entities(&text);
        let text = self.blank_lines_regex.replace_all(&text, "\n\n");
        text.trim().to_string()
    }

    fn decode_html_entities(&self, text: &str) -> String {
        self.html_entity_regex
            .replace_all(text, |caps: &regex::Captures| {
                let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                let decoded = if let Some(decimal) = caps.get(1) {
                    decimal.as_str().parse::<u32>().ok().and_then(char::from_u32)
                } else if let Some(hex) = caps.get(2) {
                    u32::from_str_radix(hex.as_str(), 16)
                        .ok()
                        .and_then(char::from_u32)
                } else {
                    caps.get(3).and_then(|named| match named.as_str() {
                        "amp" => Some('&'),
                        "lt" => Some('<'),
                        "gt" => Some('>'),
                        "quot" => Some('"'),
                        "apos" => Some('\''),
                        "nbsp" => Some(' '),
                        _ => None,
                    })
                };
                decoded.map(String::from).unwrap_or_else(|| whole.to_string())
            })
            .into_owned()
    }

    /// All maximal letter runs of `text`, lowercased, without filtering.
    pub fn words(&self, text: &str) -> Vec<String> {
        let mut words = Vec::new();
        let mut current = String::new();
        for c in text.chars() {
            if self.alphabet.is_letter(c) {
                current.extend(c.to_lowercase());
            } else if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            words.push(current);
        }
        words
    }

    /// Full pipeline over raw (possibly HTML) text.
    pub fn normalize(&self, raw: &str, field: Field) -> NormalizedText {
        let clean = self.strip_html(raw);
        self.normalize_clean(&clean, field)
    }

    /// Pipeline over text that has already been through [`strip_html`](Self::strip_html).
    pub fn normalize_clean(&self, clean: &str, field: Field) -> NormalizedText {
        let tokens = self
            .words(clean)
            .into_iter()
            .filter(|w| self.keep(w, field))
            .collect();
        NormalizedText { tokens }
    }

    fn keep(&self, word: &str, field: Field) -> bool {
        if word.chars().count() < field.min_token_len() || is_numeric(word) {
            return false;
        }
        if self.stop_words.contains(word) || self.artifacts.contains(word) {
            return false;
        }
        // The dictionary filters body tokens only.
        field == Field::Subject || !self.dictionary.is_loaded() || self.dictionary.contains(word)
    }
}

fn is_numeric(word: &str) -> bool {
    word.chars().all(|c| c.is_ascii_digit())
}
