//! Body renditions handed to the presentation layer.

use anyhow::Result;
use regex::Regex;
use std::collections::HashSet;

const URGENCY_WORDS: &[&str] = &["immediately", "urgent", "suspend", "limit", "verify", "action"];

pub struct PreviewRenderer {
    script_regex: Regex,
    event_handler_regex: Regex,
}

impl PreviewRenderer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            script_regex: Regex::new(r"(?si)<script[^>]*>.*?</script\s*>")?,
            event_handler_regex: Regex::new(r#"(?i)\s+on\w+\s*=\s*"[^"]*""#)?,
        })
    }

    /// Extracted body with `<script>` blocks and inline `on*="..."` handlers removed.
    pub fn sanitize_html(&self, body: &str) -> String {
        let text = self.script_regex.replace_all(body, "");
        self.event_handler_regex.replace_all(&text, "").into_owned()
    }

    /// Escape `clean_text` and wrap the matched subject keywords and a fixed
    /// list of urgency words in highlight spans. Newlines become `<br>`.
    pub fn highlight(&self, clean_text: &str, keywords: &[String]) -> Result<String> {
        let escaped = escape_html(clean_text);

        let scam: HashSet<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let mut words: Vec<String> = scam.iter().cloned().collect();
        words.extend(
            URGENCY_WORDS
                .iter()
                .map(|w| w.to_string())
                .filter(|w| !scam.contains(w)),
        );
        words.retain(|w| !w.is_empty());
        if words.is_empty() {
            return Ok(escaped.replace('\n', "<br>"));
        }
        // Longest first so overlapping words match the longer alternative.
        words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))?;

        let highlighted = pattern.replace_all(&escaped, |caps: &regex::Captures| {
            let word = &caps[0];
            let class = if scam.contains(&word.to_lowercase()) {
                "highlight-scam"
            } else {
                "highlight-urgent"
            };
            format!(r#"<span class="{class}">{word}</span>"#)
        });
        Ok(highlighted.replace('\n', "<br>"))
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
