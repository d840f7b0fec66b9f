//! RFC 5322 message parsing: mbox envelope stripping, header unfolding and
//! RFC 2047 encoded-word decoding.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use std::collections::HashMap;

/// Base64 engine that tolerates missing padding and trailing bits, as
/// produced by sloppy mailers.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Header fields keyed by lowercase name. Repeated fields keep their first
/// occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    fields: HashMap<String, String>,
}

impl Headers {
    pub fn parse(block: &[u8]) -> Self {
        let text = decode_header_bytes(block);
        let mut fields = HashMap::new();
        for (name, value) in unfold(&text) {
            fields.entry(name).or_insert(value);
        }
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Raw value, or the empty string when the field is absent.
    pub fn raw(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    /// Value with RFC 2047 encoded words decoded.
    pub fn decoded(&self, name: &str) -> String {
        decode_encoded_words(self.raw(name))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.fields
            .entry(name.to_lowercase())
            .or_insert_with(|| value.to_string());
    }
}

/// A parsed message: headers plus the undecoded body bytes.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    headers: Headers,
    body: Vec<u8>,
}

impl RawMessage {
    pub fn parse(raw: &[u8]) -> Self {
        let data = strip_mbox_envelope(raw);
        let (header_block, body) = split_header_block(data);
        Self {
            headers: Headers::parse(header_block),
            body: body.to_vec(),
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Drop a leading BOM and a single mbox `From ` envelope line.
pub fn strip_mbox_envelope(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Split at the first empty line. Without one, everything is header.
pub fn split_header_block(data: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;
    while pos < data.len() {
        let newline = data[pos..].iter().position(|&b| b == b'\n').map(|i| pos + i);
        let line_end = newline.unwrap_or(data.len());
        let line = &data[pos..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            let body = newline.map(|n| &data[n + 1..]).unwrap_or_default();
            return (&data[..pos], body);
        }
        match newline {
            Some(n) => pos = n + 1,
            None => break,
        }
    }
    (data, &[])
}

/// UTF-8 first, then Windows-1252 which accepts every byte.
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Join continuation lines and return `(lowercase_name, value)` pairs in order.
fn unfold(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                if !last.1.is_empty() {
                    last.1.push(' ');
                }
                last.1.push_str(line.trim());
            }
        } else if let Some(colon) = line.find(':') {
            let name = line[..colon].trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            result.push((name, line[colon + 1..].trim().to_string()));
        }
    }
    result
}

/// Decode RFC 2047 encoded words. Whitespace between two adjacent encoded
/// words is dropped; undecodable words are kept verbatim.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        let after_start = &remaining[start + 2..];
        match decode_word(after_start) {
            Some((text, consumed)) => {
                if !last_was_encoded || !before.trim().is_empty() {
                    result.push_str(before);
                }
                result.push_str(&text);
                remaining = &after_start[consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str(before);
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// `charset?encoding?text?=`, returning the text and the bytes consumed.
fn decode_word(s: &str) -> Option<(String, usize)> {
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];
    let rest = &rest[second_q + 1..];
    let end = rest.find("?=")?;
    let encoded = &rest[..end];
    if charset.is_empty() || encoded.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => LENIENT_BASE64.decode(encoded).ok()?,
        "Q" | "q" => decode_q(encoded),
        _ => return None,
    };
    let consumed = first_q + 1 + second_q + 1 + end + 2;
    Some((decode_charset(charset, &bytes), consumed))
}

/// Q encoding: `_` is a space, `=XX` a hex byte.
fn decode_q(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                match hex_byte(bytes.get(i + 1).copied(), bytes.get(i + 2).copied()) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

fn hex_byte(hi: Option<u8>, lo: Option<u8>) -> Option<u8> {
    let hi = (hi? as char).to_digit(16)?;
    let lo = (lo? as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Decode `bytes` in the named charset, lossy UTF-8 when the label is unknown.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    // RFC 2231 allows a `*language` suffix on the charset.
    let label = charset.split('*').next().unwrap_or_default().trim();
    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(encoding) => {
            let (decoded, _, _) = encoding.decode(bytes);
            decoded.into_owned()
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Address between the first `<` and the last `>`, or the whole value.
pub fn extract_address(value: &str) -> &str {
    match (value.find('<'), value.rfind('>')) {
        (Some(start), Some(end)) if end > start => value[start + 1..end].trim(),
        _ => value.trim(),
    }
}

/// Lowercased domain of an address, empty unless it has exactly one `@`.
pub fn domain_of(address: &str) -> String {
    let mut parts = address.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(domain), None) => domain.to_lowercase(),
        _ => String::new(),
    }
}
