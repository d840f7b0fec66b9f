//! MIME body extraction.
//!
//! A message is parsed with `mail-parser` and mapped into a [`MimePart`]
//! tree, then one best-effort body is selected from it: the last HTML part
//! found wins, otherwise the first plain-text part.

use crate::message::{decode_charset, split_header_block, strip_mbox_envelope, Headers, LENIENT_BASE64};
use base64::Engine;
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};

/// Nesting deeper than this is flattened to an empty part.
pub const MAX_DEPTH: usize = 8;

/// `Content-Type` of a part, as reported by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Lowercase `type/subtype`.
    pub essence: String,
    pub charset: Option<String>,
    pub boundary: Option<String>,
}

impl MediaType {
    fn of(part: &MessagePart<'_>) -> Self {
        let Some(ct) = part.content_type() else {
            return Self::text_plain();
        };
        let essence = match ct.subtype() {
            Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
            None => ct.ctype().to_string(),
        };
        Self {
            essence: essence.to_lowercase(),
            charset: ct.attribute("charset").map(str::to_string),
            boundary: ct
                .attribute("boundary")
                .filter(|b| !b.is_empty())
                .map(str::to_string),
        }
    }

    pub fn text_plain() -> Self {
        Self {
            essence: "text/plain".to_string(),
            charset: None,
            boundary: None,
        }
    }

    pub fn is_multipart(&self) -> bool {
        self.essence.starts_with("multipart/")
    }

    pub fn is_html(&self) -> bool {
        self.essence == "text/html"
    }

    pub fn is_plain_text(&self) -> bool {
        self.essence == "text/plain"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    QuotedPrintable,
    Base64,
    /// `7bit`, `8bit`, `binary` and anything unknown pass through unchanged.
    Identity,
}

impl TransferEncoding {
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("quoted-printable") => TransferEncoding::QuotedPrintable,
            Some("base64") => TransferEncoding::Base64,
            _ => TransferEncoding::Identity,
        }
    }

    pub fn decode(self, content: &[u8]) -> Vec<u8> {
        match self {
            TransferEncoding::QuotedPrintable => decode_quoted_printable(content),
            TransferEncoding::Base64 => {
                let compact: Vec<u8> = content
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                match LENIENT_BASE64.decode(&compact) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        log::debug!("Invalid base64 part, keeping raw content: {e}");
                        content.to_vec()
                    }
                }
            }
            TransferEncoding::Identity => content.to_vec(),
        }
    }
}

/// Robust quoted-printable decoding: invalid escapes are kept as written.
pub fn decode_quoted_printable(content: &[u8]) -> Vec<u8> {
    match quoted_printable::decode(content, quoted_printable::ParseMode::Robust) {
        Ok(decoded) => decoded,
        Err(e) => {
            log::debug!("Invalid quoted-printable part, keeping raw content: {e}");
            content.to_vec()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartBody {
    /// Decoded text of a leaf part.
    Text(String),
    Multipart(Vec<MimePart>),
    /// Leaf that carries no readable text (attachments, images).
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MimePart {
    pub content_type: MediaType,
    pub transfer_encoding: TransferEncoding,
    pub body: PartBody,
}

impl MimePart {
    /// Build the tree for a whole raw message. A root that is not multipart
    /// is always decoded as text, whatever its declared type.
    pub fn parse(raw: &[u8]) -> Self {
        let data = strip_mbox_envelope(raw);
        let Some(message) = MessageParser::default().parse(data) else {
            log::debug!("MIME parser rejected the message, decoding the body as one text part");
            return Self::fallback(data);
        };
        let Some(root) = message.parts.first() else {
            return Self::fallback(data);
        };

        let content_type = MediaType::of(root);
        let body = if content_type.is_multipart() {
            PartBody::Multipart(children(&message, root, 1))
        } else {
            PartBody::Text(leaf_text(root, &content_type))
        };
        Self {
            transfer_encoding: TransferEncoding::from_header(root.content_transfer_encoding()),
            content_type,
            body,
        }
    }

    fn node(message: &Message<'_>, part: &MessagePart<'_>, depth: usize) -> Self {
        let content_type = MediaType::of(part);
        let body = if content_type.is_multipart() {
            PartBody::Multipart(children(message, part, depth + 1))
        } else if content_type.is_html() || content_type.is_plain_text() {
            PartBody::Text(leaf_text(part, &content_type))
        } else {
            PartBody::Binary
        };
        Self {
            transfer_encoding: TransferEncoding::from_header(part.content_transfer_encoding()),
            content_type,
            body,
        }
    }

    fn fallback(data: &[u8]) -> Self {
        let (header_block, body) = split_header_block(data);
        let headers = Headers::parse(header_block);
        let transfer_encoding = TransferEncoding::from_header(headers.get("content-transfer-encoding"));
        let text = String::from_utf8_lossy(&transfer_encoding.decode(body)).into_owned();
        Self {
            content_type: MediaType::text_plain(),
            transfer_encoding,
            body: PartBody::Text(text),
        }
    }

    /// The best-effort human-visible body of this subtree.
    pub fn best_body(&self) -> String {
        match &self.body {
            PartBody::Text(text) => text.clone(),
            PartBody::Multipart(children) => select_body(children),
            PartBody::Binary => String::new(),
        }
    }
}

fn children(message: &Message<'_>, part: &MessagePart<'_>, depth: usize) -> Vec<MimePart> {
    if depth > MAX_DEPTH {
        log::debug!("Multipart nesting deeper than {MAX_DEPTH}, flattening");
        return Vec::new();
    }
    match &part.body {
        PartType::Multipart(ids) => ids
            .iter()
            .filter_map(|id| message.parts.get(*id as usize))
            .map(|child| MimePart::node(message, child, depth))
            .collect(),
        _ => {
            log::debug!("Multipart part without boundary, skipping");
            Vec::new()
        }
    }
}

/// Text and HTML leaves arrive charset-decoded; anything else is decoded
/// from its transfer-decoded bytes.
fn leaf_text(part: &MessagePart<'_>, content_type: &MediaType) -> String {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => match &content_type.charset {
            Some(charset) => decode_charset(charset, bytes),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
        PartType::Message(_) | PartType::Multipart(_) => String::new(),
    }
}

fn looks_like_html(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("<html") || lower.contains("<div") || lower.contains("<body")
}

/// Sibling selection: HTML (declared, or sniffed for nested multiparts)
/// beats plain text. Empty results are ignored.
fn select_body(parts: &[MimePart]) -> String {
    let mut html: Option<String> = None;
    let mut text: Option<String> = None;

    for part in parts {
        let content = part.best_body();
        if content.trim().is_empty() {
            continue;
        }
        let is_html = match part.body {
            PartBody::Multipart(_) => looks_like_html(&content),
            PartBody::Text(_) => part.content_type.is_html(),
            PartBody::Binary => false,
        };
        if is_html {
            html = Some(content);
        } else if text.is_none() {
            text = Some(content);
        }
    }

    html.or(text).unwrap_or_default()
}

/// Best-effort visible body of a raw message.
pub fn extract_body(raw: &[u8]) -> String {
    MimePart::parse(raw).best_body()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(raw: &str) -> String {
        extract_body(raw.as_bytes())
    }

    #[test]
    fn test_media_type_from_parsed_headers() {
        let raw = "Content-Type: Multipart/Alternative; boundary=\"b1;x\"\n\n\
                   --b1;x\n\
                   Content-Type: text/plain; charset=UTF-8\n\n\
                   hi\n\
                   --b1;x--\n";
        let tree = MimePart::parse(raw.as_bytes());
        assert_eq!(tree.content_type.essence, "multipart/alternative");
        assert!(tree.content_type.is_multipart());
        assert_eq!(tree.content_type.boundary.as_deref(), Some("b1;x"));

        let PartBody::Multipart(children) = &tree.body else {
            panic!("expected a multipart root, got {:?}", tree.body);
        };
        assert_eq!(children.len(), 1);
        assert!(children[0].content_type.is_plain_text());
        assert_eq!(
            children[0].content_type.charset.as_deref().map(str::to_lowercase).as_deref(),
            Some("utf-8")
        );
    }

    #[test]
    fn test_quoted_printable_round_trip() {
        let original = "Dear customer, your 100% = guaranteed prize awaits. This line is intentionally \
                        long so that the encoder has to insert a soft line break somewhere in it.";
        let encoded = String::from_utf8(quoted_printable::encode(original)).unwrap();
        assert_ne!(encoded, original);
        assert_eq!(String::from_utf8(decode_quoted_printable(encoded.as_bytes())).unwrap(), original);

        let raw = format!(
            "Content-Type: text/plain\nContent-Transfer-Encoding: quoted-printable\n\n{encoded}"
        );
        assert_eq!(extract(&raw).trim_end(), original);
    }

    #[test]
    fn test_quoted_printable_keeps_invalid_escapes() {
        assert_eq!(decode_quoted_printable(b"a=ZZb =3D c=\r\nd"), b"a=ZZb = cd");
    }

    #[test]
    fn test_unparsable_message_falls_back_to_transfer_decoding() {
        let part = MimePart::fallback(b"Content-Transfer-Encoding: quoted-printable\n\nso=3Dso");
        assert_eq!(part.transfer_encoding, TransferEncoding::QuotedPrintable);
        assert_eq!(part.best_body(), "so=so");
        assert_eq!(extract(""), "");
    }

    #[test]
    fn test_single_part_extraction_is_idempotent() {
        let raw = "Subject: hi\nContent-Type: text/plain\n\nHello there,\nsee you soon.\n";
        let once = extract(raw);
        let twice = extract(&format!("Subject: hi\nContent-Type: text/plain\n\n{once}"));
        assert_eq!(once.trim_end(), "Hello there,\nsee you soon.");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_content_type_is_plain_text() {
        assert_eq!(extract("Subject: x\n\nJust text").trim_end(), "Just text");
        assert_eq!(
            extract("Content-Type: ???\nContent-Transfer-Encoding: quoted-printable\n\nso=3Dso").trim_end(),
            "so=so"
        );
    }

    #[test]
    fn test_mbox_envelope_is_not_part_of_the_headers() {
        let raw = "From someone@example.org Thu Jan  1 00:00:00 2024\n\
                   Content-Type: text/plain\n\n\
                   after the envelope";
        assert_eq!(extract(raw).trim_end(), "after the envelope");
    }

    #[test]
    fn test_html_preferred_over_plain_text() {
        let raw = "Content-Type: multipart/alternative; boundary=\"alt\"\n\n\
                   preamble\n\
                   --alt\n\
                   Content-Type: text/plain; charset=utf-8\n\n\
                   Plain version\n\
                   --alt\n\
                   Content-Type: text/html; charset=utf-8\n\
                   Content-Transfer-Encoding: base64\n\n\
                   PHA+SFRNTCB2ZXJzaW9uPC9wPg==\n\
                   --alt--\n\
                   epilogue\n";
        assert_eq!(extract(raw).trim_end(), "<p>HTML version</p>");
    }

    #[test]
    fn test_first_plain_text_wins_without_html() {
        let raw = "Content-Type: multipart/mixed; boundary=m\n\n\
                   --m\n\n\
                   First text\n\
                   --m\n\
                   Content-Type: text/plain\n\n\
                   Second text\n\
                   --m\n\
                   Content-Type: application/pdf\n\
                   Content-Transfer-Encoding: base64\n\n\
                   JVBERi0xLjQK\n\
                   --m--\n";
        assert_eq!(extract(raw).trim_end(), "First text");
    }

    #[test]
    fn test_nested_multipart_html_is_sniffed() {
        let raw = "Content-Type: multipart/mixed; boundary=outer\n\n\
                   --outer\n\
                   Content-Type: multipart/alternative; boundary=inner\n\n\
                   --inner\n\
                   Content-Type: text/plain\n\n\
                   fallback\n\
                   --inner\n\
                   Content-Type: text/html; charset=iso-8859-1\n\
                   Content-Transfer-Encoding: quoted-printable\n\n\
                   <div>Gr=FC=DFe</div>\n\
                   --inner--\n\
                   --outer\n\
                   Content-Type: image/png\n\
                   Content-Transfer-Encoding: base64\n\n\
                   iVBORw0KGgo=\n\
                   --outer--\n";
        assert_eq!(extract(raw).trim_end(), "<div>Grüße</div>");
    }

    #[test]
    fn test_malformed_parts_are_skipped() {
        let raw = "Content-Type: multipart/mixed; boundary=b\n\n\
                   --b\n\
                   Content-Type: multipart/related\n\n\
                   no boundary here\n\
                   --b\n\
                   Content-Type: text/plain\n\n\
                   survivor\n\
                   --b\n\
                   Content-Type: text/plain\n\n\
                   unterminated";
        assert_eq!(extract(raw).trim_end(), "survivor");

        let no_boundary = "Content-Type: multipart/mixed\n\nwhatever";
        assert_eq!(extract(no_boundary), "");
    }

    #[test]
    fn test_depth_guard_flattens_deep_nesting() {
        let mut body = String::from("Content-Type: text/plain\n\ndeep secret\n");
        for level in (0..12).rev() {
            body = format!(
                "Content-Type: multipart/mixed; boundary=l{level}x\n\n--l{level}x\n{body}--l{level}x--\n"
            );
        }
        assert_eq!(MimePart::parse(body.as_bytes()).best_body(), "");

        let mut shallow = String::from("Content-Type: text/plain\n\nreachable\n");
        for level in (0..3).rev() {
            shallow = format!(
                "Content-Type: multipart/mixed; boundary=s{level}x\n\n--s{level}x\n{shallow}--s{level}x--\n"
            );
        }
        assert_eq!(extract(&shallow).trim_end(), "reachable");
    }
}
