//! Text decoding for archived payloads.
//!
//! Archived pages frequently predate UTF-8 and carry no (or a wrong) charset
//! header, so the encoding can be guessed from the bytes themselves.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, WINDOWS_1252};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// How many leading bytes are scanned for a `<meta charset>` declaration.
const META_SNIFF_LEN: usize = 2048;

static META_CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([a-zA-Z0-9_\-:.]+)"#)
        .expect("meta charset pattern is valid")
});

/// Decode using the encoding apparent from the content.
///
/// Order: byte-order mark, strict UTF-8, a `<meta charset>` declaration in the
/// document head, then statistical detection over the whole body.
#[must_use]
pub fn decode_apparent(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let head = &bytes[..bytes.len().min(META_SNIFF_LEN)];
    let encoding = META_CHARSET_RE
        .captures(head)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Encoding::for_label(m.as_bytes()))
        .unwrap_or_else(|| detect(bytes));

    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn detect(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Decode using the `charset` parameter of a `Content-Type` header.
///
/// Text without a declared charset is read as ISO-8859-1 (windows-1252 in
/// WHATWG terms), matching HTTP/1.1's historical default.
#[must_use]
pub fn decode_declared(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(WINDOWS_1252);

    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

/// True when the content type names a textual payload.
#[must_use]
pub fn is_text(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.starts_with("text"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apparent_utf8() {
        assert_eq!(decode_apparent("caf\u{e9}".as_bytes()), "caf\u{e9}");
    }

    #[test]
    fn test_apparent_detects_western_text() {
        let (bytes, _, _) = WINDOWS_1252.encode("Le café est très bon, à bientôt chez nous.");
        assert_eq!(
            decode_apparent(&bytes),
            "Le café est très bon, à bientôt chez nous."
        );
    }

    #[test]
    fn test_apparent_detects_shift_jis() {
        let text = "日本語のテキストです。古いウェブページはシフトJISで保存されていることが多いです。";
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode(text);
        assert_eq!(decode_apparent(&bytes), text);
    }

    #[test]
    fn test_apparent_detects_windows_1251() {
        let text = "Привет мир! Это пример текста на русском языке, сохранённый в старой кодировке.";
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(text);
        assert_eq!(decode_apparent(&bytes), text);
    }

    #[test]
    fn test_apparent_meta_charset() {
        // 0xC0 0xE1 in windows-1251 is "Аб"
        let html = b"<html><head><meta charset=\"windows-1251\"></head><body>\xc0\xe1</body></html>";
        assert!(decode_apparent(html).contains("\u{410}\u{431}"));
    }

    #[test]
    fn test_apparent_bom() {
        let bytes = [0xEF, 0xBB, 0xBF, b'h', b'i'];
        assert_eq!(decode_apparent(&bytes), "hi");
    }

    #[test]
    fn test_declared_charset() {
        assert_eq!(
            decode_declared("caf\u{e9}".as_bytes(), Some("text/html; charset=UTF-8")),
            "caf\u{e9}"
        );
        assert_eq!(decode_declared(b"caf\xe9", Some("text/html")), "caf\u{e9}");
    }

    #[test]
    fn test_is_text() {
        assert!(is_text(Some("text/html; charset=utf-8")));
        assert!(is_text(Some("text/plain")));
        assert!(!is_text(Some("image/png")));
        assert!(!is_text(None));
    }
}
