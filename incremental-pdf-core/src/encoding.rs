//! String encodings for PDF text strings and names
//!
//! Outline titles and document information values are written as PDF text
//! strings. Valid UTF-8 input becomes a UTF-16BE hex string prefixed with the
//! byte order mark (`<FEFF...>`), which every viewer decodes the same way.
//! Anything else is written as a literal string with the bytes preserved.

use crate::objects::Object;

const UTF16_BOM: [u8; 2] = [0xFE, 0xFF];

/// Escape the bytes of a literal string body (the part between parentheses).
pub fn escape_literal(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 8);
    for &ch in text {
        match ch {
            b'\\' | b'(' | b')' => {
                out.push(b'\\');
                out.push(ch);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reverse of [`escape_literal`] for the escapes it produces.
pub fn unescape_literal(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut iter = body.iter().copied();
    while let Some(ch) = iter.next() {
        if ch != b'\\' {
            out.push(ch);
            continue;
        }
        match iter.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Encode raw text bytes as a PDF text string object.
pub fn encode_text_string(text: &[u8]) -> Object {
    match std::str::from_utf8(text) {
        Ok(s) => {
            let mut bytes = Vec::with_capacity(2 + s.len() * 2);
            bytes.extend_from_slice(&UTF16_BOM);
            for unit in s.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            Object::HexString(bytes)
        }
        Err(_) => Object::String(text.to_vec()),
    }
}

/// Serialize raw text bytes to a text string token.
///
/// Bytes that are not valid UTF-8 are shown lossily, so this is meant for
/// diagnostics; the writer serializes the [`Object`] itself.
pub fn text_string_token(text: &[u8]) -> String {
    match encode_text_string(text) {
        Object::HexString(bytes) => format!("<{}>", hex::encode_upper(bytes)),
        _ => format!(
            "({})",
            String::from_utf8_lossy(&escape_literal(text))
        ),
    }
}

/// Decode a serialized text string token (`<FEFF...>`, `<...>` or `(...)`).
///
/// Returns `None` for malformed tokens.
pub fn decode_text_string(token: &str) -> Option<String> {
    let token = token.trim();
    if let Some(inner) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        let bytes = hex::decode(inner).ok()?;
        return match bytes.strip_prefix(&UTF16_BOM) {
            Some(utf16) => {
                if utf16.len() % 2 != 0 {
                    return None;
                }
                let units: Vec<u16> = utf16
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).ok()
            }
            None => Some(String::from_utf8_lossy(&bytes).into_owned()),
        };
    }
    let inner = token.strip_prefix('(')?.strip_suffix(')')?;
    Some(String::from_utf8_lossy(&unescape_literal(inner.as_bytes())).into_owned())
}

/// Escape a key for use as a PDF name (without the leading slash).
///
/// Regular characters pass through; delimiters, whitespace, `#` and
/// non-printable bytes become `#XX`.
pub fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for &byte in name.as_bytes() {
        let regular = (0x21..=0x7E).contains(&byte)
            && !matches!(
                byte,
                b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
            );
        if regular {
            out.push(byte as char);
        } else {
            out.push_str(&format!("#{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(b"plain"), b"plain".to_vec());
        assert_eq!(escape_literal(b"a(b)c"), b"a\\(b\\)c".to_vec());
        assert_eq!(escape_literal(b"back\\slash"), b"back\\\\slash".to_vec());
        assert_eq!(escape_literal(b"1\n2\r3\t4"), b"1\\n2\\r3\\t4".to_vec());
    }

    #[test]
    fn test_unescape_literal_reverses_escape() {
        let raw = b"Chapter (1)\\\n\t\r end";
        assert_eq!(unescape_literal(&escape_literal(raw)), raw.to_vec());
    }

    #[test]
    fn test_ascii_title_is_hex_encoded() {
        assert_eq!(text_string_token(b"T"), "<FEFF0054>");
        assert_eq!(text_string_token(b""), "<FEFF>");
    }

    #[test]
    fn test_non_ascii_title() {
        let token = text_string_token("Résumé".as_bytes());
        assert_eq!(token, "<FEFF005200E900730075006D00E9>");
        assert_eq!(decode_text_string(&token).as_deref(), Some("Résumé"));
    }

    #[test]
    fn test_astral_plane_round_trip() {
        let title = "Notes \u{1F4D6}";
        let token = text_string_token(title.as_bytes());
        assert!(token.starts_with("<FEFF"));
        assert!(token.contains("D83DDCD6"));
        assert_eq!(decode_text_string(&token).as_deref(), Some(title));
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_literal() {
        let raw = [0x43, 0x68, 0xFF, 0x28];
        match encode_text_string(&raw) {
            Object::String(bytes) => assert_eq!(bytes, raw.to_vec()),
            other => panic!("expected literal string, got {other:?}"),
        }
        let token = text_string_token(&raw);
        assert!(token.starts_with('('));
        assert!(token.ends_with("\\()"));
    }

    #[test]
    fn test_decode_literal_token() {
        assert_eq!(
            decode_text_string("(a\\(b\\))").as_deref(),
            Some("a(b)")
        );
        assert_eq!(decode_text_string("<FEFF00>"), None);
        assert_eq!(decode_text_string("garbage"), None);
    }

    #[test]
    fn test_escape_name() {
        assert_eq!(escape_name("ISBN"), "ISBN");
        assert_eq!(escape_name("page count"), "page#20count");
        assert_eq!(escape_name("a/b#c"), "a#2Fb#23c");
        assert_eq!(escape_name("é"), "#C3#A9");
    }
}
