//! Text decoding helpers.

use std::borrow::Cow;

/// Decode bytes to a string, handling various encodings.
///
/// 1. UTF-8 (a BOM is handled by encoding_rs)
/// 2. The hint encoding, e.g. from a `<meta charset>` declaration
/// 3. Windows-1252, a superset of ISO-8859-1
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Find a `charset` declaration in the first kilobyte of an HTML document.
///
/// Matches both `<meta charset="...">` and the `content="text/html;
/// charset=..."` form.
pub fn sniff_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(1024)];
    let text = String::from_utf8_lossy(head).to_ascii_lowercase();
    let pos = text.find("charset=")?;
    let rest = text[pos + "charset=".len()..].trim_start_matches(['"', '\'', ' ']);
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    let label = &rest[..end];
    (!label.is_empty()).then(|| label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_utf8() {
        assert_eq!(decode_text("héllo".as_bytes(), None), "héllo");
    }

    #[test]
    fn test_decode_text_falls_back_to_hint() {
        // "café" in ISO-8859-1
        let bytes = b"caf\xe9";
        assert_eq!(decode_text(bytes, Some("iso-8859-1")), "café");
        assert_eq!(decode_text(bytes, None), "café");
    }

    #[test]
    fn test_sniff_charset() {
        assert_eq!(
            sniff_charset(b"<html><head><meta charset=\"ISO-8859-1\">").as_deref(),
            Some("iso-8859-1")
        );
        assert_eq!(
            sniff_charset(b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\">")
                .as_deref(),
            Some("windows-1252")
        );
        assert_eq!(sniff_charset(b"<html></html>"), None);
    }
}
