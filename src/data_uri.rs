//! `data:<mime>;base64,<payload>` URIs: how images travel through templates
//! and markup without touching the network or the file system.

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

/// Build a base64 data URI for `bytes` with the given MIME type.
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64_STD.encode(bytes))
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
///
/// Returns `Err` if `src` is not a data URI or does not use base64 encoding.
pub fn decode(src: &str) -> Result<Vec<u8>, String> {
    let Some(rest) = src.strip_prefix("data:") else {
        let preview: String = src.chars().take(80).collect();
        return Err(format!(
            "image src must be a base64 data URI (e.g. `data:image/png;base64,...`), got {preview:?}"
        ));
    };
    let comma_pos = rest
        .find(',')
        .ok_or_else(|| "invalid data URI: missing `,` between header and data".to_string())?;
    let header = &rest[..comma_pos];
    if !header.split(';').any(|p| p == "base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    // Templates may wrap long payloads; whitespace is not part of the alphabet.
    let payload: String = rest[comma_pos + 1..]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    BASE64_STD
        .decode(payload)
        .map_err(|e| format!("base64 decode error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_png_header() {
        let uri = encode("image/png", b"\x89PNG");
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(decode(&uri).unwrap(), b"\x89PNG");
    }

    #[test]
    fn rejects_non_data_and_non_base64_uris() {
        assert!(decode("https://example.com/logo.png").is_err());
        assert!(decode("data:image/png,rawbytes").is_err());
        assert!(decode("data:image/png;base64").is_err());
        assert!(decode("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn tolerates_wrapped_payloads() {
        assert_eq!(decode("data:text/plain;base64,aGVs\n bG8=").unwrap(), b"hello");
    }
}
