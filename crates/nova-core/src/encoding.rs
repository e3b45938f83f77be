//! Small bespoke encoders: unpadded base64url, standard base64, XML escaping,
//! and the two timestamp flavours the engine needs (IST for Aadhaar, UTC-Z
//! elsewhere).
//!
//! None of these have an ecosystem crate worth reaching for at this size,
//! they stay hand-rolled.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, FixedOffset, Utc};

/// RFC 4648 §5 base64url, no `=` padding. Used for the JWS header/signature
/// segments, never for the AA wire payloads.
pub fn b64url_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn b64url_decode(data: impl AsRef<[u8]>) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(data)
}

/// RFC 4648 §4 standard base64, with `+`/`/` and `=` padding. The AA
/// `encryptedFI` blob (`IV||ciphertext||tag`) is wire-encoded this way.
pub fn b64_standard_decode(data: impl AsRef<[u8]>) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(data)
}

/// Escapes the five XML entities required in every Aadhaar attribute/text node.
pub fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// `YYYY-MM-DDTHH:MM:SS+05:30`, the timestamp shape UIDAI's Auth envelope requires.
pub fn ist_timestamp(now: DateTime<Utc>) -> String {
    let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("valid fixed offset");
    now.with_timezone(&ist).format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// ISO-8601 with a trailing `Z`, used everywhere outside the Aadhaar envelope.
pub fn iso_z(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn base64url_roundtrip_has_no_padding_or_unsafe_chars() {
        for payload in [b"".as_slice(), b"a", b"ab", b"abc", b"hello world!!"] {
            let encoded = b64url_encode(payload);
            assert!(!encoded.contains('='));
            assert!(!encoded.contains('+'));
            assert!(!encoded.contains('/'));
            assert_eq!(b64url_decode(&encoded).unwrap(), payload);
        }
    }

    #[test]
    fn standard_base64_decodes_padded_input_with_plus_and_slash() {
        // Chosen to force both `+`/`/` in the alphabet and `=` padding, which
        // `b64url_decode` would reject.
        let payload = b"\xfb\xff\xbf\x00";
        let encoded = STANDARD.encode(payload);
        assert!(encoded.contains('='));
        assert_eq!(b64_standard_decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn xml_escape_covers_all_five_entities() {
        assert_eq!(
            xml_escape("a & b < c > d \" e ' f"),
            "a &amp; b &lt; c &gt; d &quot; e &apos; f"
        );
    }

    #[test]
    fn ist_timestamp_has_fixed_offset() {
        let t = Utc.with_ymd_and_hms(2025, 7, 20, 18, 29, 59).unwrap();
        assert_eq!(ist_timestamp(t), "2025-07-20T23:59:59+05:30");
    }

    #[test]
    fn iso_z_has_trailing_z() {
        let t = Utc.with_ymd_and_hms(2025, 7, 20, 18, 29, 59).unwrap();
        assert_eq!(iso_z(t), "2025-07-20T18:29:59Z");
    }
}
