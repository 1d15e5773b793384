use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;

use crate::error::{Result, SsrError};

/// Decodes subscription base64: URL-safe alphabet, tolerant of stripped
/// trailing `=` padding and of whitespace inserted by providers.
///
/// A cleaned length of `4k + 1` can never be completed by padding, so it is
/// rejected outright instead of being passed to an engine that would guess.
/// The standard alphabet is kept as a fallback for providers that emit
/// `+`/`/` in the inner credential fields.
pub fn decode(input: &str) -> Result<Vec<u8>> {
  let mut cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
  match cleaned.len() % 4 {
    0 => {}
    1 => {
      return Err(SsrError::Decode(format!(
        "length {} leaves a remainder of 1, no padding can complete it",
        cleaned.len()
      )))
    }
    r => cleaned.push_str(&"=".repeat(4 - r)),
  }

  URL_SAFE
    .decode(&cleaned)
    .or_else(|_| STANDARD.decode(&cleaned))
    .map_err(|e| SsrError::Decode(e.to_string()))
}

/// `decode` plus UTF-8 validation, for the text layers of the format.
pub fn decode_str(input: &str) -> Result<String> {
  let bytes = decode(input)?;
  String::from_utf8(bytes).map_err(|e| SsrError::Decode(format!("decoded bytes are not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};

  #[test]
  fn decode_round_trips_all_padding_remainders() {
    // Lengths chosen so the unpadded encodings end 0, 2 and 3 short of a
    // 4-character boundary.
    for payload in ["a", "ab", "abc", "abcd", "abcde", "abcdef"] {
      let stripped = URL_SAFE_NO_PAD.encode(payload);
      assert_eq!(decode(&stripped).unwrap(), payload.as_bytes(), "payload {payload:?}");
    }
  }

  #[test]
  fn decode_accepts_already_padded_input() {
    let padded = URL_SAFE.encode("hello world");
    assert_eq!(decode(&padded).unwrap(), b"hello world");
  }

  #[test]
  fn decode_accepts_url_safe_alphabet() {
    // 0xfb 0xff encodes to "-_8" in the URL-safe alphabet.
    let encoded = URL_SAFE_NO_PAD.encode([0xfb, 0xff]);
    assert!(encoded.contains('-') || encoded.contains('_'));
    assert_eq!(decode(&encoded).unwrap(), vec![0xfb, 0xff]);
  }

  #[test]
  fn decode_falls_back_to_standard_alphabet() {
    let encoded = STANDARD_NO_PAD.encode([0xfb, 0xff, 0x01]);
    assert!(encoded.contains('+') || encoded.contains('/'));
    assert_eq!(decode(&encoded).unwrap(), vec![0xfb, 0xff, 0x01]);
  }

  #[test]
  fn decode_rejects_remainder_of_one() {
    // "abcda" is 5 characters: 5 % 4 == 1, unrecoverable.
    let err = decode("abcda").unwrap_err();
    assert!(matches!(err, SsrError::Decode(_)));
  }

  #[test]
  fn decode_rejects_invalid_alphabet() {
    assert!(matches!(decode("not!base64??"), Err(SsrError::Decode(_))));
  }

  #[test]
  fn decode_ignores_embedded_whitespace() {
    let encoded = "aGVs\nbG8g\nd29y\nbGQ";
    assert_eq!(decode_str(encoded).unwrap(), "hello world");
  }

  #[test]
  fn decode_str_empty_input_is_empty_string() {
    assert_eq!(decode_str("").unwrap(), "");
  }

  #[test]
  fn decode_str_rejects_non_utf8() {
    let encoded = URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]);
    assert!(matches!(decode_str(&encoded), Err(SsrError::Decode(_))));
  }
}
