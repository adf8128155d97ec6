//! Decoding of `data:` URLs carrying base64 image payloads.
//!
//! Document records embed their image as `data:<media-type>;base64,<payload>`.
//! Decoding either yields the exact bytes or an error; it never returns a
//! partially decoded buffer.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use thiserror::Error;

/// URL scheme prefix of the declaration component.
const SCHEME: &str = "data:";

/// Standard alphabet, padding optional on decode.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors for encoded payloads that do not have the expected shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedEncodingError {
    #[error("encoded image has no ',' between declaration and payload")]
    MissingSeparator,

    #[error("encoded image declaration does not start with 'data:'")]
    MissingScheme,

    #[error("encoded image declares an empty media type")]
    EmptyMediaType,

    #[error("encoded image payload is not valid base64: {0}")]
    InvalidPayload(#[from] base64::DecodeError),
}

/// Raw bytes recovered from a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Decode a `data:` URL into its bytes and media type.
pub fn decode_data_url(encoded: &str) -> Result<DecodedImage, MalformedEncodingError> {
    let (declaration, payload) = encoded
        .split_once(',')
        .ok_or(MalformedEncodingError::MissingSeparator)?;

    let declaration = declaration.trim_start();
    let params = declaration
        .strip_prefix(SCHEME)
        .ok_or(MalformedEncodingError::MissingScheme)?;

    let media_type = params.split(';').next().unwrap_or_default().trim();
    if media_type.is_empty() {
        return Err(MalformedEncodingError::EmptyMediaType);
    }

    let bytes = PAYLOAD_ENGINE.decode(payload.trim_end())?;

    Ok(DecodedImage {
        bytes,
        media_type: media_type.to_string(),
    })
}

/// Encode bytes as a base64 `data:` URL.
pub fn encode_data_url(bytes: &[u8], media_type: &str) -> String {
    format!(
        "{}{};base64,{}",
        SCHEME,
        media_type,
        PAYLOAD_ENGINE.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn test_decode_png_data_url() {
        let decoded = decode_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(decoded.media_type, "image/png");
        assert_eq!(decoded.bytes, PNG_HEADER);
    }

    #[test]
    fn test_round_trip_preserves_bytes_and_type() {
        let samples: [(&[u8], &str); 4] = [
            (&PNG_HEADER, "image/png"),
            (&[], "image/jpeg"),
            (&[0xff], "image/gif"),
            (&[0x00, 0xff, 0x10, 0x80, 0x7f], "image/webp"),
        ];

        for (bytes, media_type) in samples {
            let decoded = decode_data_url(&encode_data_url(bytes, media_type)).unwrap();
            assert_eq!(decoded.bytes, bytes);
            assert_eq!(decoded.media_type, media_type);
        }
    }

    #[test]
    fn test_unpadded_payload_is_accepted() {
        let decoded = decode_data_url("data:image/png;base64,iVBORw0KGgo").unwrap();
        assert_eq!(decoded.bytes, PNG_HEADER);
    }

    #[test]
    fn test_missing_separator() {
        assert_eq!(
            decode_data_url("data:image/png;base64 iVBORw0KGgo="),
            Err(MalformedEncodingError::MissingSeparator)
        );
        assert_eq!(
            decode_data_url("iVBORw0KGgo="),
            Err(MalformedEncodingError::MissingSeparator)
        );
    }

    #[test]
    fn test_missing_scheme() {
        assert_eq!(
            decode_data_url("image/png;base64,iVBORw0KGgo="),
            Err(MalformedEncodingError::MissingScheme)
        );
    }

    #[test]
    fn test_empty_media_type() {
        assert_eq!(
            decode_data_url("data:;base64,iVBORw0KGgo="),
            Err(MalformedEncodingError::EmptyMediaType)
        );
        assert_eq!(
            decode_data_url("data: ,iVBORw0KGgo="),
            Err(MalformedEncodingError::EmptyMediaType)
        );
    }

    #[test]
    fn test_invalid_alphabet_is_rejected() {
        for payload in ["iVBO*w0KGgo=", "iVBO w0KGgo=", "iVBORw0K-_go="] {
            let result = decode_data_url(&format!("data:image/png;base64,{}", payload));
            assert!(
                matches!(result, Err(MalformedEncodingError::InvalidPayload(_))),
                "payload {payload:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let input = encode_data_url(b"scanned page", "image/tiff");
        assert_eq!(decode_data_url(&input), decode_data_url(&input));
    }
}
