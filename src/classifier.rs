//! Mapping of terminal outcomes onto what the presentation layer shows
//!
//! [`classify`] is pure apart from logging. Image payloads are decoded here,
//! after the remote has already reported success, so a payload that fails to
//! decode is reclassified as a generation failure instead of reaching the
//! user as a broken image.

use crate::types::{CredentialId, Outcome};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// A decoded image ready to be sent to the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    /// Raw image bytes
    pub bytes: Vec<u8>,
    /// MIME type sniffed from the leading bytes
    pub mime: &'static str,
}

/// Fixed, user-facing outcome categories
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notice {
    /// The remote moderation blocked the result
    Censored,
    /// The remote failed, returned garbage, or the run faulted
    GenerationFailed,
    /// The job did not finish within the polling budget
    TimedOut,
    /// The job could not be submitted
    SubmissionFailed {
        /// Credential that attempted the submission (diagnostics only)
        credential: CredentialId,
    },
}

impl Notice {
    /// Stable English text for this category
    pub fn message(&self) -> &'static str {
        match self {
            Notice::Censored => {
                "The image was blocked by content moderation. Try rephrasing your request."
            }
            Notice::GenerationFailed => "Image generation failed. Please try again later.",
            Notice::TimedOut => "Image generation is taking too long. Please try again later.",
            Notice::SubmissionFailed { .. } => {
                "The image service is unavailable right now. Please try again later."
            }
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// What the presentation layer should render for one outcome
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Presentation {
    /// Forward this image
    Image(DecodedImage),
    /// Show a fixed notice
    Notice(Notice),
}

/// Classify a terminal outcome
///
/// For `Images` only the first payload is decoded and presented.
pub fn classify(outcome: &Outcome) -> Presentation {
    match outcome {
        Outcome::Images { payloads } => {
            let Some(first) = payloads.first() else {
                tracing::error!("image outcome carried no payloads");
                return Presentation::Notice(Notice::GenerationFailed);
            };
            match decode_image(first) {
                Ok(image) => Presentation::Image(image),
                Err(reason) => {
                    tracing::error!(error = %reason, "image payload could not be decoded");
                    Presentation::Notice(Notice::GenerationFailed)
                }
            }
        }
        Outcome::Censored => Presentation::Notice(Notice::Censored),
        Outcome::RemoteError { .. } => Presentation::Notice(Notice::GenerationFailed),
        Outcome::Timeout { .. } => Presentation::Notice(Notice::TimedOut),
        Outcome::SubmissionFailed { credential, .. } => {
            Presentation::Notice(Notice::SubmissionFailed {
                credential: *credential,
            })
        }
    }
}

/// Decode one base64 image payload
///
/// Surrounding whitespace and embedded line breaks are tolerated. Empty
/// input and input that decodes to zero bytes are rejected.
pub fn decode_image(payload: &str) -> Result<DecodedImage, String> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err("empty payload".to_string());
    }

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| format!("invalid base64: {e}"))?;
    if bytes.is_empty() {
        return Err("payload decoded to zero bytes".to_string());
    }

    let mime = sniff_mime(&bytes);
    Ok(DecodedImage { bytes, mime })
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        // The service returns PNG unless told otherwise
        "image/png"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn images(payloads: &[&str]) -> Outcome {
        Outcome::Images {
            payloads: payloads.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn first_payload_is_decoded() {
        let png = STANDARD.encode(PNG_HEADER);
        let jpeg = STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0]);

        let presentation = classify(&images(&[&png, &jpeg]));

        assert_eq!(
            presentation,
            Presentation::Image(DecodedImage {
                bytes: PNG_HEADER.to_vec(),
                mime: "image/png",
            })
        );
    }

    #[test]
    fn malformed_base64_becomes_generation_failure() {
        let presentation = classify(&images(&["%%% not base64 %%%"]));
        assert_eq!(presentation, Presentation::Notice(Notice::GenerationFailed));
    }

    #[test]
    fn empty_payload_becomes_generation_failure() {
        assert_eq!(
            classify(&images(&[""])),
            Presentation::Notice(Notice::GenerationFailed)
        );
        assert_eq!(
            classify(&images(&["  \n "])),
            Presentation::Notice(Notice::GenerationFailed)
        );
        assert_eq!(
            classify(&images(&[])),
            Presentation::Notice(Notice::GenerationFailed)
        );
    }

    #[test]
    fn line_wrapped_payload_decodes() {
        let encoded = STANDARD.encode(b"GIF89a-some-gif-bytes");
        let (head, tail) = encoded.split_at(8);
        let wrapped = format!("{head}\n{tail}\n");

        let image = decode_image(&wrapped).unwrap();

        assert_eq!(image.mime, "image/gif");
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xDB]), "image/jpeg");
        assert_eq!(sniff_mime(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(sniff_mime(b"GIF87a"), "image/gif");
        assert_eq!(sniff_mime(b"unknown"), "image/png");
    }

    #[test]
    fn non_image_outcomes_map_to_fixed_notices() {
        assert_eq!(
            classify(&Outcome::Censored),
            Presentation::Notice(Notice::Censored)
        );
        assert_eq!(
            classify(&Outcome::remote_error("boom")),
            Presentation::Notice(Notice::GenerationFailed)
        );
        assert_eq!(
            classify(&Outcome::Timeout { attempts: 30 }),
            Presentation::Notice(Notice::TimedOut)
        );
        assert_eq!(
            classify(&Outcome::SubmissionFailed {
                credential: CredentialId(3),
                reason: "HTTP 500".to_string(),
            }),
            Presentation::Notice(Notice::SubmissionFailed {
                credential: CredentialId(3)
            })
        );
    }

    #[test]
    fn notice_messages_are_distinct() {
        let notices = [
            Notice::Censored,
            Notice::GenerationFailed,
            Notice::TimedOut,
            Notice::SubmissionFailed {
                credential: CredentialId(1),
            },
        ];
        for (i, a) in notices.iter().enumerate() {
            for b in &notices[i + 1..] {
                assert_ne!(a.message(), b.message());
            }
        }
        assert_eq!(Notice::TimedOut.to_string(), Notice::TimedOut.message());
    }
}
