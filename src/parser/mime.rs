//! MIME body resolution: find and decode the first textual part of a message.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use tracing::{trace, warn};

use crate::model::message::{Message, MimePart};

/// Gmail emits URL-safe base64, sometimes without padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Resolve the body text of a whole message.
///
/// A single-part message is treated as a one-element part list.
pub fn resolve_message(message: &Message) -> String {
    trace!(id = %message.id, root = message.payload.media_type(), "Resolving body");
    match &message.payload {
        MimePart::Container { children, .. } => resolve(children),
        leaf @ MimePart::Leaf { .. } => resolve(std::slice::from_ref(leaf)),
    }
}

/// Walk `parts` depth-first and return the first decoded text body.
///
/// The first `text/plain` or `text/html` leaf with a payload wins, even if a
/// richer sibling follows. Containers are searched recursively; an empty
/// container falls through to its next sibling. Returns an empty string when
/// nothing matches.
pub fn resolve(parts: &[MimePart]) -> String {
    for part in parts {
        match part {
            MimePart::Leaf {
                media_type,
                payload: Some(data),
            } if is_text_body(media_type) => {
                if let Some(text) = decode_payload(data) {
                    return text;
                }
            }
            MimePart::Leaf { .. } => {}
            MimePart::Container { children, .. } => {
                let text = resolve(children);
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }
    String::new()
}

/// `text/plain` or `text/html`, ignoring case and parameters.
fn is_text_body(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "text/plain" || essence == "text/html"
}

/// Decode a base64url payload into text.
///
/// Returns `None` (and logs) when the payload is not valid base64.
fn decode_payload(data: &str) -> Option<String> {
    match URL_SAFE_LENIENT.decode(data.trim()) {
        Ok(bytes) => Some(decode_text_bytes(&bytes)),
        Err(e) => {
            warn!(error = %e, "Skipping undecodable body part");
            None
        }
    }
}

/// Decode body bytes as UTF-8, falling back to Windows-1252 (which accepts every byte).
fn decode_text_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{Folder, Header};

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE.encode(text)
    }

    fn leaf(media_type: &str, payload: Option<&str>) -> MimePart {
        MimePart::Leaf {
            media_type: media_type.into(),
            payload: payload.map(encode),
        }
    }

    fn container(children: Vec<MimePart>) -> MimePart {
        MimePart::Container {
            media_type: "multipart/alternative".into(),
            children,
        }
    }

    #[test]
    fn test_empty_html_falls_through_to_plain() {
        let parts = vec![container(vec![
            leaf("text/html", None),
            leaf("text/plain", Some("Click to unsubscribe https://x.com/u")),
        ])];
        assert_eq!(resolve(&parts), "Click to unsubscribe https://x.com/u");
    }

    #[test]
    fn test_first_match_wins_not_best_match() {
        let parts = vec![container(vec![
            leaf("text/html", Some("<a href=\"https://x.com/u\">x</a>")),
            leaf("text/plain", Some("plain body")),
        ])];
        assert_eq!(resolve(&parts), "<a href=\"https://x.com/u\">x</a>");

        let reversed = vec![container(vec![
            leaf("text/plain", Some("plain body")),
            leaf("text/html", Some("<a href=\"https://x.com/u\">x</a>")),
        ])];
        assert_eq!(resolve(&reversed), "plain body");
    }

    #[test]
    fn test_empty_container_falls_through_to_sibling() {
        let parts = vec![
            container(vec![leaf("image/png", Some("png"))]),
            leaf("text/plain", Some("after the container")),
        ];
        assert_eq!(resolve(&parts), "after the container");
    }

    #[test]
    fn test_deep_nesting() {
        let parts = vec![container(vec![container(vec![container(vec![leaf(
            "TEXT/PLAIN; charset=\"utf-8\"",
            Some("deep"),
        )])])])];
        assert_eq!(resolve(&parts), "deep");
    }

    #[test]
    fn test_non_text_and_missing_parts_yield_empty() {
        assert_eq!(resolve(&[]), "");
        assert_eq!(resolve(&[leaf("application/pdf", Some("%PDF"))]), "");
    }

    #[test]
    fn test_unpadded_payload_decodes() {
        let parts = vec![MimePart::Leaf {
            media_type: "text/plain".into(),
            payload: Some("aGk".into()),
        }];
        assert_eq!(resolve(&parts), "hi");
    }

    #[test]
    fn test_invalid_base64_is_skipped() {
        let parts = vec![
            MimePart::Leaf {
                media_type: "text/plain".into(),
                payload: Some("!!not base64!!".into()),
            },
            leaf("text/html", Some("fallback")),
        ];
        assert_eq!(resolve(&parts), "fallback");
    }

    #[test]
    fn test_latin1_bytes_fall_back() {
        let parts = vec![MimePart::Leaf {
            media_type: "text/plain".into(),
            payload: Some(base64::engine::general_purpose::URL_SAFE.encode(b"caf\xe9")),
        }];
        assert_eq!(resolve(&parts), "café");
    }

    #[test]
    fn test_single_part_message() {
        let msg = Message {
            id: "m".into(),
            folder: Folder::Inbox,
            headers: vec![Header::new("From", "a@b.com")],
            payload: leaf("text/plain", Some("single part body")),
        };
        assert_eq!(resolve_message(&msg), "single part body");
    }
}
