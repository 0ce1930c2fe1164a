//! Fetched messages, their MIME tree, and the folders they live in.

use serde::{Deserialize, Serialize};

use super::address::sender_domain;

/// Provider-side folder a scan can cover.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    Inbox,
    Spam,
    Trash,
}

impl Folder {
    /// Gmail system label id.
    pub fn label_id(self) -> &'static str {
        match self {
            Folder::Inbox => "INBOX",
            Folder::Spam => "SPAM",
            Folder::Trash => "TRASH",
        }
    }
}

impl std::fmt::Display for Folder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label_id())
    }
}

/// A single `name: value` header. Names keep their original case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One node of a message's MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimePart {
    /// A part carrying (or lacking) a base64url-encoded payload.
    Leaf {
        media_type: String,
        payload: Option<String>,
    },
    /// A `multipart/*` container.
    Container {
        media_type: String,
        children: Vec<MimePart>,
    },
}

impl MimePart {
    pub fn media_type(&self) -> &str {
        match self {
            MimePart::Leaf { media_type, .. } | MimePart::Container { media_type, .. } => {
                media_type
            }
        }
    }
}

/// A fully fetched message. Immutable once built.
#[derive(Debug, Clone)]
pub struct Message {
    /// Opaque provider identifier.
    pub id: String,
    /// Folder the message was listed under.
    pub folder: Folder,
    /// Top-level headers in provider order.
    pub headers: Vec<Header>,
    /// Root of the MIME tree.
    pub payload: MimePart,
}

impl Message {
    /// First header value whose name matches case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Aggregation key: lowercased host of the `From` address.
    pub fn sender_domain(&self) -> String {
        sender_domain(self.header("from"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::UNKNOWN_DOMAIN;

    fn message(headers: Vec<Header>) -> Message {
        Message {
            id: "m1".into(),
            folder: Folder::Inbox,
            headers,
            payload: MimePart::Leaf {
                media_type: "text/plain".into(),
                payload: None,
            },
        }
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let msg = message(vec![
            Header::new("FROM", "Shop <deals@Shop.com>"),
            Header::new("from", "second@other.com"),
        ]);
        assert_eq!(msg.header("From"), Some("Shop <deals@Shop.com>"));
        assert_eq!(msg.sender_domain(), "shop.com");
    }

    #[test]
    fn test_missing_sender() {
        let msg = message(vec![Header::new("Subject", "hi")]);
        assert_eq!(msg.sender_domain(), UNKNOWN_DOMAIN);
    }

    #[test]
    fn test_folder_label_ids() {
        assert_eq!(Folder::Inbox.label_id(), "INBOX");
        assert_eq!(Folder::Spam.to_string(), "SPAM");
        assert_eq!(Folder::Trash.label_id(), "TRASH");
    }

    #[test]
    fn test_media_type_of_either_kind() {
        let leaf = MimePart::Leaf {
            media_type: "text/html".into(),
            payload: None,
        };
        let root = MimePart::Container {
            media_type: "multipart/mixed".into(),
            children: vec![leaf.clone()],
        };
        assert_eq!(leaf.media_type(), "text/html");
        assert_eq!(root.media_type(), "multipart/mixed");
    }
}
