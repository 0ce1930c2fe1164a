//! Unsubscribe link extraction from decoded bodies and `List-Unsubscribe` headers.
//!
//! Both rules are pure functions of their input.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::link::{LinkSource, UnsubscribeCandidate};
use crate::model::message::{Header, Message};

use super::mime;

/// Any http(s) URL up to whitespace, quotes or angle brackets.
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).expect("valid URL regex"));

/// An http(s) URI inside `<...>`, as used by `List-Unsubscribe`.
static HEADER_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(https?://[^\s>]+)>").expect("valid header regex"));

/// Characters that end a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// Which phrases mark a body link as an opt-out link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhraseSet {
    /// `unsubscribe`, `preferences`, `opt-out`.
    #[default]
    Broad,
    /// `unsubscribe` only.
    Strict,
}

impl PhraseSet {
    pub fn phrases(self) -> &'static [&'static str] {
        match self {
            PhraseSet::Broad => &["unsubscribe", "preferences", "opt-out"],
            PhraseSet::Strict => &["unsubscribe"],
        }
    }

    fn matches(self, link: &str) -> bool {
        let decoded = urlencoding::decode_binary(link.as_bytes());
        let lowered = String::from_utf8_lossy(&decoded).to_lowercase();
        self.phrases().iter().any(|p| lowered.contains(p))
    }
}

/// All opt-out links in `body`, in document order.
pub fn body_links(body: &str, phrases: PhraseSet) -> Vec<String> {
    URL_RE
        .find_iter(body)
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
        .filter(|link| phrases.matches(link))
        .map(str::to_string)
        .collect()
}

/// The first http(s) URI of the first `List-Unsubscribe` header that has one.
///
/// `mailto:` entries are ignored.
pub fn header_link(headers: &[Header]) -> Option<String> {
    headers
        .iter()
        .filter(|h| h.name.eq_ignore_ascii_case("list-unsubscribe"))
        .find_map(|h| {
            HEADER_URL_RE
                .captures(&h.value)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// Body and header candidates of one message, tagged with its sender domain.
pub fn candidates_for(message: &Message, phrases: PhraseSet) -> Vec<UnsubscribeCandidate> {
    let domain = message.sender_domain();
    let body = mime::resolve_message(message);

    let mut candidates: Vec<UnsubscribeCandidate> = body_links(&body, phrases)
        .into_iter()
        .map(|url| UnsubscribeCandidate {
            url,
            source: LinkSource::Body,
            domain: domain.clone(),
        })
        .collect();

    if let Some(url) = header_link(&message.headers) {
        candidates.push(UnsubscribeCandidate {
            url,
            source: LinkSource::Header,
            domain,
        });
    }

    candidates
}
