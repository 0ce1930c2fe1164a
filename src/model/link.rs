//! Unsubscribe candidates and the per-domain result maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where a candidate link was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkSource {
    /// Matched in the decoded message body.
    Body,
    /// Taken from the `List-Unsubscribe` header.
    Header,
}

/// One unsubscribe URL found in one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeCandidate {
    pub url: String,
    pub source: LinkSource,
    /// Sender domain of the message the link came from.
    pub domain: String,
}

/// Final per-domain links, one map per source.
///
/// Every scanned domain has a `body` entry (the link may be absent); only
/// domains that sent a usable header have a `header` entry. The two maps are
/// never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainLinks {
    pub body: BTreeMap<String, Option<String>>,
    pub header: BTreeMap<String, String>,
}

impl DomainLinks {
    /// Domains present in either map, sorted.
    pub fn domains(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self
            .body
            .keys()
            .chain(self.header.keys())
            .map(String::as_str)
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }

    /// Body map restricted to domains that actually have a link.
    pub fn body_links(&self) -> BTreeMap<String, String> {
        self.body
            .iter()
            .filter_map(|(domain, link)| link.clone().map(|l| (domain.clone(), l)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.header.is_empty()
    }
}
