//! Online per-domain reconciliation of unsubscribe candidates.

use std::collections::{BTreeMap, HashMap};

use crate::model::link::{DomainLinks, LinkSource, UnsubscribeCandidate};

/// Every body link ever seen for one domain, with counts and first-seen order.
#[derive(Debug, Default, Clone)]
struct BodyTally {
    counts: HashMap<String, usize>,
    order: Vec<String>,
}

impl BodyTally {
    fn add(&mut self, url: &str) {
        match self.counts.get_mut(url) {
            Some(n) => *n += 1,
            None => {
                self.counts.insert(url.to_string(), 1);
                self.order.push(url.to_string());
            }
        }
    }

    /// The recurring link if one occurs more than once, else the shortest.
    ///
    /// Ties go to the link seen first.
    fn choose(&self) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for url in &self.order {
            let count = self.counts[url];
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((url.as_str(), count));
            }
        }

        match best {
            Some((url, count)) if count > 1 => Some(url),
            _ => {
                let mut shortest: Option<&str> = None;
                for url in &self.order {
                    if shortest.map_or(true, |s| url.len() < s.len()) {
                        shortest = Some(url.as_str());
                    }
                }
                shortest
            }
        }
    }
}

/// Accumulates candidates message by message.
///
/// Header links are last-write-wins; body links keep a multiset that is only
/// reduced when a snapshot is taken.
#[derive(Debug, Default, Clone)]
pub struct DomainReconciler {
    body: BTreeMap<String, BodyTally>,
    header: BTreeMap<String, String>,
}

impl DomainReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the candidates of one message into the state for `domain`.
    ///
    /// The domain gets a body entry even when `candidates` is empty.
    pub fn fold(&mut self, domain: &str, candidates: &[UnsubscribeCandidate]) {
        let tally = self.body.entry(domain.to_string()).or_default();
        for candidate in candidates {
            match candidate.source {
                LinkSource::Body => tally.add(&candidate.url),
                LinkSource::Header => {
                    self.header
                        .insert(domain.to_string(), candidate.url.clone());
                }
            }
        }
    }

    /// Number of distinct domains seen so far.
    pub fn domain_count(&self) -> usize {
        self.body.len()
    }

    /// Current chosen links without consuming the state.
    pub fn snapshot(&self) -> DomainLinks {
        DomainLinks {
            body: self
                .body
                .iter()
                .map(|(domain, tally)| (domain.clone(), tally.choose().map(str::to_string)))
                .collect(),
            header: self.header.clone(),
        }
    }

    pub fn finish(self) -> DomainLinks {
        self.snapshot()
    }
}
