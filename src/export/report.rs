//! The reviewable list: one row per sender domain.

use serde::Serialize;

use crate::model::link::{DomainLinks, LinkSource};

/// One domain with its two opt-out options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRow {
    pub domain: String,
    /// Link found in message bodies.
    pub body_link: Option<String>,
    /// Link from the `List-Unsubscribe` header.
    pub header_link: Option<String>,
}

/// Rows for every domain in either map, sorted by domain.
pub fn review_rows(links: &DomainLinks) -> Vec<ReviewRow> {
    links
        .domains()
        .into_iter()
        .map(|domain| ReviewRow {
            domain: domain.to_string(),
            body_link: links.body.get(domain).cloned().flatten(),
            header_link: links.header.get(domain).cloned(),
        })
        .collect()
}

/// The saved opt-out link of `domain` from one source.
///
/// Domain keys are stored lowercased, so the lookup ignores case and
/// surrounding whitespace.
pub fn link_for<'a>(links: &'a DomainLinks, domain: &str, source: LinkSource) -> Option<&'a str> {
    let key = domain.trim().to_lowercase();
    match source {
        LinkSource::Body => links.body.get(&key)?.as_deref(),
        LinkSource::Header => links.header.get(&key).map(String::as_str),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_pair_up_both_maps() {
        let mut links = DomainLinks::default();
        links.body.insert("a.com".into(), Some("https://a.com/u".into()));
        links.body.insert("b.com".into(), None);
        links.header.insert("a.com".into(), "https://a.com/h".into());
        links.header.insert("c.com".into(), "https://c.com/h".into());

        let rows = review_rows(&links);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].body_link.as_deref(), Some("https://a.com/u"));
        assert_eq!(rows[0].header_link.as_deref(), Some("https://a.com/h"));
        assert_eq!(rows[1].body_link, None);
        assert_eq!(rows[1].header_link, None);
        assert_eq!(rows[2].domain, "c.com");
        assert_eq!(rows[2].body_link, None);
    }

    #[test]
    fn test_link_for_picks_requested_source() {
        let mut links = DomainLinks::default();
        links.body.insert("a.com".into(), Some("https://a.com/u".into()));
        links.body.insert("quiet.com".into(), None);
        links.header.insert("a.com".into(), "https://a.com/h".into());

        assert_eq!(link_for(&links, " A.com ", LinkSource::Body), Some("https://a.com/u"));
        assert_eq!(link_for(&links, "a.com", LinkSource::Header), Some("https://a.com/h"));
        assert_eq!(link_for(&links, "quiet.com", LinkSource::Body), None);
        assert_eq!(link_for(&links, "quiet.com", LinkSource::Header), None);
        assert_eq!(link_for(&links, "nobody.net", LinkSource::Body), None);
    }
}
