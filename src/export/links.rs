//! Plain-text `domain: link` artifacts.
//!
//! One mapping per line, sorted by domain:
//!
//! ```text
//! news.shop.com: https://news.shop.com/unsubscribe
//! example.org: https://example.org/email/preferences
//! ```
//!
//! Links never contain whitespace, so the last `": "` separates key from link.
//! Domain keys may contain it (`news@shop.com (Team: Deals)`).

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::{Result, UnsublyError};
use crate::model::link::DomainLinks;

const SEPARATOR: &str = ": ";

/// Write `map` to `path`, replacing any previous file.
pub fn save_link_map(path: &Path, map: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| UnsublyError::io(parent, e))?;
        }
    }

    let mut file = std::fs::File::create(path).map_err(|e| UnsublyError::io(path, e))?;
    for (domain, link) in map {
        writeln!(file, "{domain}{SEPARATOR}{link}").map_err(|e| UnsublyError::io(path, e))?;
    }
    file.flush().map_err(|e| UnsublyError::io(path, e))?;

    info!(path = %path.display(), entries = map.len(), "Saved link map");
    Ok(())
}

/// Read a file written by [`save_link_map`]. Blank lines are ignored.
pub fn load_link_map(path: &Path) -> Result<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| UnsublyError::io(path, e))?;
    parse_link_map(&contents).map_err(|(line, reason)| UnsublyError::InvalidArtifact {
        path: path.to_path_buf(),
        line,
        reason,
    })
}

fn parse_link_map(contents: &str) -> std::result::Result<BTreeMap<String, String>, (usize, String)> {
    let mut map = BTreeMap::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (domain, link) = line
            .rsplit_once(SEPARATOR)
            .ok_or_else(|| (idx + 1, "missing \": \" separator".to_string()))?;
        if domain.trim().is_empty() || link.trim().is_empty() {
            return Err((idx + 1, "empty domain or link".to_string()));
        }
        map.insert(domain.trim().to_string(), link.trim().to_string());
    }
    Ok(map)
}

/// Save both maps of a scan result to their own files.
pub fn save_domain_links(links: &DomainLinks, body_path: &Path, header_path: &Path) -> Result<()> {
    save_link_map(body_path, &links.body_links())?;
    save_link_map(header_path, &links.header)
}

/// Reload a result saved by [`save_domain_links`].
///
/// Missing files read as empty maps.
pub fn load_domain_links(body_path: &Path, header_path: &Path) -> Result<DomainLinks> {
    let load = |path: &Path| -> Result<BTreeMap<String, String>> {
        if path.exists() {
            load_link_map(path)
        } else {
            Ok(BTreeMap::new())
        }
    };
    Ok(DomainLinks {
        body: load(body_path)?
            .into_iter()
            .map(|(domain, link)| (domain, Some(link)))
            .collect(),
        header: load(header_path)?,
    })
}
