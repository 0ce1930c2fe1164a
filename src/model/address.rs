//! Sender address parsing and the domain key derived from it.

/// Domain key used when a message has no usable `From` address.
pub const UNKNOWN_DOMAIN: &str = "unknown sender";

/// A parsed sender address.
///
/// # Examples
/// - `"News Team <news@Shop.example>"` → `display_name = "News Team"`, `address = "news@Shop.example"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Parse a single address from a `From` header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// If parsing fails, the raw string is stored as `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    return Self {
                        display_name: strip_quotes(&trimmed[..angle_start]),
                        address: trimmed[angle_start + 1..angle_end].trim().to_string(),
                    };
                }
            }
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Lowercased host part of the address, if it has a non-empty one.
    pub fn domain(&self) -> Option<String> {
        let (_, host) = self.address.rsplit_once('@')?;
        let host = host.trim();
        if host.is_empty() {
            None
        } else {
            Some(host.to_lowercase())
        }
    }
}

/// Domain key for a message given its raw `From` header value.
///
/// Absent or malformed senders collapse onto [`UNKNOWN_DOMAIN`].
pub fn sender_domain(from: Option<&str>) -> String {
    from.map(EmailAddress::parse)
        .and_then(|addr| addr.domain())
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.display_name, self.address)
        }
    }
}
