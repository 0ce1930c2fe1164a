//! Gmail REST v1 client (blocking).

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::config::GmailConfig;
use crate::error::{Result, UnsublyError};
use crate::model::message::{Folder, Header, Message, MimePart};

use super::auth::AuthSession;
use super::{MailProvider, MessagePage};

// ── Wire types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageIndex {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageIndex>,
    #[serde(rename = "nextPageToken", default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FullMessage {
    pub id: String,
    #[serde(default)]
    pub payload: MessagePart,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelDetail {
    #[serde(rename = "messagesTotal", default)]
    pub messages_total: Option<u64>,
}

impl From<MessagePart> for MimePart {
    fn from(part: MessagePart) -> Self {
        if part.parts.is_empty() {
            MimePart::Leaf {
                media_type: part.mime_type,
                payload: part.body.data.filter(|d| !d.is_empty()),
            }
        } else {
            MimePart::Container {
                media_type: part.mime_type,
                children: part.parts.into_iter().map(MimePart::from).collect(),
            }
        }
    }
}

impl FullMessage {
    pub fn into_message(mut self, folder: Folder) -> Message {
        let headers = std::mem::take(&mut self.payload.headers);
        Message {
            id: self.id,
            folder,
            headers,
            payload: self.payload.into(),
        }
    }
}

// ── Error classification ────────────────────────────────────────

/// Map a non-success HTTP status to the crate's error taxonomy.
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
    what: &str,
) -> UnsublyError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => UnsublyError::RateLimited { retry_after },
        StatusCode::FORBIDDEN
            if body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded") =>
        {
            UnsublyError::RateLimited { retry_after }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            UnsublyError::Authentication(format!("{what}: HTTP {status}"))
        }
        StatusCode::NOT_FOUND => UnsublyError::NotFound(what.to_string()),
        s if s.is_server_error() => UnsublyError::Transient(format!("{what}: HTTP {s}")),
        s => UnsublyError::Provider(format!("{what}: HTTP {s}: {}", truncate(body, 200))),
    }
}

/// `Retry-After` in delta-seconds form.
fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── Client ──────────────────────────────────────────────────────

/// Blocking Gmail API client bound to one mailbox.
pub struct GmailClient {
    client: Client,
    bearer: String,
    base: String,
}

impl GmailClient {
    pub fn new(session: &AuthSession, config: &GmailConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("unsubly/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| UnsublyError::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            bearer: session.bearer(),
            base: format!(
                "{}/users/{}",
                config.api_base.trim_end_matches('/'),
                config.user_id
            ),
        })
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base, path);
        trace!(url = %url, "GET");
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, &self.bearer)
            .query(query)
            .send()
            .map_err(|e| UnsublyError::Transient(format!("{what}: {e}")))?;
        Self::decode(response, what)
    }

    fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status, retry_after, &body, what));
        }
        response.json::<T>().map_err(|e| {
            UnsublyError::Transient(format!(
                "{what}: unexpected response body ({e}), possible API change"
            ))
        })
    }
}

impl MailProvider for GmailClient {
    fn list_messages(
        &self,
        folder: Folder,
        page_token: Option<&str>,
        page_size: u32,
        include_spam_trash: bool,
    ) -> Result<MessagePage> {
        let mut query = vec![
            ("labelIds", folder.label_id().to_string()),
            ("maxResults", page_size.to_string()),
            ("includeSpamTrash", include_spam_trash.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let list: MessageList = self.get("messages", &query, &format!("list {folder}"))?;
        debug!(
            folder = %folder,
            count = list.messages.len(),
            more = list.next_page_token.is_some(),
            "Listed page"
        );
        Ok(MessagePage {
            ids: list.messages.into_iter().map(|m| m.id).collect(),
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    fn get_message(&self, folder: Folder, id: &str) -> Result<Message> {
        let full: FullMessage = self.get(
            &format!("messages/{id}"),
            &[("format", "full".to_string())],
            &format!("message {id}"),
        )?;
        Ok(full.into_message(folder))
    }

    fn folder_total(&self, folder: Folder) -> Result<Option<u64>> {
        let label: LabelDetail = self.get(
            &format!("labels/{}", folder.label_id()),
            &[],
            &format!("label {folder}"),
        )?;
        Ok(label.messages_total)
    }
}
