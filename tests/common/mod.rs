//! In-memory mailbox used by the integration tests.

#![allow(dead_code)]

pub mod http;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine as _;

use unsubly::error::{Result, UnsublyError};
use unsubly::model::message::{Folder, Header, Message, MimePart};
use unsubly::provider::{MailProvider, MessagePage};
use unsubly::scan::ScanSettings;

/// Build a single-part text message.
pub fn message(id: &str, from: &str, body: &str, list_unsubscribe: Option<&str>) -> Message {
    let mut headers = vec![Header::new("From", from), Header::new("Subject", "news")];
    if let Some(value) = list_unsubscribe {
        headers.push(Header::new("List-Unsubscribe", value));
    }
    Message {
        id: id.to_string(),
        folder: Folder::Inbox,
        headers,
        payload: MimePart::Container {
            media_type: "multipart/alternative".into(),
            children: vec![MimePart::Leaf {
                media_type: "text/plain".into(),
                payload: Some(base64::engine::general_purpose::URL_SAFE.encode(body)),
            }],
        },
    }
}

/// `count` messages from `domain`, each with a distinct tracking link.
pub fn newsletter(prefix: &str, domain: &str, count: usize) -> Vec<Message> {
    (0..count)
        .map(|i| {
            message(
                &format!("{prefix}{i}"),
                &format!("News <news@{domain}>"),
                &format!("Hi!\nUnsubscribe: https://{domain}/unsubscribe?m={i}\n"),
                None,
            )
        })
        .collect()
}

/// Settings with no real sleeping.
pub fn fast_settings(page_size: u32) -> ScanSettings {
    ScanSettings {
        page_size,
        backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
        ..ScanSettings::default()
    }
}

#[derive(Default)]
struct State {
    /// Scripted failures returned before a fetch succeeds, per message id.
    fetch_errors: HashMap<String, VecDeque<UnsublyError>>,
    /// Scripted failures for listing, per folder.
    list_errors: HashMap<Folder, VecDeque<UnsublyError>>,
    total_error: Option<UnsublyError>,
    fetch_log: Vec<String>,
    list_calls: usize,
}

/// Scriptable [`MailProvider`]. Clones share state.
#[derive(Clone, Default)]
pub struct FakeMailbox {
    folders: Arc<HashMap<Folder, Vec<Message>>>,
    report_totals: bool,
    state: Arc<Mutex<State>>,
}

impl FakeMailbox {
    pub fn new(folders: Vec<(Folder, Vec<Message>)>) -> Self {
        Self {
            folders: Arc::new(folders.into_iter().collect()),
            report_totals: true,
            state: Arc::default(),
        }
    }

    /// Behave like a provider that cannot size folders.
    pub fn without_totals(mut self) -> Self {
        self.report_totals = false;
        self
    }

    pub fn fail_fetch(&self, id: &str, errors: Vec<UnsublyError>) {
        self.state
            .lock()
            .unwrap()
            .fetch_errors
            .insert(id.to_string(), errors.into());
    }

    pub fn fail_list(&self, folder: Folder, errors: Vec<UnsublyError>) {
        self.state
            .lock()
            .unwrap()
            .list_errors
            .insert(folder, errors.into());
    }

    pub fn fail_totals(&self, error: UnsublyError) {
        self.state.lock().unwrap().total_error = Some(error);
    }

    /// Ids passed to `get_message`, including failed attempts.
    pub fn fetch_log(&self) -> Vec<String> {
        self.state.lock().unwrap().fetch_log.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    fn messages(&self, folder: Folder) -> &[Message] {
        self.folders.get(&folder).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl MailProvider for FakeMailbox {
    fn list_messages(
        &self,
        folder: Folder,
        page_token: Option<&str>,
        page_size: u32,
        include_spam_trash: bool,
    ) -> Result<MessagePage> {
        assert!(include_spam_trash);
        {
            let mut state = self.state.lock().unwrap();
            state.list_calls += 1;
            if let Some(err) = state.list_errors.get_mut(&folder).and_then(VecDeque::pop_front) {
                return Err(err);
            }
        }

        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let all = self.messages(folder);
        let end = (start + page_size as usize).min(all.len());
        let ids = all[start.min(end)..end].iter().map(|m| m.id.clone()).collect();
        Ok(MessagePage {
            ids,
            next_page_token: (end < all.len()).then(|| end.to_string()),
        })
    }

    fn get_message(&self, folder: Folder, id: &str) -> Result<Message> {
        {
            let mut state = self.state.lock().unwrap();
            state.fetch_log.push(id.to_string());
            if let Some(err) = state.fetch_errors.get_mut(id).and_then(VecDeque::pop_front) {
                return Err(err);
            }
        }
        self.messages(folder)
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .map(|mut m| {
                m.folder = folder;
                m
            })
            .ok_or_else(|| UnsublyError::NotFound(id.to_string()))
    }

    fn folder_total(&self, folder: Folder) -> Result<Option<u64>> {
        if let Some(err) = self.state.lock().unwrap().total_error.take() {
            return Err(err);
        }
        Ok(self
            .report_totals
            .then(|| self.messages(folder).len() as u64))
    }
}
