//! The scan loop: list, fetch, extract, fold, report.
//!
//! ```text
//! Idle ─▶ Listing ─▶ Fetching ─┬─▶ Completed
//!            ▲          │  ▲   └─▶ Cancelled
//!            │          ▼  │
//!            └──────── Backoff
//! ```
//!
//! Provider calls are sequential and blocking. Cancellation is observed at
//! every page boundary, every message boundary and after every backoff.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::ScanConfig;
use crate::error::{Result, UnsublyError};
use crate::model::link::DomainLinks;
use crate::model::message::{Folder, Message};
use crate::parser::links::{self, PhraseSet};
use crate::provider::{MailProvider, MessagePage};

use super::cancel::CancelToken;
use super::reconcile::DomainReconciler;

/// Granularity of cancellation checks while sleeping in backoff.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// What to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Maximum number of messages to process.
    pub budget: usize,
    /// Folders in scan order.
    pub folders: Vec<Folder>,
}

/// Tuning knobs of the scan loop.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub page_size: u32,
    pub include_spam_trash: bool,
    pub backoff: Duration,
    pub max_backoff: Duration,
    pub max_rate_limit_retries: u32,
    pub phrases: PhraseSet,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for ScanSettings {
    fn from(cfg: &ScanConfig) -> Self {
        Self {
            page_size: cfg.effective_page_size(),
            include_spam_trash: true,
            backoff: cfg.backoff(),
            max_backoff: cfg.max_backoff(),
            max_rate_limit_retries: cfg.max_rate_limit_retries,
            phrases: if cfg.strict_phrases {
                PhraseSet::Strict
            } else {
                PhraseSet::Broad
            },
        }
    }
}

/// Controller state, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Listing,
    Fetching,
    Backoff,
    Completed,
    Cancelled,
}

/// How a scan ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "reason")]
pub enum ScanStatus {
    /// Budget reached or every folder exhausted.
    Completed,
    /// The cancel token was observed.
    Cancelled,
    /// Credentials were rejected after the scan started.
    Aborted(String),
}

/// Result of one scan. Partial when cancelled or aborted.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub links: DomainLinks,
    /// Messages fetched and folded.
    pub processed: usize,
    /// Effective budget (requested, capped by folder totals when known).
    pub budget: usize,
    /// Messages that could not be fetched and were left out.
    pub skipped: usize,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub status: ScanStatus,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Transient state of one in-flight scan.
struct ScanSession {
    budget: usize,
    processed: usize,
    skipped: usize,
    reconciler: DomainReconciler,
}

impl ScanSession {
    fn budget_reached(&self) -> bool {
        self.processed >= self.budget
    }
}

/// Outcome of one provider call wrapped in backoff.
enum Call<T> {
    Ok(T),
    Failed(UnsublyError),
    Cancelled,
}

/// Drives one scan over a [`MailProvider`].
pub struct ScanController<P> {
    provider: P,
    settings: ScanSettings,
    cancel: CancelToken,
    state: ScanState,
}

impl<P: MailProvider> ScanController<P> {
    pub fn new(provider: P, settings: ScanSettings, cancel: CancelToken) -> Self {
        Self {
            provider,
            settings,
            cancel,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Run the scan to completion, cancellation, or abort.
    ///
    /// Returns `Err` only for setup failures (bad credentials), before any
    /// progress is reported. Everything after that ends in a [`ScanOutcome`].
    pub fn run(
        &mut self,
        request: &ScanRequest,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> Result<ScanOutcome> {
        let started = Instant::now();
        let budget = self.effective_budget(request)?;
        info!(
            requested = request.budget,
            budget = budget,
            folders = ?request.folders,
            "Starting scan"
        );

        let mut session = ScanSession {
            budget,
            processed: 0,
            skipped: 0,
            reconciler: DomainReconciler::new(),
        };
        on_progress(0, budget);

        let status = self.scan_folders(&request.folders, &mut session, on_progress);
        self.transition(match status {
            ScanStatus::Cancelled => ScanState::Cancelled,
            _ => ScanState::Completed,
        });

        let elapsed = started.elapsed();
        info!(
            processed = session.processed,
            skipped = session.skipped,
            domains = session.reconciler.domain_count(),
            elapsed = ?elapsed,
            status = ?status,
            "Scan finished"
        );

        Ok(ScanOutcome {
            links: session.reconciler.finish(),
            processed: session.processed,
            budget,
            skipped: session.skipped,
            elapsed,
            status,
        })
    }

    /// `min(requested, Σ folder totals)`, or `requested` if a total is unknown.
    fn effective_budget(&self, request: &ScanRequest) -> Result<usize> {
        let mut total: u64 = 0;
        for &folder in &request.folders {
            match self.provider.folder_total(folder) {
                Ok(Some(n)) => total += n,
                Ok(None) => return Ok(request.budget),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(folder = %folder, error = %e, "Cannot size folder, using requested budget");
                    return Ok(request.budget);
                }
            }
        }
        Ok(request.budget.min(usize::try_from(total).unwrap_or(usize::MAX)))
    }

    fn scan_folders(
        &mut self,
        folders: &[Folder],
        session: &mut ScanSession,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> ScanStatus {
        for &folder in folders {
            if session.budget_reached() {
                break;
            }
            info!(folder = %folder, "Scanning folder");
            let mut page_token: Option<String> = None;

            loop {
                if self.cancel.is_cancelled() {
                    return ScanStatus::Cancelled;
                }
                if session.budget_reached() {
                    break;
                }

                self.transition(ScanState::Listing);
                let page = match self.list_page(folder, page_token.as_deref()) {
                    Call::Ok(page) => page,
                    Call::Cancelled => return ScanStatus::Cancelled,
                    Call::Failed(e) if e.is_fatal() => return ScanStatus::Aborted(e.to_string()),
                    Call::Failed(e) => {
                        warn!(folder = %folder, error = %e, "Listing failed, moving to next folder");
                        break;
                    }
                };

                if page.ids.is_empty() {
                    debug!(folder = %folder, "No messages found");
                    break;
                }

                self.transition(ScanState::Fetching);
                for id in &page.ids {
                    if self.cancel.is_cancelled() {
                        return ScanStatus::Cancelled;
                    }
                    if session.budget_reached() {
                        break;
                    }

                    match self.fetch(folder, id) {
                        Call::Ok(message) => {
                            fold_message(&message, self.settings.phrases, session);
                            on_progress(session.processed, session.budget);
                        }
                        Call::Cancelled => return ScanStatus::Cancelled,
                        Call::Failed(e) if e.is_fatal() => {
                            return ScanStatus::Aborted(e.to_string())
                        }
                        Call::Failed(e) => {
                            session.skipped += 1;
                            warn!(folder = %folder, id = %id, error = %e, "Skipping message");
                        }
                    }
                }

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        }

        ScanStatus::Completed
    }

    fn list_page(&mut self, folder: Folder, page_token: Option<&str>) -> Call<MessagePage> {
        let page_size = self.settings.page_size;
        let include = self.settings.include_spam_trash;
        self.with_backoff(|provider| {
            provider.list_messages(folder, page_token, page_size, include)
        })
    }

    fn fetch(&mut self, folder: Folder, id: &str) -> Call<Message> {
        self.with_backoff(|provider| provider.get_message(folder, id))
    }

    /// Call `op`, sleeping and retrying while the provider rate-limits us.
    fn with_backoff<T>(&mut self, mut op: impl FnMut(&P) -> Result<T>) -> Call<T> {
        let resume = self.state;
        let mut attempt: u32 = 0;
        loop {
            match op(&self.provider) {
                Ok(value) => return Call::Ok(value),
                Err(e) if e.is_retryable() && attempt < self.settings.max_rate_limit_retries => {
                    let delay = self.backoff_delay(attempt, e.retry_after());
                    attempt += 1;
                    self.transition(ScanState::Backoff);
                    warn!(attempt = attempt, delay = ?delay, "Rate limited, backing off");
                    if !self.sleep_unless_cancelled(delay) {
                        return Call::Cancelled;
                    }
                    self.transition(resume);
                }
                Err(e) => return Call::Failed(e),
            }
        }
    }

    /// `Retry-After` if given, else `backoff * 2^attempt`; capped either way.
    fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let escalated = self
            .settings
            .backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        retry_after
            .unwrap_or(escalated)
            .min(self.settings.max_backoff)
    }

    /// Sleep in small slices. Returns `false` if cancelled meanwhile.
    fn sleep_unless_cancelled(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    fn transition(&mut self, next: ScanState) {
        if self.state != next {
            trace!(from = ?self.state, to = ?next, "Scan state");
            self.state = next;
        }
    }
}

/// Extract and fold one fetched message.
fn fold_message(message: &Message, phrases: PhraseSet, session: &mut ScanSession) {
    let domain = message.sender_domain();
    let candidates = links::candidates_for(message, phrases);
    debug!(
        id = %message.id,
        domain = %domain,
        candidates = candidates.len(),
        "Processed message"
    );
    session.reconciler.fold(&domain, &candidates);
    session.processed += 1;
}
