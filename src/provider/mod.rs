//! Mail provider access: the authenticated client handle the scanner talks to.

pub mod auth;
pub mod gmail;

use crate::error::Result;
use crate::model::message::{Folder, Message};

/// One page of a folder listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    /// Message ids in provider order.
    pub ids: Vec<String>,
    /// Continuation token for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Authenticated access to a mailbox.
///
/// Implementations are blocking; the scanner calls them sequentially from
/// its own worker thread. Errors are classified through
/// [`UnsublyError`](crate::error::UnsublyError): `RateLimited` is retried,
/// `NotFound`/`Transient`/`Provider` skip one message, `Authentication`
/// stops the scan.
pub trait MailProvider {
    /// List one page of message ids in `folder`.
    fn list_messages(
        &self,
        folder: Folder,
        page_token: Option<&str>,
        page_size: u32,
        include_spam_trash: bool,
    ) -> Result<MessagePage>;

    /// Fetch the full content of a listed message.
    fn get_message(&self, folder: Folder, id: &str) -> Result<Message>;

    /// Total number of messages in `folder`, when the provider can tell.
    fn folder_total(&self, _folder: Folder) -> Result<Option<u64>> {
        Ok(None)
    }
}

impl<P: MailProvider + ?Sized> MailProvider for &P {
    fn list_messages(
        &self,
        folder: Folder,
        page_token: Option<&str>,
        page_size: u32,
        include_spam_trash: bool,
    ) -> Result<MessagePage> {
        (**self).list_messages(folder, page_token, page_size, include_spam_trash)
    }

    fn get_message(&self, folder: Folder, id: &str) -> Result<Message> {
        (**self).get_message(folder, id)
    }

    fn folder_total(&self, folder: Folder) -> Result<Option<u64>> {
        (**self).folder_total(folder)
    }
}
