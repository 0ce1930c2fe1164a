//! Message content parsing: MIME body resolution and unsubscribe link extraction.

pub mod links;
pub mod mime;
