//! Core data model types: messages, sender addresses, and unsubscribe links.

pub mod address;
pub mod link;
pub mod message;
