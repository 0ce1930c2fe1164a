//! `unsubly`: find the unsubscribe links hiding in a mailbox.
//!
//! This crate provides the scan-and-extract pipeline: paginated retrieval of
//! messages from a mail provider under a processing budget, MIME body
//! resolution, unsubscribe-link extraction from bodies and
//! `List-Unsubscribe` headers, and per-sender-domain reconciliation.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod provider;
pub mod scan;
pub mod timing;
