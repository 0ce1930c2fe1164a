//! Scan results on disk and on screen: link artifacts, review rows, CSV.

pub mod csv;
pub mod links;
pub mod report;
