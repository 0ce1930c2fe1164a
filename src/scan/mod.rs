//! The scan-and-extract pipeline.

pub mod cancel;
pub mod controller;
pub mod reconcile;
pub mod worker;

pub use cancel::CancelToken;
pub use controller::{ScanController, ScanOutcome, ScanRequest, ScanSettings, ScanStatus};
pub use reconcile::DomainReconciler;
pub use worker::{run_scan, spawn_scan, ScanEvent, ScanHandle};
