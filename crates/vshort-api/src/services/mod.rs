//! Business logic services.

pub mod scanner;

pub use scanner::{scan_folder, ScanStatus, ScannedVideo};
