//! Lock-free upload progress shared between the upload task and pollers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Bytes acknowledged by the platform out of the file size.
///
/// `bytes_sent` only moves forward, so `fraction` is monotonically non-decreasing.
#[derive(Debug, Default)]
pub struct UploadProgress {
    sent: AtomicU64,
    total: AtomicU64,
}

impl UploadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total size once the file has been measured.
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    /// Record that the platform has acknowledged `bytes` bytes.
    pub fn advance_to(&self, bytes: u64) {
        let total = self.total.load(Ordering::Acquire);
        let bytes = if total > 0 { bytes.min(total) } else { bytes };
        self.sent.fetch_max(bytes, Ordering::AcqRel);
    }

    /// Mark every byte as acknowledged.
    pub fn complete(&self) {
        let total = self.total.load(Ordering::Acquire);
        self.sent.fetch_max(total, Ordering::AcqRel);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.sent.load(Ordering::Acquire)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Fraction in [0, 1]; 0 until the total is known.
    pub fn fraction(&self) -> f64 {
        let total = self.total_bytes();
        if total == 0 {
            return 0.0;
        }
        (self.bytes_sent() as f64 / total as f64).clamp(0.0, 1.0)
    }
}
