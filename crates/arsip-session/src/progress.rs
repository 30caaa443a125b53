//! Upload progress as whole percentages that never go backwards.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI16, Ordering};

use arsip_transport::ByteProgress;

type PercentCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Turns `(bytes_sent, bytes_total)` into a monotonic percentage.
///
/// One tracker spans every attempt of an upload: when the request is
/// replayed after a refresh, the second body starts again from zero bytes,
/// but the caller never sees the percentage drop.
#[derive(Clone)]
pub struct ProgressTracker {
    // Highest percentage reported so far, -1 before the first report.
    last: Arc<AtomicI16>,
    callback: Option<PercentCallback>,
}

impl ProgressTracker {
    pub fn new(callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            last: Arc::new(AtomicI16::new(-1)),
            callback: Some(Arc::new(callback)),
        }
    }

    /// A tracker without a callback.
    pub fn silent() -> Self {
        Self {
            last: Arc::new(AtomicI16::new(-1)),
            callback: None,
        }
    }

    /// Records progress. Nothing is reported until a byte has been sent.
    pub fn report(&self, sent: u64, total: u64) {
        if sent == 0 && total > 0 {
            return;
        }
        let pct = if total == 0 {
            100
        } else {
            (sent.min(total) * 100 / total) as i16
        };
        self.advance(pct);
    }

    /// Reports 100 unless it already has been.
    pub fn finish(&self) {
        self.advance(100);
    }

    /// Highest percentage reported so far.
    pub fn last_reported(&self) -> Option<u8> {
        u8::try_from(self.last.load(Ordering::Acquire)).ok()
    }

    /// Adapter for the transport's byte-level progress sink.
    pub fn as_byte_progress(&self) -> ByteProgress {
        let tracker = self.clone();
        Arc::new(move |sent, total| tracker.report(sent, total))
    }

    fn advance(&self, pct: i16) {
        let previous = self.last.fetch_max(pct, Ordering::AcqRel);
        if pct > previous {
            if let Some(callback) = &self.callback {
                callback(pct as u8);
            }
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::silent()
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("last_reported", &self.last_reported())
            .finish_non_exhaustive()
    }
}
