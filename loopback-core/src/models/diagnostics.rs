use chrono::{DateTime, Utc};
use portable_atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use super::config::CaptureEffect;
use super::error::DeviceError;
use super::format::AudioFormat;

/// Counters updated by the processing loop, read from the control context.
#[derive(Debug, Default)]
pub struct LoopStats {
    frames_processed: AtomicU64,
    samples_processed: AtomicU64,
    read_failures: AtomicU64,
    write_failures: AtomicU64,
}

impl LoopStats {
    pub fn record_frame(&self, samples: usize) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.samples_processed.fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.frames_processed.store(0, Ordering::Relaxed);
        self.samples_processed.store(0, Ordering::Relaxed);
        self.read_failures.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of the current (or last) loopback session for debugging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopbackDiagnostics {
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub format: Option<AudioFormat>,
    pub buffer_samples: usize,
    pub attached_effects: Vec<CaptureEffect>,
    pub frames_processed: u64,
    pub samples_processed: u64,
    pub read_failures: u64,
    pub write_failures: u64,
    pub last_error: Option<DeviceError>,
}

impl LoopbackDiagnostics {
    pub(crate) fn with_counters(mut self, stats: &LoopStats) -> Self {
        self.frames_processed = stats.frames_processed.load(Ordering::Acquire);
        self.samples_processed = stats.samples_processed.load(Ordering::Acquire);
        self.read_failures = stats.read_failures.load(Ordering::Acquire);
        self.write_failures = stats.write_failures.load(Ordering::Acquire);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_flow_into_snapshot() {
        let stats = LoopStats::default();
        stats.record_frame(512);
        stats.record_frame(512);
        stats.record_read_failure();

        let snapshot = LoopbackDiagnostics::default().with_counters(&stats);
        assert_eq!(snapshot.frames_processed, 2);
        assert_eq!(snapshot.samples_processed, 1024);
        assert_eq!(snapshot.read_failures, 1);
        assert_eq!(snapshot.write_failures, 0);

        stats.reset();
        assert_eq!(stats.frames_processed(), 0);
    }
}
