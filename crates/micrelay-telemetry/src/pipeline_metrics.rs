use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared counters for cross-thread pipeline monitoring.
///
/// Cloned into each stage; every field is a relaxed atomic so the hot loops
/// never take a lock to account for a frame.
#[derive(Clone, Default)]
pub struct PipelineMetrics {
    pub capture_frames: Arc<AtomicU64>,
    pub bus_frames: Arc<AtomicU64>,
    pub udp_frames: Arc<AtomicU64>,
    pub send_errors: Arc<AtomicU64>,
    pub summaries_emitted: Arc<AtomicU64>,
    pub capture_errors: Arc<AtomicU64>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_capture_frames(&self) {
        self.capture_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_bus_frames(&self) {
        self.bus_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_udp_frames(&self) {
        self.udp_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_send_errors(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_summaries(&self) {
        self.summaries_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_capture_errors(&self) {
        self.capture_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// One-line snapshot for the periodic stats log.
    pub fn snapshot(&self) -> String {
        format!(
            "captured={} bus={} udp={} send_errors={} summaries={} capture_errors={}",
            self.capture_frames.load(Ordering::Relaxed),
            self.bus_frames.load(Ordering::Relaxed),
            self.udp_frames.load(Ordering::Relaxed),
            self.send_errors.load(Ordering::Relaxed),
            self.summaries_emitted.load(Ordering::Relaxed),
            self.capture_errors.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = PipelineMetrics::new();
        let clone = metrics.clone();
        clone.increment_capture_frames();
        clone.increment_udp_frames();
        assert_eq!(metrics.capture_frames.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.udp_frames.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.bus_frames.load(Ordering::Relaxed), 0);
    }
}
