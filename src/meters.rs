//! Thread-safe progress metering for the decoder pool.
//!
//! Workers and the ordering consumer update these counters without locks;
//! any other thread (a progress display, the validation tool) may read them
//! while the pool runs.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Lock-free decode counters.
#[derive(Default, Debug)]
pub struct DecodeMeters {
    frames_decoded: AtomicUsize,
    frames_written: AtomicUsize,
    peak_pending: AtomicUsize,
    last_decode_ms: AtomicU32,
}

impl DecodeMeters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.frames_decoded.store(0, Ordering::Relaxed);
        self.frames_written.store(0, Ordering::Relaxed);
        self.peak_pending.store(0, Ordering::Relaxed);
        self.last_decode_ms.store(0f32.to_bits(), Ordering::Relaxed);
    }

    pub fn record_decoded(&self, elapsed_ms: f32) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
        self.last_decode_ms.store(elapsed_ms.to_bits(), Ordering::Relaxed);
    }

    pub fn record_written(&self) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pending(&self, depth: usize) {
        self.peak_pending.fetch_max(depth, Ordering::Relaxed);
    }

    pub fn get_frames_decoded(&self) -> usize {
        self.frames_decoded.load(Ordering::Relaxed)
    }

    pub fn get_frames_written(&self) -> usize {
        self.frames_written.load(Ordering::Relaxed)
    }

    pub fn get_peak_pending(&self) -> usize {
        self.peak_pending.load(Ordering::Relaxed)
    }

    pub fn get_last_decode_ms(&self) -> f32 {
        f32::from_bits(self.last_decode_ms.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let meters = DecodeMeters::new();
        meters.record_decoded(12.5);
        meters.record_decoded(3.0);
        meters.record_written();
        meters.record_pending(4);
        meters.record_pending(2);
        assert_eq!(meters.get_frames_decoded(), 2);
        assert_eq!(meters.get_frames_written(), 1);
        assert_eq!(meters.get_peak_pending(), 4);
        assert_eq!(meters.get_last_decode_ms(), 3.0);
        meters.reset();
        assert_eq!(meters.get_frames_decoded(), 0);
    }
}
