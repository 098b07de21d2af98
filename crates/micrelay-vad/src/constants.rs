//! Analysis-format constants for voice-activity processing.

/// Sample rate the classifier operates at (Hz).
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Duration of one analysis window in milliseconds.
pub const WINDOW_DURATION_MS: u32 = 30;

/// Samples per analysis window. At 16 kHz, 480 samples = 30 ms.
pub const WINDOW_SIZE_SAMPLES: usize =
    (SAMPLE_RATE_HZ as usize * WINDOW_DURATION_MS as usize) / 1000;

/// Bytes per analysis window (16-bit mono).
pub const WINDOW_SIZE_BYTES: usize = WINDOW_SIZE_SAMPLES * 2;
