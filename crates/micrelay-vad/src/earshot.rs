//! Earshot-powered voice activity detector implementing [`VadEngine`].

use ::earshot::{VoiceActivityDetector, VoiceActivityProfile};
use serde::{Deserialize, Serialize};

use crate::constants::{SAMPLE_RATE_HZ, WINDOW_SIZE_SAMPLES};
use crate::engine::VadEngine;

/// Classifier aggressiveness, mirroring the four WebRTC VAD operating modes.
/// Higher modes reject more non-speech at the cost of clipping quiet speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sensitivity {
    Quality,
    LowBitrate,
    Aggressive,
    VeryAggressive,
}

impl Sensitivity {
    /// Map a numeric mode (0..=3) onto a profile; out-of-range values clamp
    /// to the most aggressive mode.
    pub fn from_mode(mode: u8) -> Self {
        match mode {
            0 => Self::Quality,
            1 => Self::LowBitrate,
            2 => Self::Aggressive,
            _ => Self::VeryAggressive,
        }
    }

    fn profile(self) -> VoiceActivityProfile {
        match self {
            Self::Quality => VoiceActivityProfile::QUALITY,
            Self::LowBitrate => VoiceActivityProfile::LBR,
            Self::Aggressive => VoiceActivityProfile::AGGRESSIVE,
            Self::VeryAggressive => VoiceActivityProfile::VERY_AGGRESSIVE,
        }
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self::VeryAggressive
    }
}

/// Thin wrapper adapting `earshot` to the [`VadEngine`] trait.
pub struct EarshotVad {
    detector: VoiceActivityDetector,
}

impl EarshotVad {
    pub fn new(sensitivity: Sensitivity) -> Self {
        Self {
            detector: VoiceActivityDetector::new(sensitivity.profile()),
        }
    }
}

impl VadEngine for EarshotVad {
    fn is_speech(&mut self, window: &[i16]) -> Result<bool, String> {
        if window.len() != WINDOW_SIZE_SAMPLES {
            return Err(format!(
                "window must hold {} samples, got {}",
                WINDOW_SIZE_SAMPLES,
                window.len()
            ));
        }
        self.detector
            .predict_16khz(window)
            .map_err(|_| "voice-activity prediction failed".to_string())
    }

    fn reset(&mut self) {
        self.detector.reset();
    }

    fn required_sample_rate(&self) -> u32 {
        SAMPLE_RATE_HZ
    }

    fn required_window_samples(&self) -> usize {
        WINDOW_SIZE_SAMPLES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_mapping_covers_range() {
        assert_eq!(Sensitivity::from_mode(0), Sensitivity::Quality);
        assert_eq!(Sensitivity::from_mode(1), Sensitivity::LowBitrate);
        assert_eq!(Sensitivity::from_mode(2), Sensitivity::Aggressive);
        assert_eq!(Sensitivity::from_mode(3), Sensitivity::VeryAggressive);
        assert_eq!(Sensitivity::from_mode(9), Sensitivity::VeryAggressive);
    }

    #[test]
    fn rejects_partial_window() {
        let mut vad = EarshotVad::new(Sensitivity::default());
        let partial = vec![0i16; WINDOW_SIZE_SAMPLES - 1];
        assert!(vad.is_speech(&partial).is_err());
    }

    #[test]
    fn silence_window_is_not_speech() {
        let mut vad = EarshotVad::new(Sensitivity::default());
        let silence = vec![0i16; WINDOW_SIZE_SAMPLES];
        assert_eq!(vad.is_speech(&silence).unwrap(), false);
    }
}
