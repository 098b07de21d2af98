use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// PCM format of the capture pipeline. Fixed at startup, never renegotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    /// Bytes per sample: 1, 2, 3 or 4.
    pub sample_width: u16,
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, sample_width: u16, channels: u16) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if !(1..=4).contains(&sample_width) {
            return Err(ConfigError::BadSampleWidth(sample_width));
        }
        if channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        Ok(Self {
            sample_rate,
            sample_width,
            channels,
        })
    }

    /// Byte length of one raw frame holding `frames_per_buffer` samples per channel.
    pub fn frame_len(&self, frames_per_buffer: usize) -> usize {
        frames_per_buffer * self.sample_width as usize * self.channels as usize
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }
}
