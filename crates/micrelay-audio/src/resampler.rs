use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use micrelay_foundation::AudioError;
use micrelay_vad::SAMPLE_RATE_HZ;

/// Rubato chunk size. 512 samples keeps latency low and divides cleanly
/// into the capture frame sizes used in practice.
const CHUNK_SIZE: usize = 512;

/// Streaming mono resampler to the fixed 16 kHz analysis rate.
///
/// This is the single resample path in the pipeline: routed audio passes
/// through untouched, only the voice-activity tap is converted. Input
/// chunks of arbitrary size are buffered internally to satisfy Rubato's
/// fixed chunk requirement; at equal rates the input passes straight
/// through.
pub struct AnalysisResampler {
    in_rate: u32,
    resampler: Option<SincFixedIn<f32>>,
    input_buffer: Vec<f32>,
}

impl AnalysisResampler {
    pub fn new(in_rate: u32) -> Result<Self, AudioError> {
        let resampler = if in_rate == SAMPLE_RATE_HZ {
            None
        } else {
            // Speech-tuned sinc interpolation; quality is fixed because the
            // output only feeds the voice-activity classifier.
            let params = SincInterpolationParameters {
                sinc_len: 64,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 128,
                window: WindowFunction::Blackman2,
            };
            let resampler = SincFixedIn::<f32>::new(
                SAMPLE_RATE_HZ as f64 / in_rate as f64,
                2.0,
                params,
                CHUNK_SIZE,
                1,
            )
            .map_err(|e| AudioError::Fatal(format!("failed to create resampler: {}", e)))?;
            Some(resampler)
        };

        Ok(Self {
            in_rate,
            resampler,
            input_buffer: Vec::with_capacity(CHUNK_SIZE * 2),
        })
    }

    pub fn input_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn output_rate(&self) -> u32 {
        SAMPLE_RATE_HZ
    }

    /// Feed an arbitrary chunk of mono samples; returns whatever resampled
    /// audio became available. Residual input below one Rubato chunk stays
    /// buffered for the next call.
    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        let Some(resampler) = self.resampler.as_mut() else {
            return input.to_vec();
        };

        self.input_buffer
            .extend(input.iter().map(|&s| s as f32 / 32768.0));

        let mut output = Vec::new();
        while self.input_buffer.len() >= CHUNK_SIZE {
            let chunk: Vec<f32> = self.input_buffer.drain(..CHUNK_SIZE).collect();
            match resampler.process(&[chunk], None) {
                Ok(frames) => {
                    if let Some(channel) = frames.first() {
                        output.extend(channel.iter().map(|&s| {
                            let clamped = s.clamp(-1.0, 1.0);
                            (clamped * 32767.0).round() as i16
                        }));
                    }
                }
                Err(e) => {
                    tracing::error!("Resampler error: {}", e);
                    return Vec::new();
                }
            }
        }

        output
    }

    /// Clear buffered input and the filter state.
    pub fn reset(&mut self) {
        self.input_buffer.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }
}
