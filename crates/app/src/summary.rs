//! Voice-activity summarizer, tapped off the routing loop.

use micrelay_audio::{decode_samples, downmix_mono, AnalysisResampler};
use micrelay_foundation::{AudioError, AudioFormat};
use micrelay_vad::{
    debiased_energy, EarshotVad, Sensitivity, VadEngine, WINDOW_SIZE_BYTES,
};

use crate::bus::AudioSummary;

/// Frames between summaries; bounds classifier CPU cost.
pub const DEFAULT_SUMMARY_SKIP_FRAMES: u32 = 5;

/// Produces one [`AudioSummary`] per `skip_frames` ingested frames.
///
/// Only the triggering frame is analyzed: it is converted to the 16 kHz
/// 16-bit mono analysis format and fed to the classifier in complete 30 ms
/// windows, while its raw bytes drive the energy figure. Resampled bytes
/// short of a full window stay buffered for the next triggering frame.
pub struct Summarizer {
    format: AudioFormat,
    sensitivity: Sensitivity,
    resampler: AnalysisResampler,
    /// Created lazily on the first triggering frame.
    vad: Option<Box<dyn VadEngine>>,
    pending: Vec<u8>,
    skip_frames: u32,
    frames_left: u32,
}

impl Summarizer {
    pub fn new(
        format: AudioFormat,
        sensitivity: Sensitivity,
        skip_frames: u32,
    ) -> Result<Self, AudioError> {
        let skip_frames = skip_frames.max(1);
        Ok(Self {
            format,
            sensitivity,
            resampler: AnalysisResampler::new(format.sample_rate)?,
            vad: None,
            pending: Vec::new(),
            skip_frames,
            frames_left: skip_frames,
        })
    }

    /// Feed one raw frame. Returns a summary on every `skip_frames`th call,
    /// `None` otherwise.
    pub fn ingest(&mut self, frame: &[u8]) -> Result<Option<AudioSummary>, String> {
        self.frames_left -= 1;
        if self.frames_left > 0 {
            return Ok(None);
        }
        self.frames_left = self.skip_frames;

        let sensitivity = self.sensitivity;
        let vad = self
            .vad
            .get_or_insert_with(|| Box::new(EarshotVad::new(sensitivity)));

        // Convert the triggering frame to the analysis format.
        let samples = decode_samples(&self.format, frame);
        let mono = downmix_mono(&samples, self.format.channels);
        for s in self.resampler.process(&mono) {
            self.pending.extend_from_slice(&s.to_le_bytes());
        }

        // Speech in any complete window counts as speech for the cycle.
        let mut is_speech = false;
        while self.pending.len() >= WINDOW_SIZE_BYTES {
            let window: Vec<i16> = self
                .pending
                .drain(..WINDOW_SIZE_BYTES)
                .collect::<Vec<u8>>()
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect();
            is_speech = vad.is_speech(&window)? || is_speech;
        }

        Ok(Some(AudioSummary {
            debiased_energy: debiased_energy(frame),
            is_speech,
        }))
    }

    /// Bytes awaiting a complete analysis window.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
