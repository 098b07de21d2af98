//! PCM byte/sample conversions for the analysis path.
//!
//! Frames travel the pipeline as opaque bytes in the configured format; only
//! the summarizer needs numeric samples, always reduced to 16-bit mono.

use micrelay_foundation::AudioFormat;

/// Decode raw PCM bytes in the configured width to 16-bit samples.
///
/// Widths narrower than 16 bits are scaled up, wider ones keep their top
/// 16 bits. 8-bit PCM is unsigned with a 128 offset, per the WAV convention.
/// Trailing bytes short of one full sample are ignored.
pub fn decode_samples(format: &AudioFormat, pcm: &[u8]) -> Vec<i16> {
    match format.sample_width {
        1 => pcm.iter().map(|&b| ((b as i16) - 128) << 8).collect(),
        2 => pcm
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect(),
        3 => pcm
            .chunks_exact(3)
            .map(|c| i16::from_le_bytes([c[1], c[2]]))
            .collect(),
        4 => pcm
            .chunks_exact(4)
            .map(|c| (i32::from_le_bytes([c[0], c[1], c[2], c[3]]) >> 16) as i16)
            .collect(),
        _ => Vec::new(),
    }
}

/// Average interleaved channels down to mono.
pub fn downmix_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}
