//! Per-frame WAV container codec.
//!
//! Every routed frame is wrapped in its own minimal PCM WAV container; this
//! is not a streaming file writer.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use micrelay_foundation::{AudioError, AudioFormat};

/// Wrap raw PCM bytes in a WAV container carrying the pipeline format.
/// Trailing bytes short of one full sample are dropped.
pub fn encode_wav(format: &AudioFormat, pcm: &[u8]) -> Result<Vec<u8>, AudioError> {
    let spec = WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample(),
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    match format.sample_width {
        1 => {
            for &b in pcm {
                writer.write_sample((b as i16 - 128) as i8)?;
            }
        }
        2 => {
            for c in pcm.chunks_exact(2) {
                writer.write_sample(i16::from_le_bytes([c[0], c[1]]))?;
            }
        }
        3 => {
            for c in pcm.chunks_exact(3) {
                let v = ((c[2] as i8 as i32) << 16) | ((c[1] as i32) << 8) | c[0] as i32;
                writer.write_sample(v)?;
            }
        }
        4 => {
            for c in pcm.chunks_exact(4) {
                writer.write_sample(i32::from_le_bytes([c[0], c[1], c[2], c[3]]))?;
            }
        }
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{}-byte samples", other),
            })
        }
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

/// Parse a WAV container back into its format and raw little-endian PCM
/// bytes. Counterpart of [`encode_wav`]; consumers use it to recover the
/// original frame.
pub fn decode_wav(wav_bytes: &[u8]) -> Result<(AudioFormat, Vec<u8>), AudioError> {
    let mut reader = WavReader::new(Cursor::new(wav_bytes))?;
    let spec = reader.spec();
    let format = AudioFormat::new(spec.sample_rate, spec.bits_per_sample / 8, spec.channels)
        .map_err(|e| AudioError::Fatal(format!("unsupported WAV format: {}", e)))?;

    let mut pcm = Vec::new();
    match format.sample_width {
        1 => {
            for sample in reader.samples::<i8>() {
                pcm.push((sample? as i16 + 128) as u8);
            }
        }
        2 => {
            for sample in reader.samples::<i16>() {
                pcm.extend_from_slice(&sample?.to_le_bytes());
            }
        }
        3 => {
            for sample in reader.samples::<i32>() {
                let bytes = sample?.to_le_bytes();
                pcm.extend_from_slice(&bytes[..3]);
            }
        }
        4 => {
            for sample in reader.samples::<i32>() {
                pcm.extend_from_slice(&sample?.to_le_bytes());
            }
        }
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{}-byte samples", other),
            })
        }
    }

    Ok((format, pcm))
}
