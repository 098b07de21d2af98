pub mod capture;
pub mod device;
pub mod pcm;
pub mod resampler;
pub mod ring_buffer;
pub mod wav;

// Public API
pub use capture::{CaptureFault, CaptureThread, RawFrame};
pub use device::{DeviceDescriptor, DeviceManager};
pub use pcm::{decode_samples, downmix_mono};
pub use resampler::AnalysisResampler;
pub use ring_buffer::ByteRingBuffer;
pub use wav::{decode_wav, encode_wav};
