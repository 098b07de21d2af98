use clap::Parser;

use micrelay_foundation::{AudioFormat, ConfigError};
use micrelay_vad::Sensitivity;

/// Stream microphone audio to a message bus or UDP socket for a downstream
/// speech recognizer.
#[derive(Parser, Debug, Clone)]
#[command(name = "micrelay", version, about)]
pub struct Cli {
    /// Sample rate of recorded audio in hertz (e.g. 16000)
    #[arg(long, env = "MICRELAY_SAMPLE_RATE")]
    pub sample_rate: u32,

    /// Sample width of recorded audio in bytes (e.g. 2)
    #[arg(long, env = "MICRELAY_SAMPLE_WIDTH")]
    pub sample_width: u16,

    /// Number of channels in recorded audio (e.g. 1)
    #[arg(long, env = "MICRELAY_CHANNELS")]
    pub channels: u16,

    /// Index of the microphone to use; defaults to the system input device
    #[arg(long, env = "MICRELAY_DEVICE_INDEX")]
    pub device_index: Option<usize>,

    /// Samples per channel read in one capture call
    #[arg(long, env = "MICRELAY_FRAMES_PER_BUFFER", default_value_t = 1024)]
    pub frames_per_buffer: usize,

    /// Site id this service answers control messages for
    #[arg(long, env = "MICRELAY_SITE_ID", default_value = "default")]
    pub site_id: String,

    /// If set, scope outgoing audio events to a different site id
    #[arg(long, env = "MICRELAY_OUTPUT_SITE_ID")]
    pub output_site_id: Option<String>,

    /// Host for raw UDP audio output
    #[arg(long, env = "MICRELAY_UDP_HOST", default_value = "127.0.0.1")]
    pub udp_audio_host: String,

    /// Send audio as UDP datagrams to this port while no recognizer listens
    #[arg(long, env = "MICRELAY_UDP_PORT")]
    pub udp_audio_port: Option<u16>,

    /// Voice-activity sensitivity mode, 0 (permissive) to 3 (aggressive)
    #[arg(long, env = "MICRELAY_VAD_MODE", default_value_t = 3)]
    pub vad_mode: u8,

    /// List capture devices and exit instead of streaming
    #[arg(long)]
    pub list_devices: bool,

    /// Record a short buffer from each listed device and report whether it
    /// produces real audio
    #[arg(long, requires = "list_devices")]
    pub test_devices: bool,
}

impl Cli {
    pub fn audio_format(&self) -> Result<AudioFormat, ConfigError> {
        if self.frames_per_buffer == 0 {
            return Err(ConfigError::ZeroFramesPerBuffer);
        }
        AudioFormat::new(self.sample_rate, self.sample_width, self.channels)
    }

    pub fn output_site_id(&self) -> String {
        self.output_site_id
            .clone()
            .unwrap_or_else(|| self.site_id.clone())
    }

    pub fn sensitivity(&self) -> Sensitivity {
        Sensitivity::from_mode(self.vad_mode)
    }
}
