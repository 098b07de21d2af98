//! Typed payloads crossing the message-bus seam.

use serde::{Deserialize, Serialize};

/// Direction a device operates in. Only input devices are served here;
/// queries for other modes produce no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMode {
    Input,
    Output,
}

/// One device in an enumeration reply. `is_default` is an explicit flag;
/// display layers may render it as a trailing `*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub mode: DeviceMode,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub is_default: bool,
    /// `None` when the device was not tested.
    pub working: Option<bool>,
}

/// Periodic voice-activity digest for one summary cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSummary {
    pub debiased_energy: u32,
    pub is_speech: bool,
}

/// Events this service publishes, each scoped to a site id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// One WAV-wrapped audio frame.
    Frame { site_id: String, wav_bytes: Vec<u8> },
    /// Voice-activity summary.
    Summary {
        site_id: String,
        summary: AudioSummary,
    },
    /// Reply to a device query; `id` echoes the request id.
    Devices {
        site_id: String,
        id: Option<String>,
        devices: Vec<DeviceRecord>,
    },
    /// A capture, send, or enumeration failure with diagnostic context.
    RecordError {
        site_id: String,
        error: String,
        context: String,
    },
}

impl OutboundEvent {
    pub fn site_id(&self) -> &str {
        match self {
            OutboundEvent::Frame { site_id, .. }
            | OutboundEvent::Summary { site_id, .. }
            | OutboundEvent::Devices { site_id, .. }
            | OutboundEvent::RecordError { site_id, .. } => site_id,
        }
    }
}

/// Inbound control events this service reacts to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    /// A recognizer began listening; prefer bus delivery.
    ListeningStarted { site_id: String },
    /// The recognizer stopped; UDP delivery may resume.
    ListeningStopped { site_id: String },
    SummaryEnable { site_id: String },
    SummaryDisable { site_id: String },
    /// Enumerate input devices, optionally running the signal test.
    DeviceQuery {
        site_id: String,
        #[serde(default)]
        id: Option<String>,
        /// Empty means no filter.
        #[serde(default)]
        modes: Vec<DeviceMode>,
        #[serde(default)]
        test: bool,
    },
}

impl ControlEvent {
    pub fn site_id(&self) -> &str {
        match self {
            ControlEvent::ListeningStarted { site_id }
            | ControlEvent::ListeningStopped { site_id }
            | ControlEvent::SummaryEnable { site_id }
            | ControlEvent::SummaryDisable { site_id }
            | ControlEvent::DeviceQuery { site_id, .. } => site_id,
        }
    }
}
