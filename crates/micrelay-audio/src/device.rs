use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::build_input_byte_stream;
use micrelay_foundation::{AudioError, AudioFormat};
use micrelay_vad::{debiased_energy, WORKING_ENERGY_THRESHOLD};

/// How long a device test waits for one buffer before giving up.
const TEST_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// One enumerated input device. Produced fresh per enumeration; device
/// topology can change between calls, so descriptors are never cached.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    /// `None` when testing was not requested; `Some(false)` covers both a
    /// silent device and one that failed to open or read.
    pub working: Option<bool>,
}

impl DeviceDescriptor {
    /// Display name with the conventional trailing `*` on the default device.
    pub fn display_name(&self) -> String {
        if self.is_default {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Enumerates capture-capable devices and can run a short signal test per
/// device. Owns the audio subsystem handle for exactly one enumeration; the
/// handle is released when the manager drops.
pub struct DeviceManager {
    host: Host,
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// List input devices by index. With `test` set, each device is opened
    /// briefly with the configured format and classified by debiased energy;
    /// per-device failures are contained, never propagated.
    pub fn enumerate(
        &self,
        format: &AudioFormat,
        frames_per_buffer: usize,
        test: bool,
    ) -> Result<Vec<DeviceDescriptor>, AudioError> {
        let default_name = self
            .host
            .default_input_device()
            .and_then(|d| d.name().ok());

        let mut devices = Vec::new();
        let mut default_marked = false;
        for (index, device) in self.host.input_devices()?.enumerate() {
            let name = device
                .name()
                .unwrap_or_else(|_| format!("input device {}", index));

            // Only the first device matching the host default name is
            // flagged; duplicate names cannot both become the default.
            let is_default = !default_marked && default_name.as_deref() == Some(name.as_str());
            if is_default {
                default_marked = true;
            }

            let working = if test {
                Some(self.test_device(&device, index, format, frames_per_buffer))
            } else {
                None
            };

            devices.push(DeviceDescriptor {
                index,
                name,
                is_default,
                working,
            });
        }

        Ok(devices)
    }

    /// Record one short buffer from the device and check its energy.
    fn test_device(
        &self,
        device: &Device,
        index: usize,
        format: &AudioFormat,
        frames_per_buffer: usize,
    ) -> bool {
        match read_one_buffer(device, format, frames_per_buffer) {
            Ok(pcm) => {
                let energy = debiased_energy(&pcm);
                tracing::debug!("Device {} test energy: {}", index, energy);
                energy > WORKING_ENERGY_THRESHOLD
            }
            Err(e) => {
                tracing::warn!("Device test failed (index {}): {}", index, e);
                false
            }
        }
    }
}

/// Open a short input stream, collect roughly one frame of bytes, stop the
/// stream. The stream is released on every path when it drops.
fn read_one_buffer(
    device: &Device,
    format: &AudioFormat,
    frames_per_buffer: usize,
) -> Result<Vec<u8>, AudioError> {
    let want = format.frame_len(frames_per_buffer);

    let ring = crate::ring_buffer::ByteRingBuffer::new(want * 2);
    let (producer, mut consumer) = ring.split();
    let stream_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let error_slot = Arc::clone(&stream_error);

    let stream = build_input_byte_stream(
        device,
        format,
        producer,
        Box::new(move |err| {
            *error_slot.lock() = Some(err);
        }),
    )?;
    stream.play()?;

    let mut collected = Vec::with_capacity(want);
    let mut scratch = vec![0u8; want];
    let deadline = Instant::now() + TEST_READ_TIMEOUT;
    while collected.len() < want {
        if let Some(err) = stream_error.lock().take() {
            return Err(AudioError::Fatal(format!("stream error: {}", err)));
        }
        if Instant::now() >= deadline {
            break;
        }
        let read = consumer.read(&mut scratch);
        if read == 0 {
            thread::sleep(Duration::from_millis(10));
            continue;
        }
        collected.extend_from_slice(&scratch[..read]);
    }

    if let Err(e) = stream.pause() {
        tracing::debug!("Could not pause test stream: {}", e);
    }
    drop(stream);

    collected.truncate(want);
    if collected.is_empty() {
        return Err(AudioError::Fatal(
            "no audio data within the test window".to_string(),
        ));
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skip_hardware_dependent(test_name: &str) -> bool {
        let manager = DeviceManager::new();
        let headless = match manager.host.input_devices() {
            Ok(mut devices) => devices.next().is_none(),
            Err(_) => true,
        };
        if headless {
            eprintln!("Skipping {test_name}: requires accessible audio input devices");
        }
        headless
    }

    #[test]
    fn enumeration_without_testing_leaves_working_unset() {
        let manager = DeviceManager::new();
        let format = AudioFormat::new(16_000, 2, 1).unwrap();
        // Metadata-only enumeration must not open any stream, so this runs
        // even on headless machines (possibly returning an empty list).
        let devices = match manager.enumerate(&format, 1024, false) {
            Ok(devices) => devices,
            Err(_) => return,
        };
        assert!(devices.iter().all(|d| d.working.is_none()));
    }

    #[test]
    fn at_most_one_default_device() {
        if skip_hardware_dependent("at_most_one_default_device") {
            return;
        }
        let manager = DeviceManager::new();
        let format = AudioFormat::new(16_000, 2, 1).unwrap();
        let devices = manager.enumerate(&format, 1024, false).unwrap();
        assert!(devices.iter().filter(|d| d.is_default).count() <= 1);
    }

    #[test]
    fn indexes_are_dense_and_ordered() {
        if skip_hardware_dependent("indexes_are_dense_and_ordered") {
            return;
        }
        let manager = DeviceManager::new();
        let format = AudioFormat::new(16_000, 2, 1).unwrap();
        let devices = manager.enumerate(&format, 1024, false).unwrap();
        for (expected, device) in devices.iter().enumerate() {
            assert_eq!(device.index, expected);
        }
    }

    #[test]
    fn default_marker_in_display_name() {
        let descriptor = DeviceDescriptor {
            index: 0,
            name: "builtin mic".to_string(),
            is_default: true,
            working: None,
        };
        assert_eq!(descriptor.display_name(), "builtin mic*");

        let descriptor = DeviceDescriptor {
            is_default: false,
            ..descriptor
        };
        assert_eq!(descriptor.display_name(), "builtin mic");
    }
}
