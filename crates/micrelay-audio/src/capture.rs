use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::ring_buffer::{ByteProducer, ByteRingBuffer};
use micrelay_foundation::{AudioError, AudioFormat};
use micrelay_telemetry::PipelineMetrics;

/// One fixed-size block of raw PCM bytes in the configured format.
///
/// Produced by the capture loop, consumed exactly once by the routing loop;
/// ownership moves through the frame queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub bytes: Vec<u8>,
}

/// Terminal capture failure, forwarded to the control handler so it can be
/// published as a record-error event.
#[derive(Debug, Clone)]
pub struct CaptureFault {
    pub error: String,
    pub context: String,
}

/// Handle to the dedicated capture thread.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl CaptureThread {
    /// Open the configured device and start producing frames into
    /// `frame_tx`. The thread exits on the first capture failure, reporting
    /// it once on `fault_tx`; it does not restart itself.
    pub fn spawn(
        format: AudioFormat,
        device_index: Option<usize>,
        frames_per_buffer: usize,
        frame_tx: crossbeam_channel::Sender<RawFrame>,
        fault_tx: tokio::sync::mpsc::UnboundedSender<CaptureFault>,
        metrics: PipelineMetrics,
    ) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                if let Err(e) = run_capture(
                    format,
                    device_index,
                    frames_per_buffer,
                    frame_tx,
                    &metrics,
                    &thread_flag,
                ) {
                    let context = match device_index {
                        Some(index) => format!("device index {}", index),
                        None => "default input device".to_string(),
                    };
                    tracing::error!("Capture failed ({}): {}", context, e);
                    let _ = fault_tx.send(CaptureFault {
                        error: e.to_string(),
                        context,
                    });
                }
                tracing::info!("Audio capture thread exiting");
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn capture thread: {}", e)))?;

        Ok(Self { handle, running })
    }

    /// Signal the loop to stop and wait for the thread to release the device.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

/// Blocking capture loop. The cpal stream and host handle are released on
/// every exit path when the locals drop.
fn run_capture(
    format: AudioFormat,
    device_index: Option<usize>,
    frames_per_buffer: usize,
    frame_tx: crossbeam_channel::Sender<RawFrame>,
    metrics: &PipelineMetrics,
    running: &AtomicBool,
) -> Result<(), AudioError> {
    let host = cpal::default_host();
    let device = match device_index {
        Some(index) => host
            .input_devices()?
            .nth(index)
            .ok_or(AudioError::DeviceNotFound {
                index: Some(index),
            })?,
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { index: None })?,
    };
    if let Ok(name) = device.name() {
        tracing::info!("Recording from input device: {}", name);
    }

    let frame_len = format.frame_len(frames_per_buffer);
    let ring = ByteRingBuffer::new(frame_len * 8);
    let (producer, mut consumer) = ring.split();

    let stream_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let error_slot = Arc::clone(&stream_error);
    let stream = build_input_byte_stream(
        &device,
        &format,
        producer,
        Box::new(move |err| {
            *error_slot.lock() = Some(err);
        }),
    )?;
    stream.play()?;
    tracing::debug!(
        "Audio stream started ({} Hz, {} byte(s)/sample, {} channel(s))",
        format.sample_rate,
        format.sample_width,
        format.channels
    );

    let mut pending = vec![0u8; frame_len];
    let mut filled = 0usize;

    while running.load(Ordering::SeqCst) {
        if let Some(err) = stream_error.lock().take() {
            return Err(AudioError::Fatal(format!("stream error: {}", err)));
        }

        let read = consumer.read(&mut pending[filled..]);
        if read == 0 {
            // Nothing buffered yet; back off instead of spinning.
            thread::sleep(Duration::from_millis(10));
            continue;
        }
        filled += read;

        if filled == frame_len {
            let frame = std::mem::replace(&mut pending, vec![0u8; frame_len]);
            filled = 0;
            if frame_tx.send(RawFrame { bytes: frame }).is_err() {
                tracing::debug!("Frame queue closed; stopping capture");
                break;
            }
            metrics.increment_capture_frames();
        }
    }

    Ok(())
}

/// Build a cpal input stream in the configured format, delivering the raw
/// sample bytes (little-endian) into the ring buffer. The callback reuses
/// one scratch buffer and never blocks.
pub(crate) fn build_input_byte_stream(
    device: &cpal::Device,
    format: &AudioFormat,
    mut producer: ByteProducer,
    mut on_error: Box<dyn FnMut(String) + Send>,
) -> Result<Stream, AudioError> {
    let config = StreamConfig {
        channels: format.channels,
        sample_rate: SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("Audio stream error: {}", err);
        on_error(err.to_string());
    };

    // One stream arm per supported width; the callback serializes the
    // device's native samples to little-endian bytes unchanged.
    let stream = match format.sample_width {
        1 => device.build_input_stream(
            &config,
            move |data: &[u8], _: &_| {
                if !data.is_empty() {
                    let _ = producer.write(data);
                }
            },
            err_fn,
            None,
        )?,
        2 => {
            let mut scratch: Vec<u8> = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &_| {
                    scratch.clear();
                    scratch.reserve(data.len() * 2);
                    for &s in data {
                        scratch.extend_from_slice(&s.to_le_bytes());
                    }
                    if !scratch.is_empty() {
                        let _ = producer.write(&scratch);
                    }
                },
                err_fn,
                None,
            )?
        }
        4 => {
            let mut scratch: Vec<u8> = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[i32], _: &_| {
                    scratch.clear();
                    scratch.reserve(data.len() * 4);
                    for &s in data {
                        scratch.extend_from_slice(&s.to_le_bytes());
                    }
                    if !scratch.is_empty() {
                        let _ = producer.write(&scratch);
                    }
                },
                err_fn,
                None,
            )?
        }
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{}-byte samples", other),
            })
        }
    };

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_reports_fault_for_missing_device() {
        // An out-of-range device index must fail once through the fault
        // channel rather than panic or retry.
        let format = AudioFormat::new(16_000, 2, 1).unwrap();
        let (frame_tx, _frame_rx) = crossbeam_channel::unbounded();
        let (fault_tx, mut fault_rx) = tokio::sync::mpsc::unbounded_channel();

        let capture = CaptureThread::spawn(
            format,
            Some(usize::MAX),
            1024,
            frame_tx,
            fault_tx,
            PipelineMetrics::new(),
        )
        .expect("thread spawn");
        // The thread exits on its own after reporting.
        let fault = loop {
            match fault_rx.try_recv() {
                Ok(fault) => break fault,
                Err(tokio::sync::mpsc::error::TryRecvError::Empty) => {
                    thread::sleep(Duration::from_millis(10))
                }
                Err(e) => panic!("fault channel closed without a fault: {}", e),
            }
        };
        assert!(fault.context.contains("device index"));
        capture.stop();
    }
}
