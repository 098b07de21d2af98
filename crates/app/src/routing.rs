//! Routing & encode loop: drains the frame queue, wraps frames in WAV
//! containers, and delivers each to exactly one sink.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use micrelay_audio::{encode_wav, RawFrame};
use micrelay_foundation::{AppError, AudioFormat, RoutingFlags};
use micrelay_telemetry::PipelineMetrics;

use crate::bus::{EventSink, OutboundEvent};
use crate::summary::Summarizer;

pub struct FrameRouter {
    format: AudioFormat,
    output_site_id: String,
    frame_rx: Receiver<RawFrame>,
    flags: Arc<RoutingFlags>,
    sink: Arc<dyn EventSink>,
    udp: Option<(UdpSocket, SocketAddr)>,
    summarizer: Summarizer,
    metrics: PipelineMetrics,
}

impl FrameRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        format: AudioFormat,
        output_site_id: String,
        frame_rx: Receiver<RawFrame>,
        flags: Arc<RoutingFlags>,
        sink: Arc<dyn EventSink>,
        udp_target: Option<SocketAddr>,
        summarizer: Summarizer,
        metrics: PipelineMetrics,
    ) -> Result<Self, AppError> {
        let udp = match udp_target {
            Some(dest) => {
                let socket = UdpSocket::bind("0.0.0.0:0")
                    .map_err(|e| AppError::Fatal(format!("failed to bind UDP socket: {}", e)))?;
                tracing::debug!("Audio will also be sent to UDP {}", dest);
                Some((socket, dest))
            }
            None => None,
        };

        Ok(Self {
            format,
            output_site_id,
            frame_rx,
            flags,
            sink,
            udp,
            summarizer,
            metrics,
        })
    }

    /// Run the loop on a dedicated thread until the queue disconnects or the
    /// shutdown flag clears.
    pub fn spawn(self, running: Arc<AtomicBool>) -> Result<JoinHandle<()>, AppError> {
        thread::Builder::new()
            .name("frame-router".to_string())
            .spawn(move || {
                self.run(&running);
                tracing::info!("Frame router thread exiting");
            })
            .map_err(|e| AppError::Fatal(format!("Failed to spawn router thread: {}", e)))
    }

    pub fn run(mut self, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            let frame = match self.frame_rx.recv() {
                Ok(frame) => frame,
                Err(_) => {
                    tracing::debug!("Frame queue disconnected; router stopping");
                    break;
                }
            };
            self.route(frame);
        }
    }

    /// Deliver one frame to exactly one sink, then feed the summary tap.
    fn route(&mut self, frame: RawFrame) {
        let wav_bytes = match encode_wav(&self.format, &frame.bytes) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to encode frame: {}", e);
                self.metrics.increment_send_errors();
                return;
            }
        };

        match (self.flags.udp_enabled(), self.udp.as_ref()) {
            (true, Some((socket, dest))) => match socket.send_to(&wav_bytes, dest) {
                Ok(_) => self.metrics.increment_udp_frames(),
                Err(e) => {
                    // One dropped datagram; keep the loop hot.
                    tracing::warn!("UDP send to {} failed: {}", dest, e);
                    self.metrics.increment_send_errors();
                    let _ = self.sink.publish(OutboundEvent::RecordError {
                        site_id: self.output_site_id.clone(),
                        error: e.to_string(),
                        context: format!("udp send to {}", dest),
                    });
                }
            },
            _ => {
                let event = OutboundEvent::Frame {
                    site_id: self.output_site_id.clone(),
                    wav_bytes,
                };
                match self.sink.publish(event) {
                    Ok(()) => self.metrics.increment_bus_frames(),
                    Err(e) => {
                        tracing::warn!("Frame publish failed: {}", e);
                        self.metrics.increment_send_errors();
                    }
                }
            }
        }

        if self.flags.summary_enabled() {
            match self.summarizer.ingest(&frame.bytes) {
                Ok(Some(summary)) => {
                    self.metrics.increment_summaries();
                    if let Err(e) = self.sink.publish(OutboundEvent::Summary {
                        site_id: self.output_site_id.clone(),
                        summary,
                    }) {
                        tracing::warn!("Summary publish failed: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Voice-activity analysis failed: {}", e),
            }
        }
    }
}
