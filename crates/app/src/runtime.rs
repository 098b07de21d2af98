//! Pipeline assembly: flags, frame queue, capture thread, routing thread,
//! and the control handler, wired together behind one handle.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use micrelay_audio::CaptureThread;
use micrelay_foundation::{
    AppError, AppState, AudioFormat, RoutingFlags, ShutdownGuard, StateManager,
};
use micrelay_telemetry::PipelineMetrics;
use micrelay_vad::Sensitivity;

use crate::bus::{ChannelSink, OutboundEvent};
use crate::control::ControlHandler;
use crate::routing::FrameRouter;
use crate::summary::{Summarizer, DEFAULT_SUMMARY_SKIP_FRAMES};

/// Options for starting the micrelay pipeline.
#[derive(Debug, Clone)]
pub struct AppRuntimeOptions {
    pub format: AudioFormat,
    pub device_index: Option<usize>,
    pub frames_per_buffer: usize,
    pub site_id: String,
    pub output_site_id: String,
    pub udp_audio_host: String,
    pub udp_audio_port: Option<u16>,
    pub sensitivity: Sensitivity,
}

/// Handle to the running pipeline.
pub struct AppHandle {
    pub metrics: PipelineMetrics,
    /// Inbound half of the bus seam: feed control messages here.
    pub control_tx: mpsc::UnboundedSender<serde_json::Value>,
    /// Outbound half of the bus seam: a transport client drains this.
    pub events_rx: crossbeam_channel::Receiver<OutboundEvent>,
    state: StateManager,
    router_running: Arc<AtomicBool>,
    capture: CaptureThread,
    router_handle: std::thread::JoinHandle<()>,
    control_handle: JoinHandle<()>,
}

impl AppHandle {
    /// Gracefully stop the pipeline: quiesce the source first, then let the
    /// router drain out, then stop the control task.
    pub async fn shutdown(self) -> Result<(), AppError> {
        info!("Shutting down micrelay runtime...");
        self.state.transition(AppState::Stopping)?;

        // Stopping capture drops the queue sender; the router loop exits on
        // the disconnect.
        self.capture.stop();
        self.router_running.store(false, Ordering::SeqCst);
        let _ = self.router_handle.join();

        self.control_handle.abort();
        let _ = self.control_handle.await;

        self.state.transition(AppState::Stopped)?;
        info!("Shutdown complete");
        Ok(())
    }
}

/// Wire up and start the full pipeline.
pub fn start(options: AppRuntimeOptions, shutdown: ShutdownGuard) -> Result<AppHandle, AppError> {
    let state = StateManager::new();
    let metrics = PipelineMetrics::new();

    let udp_target: Option<SocketAddr> = match options.udp_audio_port {
        Some(port) => {
            let target = (options.udp_audio_host.as_str(), port)
                .to_socket_addrs()
                .map_err(|e| AppError::Fatal(format!("bad UDP target: {}", e)))?
                .next()
                .ok_or_else(|| {
                    AppError::Fatal(format!(
                        "UDP target {}:{} did not resolve",
                        options.udp_audio_host, port
                    ))
                })?;
            Some(target)
        }
        None => None,
    };

    let flags = Arc::new(RoutingFlags::new(udp_target.is_some()));
    let (sink, events_rx) = ChannelSink::unbounded();
    let (frame_tx, frame_rx) = crossbeam_channel::unbounded();
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (fault_tx, fault_rx) = mpsc::unbounded_channel();

    let capture = CaptureThread::spawn(
        options.format,
        options.device_index,
        options.frames_per_buffer,
        frame_tx,
        fault_tx,
        metrics.clone(),
    )?;
    info!("Audio capture thread started");

    let summarizer = Summarizer::new(
        options.format,
        options.sensitivity,
        DEFAULT_SUMMARY_SKIP_FRAMES,
    )?;
    let router_running = Arc::new(AtomicBool::new(true));
    let router = FrameRouter::new(
        options.format,
        options.output_site_id.clone(),
        frame_rx,
        Arc::clone(&flags),
        Arc::clone(&sink) as Arc<dyn crate::bus::EventSink>,
        udp_target,
        summarizer,
        metrics.clone(),
    )?;
    let router_handle = router.spawn(Arc::clone(&router_running))?;
    info!("Frame router thread started");

    let control_handle = ControlHandler {
        site_id: options.site_id,
        output_site_id: options.output_site_id,
        format: options.format,
        frames_per_buffer: options.frames_per_buffer,
        flags,
        sink,
        metrics: metrics.clone(),
    }
    .spawn(control_rx, fault_rx, shutdown);

    state.transition(AppState::Running)?;

    Ok(AppHandle {
        metrics,
        control_tx,
        events_rx,
        state,
        router_running,
        capture,
        router_handle,
        control_handle,
    })
}
