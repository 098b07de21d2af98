//! Control-message handler: reacts to inbound bus events by mutating the
//! shared routing flags, serving device queries, and surfacing capture
//! faults as record-error events.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use micrelay_audio::{CaptureFault, DeviceManager};
use micrelay_foundation::{AudioFormat, RoutingFlags, ShutdownGuard};
use micrelay_telemetry::PipelineMetrics;

use crate::bus::{ControlEvent, DeviceMode, DeviceRecord, EventSink, OutboundEvent};

pub struct ControlHandler {
    pub site_id: String,
    pub output_site_id: String,
    pub format: AudioFormat,
    pub frames_per_buffer: usize,
    pub flags: Arc<RoutingFlags>,
    pub sink: Arc<dyn EventSink>,
    pub metrics: PipelineMetrics,
}

impl ControlHandler {
    /// Suspends on inbound events until the control channel closes or
    /// shutdown is requested. Capture faults arrive on their own channel and
    /// are republished once each.
    pub fn spawn(
        self,
        control_rx: UnboundedReceiver<serde_json::Value>,
        fault_rx: UnboundedReceiver<CaptureFault>,
        shutdown: ShutdownGuard,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(control_rx, fault_rx, shutdown))
    }

    async fn run(
        self,
        mut control_rx: UnboundedReceiver<serde_json::Value>,
        mut fault_rx: UnboundedReceiver<CaptureFault>,
        shutdown: ShutdownGuard,
    ) {
        tracing::info!("Control handler started");
        let mut faults_open = true;

        loop {
            if shutdown.is_shutdown_requested() {
                break;
            }
            tokio::select! {
                message = control_rx.recv() => match message {
                    Some(payload) => self.handle_message(payload).await,
                    None => break,
                },
                fault = fault_rx.recv(), if faults_open => match fault {
                    Some(fault) => self.handle_fault(fault),
                    None => faults_open = false,
                },
                _ = shutdown.wait() => break,
            }
        }

        tracing::info!("Control handler stopped");
    }

    async fn handle_message(&self, payload: serde_json::Value) {
        let event: ControlEvent = match serde_json::from_value(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Unexpected control message: {}", e);
                return;
            }
        };

        if event.site_id() != self.site_id {
            tracing::debug!(
                "Ignoring control message for site '{}' (serving '{}')",
                event.site_id(),
                self.site_id
            );
            return;
        }

        match event {
            ControlEvent::ListeningStarted { .. } => {
                if self.flags.udp_configured() {
                    self.flags.set_udp_enabled(false);
                    tracing::debug!("Disable UDP output");
                }
            }
            ControlEvent::ListeningStopped { .. } => {
                if self.flags.udp_configured() {
                    self.flags.set_udp_enabled(true);
                    tracing::debug!("Enable UDP output");
                }
            }
            ControlEvent::SummaryEnable { .. } => {
                self.flags.set_summary_enabled(true);
                tracing::debug!("Enable audio summaries");
            }
            ControlEvent::SummaryDisable { .. } => {
                self.flags.set_summary_enabled(false);
                tracing::debug!("Disable audio summaries");
            }
            ControlEvent::DeviceQuery {
                site_id,
                id,
                modes,
                test,
            } => self.handle_device_query(site_id, id, modes, test).await,
        }
    }

    async fn handle_device_query(
        &self,
        site_id: String,
        id: Option<String>,
        modes: Vec<DeviceMode>,
        test: bool,
    ) {
        if !modes.is_empty() && !modes.contains(&DeviceMode::Input) {
            tracing::debug!("Not a request for input devices");
            return;
        }

        let format = self.format;
        let frames_per_buffer = self.frames_per_buffer;
        // Enumeration opens the audio subsystem (and devices, when testing);
        // keep it off the async workers.
        let result = tokio::task::spawn_blocking(move || {
            let manager = DeviceManager::new();
            manager.enumerate(&format, frames_per_buffer, test)
        })
        .await;

        let devices = match result {
            Ok(Ok(devices)) => devices,
            Ok(Err(e)) => {
                tracing::error!("Device enumeration failed: {}", e);
                let _ = self.sink.publish(OutboundEvent::RecordError {
                    site_id: site_id.clone(),
                    error: e.to_string(),
                    context: id.clone().unwrap_or_else(|| "device query".to_string()),
                });
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Device enumeration task failed: {}", e);
                let _ = self.sink.publish(OutboundEvent::RecordError {
                    site_id: site_id.clone(),
                    error: e.to_string(),
                    context: id.clone().unwrap_or_else(|| "device query".to_string()),
                });
                Vec::new()
            }
        };

        let records = devices
            .into_iter()
            .map(|d| DeviceRecord {
                mode: DeviceMode::Input,
                id: d.index.to_string(),
                name: d.name,
                description: String::new(),
                is_default: d.is_default,
                working: d.working,
            })
            .collect();

        let _ = self.sink.publish(OutboundEvent::Devices {
            site_id,
            id,
            devices: records,
        });
    }

    fn handle_fault(&self, fault: CaptureFault) {
        self.metrics.increment_capture_errors();
        let _ = self.sink.publish(OutboundEvent::RecordError {
            site_id: self.output_site_id.clone(),
            error: fault.error,
            context: fault.context,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChannelSink;
    use micrelay_foundation::ShutdownHandler;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        control_tx: mpsc::UnboundedSender<serde_json::Value>,
        fault_tx: mpsc::UnboundedSender<CaptureFault>,
        events: crossbeam_channel::Receiver<OutboundEvent>,
        flags: Arc<RoutingFlags>,
        handle: JoinHandle<()>,
    }

    async fn start_handler(udp_configured: bool) -> Harness {
        let (sink, events) = ChannelSink::unbounded();
        let flags = Arc::new(RoutingFlags::new(udp_configured));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        let shutdown = ShutdownHandler::new().install().await;

        let handler = ControlHandler {
            site_id: "default".to_string(),
            output_site_id: "default".to_string(),
            format: AudioFormat::new(16_000, 2, 1).unwrap(),
            frames_per_buffer: 1024,
            flags: Arc::clone(&flags),
            sink,
            metrics: PipelineMetrics::new(),
        };
        let handle = handler.spawn(control_rx, fault_rx, shutdown);

        Harness {
            control_tx,
            fault_tx,
            events,
            flags,
            handle,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn listening_events_gate_on_udp_configuration() {
        let h = start_handler(true).await;
        assert!(h.flags.udp_enabled());

        h.control_tx
            .send(json!({"type": "listening_started", "site_id": "default"}))
            .unwrap();
        settle().await;
        assert!(!h.flags.udp_enabled());

        h.control_tx
            .send(json!({"type": "listening_stopped", "site_id": "default"}))
            .unwrap();
        settle().await;
        assert!(h.flags.udp_enabled());
        h.handle.abort();
    }

    #[tokio::test]
    async fn listening_events_are_noops_without_udp() {
        let h = start_handler(false).await;
        h.control_tx
            .send(json!({"type": "listening_stopped", "site_id": "default"}))
            .unwrap();
        settle().await;
        assert!(!h.flags.udp_enabled());
        h.handle.abort();
    }

    #[tokio::test]
    async fn summary_toggles_are_unconditional() {
        let h = start_handler(false).await;
        h.control_tx
            .send(json!({"type": "summary_enable", "site_id": "default"}))
            .unwrap();
        settle().await;
        assert!(h.flags.summary_enabled());

        h.control_tx
            .send(json!({"type": "summary_disable", "site_id": "default"}))
            .unwrap();
        settle().await;
        assert!(!h.flags.summary_enabled());
        h.handle.abort();
    }

    #[tokio::test]
    async fn other_sites_and_unknown_messages_are_dropped() {
        let h = start_handler(true).await;
        h.control_tx
            .send(json!({"type": "summary_enable", "site_id": "elsewhere"}))
            .unwrap();
        h.control_tx
            .send(json!({"type": "play_bytes", "site_id": "default"}))
            .unwrap();
        h.control_tx.send(json!("not even an object")).unwrap();
        settle().await;
        assert!(!h.flags.summary_enabled());
        assert!(h.events.is_empty());
        h.handle.abort();
    }

    #[tokio::test]
    async fn non_input_device_query_produces_no_result() {
        let h = start_handler(false).await;
        h.control_tx
            .send(json!({
                "type": "device_query",
                "site_id": "default",
                "modes": ["output"],
            }))
            .unwrap();
        settle().await;
        assert!(h.events.is_empty());
        h.handle.abort();
    }

    #[tokio::test]
    async fn input_device_query_always_answers() {
        let h = start_handler(false).await;
        h.control_tx
            .send(json!({
                "type": "device_query",
                "site_id": "default",
                "id": "q-7",
                "modes": ["input"],
            }))
            .unwrap();

        // Metadata-only enumeration works even on headless machines; the
        // reply may carry an empty device list, possibly preceded by a
        // record error.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let reply = loop {
            if let Ok(event) = h.events.try_recv() {
                if let OutboundEvent::Devices { id, .. } = &event {
                    assert_eq!(id.as_deref(), Some("q-7"));
                    break event;
                }
            } else if tokio::time::Instant::now() > deadline {
                panic!("no device reply within deadline");
            } else {
                settle().await;
            }
        };
        match reply {
            OutboundEvent::Devices { site_id, .. } => assert_eq!(site_id, "default"),
            other => panic!("unexpected event: {:?}", other),
        }
        h.handle.abort();
    }

    #[tokio::test]
    async fn capture_faults_become_record_errors() {
        let h = start_handler(false).await;
        h.fault_tx
            .send(CaptureFault {
                error: "device unplugged".to_string(),
                context: "device index 2".to_string(),
            })
            .unwrap();
        settle().await;

        match h.events.try_recv() {
            Ok(OutboundEvent::RecordError { error, context, .. }) => {
                assert_eq!(error, "device unplugged");
                assert_eq!(context, "device index 2");
            }
            other => panic!("expected record error, got {:?}", other),
        }
        h.handle.abort();
    }
}
