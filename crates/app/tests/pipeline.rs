//! End-to-end properties of the frame routing pipeline, driven by synthetic
//! frames fed straight into the frame queue.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use micrelay_app::bus::{ChannelSink, OutboundEvent};
use micrelay_app::routing::FrameRouter;
use micrelay_app::summary::Summarizer;
use micrelay_audio::{decode_wav, RawFrame};
use micrelay_foundation::{AudioFormat, RoutingFlags};
use micrelay_telemetry::PipelineMetrics;
use micrelay_vad::Sensitivity;

const FRAMES_PER_BUFFER: usize = 2048;

fn format_16k_mono() -> AudioFormat {
    AudioFormat::new(16_000, 2, 1).unwrap()
}

struct TestPipeline {
    frame_tx: crossbeam_channel::Sender<RawFrame>,
    events: crossbeam_channel::Receiver<OutboundEvent>,
    flags: Arc<RoutingFlags>,
    running: Arc<AtomicBool>,
    handle: std::thread::JoinHandle<()>,
}

fn start_pipeline(udp_target: Option<std::net::SocketAddr>) -> TestPipeline {
    let format = format_16k_mono();
    let (sink, events) = ChannelSink::unbounded();
    let (frame_tx, frame_rx) = crossbeam_channel::unbounded();
    let flags = Arc::new(RoutingFlags::new(udp_target.is_some()));
    let summarizer = Summarizer::new(format, Sensitivity::default(), 5).unwrap();

    let router = FrameRouter::new(
        format,
        "default".to_string(),
        frame_rx,
        Arc::clone(&flags),
        sink,
        udp_target,
        summarizer,
        PipelineMetrics::new(),
    )
    .unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let handle = router.spawn(Arc::clone(&running)).unwrap();

    TestPipeline {
        frame_tx,
        events,
        flags,
        running,
        handle,
    }
}

impl TestPipeline {
    fn push_silent_frames(&self, count: usize) {
        let frame_len = format_16k_mono().frame_len(FRAMES_PER_BUFFER);
        for _ in 0..count {
            self.frame_tx
                .send(RawFrame {
                    bytes: vec![0u8; frame_len],
                })
                .unwrap();
        }
    }

    fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        drop(self.frame_tx);
        let _ = self.handle.join();
    }

    fn drain_events(&self) -> Vec<OutboundEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

/// Wait until the queue has been drained by the router.
fn settle(pipeline: &TestPipeline) {
    for _ in 0..200 {
        if pipeline.frame_tx.len() == 0 {
            // One extra beat for the frame currently in flight.
            std::thread::sleep(Duration::from_millis(20));
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("router did not drain the queue");
}

#[test]
fn silent_capture_routes_every_frame_as_wav_with_no_summaries() {
    let pipeline = start_pipeline(None);
    pipeline.push_silent_frames(8);
    settle(&pipeline);

    let events = pipeline.drain_events();
    let frames: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            OutboundEvent::Frame { wav_bytes, site_id } => {
                assert_eq!(site_id, "default");
                Some(wav_bytes)
            }
            _ => None,
        })
        .collect();
    assert_eq!(frames.len(), 8, "one WAV packet per captured frame");
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, OutboundEvent::Summary { .. })),
        "no summaries while the summary flag is off"
    );

    for wav_bytes in frames {
        let (format, pcm) = decode_wav(wav_bytes).unwrap();
        assert_eq!(format, format_16k_mono());
        // 2048 samples per frame at two bytes per sample.
        assert_eq!(pcm.len(), FRAMES_PER_BUFFER * 2);
        assert!(pcm.iter().all(|&b| b == 0));
    }

    pipeline.stop();
}

#[test]
fn toggling_udp_strictly_alternates_the_sink() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_millis(500)))
        .unwrap();
    let target = receiver.local_addr().unwrap();

    let pipeline = start_pipeline(Some(target));
    assert!(pipeline.flags.udp_enabled());

    // First frame goes to UDP only.
    pipeline.push_silent_frames(1);
    settle(&pipeline);
    let mut datagram = vec![0u8; 65_536];
    let received = receiver.recv(&mut datagram).expect("UDP datagram expected");
    let (format, pcm) = decode_wav(&datagram[..received]).unwrap();
    assert_eq!(format, format_16k_mono());
    assert_eq!(pcm.len(), FRAMES_PER_BUFFER * 2);
    assert!(
        pipeline.drain_events().is_empty(),
        "UDP frame must not also reach the bus"
    );

    // After the toggle the next frame goes to the bus only.
    pipeline.flags.set_udp_enabled(false);
    pipeline.push_silent_frames(1);
    settle(&pipeline);
    let events = pipeline.drain_events();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, OutboundEvent::Frame { .. })),
        "bus frame expected after toggle"
    );
    assert!(
        receiver.recv(&mut datagram).is_err(),
        "no datagram may arrive while UDP is disabled"
    );

    // And back again.
    pipeline.flags.set_udp_enabled(true);
    pipeline.push_silent_frames(1);
    settle(&pipeline);
    receiver
        .recv(&mut datagram)
        .expect("UDP datagram expected after re-enable");
    assert!(pipeline.drain_events().is_empty());

    pipeline.stop();
}

#[test]
fn summary_cadence_follows_the_skip_counter() {
    let pipeline = start_pipeline(None);
    pipeline.flags.set_summary_enabled(true);

    pipeline.push_silent_frames(15);
    settle(&pipeline);

    let events = pipeline.drain_events();
    let summaries: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            OutboundEvent::Summary { summary, .. } => Some(*summary),
            _ => None,
        })
        .collect();
    assert_eq!(summaries.len(), 3, "one summary per five frames");
    for summary in summaries {
        assert_eq!(summary.debiased_energy, 0);
        assert!(!summary.is_speech);
    }

    pipeline.stop();
}

#[test]
fn summaries_stop_when_disabled_mid_stream() {
    let pipeline = start_pipeline(None);
    pipeline.flags.set_summary_enabled(true);
    pipeline.push_silent_frames(5);
    settle(&pipeline);
    assert_eq!(
        pipeline
            .drain_events()
            .iter()
            .filter(|e| matches!(e, OutboundEvent::Summary { .. }))
            .count(),
        1
    );

    pipeline.flags.set_summary_enabled(false);
    pipeline.push_silent_frames(10);
    settle(&pipeline);
    assert!(
        !pipeline
            .drain_events()
            .iter()
            .any(|e| matches!(e, OutboundEvent::Summary { .. })),
        "disabling the flag stops the summary stream"
    );

    pipeline.stop();
}
