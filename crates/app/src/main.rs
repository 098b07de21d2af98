use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use micrelay_app::config::Cli;
use micrelay_app::runtime::{self, AppRuntimeOptions};
use micrelay_audio::DeviceManager;
use micrelay_foundation::{AudioFormat, ShutdownHandler};

fn init_logging() -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "micrelay.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

/// Diagnostic listing: one line per device, default marked with `*`.
fn list_devices(format: &AudioFormat, frames_per_buffer: usize, test: bool) -> anyhow::Result<()> {
    let manager = DeviceManager::new();
    let devices = manager
        .enumerate(format, frames_per_buffer, test)
        .context("device enumeration failed")?;

    if devices.is_empty() {
        println!("No input devices found");
        return Ok(());
    }
    for device in devices {
        match device.working {
            Some(true) => println!("{}: {} (working)", device.index, device.display_name()),
            Some(false) => println!("{}: {} (no signal)", device.index, device.display_name()),
            None => println!("{}: {}", device.index, device.display_name()),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    let format = cli.audio_format()?;

    if cli.list_devices {
        return list_devices(&format, cli.frames_per_buffer, cli.test_devices);
    }

    tracing::info!("Starting micrelay");
    let shutdown = ShutdownHandler::new().install().await;

    let handle = runtime::start(
        AppRuntimeOptions {
            format,
            device_index: cli.device_index,
            frames_per_buffer: cli.frames_per_buffer,
            site_id: cli.site_id.clone(),
            output_site_id: cli.output_site_id(),
            udp_audio_host: cli.udp_audio_host.clone(),
            udp_audio_port: cli.udp_audio_port,
            sensitivity: cli.sensitivity(),
        },
        shutdown.clone(),
    )?;

    // The bus transport is an external collaborator; until one is attached,
    // published events are drained to the debug log so the hot loops never
    // back up.
    let events_rx = handle.events_rx.clone();
    let drain_handle = tokio::task::spawn_blocking(move || {
        for event in events_rx.iter() {
            tracing::debug!("Published event: {}", event_kind(&event));
        }
    });

    let metrics = handle.metrics.clone();
    let mut stats_interval = tokio::time::interval(Duration::from_secs(30));
    stats_interval.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = stats_interval.tick() => {
                tracing::info!("Pipeline: {}", metrics.snapshot());
            }
        }
    }

    handle.shutdown().await?;
    drain_handle.abort();
    Ok(())
}

fn event_kind(event: &micrelay_app::bus::OutboundEvent) -> &'static str {
    use micrelay_app::bus::OutboundEvent;
    match event {
        OutboundEvent::Frame { .. } => "audio frame",
        OutboundEvent::Summary { .. } => "audio summary",
        OutboundEvent::Devices { .. } => "audio devices",
        OutboundEvent::RecordError { .. } => "record error",
    }
}
