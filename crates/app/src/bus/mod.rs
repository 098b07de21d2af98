//! In-process seam standing in for the external message-bus client.
//!
//! The transport (connect/reconnect/subscribe mechanics) is out of scope; a
//! wire client attaches by draining the receiver half of [`ChannelSink`] and
//! feeding inbound JSON into the control handler's channel.

pub mod events;

use std::sync::Arc;

use thiserror::Error;

pub use events::{AudioSummary, ControlEvent, DeviceMode, DeviceRecord, OutboundEvent};

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Event channel closed")]
    Closed,
}

/// Outbound publish seam. Object-safe and callable from blocking threads;
/// implementations must not block the hot loop.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: OutboundEvent) -> Result<(), BusError>;
}

/// Unbounded channel-backed sink, the in-process implementation of the seam.
pub struct ChannelSink {
    tx: crossbeam_channel::Sender<OutboundEvent>,
}

impl ChannelSink {
    pub fn unbounded() -> (Arc<Self>, crossbeam_channel::Receiver<OutboundEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Arc::new(Self { tx }), rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: OutboundEvent) -> Result<(), BusError> {
        self.tx.send(event).map_err(|_| BusError::Closed)
    }
}
