use crate::error::AppError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Initializing,
    Running,
    Stopping,
    Stopped,
}

pub struct StateManager {
    state: Arc<RwLock<AppState>>,
    state_tx: Sender<AppState>,
    state_rx: Receiver<AppState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(AppState::Initializing)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: AppState) -> Result<(), AppError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (AppState::Initializing, AppState::Running)
                | (AppState::Initializing, AppState::Stopping)
                | (AppState::Running, AppState::Stopping)
                | (AppState::Stopping, AppState::Stopped)
        );

        if !valid {
            return Err(AppError::Fatal(format!(
                "Invalid state transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!("State transition: {:?} -> {:?}", *current, new_state);
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> AppState {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> Receiver<AppState> {
        self.state_rx.clone()
    }
}

/// Transport and summary switches shared between the routing loop, the
/// summarizer and the control-message handler.
///
/// Single writer (the control handler), many readers. Relaxed single-word
/// atomics are sufficient: a toggle observed one frame late changes the
/// transport choice, not data integrity.
pub struct RoutingFlags {
    udp_enabled: AtomicBool,
    summary_enabled: AtomicBool,
    /// Whether a UDP destination was configured at startup. Immutable;
    /// listening transitions are no-ops without it.
    udp_configured: bool,
}

impl RoutingFlags {
    pub fn new(udp_configured: bool) -> Self {
        Self {
            // UDP output is active until a recognizer starts listening.
            udp_enabled: AtomicBool::new(udp_configured),
            summary_enabled: AtomicBool::new(false),
            udp_configured,
        }
    }

    pub fn udp_configured(&self) -> bool {
        self.udp_configured
    }

    pub fn udp_enabled(&self) -> bool {
        self.udp_enabled.load(Ordering::Relaxed)
    }

    pub fn set_udp_enabled(&self, enabled: bool) {
        self.udp_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn summary_enabled(&self) -> bool {
        self.summary_enabled.load(Ordering::Relaxed)
    }

    pub fn set_summary_enabled(&self, enabled: bool) {
        self.summary_enabled.store(enabled, Ordering::Relaxed);
    }
}
