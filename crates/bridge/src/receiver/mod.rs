//! Detection receiver: one interface, two interchangeable backends.
//!
//! The socket backend speaks the wire protocol itself. The client backend
//! (feature `client-backend`) hands the protocol to `rumqttc`. Both feed the
//! same [`ObjectStore`] with the same semantics: decoded sets replace the
//! previous one, a lost connection clears the store.

#[cfg(feature = "client-backend")]
pub mod client;
pub mod socket;

use crate::config::ReceiverConfig;
use crate::decoder::decode_detections;
use crate::errors::BridgeError;
use crate::metrics::ReceiverMetrics;
use crate::store::ObjectStore;
use crate::types::DetectedObject;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

#[cfg(feature = "client-backend")]
pub use client::ClientObjectReceiver;
pub use socket::MqttObjectReceiver;

/// What the host polls for detections.
pub trait DetectionSource: Send + Sync {
    /// Spawn the background task. Calling it while running is a no-op.
    fn start(&self) -> Result<(), BridgeError>;

    /// Stop and join the background task.
    fn stop(&self);

    fn connection_state(&self) -> ConnectionState;

    fn store(&self) -> &ObjectStore;

    fn has_received_data(&self) -> bool {
        self.store().has_received_data()
    }

    fn drain_and_clear(&self) -> Vec<DetectedObject> {
        self.store().drain_and_clear()
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Subscribed = 3,
}

impl ConnectionState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ConnectionState::Disconnected),
            1 => Some(ConnectionState::Connecting),
            2 => Some(ConnectionState::Connected),
            3 => Some(ConnectionState::Subscribed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Subscribed => "subscribed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected as u8))
    }

    fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
            .unwrap_or(ConnectionState::Disconnected)
    }

    fn swap(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
            .unwrap_or(ConnectionState::Disconnected)
    }
}

/// Which receiver implementation [`build_receiver`] constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverBackend {
    #[default]
    Socket,
    Client,
}

impl ReceiverBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiverBackend::Socket => "socket",
            ReceiverBackend::Client => "client",
        }
    }
}

impl fmt::Display for ReceiverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiverBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "socket" => Ok(ReceiverBackend::Socket),
            "client" | "rumqttc" => Ok(ReceiverBackend::Client),
            other => Err(format!("unknown receiver backend '{}'", other)),
        }
    }
}

/// Construct a receiver without starting it.
pub fn build_receiver(
    backend: ReceiverBackend,
    config: ReceiverConfig,
) -> Result<Box<dyn DetectionSource>, BridgeError> {
    match backend {
        ReceiverBackend::Socket => Ok(Box::new(MqttObjectReceiver::new(config))),
        #[cfg(feature = "client-backend")]
        ReceiverBackend::Client => Ok(Box::new(ClientObjectReceiver::new(config))),
        #[cfg(not(feature = "client-backend"))]
        ReceiverBackend::Client => Err(BridgeError::BackendUnavailable(backend.as_str())),
    }
}

/// State shared between a receiver handle and its background thread.
struct ReceiverCore {
    config: ReceiverConfig,
    store: ObjectStore,
    state: StateCell,
    metrics: ReceiverMetrics,
}

impl ReceiverCore {
    fn new(config: ReceiverConfig) -> Self {
        let metrics = ReceiverMetrics::new(&config.topic);
        Self {
            config,
            store: ObjectStore::new(),
            state: StateCell::new(),
            metrics,
        }
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.swap(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Receiver state changed");
        }
    }

    /// Route one inbound PUBLISH payload to the store. A payload that fails
    /// to decode leaves the store untouched.
    fn ingest(&self, topic: &str, payload: &[u8]) {
        self.metrics.message_received();

        match decode_detections(payload) {
            Ok(detections) => {
                tracing::trace!(topic, count = detections.len(), "Detections received");
                self.metrics.detections_decoded(detections.len());
                self.store.replace(detections);
            }
            Err(e) => {
                self.metrics.decode_failed();
                tracing::warn!(
                    topic,
                    error = %e,
                    bytes = payload.len(),
                    "Discarding undecodable detection message"
                );
            }
        }
    }

    /// Forget everything received on the session and record why it ended.
    /// Returns whether the broker had accepted the session, as opposed to
    /// a connect attempt that failed outright.
    fn connection_lost(&self, error: &BridgeError) -> bool {
        let was_connected = matches!(
            self.state(),
            ConnectionState::Connected | ConnectionState::Subscribed
        );
        self.store.clear();
        self.set_state(ConnectionState::Disconnected);

        let retry_in_ms = self.config.reconnect_delay.as_millis() as u64;
        if was_connected {
            self.metrics.reconnecting();
            tracing::warn!(error = %error, retry_in_ms, "Connection to broker lost");
        } else {
            self.metrics.connect_failed();
            tracing::warn!(error = %error, retry_in_ms, "Connect attempt failed");
        }
        was_connected
    }
}
