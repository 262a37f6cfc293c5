use crate::topics::{PUBLISHER_CLIENT_ID, ROI_TOPIC, receiver_client_id};
use std::time::Duration;
use wire::KEEP_ALIVE_SECS;

/// Default largest inbound packet the receiver buffers (4 MiB)
pub const DEFAULT_MAX_PACKET_SIZE: usize = 4 * 1024 * 1024;

/// Broker endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
}

impl BrokerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new("localhost", 1883)
    }
}

/// Configuration for the detection receiver
///
/// Defaults:
/// - 30s receive timeout (also bounds the wait for CONNACK/SUBACK)
/// - fixed 5s wait between reconnect attempts, retried forever
/// - 10s TCP connect timeout
/// - 60s keep-alive advertised to the broker
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub broker: BrokerConfig,
    pub topic: String,
    pub client_id: String,
    /// Bound on a single socket read; an idle read that hits it is not an error
    pub read_timeout: Duration,
    /// Wait between a lost connection and the next attempt
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    /// Advertised in CONNECT. Half of it without outbound traffic sends a
    /// PINGREQ; one and a half without inbound traffic is a lost connection.
    /// Zero disables both.
    pub keep_alive: Duration,
    /// Inbound packets declaring more than this are a protocol error
    pub max_packet_size: usize,
}

impl ReceiverConfig {
    pub fn new(broker: BrokerConfig, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        Self {
            broker,
            client_id: receiver_client_id(&topic),
            topic,
            read_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            keep_alive: Duration::from_secs(KEEP_ALIVE_SECS.into()),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }

    /// Keep-alive in whole seconds as carried by CONNECT, saturating.
    pub fn keep_alive_secs(&self) -> u16 {
        u16::try_from(self.keep_alive.as_secs()).unwrap_or(u16::MAX)
    }
}

/// Configuration for the ROI publisher
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub broker: BrokerConfig,
    pub topic: String,
    pub client_id: String,
    /// Applied to connect, send and receive of each one-shot session
    pub io_timeout: Duration,
    /// Pending messages kept before the oldest is dropped
    pub queue_capacity: usize,
}

impl PublisherConfig {
    pub fn new(broker: BrokerConfig, topic: impl Into<String>) -> Self {
        Self {
            broker,
            topic: topic.into(),
            client_id: PUBLISHER_CLIENT_ID.to_string(),
            io_timeout: Duration::from_secs(2),
            queue_capacity: 1024,
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self::new(BrokerConfig::default(), ROI_TOPIC)
    }
}
