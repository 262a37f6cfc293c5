use crate::config::{BrokerConfig, PublisherConfig};
use crate::errors::BridgeError;
use crate::transport;
use std::io::Write;
use std::net::Shutdown;
use std::time::Duration;
use wire::{FrameAccumulator, KEEP_ALIVE_SECS, encode_disconnect, encode_publish};

/// Largest frame accepted while waiting for CONNACK
const ACK_FRAME_LIMIT: usize = 1024;

/// Hands one message to the broker. Any error drops the message.
pub trait Delivery: Send + Sync + 'static {
    fn deliver(&self, topic: &str, message: &str) -> Result<(), BridgeError>;
}

/// Fresh connection per message: CONNECT, PUBLISH, DISCONNECT, close.
#[derive(Debug, Clone)]
pub struct OneShotDelivery {
    broker: BrokerConfig,
    client_id: String,
    io_timeout: Duration,
}

impl OneShotDelivery {
    pub fn new(config: &PublisherConfig) -> Self {
        Self {
            broker: config.broker.clone(),
            client_id: config.client_id.clone(),
            io_timeout: config.io_timeout,
        }
    }
}

impl Delivery for OneShotDelivery {
    fn deliver(&self, topic: &str, message: &str) -> Result<(), BridgeError> {
        let frame = encode_publish(topic, message.as_bytes())?;

        let mut stream = transport::open(&self.broker, self.io_timeout, self.io_timeout)?;
        let mut acc = FrameAccumulator::new(ACK_FRAME_LIMIT);
        transport::handshake(&mut stream, &self.client_id, KEEP_ALIVE_SECS, &mut acc)?;

        stream.write_all(&frame)?;
        stream.write_all(&encode_disconnect())?;
        stream.flush()?;
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            tracing::debug!(error = %e, "Publisher socket already closed");
        }
        Ok(())
    }
}
