use crate::decoder::DecodeError;
use std::io;
use std::time::Duration;
use thiserror::Error;
use wire::CodecError;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Socket error: {0}")]
    Socket(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Broker refused connection (return code {0})")]
    ConnectionRefused(u8),

    #[error("Broker rejected subscription to '{0}'")]
    SubscriptionRejected(String),

    #[error("Connection closed by broker")]
    ConnectionClosed,

    #[error("No traffic from broker for {0:?}")]
    KeepAliveExpired(Duration),

    #[error("Could not resolve broker address {0}")]
    UnresolvedAddress(String),

    #[error("Receiver backend '{0}' is not compiled in")]
    BackendUnavailable(&'static str),

    #[cfg(feature = "client-backend")]
    #[error("MQTT client connection error: {0}")]
    ClientConnection(#[from] rumqttc::ConnectionError),

    #[cfg(feature = "client-backend")]
    #[error("MQTT client request error: {0}")]
    ClientRequest(#[from] rumqttc::ClientError),
}
