use crate::packet::PacketType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed {packet} packet ({len} bytes)")]
    MalformedAck { packet: PacketType, len: usize },

    #[error("Malformed PUBLISH packet: {0}")]
    MalformedPublish(&'static str),

    #[error("Invalid remaining length encoding")]
    InvalidRemainingLength,

    #[error("Remaining length {0} exceeds the protocol maximum")]
    RemainingLengthTooLarge(usize),

    #[error("{field} is {len} bytes, longer than the 65535 byte limit")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("Truncated packet: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Packet of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}
