//! Hand-rolled codec for the subset of MQTT 3.1.1 used by the bridge.
//!
//! Everything here is pure: functions take and return byte buffers and never
//! touch a socket. Every length read from the wire is validated through
//! [`cursor::Cursor`] before it is used to slice a buffer.

pub mod accumulator;
pub mod codec;
pub(crate) mod cursor;
pub mod errors;
pub mod packet;
pub mod varint;

pub use accumulator::{FrameAccumulator, frame_len};
pub use codec::{
    ConnAck, KEEP_ALIVE_SECS, Publish, SubAck, decode_conn_ack, decode_publish, decode_sub_ack,
    encode_connect, encode_disconnect, encode_ping_request, encode_publish, encode_subscribe,
};
pub use errors::CodecError;
pub use packet::PacketType;
pub use varint::{MAX_REMAINING_LENGTH, decode_remaining_length, encode_remaining_length};
