use crate::cursor::Cursor;
use crate::errors::CodecError;
use crate::packet::PacketType;
use crate::varint::encode_remaining_length;

const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT 3.1.1
const PROTOCOL_LEVEL: u8 = 4;
const CLEAN_SESSION: u8 = 0x02;
const REQUESTED_QOS: u8 = 0;
const SUBACK_FAILURE: u8 = 0x80;

/// Default keep-alive interval advertised in CONNECT.
pub const KEEP_ALIVE_SECS: u16 = 60;

/// Acknowledgement of a CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    pub return_code: u8,
}

impl ConnAck {
    pub fn is_accepted(&self) -> bool {
        self.return_code == 0
    }
}

/// Acknowledgement of a single-topic SUBSCRIBE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubAck {
    pub packet_id: u16,
    pub granted_qos: u8,
}

impl SubAck {
    pub fn is_rejected(&self) -> bool {
        self.granted_qos == SUBACK_FAILURE
    }
}

/// Topic and payload borrowed from a decoded PUBLISH frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publish<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
}

/// CONNECT with a clean session. A `keep_alive_secs` of zero disables
/// keep-alive on the broker side.
pub fn encode_connect(client_id: &str, keep_alive_secs: u16) -> Result<Vec<u8>, CodecError> {
    let id = client_id.as_bytes();
    let remaining = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2 + 2 + id.len();

    let mut frame = Vec::with_capacity(remaining + 5);
    frame.push(PacketType::Connect.header_byte());
    encode_remaining_length(remaining, &mut frame)?;
    put_prefixed(&mut frame, "protocol name", PROTOCOL_NAME)?;
    frame.push(PROTOCOL_LEVEL);
    frame.push(CLEAN_SESSION);
    frame.extend_from_slice(&keep_alive_secs.to_be_bytes());
    put_prefixed(&mut frame, "client id", id)?;
    Ok(frame)
}

pub fn decode_conn_ack(bytes: &[u8]) -> Result<ConnAck, CodecError> {
    match bytes {
        [0x20, _, flags, return_code, ..] => Ok(ConnAck {
            session_present: flags & 0x01 == 0x01,
            return_code: *return_code,
        }),
        _ => Err(CodecError::MalformedAck {
            packet: PacketType::ConnAck,
            len: bytes.len(),
        }),
    }
}

pub fn encode_subscribe(packet_id: u16, topic: &str) -> Result<Vec<u8>, CodecError> {
    let remaining = 2 + 2 + topic.len() + 1;

    let mut frame = Vec::with_capacity(remaining + 5);
    frame.push(PacketType::Subscribe.header_byte());
    encode_remaining_length(remaining, &mut frame)?;
    frame.extend_from_slice(&packet_id.to_be_bytes());
    put_prefixed(&mut frame, "topic", topic.as_bytes())?;
    frame.push(REQUESTED_QOS);
    Ok(frame)
}

pub fn decode_sub_ack(bytes: &[u8]) -> Result<SubAck, CodecError> {
    match bytes {
        [0x90, _, id_hi, id_lo, granted_qos, ..] => Ok(SubAck {
            packet_id: u16::from_be_bytes([*id_hi, *id_lo]),
            granted_qos: *granted_qos,
        }),
        _ => Err(CodecError::MalformedAck {
            packet: PacketType::SubAck,
            len: bytes.len(),
        }),
    }
}

pub fn encode_publish(topic: &str, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    let remaining = 2 + topic.len() + payload.len();

    let mut frame = Vec::with_capacity(remaining + 5);
    frame.push(PacketType::Publish.header_byte());
    encode_remaining_length(remaining, &mut frame)?;
    put_prefixed(&mut frame, "topic", topic.as_bytes())?;
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode one PUBLISH frame.
///
/// The payload is whatever the declared remaining length leaves after the
/// topic (and the packet identifier, should a broker deliver at QoS > 0).
/// Bytes past the declared length are not part of this frame and are ignored.
pub fn decode_publish(bytes: &[u8]) -> Result<Publish<'_>, CodecError> {
    let mut cursor = Cursor::new(bytes);

    let header = cursor
        .read_u8()
        .map_err(|_| CodecError::MalformedPublish("empty frame"))?;
    if PacketType::from_header(header) != Some(PacketType::Publish) {
        return Err(CodecError::MalformedPublish("not a PUBLISH frame"));
    }
    let qos = (header >> 1) & 0x03;

    let remaining = cursor.read_remaining_length().map_err(|e| match e {
        CodecError::Truncated { .. } => {
            CodecError::MalformedPublish("remaining length field is incomplete")
        }
        _ => CodecError::MalformedPublish("invalid remaining length"),
    })?;
    let body = cursor
        .read_bytes(remaining)
        .map_err(|_| CodecError::MalformedPublish("remaining length exceeds available bytes"))?;

    let mut body = Cursor::new(body);
    let topic_len = body
        .read_u16()
        .map_err(|_| CodecError::MalformedPublish("missing topic length"))?;
    let topic = body
        .read_bytes(usize::from(topic_len))
        .map_err(|_| CodecError::MalformedPublish("topic length exceeds remaining length"))?;
    if qos > 0 {
        body.read_u16()
            .map_err(|_| CodecError::MalformedPublish("missing packet identifier"))?;
    }

    let topic = std::str::from_utf8(topic)
        .map_err(|_| CodecError::MalformedPublish("topic is not valid UTF-8"))?;

    Ok(Publish {
        topic,
        payload: body.rest(),
    })
}

pub fn encode_disconnect() -> [u8; 2] {
    [PacketType::Disconnect.header_byte(), 0x00]
}

pub fn encode_ping_request() -> [u8; 2] {
    [PacketType::PingReq.header_byte(), 0x00]
}

fn put_prefixed(frame: &mut Vec<u8>, field: &'static str, bytes: &[u8]) -> Result<(), CodecError> {
    let len = u16::try_from(bytes.len()).map_err(|_| CodecError::FieldTooLong {
        field,
        len: bytes.len(),
    })?;
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(bytes);
    Ok(())
}
