//! In-process broker stand-in for integration tests.
//!
//! Speaks just enough of the wire protocol to script one side of a
//! session from the test thread.

#![allow(dead_code)]

use bridge::BrokerConfig;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};
use wire::{FrameAccumulator, decode_remaining_length, encode_publish};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

pub struct FakeBroker {
    listener: TcpListener,
    port: u16,
}

impl FakeBroker {
    pub fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();
        Self { listener, port }
    }

    pub fn config(&self) -> BrokerConfig {
        BrokerConfig::new("127.0.0.1", self.port)
    }

    /// Wait for the next client connection.
    pub fn accept(&self) -> BrokerConn {
        self.try_accept(TIMEOUT).expect("No client connected in time")
    }

    pub fn try_accept(&self, timeout: Duration) -> Option<BrokerConn> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.listener.accept() {
                Ok((stream, _)) => return Some(BrokerConn::new(stream)),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(e) => panic!("accept failed: {}", e),
            }
        }
    }
}

/// A port nobody listens on.
pub fn unused_broker() -> BrokerConfig {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    BrokerConfig::new("127.0.0.1", port)
}

pub struct BrokerConn {
    stream: TcpStream,
    acc: FrameAccumulator,
}

impl BrokerConn {
    fn new(stream: TcpStream) -> Self {
        stream.set_nonblocking(false).unwrap();
        stream.set_read_timeout(Some(TIMEOUT)).unwrap();
        stream.set_nodelay(true).unwrap();
        Self {
            stream,
            acc: FrameAccumulator::new(16 * 1024 * 1024),
        }
    }

    /// Next frame from the client, or `None` on EOF or timeout.
    pub fn try_read_frame(&mut self) -> Option<Vec<u8>> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(frame) = self.acc.next_frame().unwrap() {
                return Some(frame);
            }
            match self.stream.read(&mut chunk) {
                Ok(0) => return None,
                Ok(n) => self.acc.extend(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn read_frame(&mut self) -> Vec<u8> {
        self.try_read_frame().expect("Client sent no frame")
    }

    /// Read until a frame of the given header byte arrives, skipping pings.
    pub fn read_until(&mut self, header: u8) -> Vec<u8> {
        loop {
            let frame = self.read_frame();
            if frame[0] == header {
                return frame;
            }
            assert_eq!(frame[0], 0xC0, "Unexpected frame {:02X?}", frame);
        }
    }

    /// Accept CONNECT with the default 60s keep-alive and return the
    /// client id it carried.
    pub fn expect_connect(&mut self) -> String {
        let (client_id, keep_alive) = self.expect_connect_with_keep_alive();
        assert_eq!(keep_alive, 60, "Keep-alive 60s");
        client_id
    }

    /// Accept CONNECT and return `(client_id, keep_alive_secs)`.
    pub fn expect_connect_with_keep_alive(&mut self) -> (String, u16) {
        let frame = self.read_frame();
        assert_eq!(frame[0], 0x10, "Expected CONNECT, got {:02X?}", frame);
        (connect_client_id(&frame), connect_keep_alive(&frame))
    }

    /// Accept SUBSCRIBE and return `(packet_id, topic)`.
    pub fn expect_subscribe(&mut self) -> (u16, String) {
        let frame = self.read_frame();
        assert_eq!(frame[0], 0x82, "Expected SUBSCRIBE, got {:02X?}", frame);
        let body = body(&frame);
        let packet_id = u16::from_be_bytes([body[0], body[1]]);
        let topic_len = usize::from(u16::from_be_bytes([body[2], body[3]]));
        let topic = String::from_utf8(body[4..4 + topic_len].to_vec()).unwrap();
        assert_eq!(body[4 + topic_len], 0x00, "Requested QoS must be 0");
        (packet_id, topic)
    }

    /// Run a full receiver handshake and return the subscribed topic.
    pub fn accept_subscription(&mut self) -> String {
        self.expect_connect_with_keep_alive();
        self.send(&CONNACK_ACCEPTED);
        let (packet_id, topic) = self.expect_subscribe();
        self.send(&[0x90, 0x03, (packet_id >> 8) as u8, packet_id as u8, 0x00]);
        topic
    }

    pub fn publish(&mut self, topic: &str, payload: &[u8]) {
        self.send(&encode_publish(topic, payload).unwrap());
    }

    pub fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).unwrap();
        self.stream.flush().unwrap();
    }

    /// Write `bytes` in `chunk`-sized pieces with a pause between them.
    pub fn send_trickled(&mut self, bytes: &[u8], chunk: usize) {
        self.send_paced(bytes, chunk, Duration::from_millis(2));
    }

    pub fn send_paced(&mut self, bytes: &[u8], chunk: usize, pause: Duration) {
        for piece in bytes.chunks(chunk) {
            self.send(piece);
            thread::sleep(pause);
        }
    }

    pub fn close(self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

/// Bytes after the fixed header.
pub fn body(frame: &[u8]) -> &[u8] {
    let (_, consumed) = decode_remaining_length(&frame[1..]).unwrap().unwrap();
    &frame[1 + consumed..]
}

pub fn connect_client_id(frame: &[u8]) -> String {
    let body = body(frame);
    assert_eq!(&body[2..6], b"MQTT");
    assert_eq!(body[6], 4, "Protocol level");
    assert_eq!(body[7], 0x02, "Clean session flag");
    let id_len = usize::from(u16::from_be_bytes([body[10], body[11]]));
    String::from_utf8(body[12..12 + id_len].to_vec()).unwrap()
}

pub fn connect_keep_alive(frame: &[u8]) -> u16 {
    let body = body(frame);
    u16::from_be_bytes([body[8], body[9]])
}

/// Poll `condition` until it holds or the test timeout passes.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    true
}
