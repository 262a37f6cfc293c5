mod support;

use bridge::{
    BrokerConfig, ConnectionState, DetectionSource, MqttObjectReceiver, ReceiverConfig,
    detection_topic,
};
use std::time::{Duration, Instant};
use support::{CONNACK_ACCEPTED, FakeBroker, unused_broker, wait_until};
use wire::encode_publish;

const PERSON: &[u8] = br#"{"detections":[{"label":"person","confidence":0.95,"trackId":3,"bbox":[0.1,0.2,0.3,0.4]}]}"#;
const CAR: &[u8] = br#"{"detections":[{"label":"car","confidence":0.8,"trackId":7,"bbox":[0.5,0.5,0.2,0.1]}]}"#;

fn receiver_config(broker: BrokerConfig) -> ReceiverConfig {
    let mut config = ReceiverConfig::new(broker, detection_topic("{cam-1}"));
    config.reconnect_delay = Duration::from_millis(100);
    config.connect_timeout = Duration::from_secs(1);
    config
}

/// Full path: handshake, subscribe, publish, drain
///
/// Tests:
/// - CONNECT carries the per-topic client id
/// - SUBSCRIBE targets the configured topic
/// - a decoded message sets the flag and fills the store
/// - drain hands the set out exactly once
/// - stop sends DISCONNECT
#[test]
fn test_receives_and_drains_detections() {
    let broker = FakeBroker::bind();
    let receiver = MqttObjectReceiver::new(receiver_config(broker.config()));
    receiver.start().unwrap();

    let mut conn = broker.accept();
    assert_eq!(conn.expect_connect(), "vms_ai_receiver_vms_ai_detections_cam-1");
    conn.send(&CONNACK_ACCEPTED);
    let (packet_id, topic) = conn.expect_subscribe();
    assert_eq!(topic, "vms/ai/detections/cam-1");
    conn.send(&[0x90, 0x03, (packet_id >> 8) as u8, packet_id as u8, 0x00]);

    assert!(wait_until(|| receiver.connection_state() == ConnectionState::Subscribed));
    assert!(!receiver.has_received_data(), "No data before the first message");

    conn.publish(&topic, PERSON);
    assert!(wait_until(|| receiver.has_received_data()));

    let detections = receiver.drain_and_clear();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].label, "person");
    assert_eq!(detections[0].track_id, 3);
    assert!(receiver.drain_and_clear().is_empty(), "Second drain must be empty");
    assert!(receiver.has_received_data(), "Flag survives draining");

    receiver.stop();
    assert_eq!(conn.read_until(0xE0), vec![0xE0, 0x00]);
    assert_eq!(receiver.connection_state(), ConnectionState::Disconnected);
}

/// Newest message replaces, never merges
#[test]
fn test_latest_message_replaces_previous() {
    let broker = FakeBroker::bind();
    let receiver = MqttObjectReceiver::new(receiver_config(broker.config()));
    receiver.start().unwrap();

    let mut conn = broker.accept();
    let topic = conn.accept_subscription();
    conn.publish(&topic, PERSON);
    conn.publish(&topic, CAR);

    assert!(wait_until(|| {
        receiver
            .store()
            .drain_and_clear()
            .iter()
            .any(|d| d.label == "car")
    }));
    receiver.stop();
}

/// A frame split across many small writes is reassembled
#[test]
fn test_publish_split_across_reads() {
    let broker = FakeBroker::bind();
    let receiver = MqttObjectReceiver::new(receiver_config(broker.config()));
    receiver.start().unwrap();

    let mut conn = broker.accept();
    let topic = conn.accept_subscription();
    conn.send_trickled(&encode_publish(&topic, PERSON).unwrap(), 3);

    assert!(wait_until(|| receiver.has_received_data()));
    assert_eq!(receiver.drain_and_clear()[0].label, "person");
    receiver.stop();
}

/// Undecodable payloads are skipped without dropping the connection
#[test]
fn test_bad_payload_keeps_connection() {
    let broker = FakeBroker::bind();
    let receiver = MqttObjectReceiver::new(receiver_config(broker.config()));
    receiver.start().unwrap();

    let mut conn = broker.accept();
    let topic = conn.accept_subscription();
    conn.publish(&topic, b"{not json");
    conn.publish(&topic, br#"{"objects":[]}"#);
    conn.publish(&topic, PERSON);

    assert!(wait_until(|| receiver.has_received_data()));
    assert_eq!(receiver.connection_state(), ConnectionState::Subscribed);
    assert!(
        broker.try_accept(Duration::from_millis(300)).is_none(),
        "Receiver must not reconnect after a decode error"
    );
    receiver.stop();
}

/// Losing the connection clears the store, then the receiver reconnects
#[test]
fn test_connection_loss_clears_store_and_reconnects() {
    let broker = FakeBroker::bind();
    let receiver = MqttObjectReceiver::new(receiver_config(broker.config()));
    receiver.start().unwrap();

    let mut conn = broker.accept();
    let topic = conn.accept_subscription();
    conn.publish(&topic, PERSON);
    assert!(wait_until(|| receiver.has_received_data()));

    conn.close();
    assert!(
        wait_until(|| !receiver.has_received_data()),
        "Flag must reset on connection loss"
    );
    assert!(receiver.drain_and_clear().is_empty());

    let mut conn = broker.accept();
    let topic = conn.accept_subscription();
    conn.publish(&topic, CAR);
    assert!(wait_until(|| receiver.has_received_data()));
    assert_eq!(receiver.drain_and_clear()[0].label, "car");

    receiver.stop();
}

/// A refused CONNACK is a failed attempt followed by a retry
#[test]
fn test_refused_connack_retries() {
    let broker = FakeBroker::bind();
    let receiver = MqttObjectReceiver::new(receiver_config(broker.config()));
    receiver.start().unwrap();

    let mut refused = broker.accept();
    refused.expect_connect();
    refused.send(&[0x20, 0x02, 0x00, 0x05]);

    let mut conn = broker.accept();
    conn.accept_subscription();
    assert!(wait_until(|| receiver.connection_state() == ConnectionState::Subscribed));
    receiver.stop();
}

/// A SUBACK granting 0x80 tears the session down
#[test]
fn test_rejected_subscription_retries() {
    let broker = FakeBroker::bind();
    let receiver = MqttObjectReceiver::new(receiver_config(broker.config()));
    receiver.start().unwrap();

    let mut rejected = broker.accept();
    rejected.expect_connect();
    rejected.send(&CONNACK_ACCEPTED);
    let (packet_id, _) = rejected.expect_subscribe();
    rejected.send(&[0x90, 0x03, (packet_id >> 8) as u8, packet_id as u8, 0x80]);

    let mut conn = broker.accept();
    conn.accept_subscription();
    assert!(wait_until(|| receiver.connection_state() == ConnectionState::Subscribed));
    receiver.stop();
}

/// An idle session pings at half the advertised keep-alive
///
/// Tests:
/// - CONNECT advertises the configured keep-alive
/// - PINGREQ is sent while the broker has nothing to say
/// - answered pings keep the session alive
#[test]
fn test_idle_session_sends_ping_requests() {
    let broker = FakeBroker::bind();
    let mut config = receiver_config(broker.config());
    config.keep_alive = Duration::from_secs(1);
    let receiver = MqttObjectReceiver::new(config);
    receiver.start().unwrap();

    let mut conn = broker.accept();
    let (_, keep_alive) = conn.expect_connect_with_keep_alive();
    assert_eq!(keep_alive, 1);
    conn.send(&CONNACK_ACCEPTED);
    let (packet_id, _) = conn.expect_subscribe();
    conn.send(&[0x90, 0x03, (packet_id >> 8) as u8, packet_id as u8, 0x00]);

    for _ in 0..3 {
        assert_eq!(conn.read_frame(), vec![0xC0, 0x00]);
        conn.send(&[0xD0, 0x00]);
    }
    assert_eq!(receiver.connection_state(), ConnectionState::Subscribed);
    assert!(
        broker.try_accept(Duration::from_millis(100)).is_none(),
        "Answered pings must keep the session"
    );
    receiver.stop();
}

/// A broker that goes quiet for one and a half keep-alives is a lost
/// connection, even though the socket stays open
#[test]
fn test_silent_broker_expires_session() {
    let broker = FakeBroker::bind();
    let mut config = receiver_config(broker.config());
    config.keep_alive = Duration::from_secs(1);
    let receiver = MqttObjectReceiver::new(config);
    receiver.start().unwrap();

    let mut silent = broker.accept();
    let topic = silent.accept_subscription();
    silent.publish(&topic, PERSON);
    assert!(wait_until(|| receiver.has_received_data()));
    let quiet_since = Instant::now();

    // Pings go unanswered from here on
    assert!(
        wait_until(|| !receiver.has_received_data()),
        "Store must clear once keep-alive expires"
    );
    assert!(
        quiet_since.elapsed() >= Duration::from_secs(1),
        "Expired after only {:?}",
        quiet_since.elapsed()
    );

    let mut conn = broker.accept();
    conn.accept_subscription();
    assert!(wait_until(|| receiver.connection_state() == ConnectionState::Subscribed));
    receiver.stop();
    drop(silent);
}

/// A frame trickling in slower than the ping interval does not hold back
/// keep-alive, and the trickle itself counts as broker activity
#[test]
fn test_trickled_frame_does_not_delay_pings() {
    let broker = FakeBroker::bind();
    let mut config = receiver_config(broker.config());
    config.keep_alive = Duration::from_secs(1);
    let receiver = MqttObjectReceiver::new(config);
    receiver.start().unwrap();

    let mut conn = broker.accept();
    let topic = conn.accept_subscription();
    // Two and a half seconds for one frame: longer than the 1.5s expiry
    let frame = encode_publish(&topic, PERSON).unwrap();
    let pause = Duration::from_millis(2500) / frame.len().div_ceil(6) as u32;
    conn.send_paced(&frame, 6, pause);

    // Pings sent during the trickle are already waiting
    let start = Instant::now();
    for _ in 0..3 {
        assert_eq!(conn.read_frame(), vec![0xC0, 0x00]);
    }
    assert!(
        start.elapsed() < Duration::from_millis(250),
        "Pings were held back for {:?}",
        start.elapsed()
    );

    assert!(wait_until(|| receiver.has_received_data()));
    assert_eq!(receiver.drain_and_clear()[0].label, "person");
    assert!(
        broker.try_accept(Duration::from_millis(100)).is_none(),
        "Trickled bytes must count as activity"
    );
    receiver.stop();
}

/// stop() interrupts a read that would otherwise block for the full timeout
#[test]
fn test_stop_during_blocked_read_is_prompt() {
    let broker = FakeBroker::bind();
    let mut config = receiver_config(broker.config());
    config.read_timeout = Duration::from_secs(30);
    let receiver = MqttObjectReceiver::new(config);
    receiver.start().unwrap();

    let mut conn = broker.accept();
    conn.accept_subscription();
    assert!(wait_until(|| receiver.connection_state() == ConnectionState::Subscribed));

    let start = Instant::now();
    receiver.stop();
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "stop() took {:?}",
        start.elapsed()
    );
    assert_eq!(conn.read_until(0xE0), vec![0xE0, 0x00]);
}

/// stop() interrupts the wait between reconnect attempts
#[test]
fn test_stop_during_backoff_is_prompt() {
    let mut config = receiver_config(unused_broker());
    config.reconnect_delay = Duration::from_secs(30);
    let receiver = MqttObjectReceiver::new(config);
    receiver.start().unwrap();

    std::thread::sleep(Duration::from_millis(200));
    let start = Instant::now();
    receiver.stop();
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "stop() took {:?}",
        start.elapsed()
    );
    assert!(!receiver.has_received_data());
}

/// start() twice runs one background task; restart after stop works
#[test]
fn test_start_is_idempotent_and_restartable() {
    let broker = FakeBroker::bind();
    let receiver = MqttObjectReceiver::new(receiver_config(broker.config()));
    receiver.start().unwrap();
    receiver.start().unwrap();

    let mut conn = broker.accept();
    conn.accept_subscription();
    assert!(
        broker.try_accept(Duration::from_millis(300)).is_none(),
        "Only one connection expected"
    );

    receiver.stop();
    receiver.stop();

    receiver.start().unwrap();
    let mut conn = broker.accept();
    conn.accept_subscription();
    receiver.stop();
}
