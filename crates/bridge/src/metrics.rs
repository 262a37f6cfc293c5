use opentelemetry::{KeyValue, global, metrics::Counter};

const METER_NAME: &str = "bridge";

/// Counters recorded by either receiver backend.
///
/// They go through the global meter, which is a no-op until the binary
/// installs a provider.
#[derive(Clone)]
pub struct ReceiverMetrics {
    messages: Counter<u64>,
    detections: Counter<u64>,
    decode_failures: Counter<u64>,
    reconnects: Counter<u64>,
    connect_failures: Counter<u64>,
    attributes: Vec<KeyValue>,
}

impl ReceiverMetrics {
    pub fn new(topic: &str) -> Self {
        let meter = global::meter(METER_NAME);
        Self {
            messages: meter
                .u64_counter("bridge_messages_received_total")
                .with_description("PUBLISH messages received on the detection topic")
                .build(),
            detections: meter
                .u64_counter("bridge_detections_decoded_total")
                .with_description("Detections decoded from received messages")
                .build(),
            decode_failures: meter
                .u64_counter("bridge_decode_failures_total")
                .with_description("Messages whose payload could not be decoded")
                .build(),
            reconnects: meter
                .u64_counter("bridge_reconnects_total")
                .with_description("Connection losses followed by a reconnect attempt")
                .build(),
            connect_failures: meter
                .u64_counter("bridge_connect_failures_total")
                .with_description("Attempts that never reached an accepted CONNACK")
                .build(),
            attributes: vec![KeyValue::new("topic", topic.to_string())],
        }
    }

    pub fn message_received(&self) {
        self.messages.add(1, &self.attributes);
    }

    pub fn detections_decoded(&self, count: usize) {
        self.detections.add(count as u64, &self.attributes);
    }

    pub fn decode_failed(&self) {
        self.decode_failures.add(1, &self.attributes);
    }

    pub fn reconnecting(&self) {
        self.reconnects.add(1, &self.attributes);
    }

    pub fn connect_failed(&self) {
        self.connect_failures.add(1, &self.attributes);
    }
}

/// Counters recorded by the ROI publisher worker.
#[derive(Clone)]
pub struct PublisherMetrics {
    attempted: Counter<u64>,
    delivered: Counter<u64>,
    dropped: Counter<u64>,
    attributes: Vec<KeyValue>,
}

impl PublisherMetrics {
    pub fn new(topic: &str) -> Self {
        let meter = global::meter(METER_NAME);
        Self {
            attempted: meter
                .u64_counter("bridge_publish_attempts_total")
                .with_description("One-shot publish sessions started")
                .build(),
            delivered: meter
                .u64_counter("bridge_publish_delivered_total")
                .with_description("Messages handed to the broker")
                .build(),
            dropped: meter
                .u64_counter("bridge_publish_dropped_total")
                .with_description("Messages lost to delivery failure, overflow or stop")
                .build(),
            attributes: vec![KeyValue::new("topic", topic.to_string())],
        }
    }

    pub fn attempted(&self) {
        self.attempted.add(1, &self.attributes);
    }

    pub fn delivered(&self) {
        self.delivered.add(1, &self.attributes);
    }

    pub fn dropped(&self, count: usize) {
        self.dropped.add(count as u64, &self.attributes);
    }
}
