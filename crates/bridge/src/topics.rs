//! Centralized topic and client-id naming
//!
//! Producers on the detection side and the ROI consumers agree on these
//! names, so they live in one place.

/// Prefix of the per-camera detection topic
pub const DETECTION_TOPIC_PREFIX: &str = "vms/ai/detections/";

/// Topic the ROI polygon updates are published on
pub const ROI_TOPIC: &str = "vms/roi/polygon";

/// Receiver client ids are this prefix plus the topic, slashes flattened
pub const RECEIVER_CLIENT_ID_PREFIX: &str = "vms_ai_receiver_";

/// Client id used by the ROI publisher for its one-shot sessions
pub const PUBLISHER_CLIENT_ID: &str = "vms_roi_plugin";

/// Detection topic for a camera. Host-side ids are often rendered as
/// `{uuid}`; the braces are not part of the topic.
pub fn detection_topic(camera_id: &str) -> String {
    let id = camera_id
        .strip_prefix('{')
        .and_then(|id| id.strip_suffix('}'))
        .unwrap_or(camera_id);
    format!("{}{}", DETECTION_TOPIC_PREFIX, id)
}

/// Client id for a receiver subscribed to `topic`. Unique per camera, so
/// two receivers never evict each other's session on the broker.
pub fn receiver_client_id(topic: &str) -> String {
    format!("{}{}", RECEIVER_CLIENT_ID_PREFIX, topic.replace('/', "_"))
}
