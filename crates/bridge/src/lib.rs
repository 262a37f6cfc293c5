pub mod config;
pub mod decoder;
pub mod errors;
pub mod metrics;
pub mod publisher;
pub mod receiver;
pub mod roi;
pub mod stop;
pub mod store;
pub mod topics;
pub mod transport;
pub mod types;

pub use config::{BrokerConfig, DEFAULT_MAX_PACKET_SIZE, PublisherConfig, ReceiverConfig};
pub use decoder::{DecodeError, decode_detections};
pub use errors::BridgeError;
pub use publisher::{Delivery, OneShotDelivery, PolygonPublisher, PublishQueue};
#[cfg(feature = "client-backend")]
pub use receiver::ClientObjectReceiver;
pub use receiver::{
    ConnectionState, DetectionSource, MqttObjectReceiver, ReceiverBackend, build_receiver,
};
pub use roi::{POLYGONS_UPDATED_EVENT, Polygon, PolygonUpdate};
pub use store::ObjectStore;
pub use topics::{
    DETECTION_TOPIC_PREFIX, PUBLISHER_CLIENT_ID, RECEIVER_CLIENT_ID_PREFIX, ROI_TOPIC,
    detection_topic, receiver_client_id,
};
pub use types::DetectedObject;
