use anyhow::Result;
use bridge::{
    BrokerConfig, PublisherConfig, ROI_TOPIC, ReceiverBackend, ReceiverConfig, detection_topic,
};
use common::{Environment, env_opt, env_or};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub environment: Environment,
    pub broker: BrokerConfig,
    pub camera_id: String,
    pub detection_topic: String,
    pub roi_topic: String,
    pub receiver_backend: ReceiverBackend,
    pub poll_interval_ms: u64,
    /// Polygons to publish at startup and whenever the file changes
    pub roi_polygon_file: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        let broker = BrokerConfig::new(
            env_opt("MQTT_BROKER_HOST").unwrap_or_else(|| "localhost".to_string()),
            env_or("MQTT_BROKER_PORT", 1883)?,
        );

        let camera_id = env_opt("CAMERA_ID").unwrap_or_else(|| "default".to_string());
        let detection_topic =
            env_opt("DETECTION_TOPIC").unwrap_or_else(|| detection_topic(&camera_id));
        let roi_topic = env_opt("ROI_TOPIC").unwrap_or_else(|| ROI_TOPIC.to_string());

        Ok(Self {
            environment: Environment::from_env(),
            broker,
            camera_id,
            detection_topic,
            roi_topic,
            receiver_backend: env_or("RECEIVER_BACKEND", ReceiverBackend::Socket)?,
            poll_interval_ms: env_or("POLL_INTERVAL_MS", 500)?,
            roi_polygon_file: env_opt("ROI_POLYGON_FILE").map(PathBuf::from),
            otel_endpoint: env_opt("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig::new(self.broker.clone(), self.detection_topic.clone())
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig::new(self.broker.clone(), self.roi_topic.clone())
    }
}
