use crate::config::RelayConfig;
use crate::roi_watch::RoiWatch;
use anyhow::{Context, Result};
use bridge::{DetectionSource, Delivery, OneShotDelivery, PolygonPublisher, build_receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Stands in for the host: polls the receiver like a per-frame callback
/// would, and pushes ROI changes through the publisher.
pub struct RelayService<D: Delivery = OneShotDelivery> {
    config: RelayConfig,
    receiver: Box<dyn DetectionSource>,
    publisher: PolygonPublisher<D>,
    roi_watch: Option<RoiWatch>,
    data_seen: bool,
}

impl RelayService<OneShotDelivery> {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let receiver = build_receiver(config.receiver_backend, config.receiver_config())
            .context("Failed to build detection receiver")?;
        let publisher = PolygonPublisher::new(config.publisher_config());
        Ok(Self::with_components(config, receiver, publisher))
    }
}

impl<D: Delivery> RelayService<D> {
    pub fn with_components(
        config: RelayConfig,
        receiver: Box<dyn DetectionSource>,
        publisher: PolygonPublisher<D>,
    ) -> Self {
        let roi_watch = config.roi_polygon_file.clone().map(RoiWatch::new);
        Self {
            config,
            receiver,
            publisher,
            roi_watch,
            data_seen: false,
        }
    }

    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        tracing::info!(
            backend = %self.config.receiver_backend,
            camera_id = %self.config.camera_id,
            topic = %self.config.detection_topic,
            "Relay service starting"
        );
        self.receiver
            .start()
            .context("Failed to start detection receiver")?;

        while !shutdown.load(Ordering::Relaxed) {
            self.poll_detections();
            self.poll_roi();
            thread::sleep(self.config.poll_interval());
        }

        tracing::info!("Shutdown requested");
        self.shutdown();
        Ok(())
    }

    /// One host "frame": returns how many detections were handed out.
    pub fn poll_detections(&mut self) -> usize {
        let has_data = self.receiver.has_received_data();
        if has_data != self.data_seen {
            self.data_seen = has_data;
            if has_data {
                tracing::info!("Detection data available");
            } else {
                tracing::info!(
                    state = %self.receiver.connection_state(),
                    "No detection data, waiting for broker"
                );
            }
        }
        if !has_data {
            return 0;
        }

        let detections = self.receiver.drain_and_clear();
        for detection in &detections {
            tracing::info!(
                label = %detection.label,
                name = detection.name.as_deref().unwrap_or_default(),
                track_id = detection.track_id,
                confidence = detection.confidence,
                x = detection.x,
                y = detection.y,
                width = detection.width,
                height = detection.height,
                "Detection"
            );
        }
        detections.len()
    }

    /// Publish the ROI file at startup and after every change.
    pub fn poll_roi(&mut self) {
        let Some(watch) = self.roi_watch.as_mut() else {
            return;
        };

        match watch.poll() {
            Ok(Some(update)) => {
                tracing::info!(
                    polygons = update.polygons.len(),
                    path = %watch.path().display(),
                    "Publishing ROI polygons"
                );
                if let Err(e) = self.publisher.publish_update(&update) {
                    tracing::error!(error = %e, "Failed to queue ROI update");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "ROI file not published"),
        }
    }

    pub fn shutdown(&mut self) {
        self.receiver.stop();
        self.publisher.stop();
        tracing::info!("Relay service stopped");
    }
}
