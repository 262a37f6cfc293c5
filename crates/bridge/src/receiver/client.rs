use super::{ConnectionState, DetectionSource, ReceiverCore};
use crate::config::ReceiverConfig;
use crate::errors::BridgeError;
use crate::stop::StopSignal;
use crate::store::ObjectStore;
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS, SubscribeReasonCode};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pending requests rumqttc buffers between the handle and its event loop
const REQUEST_CAPACITY: usize = 10;

/// Shortest non-zero keep-alive rumqttc accepts
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(1);

/// Receiver backed by the `rumqttc` synchronous client.
///
/// rumqttc owns the socket and the keep-alive; this type only maps its
/// events onto the shared store and connection state.
pub struct ClientObjectReceiver {
    core: Arc<ReceiverCore>,
    worker: Mutex<Option<ClientWorker>>,
}

struct ClientWorker {
    stop: Arc<StopSignal>,
    client: Client,
    handle: JoinHandle<()>,
}

impl ClientObjectReceiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            core: Arc::new(ReceiverCore::new(config)),
            worker: Mutex::new(None),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<ClientWorker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn options(config: &ReceiverConfig) -> MqttOptions {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker.host, config.broker.port);
        let keep_alive = if config.keep_alive.is_zero() {
            Duration::ZERO
        } else {
            config.keep_alive.max(MIN_KEEP_ALIVE)
        };
        options.set_keep_alive(keep_alive);
        options.set_clean_session(true);
        options.set_max_packet_size(config.max_packet_size, config.max_packet_size);
        options
    }
}

impl DetectionSource for ClientObjectReceiver {
    fn start(&self) -> Result<(), BridgeError> {
        let mut worker = self.worker();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return Ok(());
        }
        if let Some(finished) = worker.take() {
            if finished.handle.join().is_err() {
                tracing::error!("Receiver thread panicked");
            }
        }

        let (client, connection) = Client::new(Self::options(&self.core.config), REQUEST_CAPACITY);
        let stop = Arc::new(StopSignal::new());
        let handle = thread::Builder::new()
            .name("bridge-receiver".to_string())
            .spawn({
                let core = Arc::clone(&self.core);
                let client = client.clone();
                let stop = Arc::clone(&stop);
                move || {
                    let span = tracing::info_span!(
                        "receiver",
                        topic = %core.config.topic,
                        broker = %core.config.broker.address(),
                        backend = "client"
                    );
                    let _enter = span.enter();
                    run(&core, &client, connection, &stop);
                }
            })?;

        tracing::info!(
            topic = %self.core.config.topic,
            broker = %self.core.config.broker.address(),
            "Detection receiver started (client backend)"
        );
        *worker = Some(ClientWorker {
            stop,
            client,
            handle,
        });
        Ok(())
    }

    fn stop(&self) {
        let mut slot = self.worker();
        let Some(worker) = slot.take() else {
            return;
        };

        worker.stop.request();
        // Wakes the event loop so it observes the stop flag
        if let Err(e) = worker.client.try_disconnect() {
            tracing::debug!(error = %e, "Disconnect request not queued");
        }
        if worker.handle.join().is_err() {
            tracing::error!("Receiver thread panicked");
        }
        self.core.set_state(ConnectionState::Disconnected);
        tracing::info!(topic = %self.core.config.topic, "Detection receiver stopped");
    }

    fn connection_state(&self) -> ConnectionState {
        self.core.state()
    }

    fn store(&self) -> &ObjectStore {
        &self.core.store
    }
}

impl Drop for ClientObjectReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drive the rumqttc event loop. Iterating again after an error makes
/// rumqttc reconnect, so the fixed delay is applied here.
fn run(core: &ReceiverCore, client: &Client, mut connection: Connection, stop: &StopSignal) {
    core.set_state(ConnectionState::Connecting);

    for notification in connection.iter() {
        if stop.is_requested() {
            break;
        }

        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                core.set_state(ConnectionState::Connected);
                tracing::info!(client_id = %core.config.client_id, "Connected to broker");
                // Clean session: every reconnect needs a fresh subscription
                if let Err(e) = client.try_subscribe(core.config.topic.as_str(), QoS::AtMostOnce) {
                    core.connection_lost(&e.into());
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    core.connection_lost(&BridgeError::SubscriptionRejected(
                        core.config.topic.clone(),
                    ));
                    if stop.wait_timeout(core.config.reconnect_delay) {
                        break;
                    }
                    if let Err(e) =
                        client.try_subscribe(core.config.topic.as_str(), QoS::AtMostOnce)
                    {
                        tracing::warn!(error = %e, "Resubscribe request not queued");
                    }
                } else {
                    core.set_state(ConnectionState::Subscribed);
                    tracing::info!(topic = %core.config.topic, "Subscribed to detection topic");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                core.ingest(&publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::PingResp)) => {
                tracing::trace!("PINGRESP received");
            }
            Ok(_) => {}
            Err(e) => {
                if stop.is_requested() {
                    tracing::debug!(error = %e, "Client event loop ended during shutdown");
                    break;
                }
                core.connection_lost(&e.into());
                if stop.wait_timeout(core.config.reconnect_delay) {
                    break;
                }
                core.set_state(ConnectionState::Connecting);
            }
        }
    }

    core.set_state(ConnectionState::Disconnected);
}
