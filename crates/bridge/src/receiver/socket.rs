use super::{ConnectionState, DetectionSource, ReceiverCore};
use crate::config::ReceiverConfig;
use crate::errors::BridgeError;
use crate::stop::StopSignal;
use crate::store::ObjectStore;
use crate::transport::{self, Inbound};
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use wire::{
    FrameAccumulator, PacketType, decode_publish, decode_sub_ack, encode_disconnect,
    encode_ping_request, encode_subscribe,
};

/// The only SUBSCRIBE a session sends
const SUBSCRIBE_PACKET_ID: u16 = 1;

/// Floor for the receive-loop read timeout; a zero timeout is rejected
const MIN_POLL: Duration = Duration::from_millis(10);

/// Receiver that owns one TCP socket and runs the
/// connect, subscribe, receive, reconnect cycle on a background thread.
pub struct MqttObjectReceiver {
    core: Arc<ReceiverCore>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    control: Arc<SessionControl>,
    handle: JoinHandle<()>,
}

/// Stop flag plus a handle on the live socket, so `stop()` can wake a
/// thread blocked in `read`.
#[derive(Default)]
struct SessionControl {
    stop: StopSignal,
    socket: Mutex<Option<TcpStream>>,
}

impl SessionControl {
    fn socket(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.socket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the session socket. Returns `false` if stop was already
    /// requested, in which case the session must not start.
    fn attach(&self, stream: &TcpStream) -> Result<bool, BridgeError> {
        let mut slot = self.socket();
        if self.stop.is_requested() {
            return Ok(false);
        }
        *slot = Some(stream.try_clone()?);
        Ok(true)
    }

    fn detach(&self) {
        self.socket().take();
    }

    /// Request stop and unblock any pending read on the live socket. The
    /// write half stays open so the session can still say DISCONNECT.
    fn interrupt(&self) {
        self.stop.request();
        if let Some(stream) = self.socket().as_ref() {
            if let Err(e) = stream.shutdown(Shutdown::Read) {
                tracing::debug!(error = %e, "Socket already closed at stop");
            }
        }
    }
}

impl MqttObjectReceiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            core: Arc::new(ReceiverCore::new(config)),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.core.config
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DetectionSource for MqttObjectReceiver {
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

        let control = Arc::new(SessionControl::default());
        let handle = thread::Builder::new()
            .name("bridge-receiver".to_string())
            .spawn({
                let core = Arc::clone(&self.core);
                let control = Arc::clone(&control);
                move || {
                    let span = tracing::info_span!(
                        "receiver",
                        topic = %core.config.topic,
                        broker = %core.config.broker.address()
                    );
                    let _enter = span.enter();
                    run(&core, &control);
                }
            })?;

        tracing::info!(
            topic = %self.core.config.topic,
            broker = %self.core.config.broker.address(),
            "Detection receiver started"
        );
        *worker = Some(Worker { control, handle });
        Ok(())
    }

    fn stop(&self) {
        // Held across the join so a concurrent start() waits for it
        let mut slot = self.worker();
        let Some(worker) = slot.take() else {
            return;
        };

        worker.control.interrupt();
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

impl Drop for MqttObjectReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reconnect loop. Retries forever with a fixed delay until stopped.
fn run(core: &ReceiverCore, control: &SessionControl) {
    while !control.stop.is_requested() {
        core.set_state(ConnectionState::Connecting);

        match run_session(core, control) {
            Ok(()) => break,
            Err(e) if control.stop.is_requested() => {
                tracing::debug!(error = %e, "Session ended during shutdown");
                break;
            }
            Err(e) => {
                core.connection_lost(&e);
            }
        }

        if control.stop.wait_timeout(core.config.reconnect_delay) {
            break;
        }
    }
    core.set_state(ConnectionState::Disconnected);
}

/// One connection from TCP connect to teardown. `Ok(())` means stop was
/// requested; any error is a lost connection.
fn run_session(core: &ReceiverCore, control: &SessionControl) -> Result<(), BridgeError> {
    let config = &core.config;
    let stream = transport::open(&config.broker, config.connect_timeout, config.read_timeout)?;
    if !control.attach(&stream)? {
        return Ok(());
    }

    let mut session = Session::new(core, control, stream);
    let result = session.drive();
    control.detach();

    if control.stop.is_requested() {
        session.disconnect();
        return Ok(());
    }
    result
}

struct Session<'a> {
    core: &'a ReceiverCore,
    control: &'a SessionControl,
    stream: TcpStream,
    acc: FrameAccumulator,
    connected: bool,
    last_sent: Instant,
    last_received: Instant,
}

impl<'a> Session<'a> {
    fn new(core: &'a ReceiverCore, control: &'a SessionControl, stream: TcpStream) -> Self {
        let now = Instant::now();
        Self {
            core,
            control,
            stream,
            acc: FrameAccumulator::new(core.config.max_packet_size),
            connected: false,
            last_sent: now,
            last_received: now,
        }
    }

    fn drive(&mut self) -> Result<(), BridgeError> {
        let core = self.core;
        let config = &core.config;

        transport::handshake(
            &mut self.stream,
            &config.client_id,
            config.keep_alive_secs(),
            &mut self.acc,
        )?;
        self.connected = true;
        self.last_sent = Instant::now();
        self.last_received = self.last_sent;
        core.set_state(ConnectionState::Connected);
        tracing::info!(client_id = %config.client_id, "Connected to broker");

        self.send(&encode_subscribe(SUBSCRIBE_PACKET_ID, &config.topic)?)?;
        self.await_sub_ack()?;
        core.set_state(ConnectionState::Subscribed);
        tracing::info!(topic = %config.topic, "Subscribed to detection topic");

        self.receive_loop()
    }

    /// Wait for our SUBACK. A broker may deliver matching PUBLISH packets
    /// before it, and those are processed normally.
    fn await_sub_ack(&mut self) -> Result<(), BridgeError> {
        loop {
            let frame = transport::expect_frame(&mut self.stream, &mut self.acc, "SUBACK")?;
            self.last_received = Instant::now();

            if packet_type(&frame) != Some(PacketType::SubAck) {
                self.dispatch(&frame)?;
                continue;
            }

            let ack = decode_sub_ack(&frame)?;
            if ack.packet_id != SUBSCRIBE_PACKET_ID {
                tracing::debug!(packet_id = ack.packet_id, "Ignoring SUBACK for another packet");
                continue;
            }
            if ack.is_rejected() {
                return Err(BridgeError::SubscriptionRejected(
                    self.core.config.topic.clone(),
                ));
            }
            return Ok(());
        }
    }

    fn receive_loop(&mut self) -> Result<(), BridgeError> {
        // Wake often enough to ping on time
        let keep_alive = self.core.config.keep_alive;
        if !keep_alive.is_zero() {
            let poll = self.core.config.read_timeout.min(keep_alive / 2);
            self.stream.set_read_timeout(Some(poll.max(MIN_POLL)))?;
        }

        while !self.control.stop.is_requested() {
            // A read timeout is only idleness; keep-alive decides when
            // silence becomes a lost connection.
            match transport::poll_frame(&mut self.stream, &mut self.acc)? {
                Inbound::Frame(frame) => {
                    self.last_received = Instant::now();
                    self.dispatch(&frame)?;
                }
                Inbound::Partial => self.last_received = Instant::now(),
                Inbound::Idle => {}
            }
            self.keep_alive()?;
        }
        Ok(())
    }

    fn dispatch(&mut self, frame: &[u8]) -> Result<(), BridgeError> {
        match packet_type(frame) {
            Some(PacketType::Publish) => {
                let publish = decode_publish(frame)?;
                self.core.ingest(publish.topic, publish.payload);
            }
            Some(PacketType::PingResp) => tracing::trace!("PINGRESP received"),
            other => tracing::debug!(
                packet = ?other,
                len = frame.len(),
                "Ignoring unexpected packet"
            ),
        }
        Ok(())
    }

    /// Ping after half the advertised keep-alive without outbound traffic;
    /// give up after one and a half without any inbound bytes.
    fn keep_alive(&mut self) -> Result<(), BridgeError> {
        let interval = self.core.config.keep_alive;
        if interval.is_zero() {
            return Ok(());
        }

        let silent_for = self.last_received.elapsed();
        if silent_for > interval * 3 / 2 {
            return Err(BridgeError::KeepAliveExpired(silent_for));
        }
        if self.last_sent.elapsed() >= interval / 2 {
            self.send(&encode_ping_request())?;
            tracing::trace!("PINGREQ sent");
        }
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), BridgeError> {
        self.stream.write_all(frame)?;
        self.last_sent = Instant::now();
        Ok(())
    }

    /// Best effort: the session is over whatever happens here.
    fn disconnect(&mut self) {
        if self.connected {
            match self.send(&encode_disconnect()) {
                Ok(()) => tracing::debug!("DISCONNECT sent"),
                Err(e) => tracing::debug!(error = %e, "Could not send DISCONNECT"),
            }
        }
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

fn packet_type(frame: &[u8]) -> Option<PacketType> {
    frame.first().copied().and_then(PacketType::from_header)
}
