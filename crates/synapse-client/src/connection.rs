//! The process-wide training event connection.
//!
//! One `EventConnection` owns the Socket.IO session to the training server.
//! It reconnects on its own, fans the three training event kinds out to any
//! number of subscribers, and publishes its health as a `ConnectionStatus`.
//! Besides one stream per kind, [`EventConnection::training_events`] yields
//! all three interleaved in arrival order.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use futures::{Stream, StreamExt};
use serde_json::Value;
use synapse_training::events::KEEPALIVE_EVENT;
use synapse_training::{ConnectionStatus, Keepalive, TrainingComplete, TrainingError, TrainingEvent, TrainingUpdate};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ClientConfig, TransportConfig};
use crate::error::{ClientError, Result};
use crate::protocol::socket::{SERVER_DISCONNECT_REASON, normalize_namespace};
use crate::protocol::{EnginePacket, Handshake, SocketPacket, SocketPacketType};
use crate::transport::{self, EngineEndpoint, EngineTransport};

/// Buffered events per subscriber before it starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A boxed, never-ending event stream.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Why a live session ended.
#[derive(Debug)]
enum SessionEnd {
    /// `disconnect()` or teardown.
    Cancelled,
    /// The server closed the namespace; no automatic reconnection.
    ServerDisconnect,
    /// Transport loss or heartbeat timeout.
    Lost(String),
}

/// A connected session ready to run.
struct Established {
    transport: Arc<dyn EngineTransport>,
    handshake: Handshake,
    socket_id: Option<String>,
    /// Events that arrived before the namespace connect reply.
    early: Vec<SocketPacket>,
}

struct Shared {
    transport: TransportConfig,
    endpoint: EngineEndpoint,
    http: reqwest::Client,
    status: watch::Sender<ConnectionStatus>,
    updates: broadcast::Sender<TrainingUpdate>,
    completes: broadcast::Sender<TrainingComplete>,
    errors: broadcast::Sender<TrainingError>,
    /// All job events in arrival order.
    events: broadcast::Sender<TrainingEvent>,
    outbound: Mutex<Option<mpsc::UnboundedSender<EnginePacket>>>,
}

struct Driver {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Long-lived handle to the training event stream. Share it as `Arc<EventConnection>`.
pub struct EventConnection {
    shared: Arc<Shared>,
    driver: Mutex<Option<Driver>>,
    teardown: CancellationToken,
}

impl EventConnection {
    /// Create a disconnected handle from client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Create a disconnected handle using an existing HTTP client for polling.
    pub fn with_http_client(config: &ClientConfig, http: reqwest::Client) -> Result<Self> {
        let endpoint = EngineEndpoint::new(&config.websocket_url, &config.transport.path)?;
        let mut transport = config.transport.clone();
        transport.namespace = normalize_namespace(&transport.namespace);
        let (status, _) = watch::channel(ConnectionStatus::disconnected());
        let (updates, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (completes, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (errors, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            shared: Arc::new(Shared {
                transport,
                endpoint,
                http,
                status,
                updates,
                completes,
                errors,
                events,
                outbound: Mutex::new(None),
            }),
            driver: Mutex::new(None),
            teardown: CancellationToken::new(),
        })
    }

    /// Start connecting in the background. Calling it while a connection is
    /// live or being established does nothing.
    pub fn connect(&self) {
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        if driver.as_ref().is_some_and(|d| !d.task.is_finished()) {
            debug!("Connect requested while already connected or connecting");
            return;
        }
        if self.teardown.is_cancelled() {
            warn!("Connect requested after shutdown");
            return;
        }

        info!(url = %self.shared.endpoint.base(), "Connecting to training event stream");
        let cancel = self.teardown.child_token();
        let task = tokio::spawn(drive(Arc::clone(&self.shared), cancel.clone()));
        *driver = Some(Driver { cancel, task });
    }

    /// Close the connection. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        let driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(driver) = driver else {
            debug!("Disconnect requested while not connected");
            return;
        };
        driver.cancel.cancel();
        if let Err(e) = driver.task.await {
            warn!(error = %e, "Connection driver ended abnormally");
        }
        self.shared.set_status(ConnectionStatus::disconnected());
    }

    /// Disconnect and end every event stream handed out by this connection.
    pub async fn shutdown(&self) {
        self.teardown.cancel();
        self.disconnect().await;
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.borrow().clone()
    }

    /// Whether a namespace session is currently live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.status.borrow().connected
    }

    /// Watch connection status changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Emit a named event. Fire-and-forget; dropped with a debug log when not connected.
    pub fn emit(&self, name: &str, payload: Value) {
        if !self.is_connected() {
            debug!(event = name, "Emit skipped, not connected");
            return;
        }
        let packet = SocketPacket::event(&self.shared.transport.namespace, name, payload);
        let message = match packet.encode() {
            Ok(message) => message,
            Err(e) => {
                warn!(event = name, error = %e, "Failed to encode outgoing event");
                return;
            }
        };
        let outbound = self.shared.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        if outbound.as_ref().is_some_and(|tx| tx.send(EnginePacket::Message(message)).is_ok()) {
            debug!(event = name, "Event emitted");
        } else {
            debug!(event = name, "Emit skipped, session closing");
        }
    }

    /// Emit a `keepalive` carrying the given timestamp.
    pub fn emit_keepalive(&self, payload: Keepalive) {
        match serde_json::to_value(payload) {
            Ok(value) => self.emit(KEEPALIVE_EVENT, value),
            Err(e) => warn!(error = %e, "Failed to encode keepalive"),
        }
    }

    /// Training progress updates, for as long as this connection lives.
    #[must_use]
    pub fn training_updates(&self) -> EventStream<TrainingUpdate> {
        self.stream(self.shared.updates.subscribe())
    }

    /// Training completions.
    #[must_use]
    pub fn training_completions(&self) -> EventStream<TrainingComplete> {
        self.stream(self.shared.completes.subscribe())
    }

    /// Server-side training failures.
    #[must_use]
    pub fn training_errors(&self) -> EventStream<TrainingError> {
        self.stream(self.shared.errors.subscribe())
    }

    /// Updates, completions and errors interleaved in the order they arrived.
    #[must_use]
    pub fn training_events(&self) -> EventStream<TrainingEvent> {
        self.stream(self.shared.events.subscribe())
    }

    fn stream<T>(&self, rx: broadcast::Receiver<T>) -> EventStream<T>
    where
        T: Clone + Send + 'static,
    {
        BroadcastStream::new(rx)
            .filter_map(|item| async move {
                match item {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event subscriber lagged, events skipped");
                        None
                    }
                }
            })
            .take_until(self.teardown.clone().cancelled_owned())
            .boxed()
    }
}

impl Drop for EventConnection {
    fn drop(&mut self) {
        self.teardown.cancel();
    }
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn set_outbound(&self, tx: Option<mpsc::UnboundedSender<EnginePacket>>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = tx;
    }

    fn dispatch(&self, packet: &SocketPacket) {
        let Some((name, args)) = packet.event_parts() else {
            return;
        };
        let payload = args.first().cloned().unwrap_or(Value::Null);

        match TrainingEvent::decode(name, payload) {
            Ok(Some(event)) => {
                debug!(event = name, "Received training event");
                let by_kind = match event.clone() {
                    TrainingEvent::Update(update) => self.updates.send(update).is_ok(),
                    TrainingEvent::Complete(complete) => self.completes.send(complete).is_ok(),
                    TrainingEvent::Error(error) => self.errors.send(error).is_ok(),
                };
                let ordered = self.events.send(event).is_ok();
                if !by_kind && !ordered {
                    debug!(event = name, "No subscribers for event");
                }
            }
            Ok(None) => debug!(event = name, "Ignoring unknown event"),
            Err(e) => warn!(event = name, error = %e, "Malformed training event payload"),
        }
    }
}

/// Connection lifecycle: connect, run, and reconnect with backoff until
/// cancelled, the server disconnects us, or attempts run out.
async fn drive(shared: Arc<Shared>, cancel: CancellationToken) {
    let config = shared.transport.clone();
    let backoff = config.backoff();
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            info!(attempt, "reconnect_attempt");
        }

        let established = tokio::select! {
            () = cancel.cancelled() => break,
            result = timeout(config.connect_timeout(), establish(&shared)) => {
                result.unwrap_or_else(|_| Err(ClientError::Timeout("connect".to_string())))
            }
        };

        match established {
            Ok(session) => {
                if attempt > 0 {
                    info!(attempt, "reconnect");
                }
                attempt = 0;
                info!(socket_id = session.socket_id.as_deref().unwrap_or_default(), transport = %session.transport.kind(), "connect");
                shared.set_status(ConnectionStatus::connected(session.socket_id.clone()));

                let end = run_session(&shared, session, &cancel).await;
                shared.set_status(ConnectionStatus::disconnected());
                match end {
                    SessionEnd::Cancelled => {
                        info!(reason = "io client disconnect", "disconnect");
                        break;
                    }
                    SessionEnd::ServerDisconnect => {
                        info!(reason = SERVER_DISCONNECT_REASON, "disconnect");
                        break;
                    }
                    SessionEnd::Lost(reason) => {
                        warn!(reason = %reason, "disconnect");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "connect_error");
                shared.set_status(ConnectionStatus::disconnected());
            }
        }

        if !config.reconnection {
            break;
        }
        if attempt >= config.reconnection_attempts {
            error!(attempts = attempt, "reconnect_failed");
            break;
        }

        let delay = backoff.delay(attempt);
        attempt += 1;
        debug!(attempt, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "Waiting before reconnecting");
        tokio::select! {
            () = cancel.cancelled() => break,
            () = sleep(delay) => {}
        }
    }

    shared.set_outbound(None);
}

/// Open a transport and join the namespace.
async fn establish(shared: &Shared) -> Result<Established> {
    let (transport, handshake) = transport::open(&shared.transport, &shared.endpoint, &shared.http).await?;
    let namespace = &shared.transport.namespace;

    let connect = SocketPacket::connect(namespace).encode()?;
    transport.send(&[EnginePacket::Message(connect)]).await?;

    let mut early = Vec::new();
    loop {
        for packet in transport.receive().await? {
            match packet {
                EnginePacket::Ping(data) => transport.send(&[EnginePacket::Pong(data)]).await?,
                EnginePacket::Close => return Err(ClientError::Connection("closed during namespace connect".to_string())),
                EnginePacket::Message(text) => {
                    let socket_packet = SocketPacket::decode(&text)?;
                    if socket_packet.namespace != *namespace {
                        continue;
                    }
                    match socket_packet.packet_type {
                        SocketPacketType::Connect => {
                            let socket_id = socket_packet.connect_sid().map(str::to_string);
                            return Ok(Established { transport, handshake, socket_id, early });
                        }
                        SocketPacketType::ConnectError => {
                            return Err(ClientError::Connection(socket_packet.error_message()));
                        }
                        _ => early.push(socket_packet),
                    }
                }
                _ => {}
            }
        }
    }
}

/// Pump packets for one live session until it ends.
async fn run_session(shared: &Shared, session: Established, cancel: &CancellationToken) -> SessionEnd {
    let Established { transport, handshake, early, .. } = session;
    let namespace = shared.transport.namespace.clone();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    shared.set_outbound(Some(out_tx));

    let (in_tx, mut in_rx) = mpsc::channel::<Result<Vec<EnginePacket>>>(64);
    let reader_cancel = cancel.child_token();
    let reader = tokio::spawn(read_loop(Arc::clone(&transport), in_tx, reader_cancel.clone()));

    for packet in &early {
        shared.dispatch(packet);
    }

    let window = handshake.liveness_window();
    let deadline = sleep_until(Instant::now() + window);
    tokio::pin!(deadline);

    let end = loop {
        tokio::select! {
            () = cancel.cancelled() => break SessionEnd::Cancelled,
            Some(packet) = out_rx.recv() => {
                if let Err(e) = transport.send(&[packet]).await {
                    break SessionEnd::Lost(e.to_string());
                }
            }
            incoming = in_rx.recv() => {
                let packets = match incoming {
                    Some(Ok(packets)) => packets,
                    Some(Err(e)) => break SessionEnd::Lost(e.to_string()),
                    None => break SessionEnd::Lost("transport reader stopped".to_string()),
                };
                deadline.as_mut().reset(Instant::now() + window);
                if let Some(end) = handle_packets(shared, transport.as_ref(), &namespace, packets).await {
                    break end;
                }
            }
            () = &mut deadline => break SessionEnd::Lost("ping timeout".to_string()),
        }
    };

    shared.set_outbound(None);
    reader_cancel.cancel();
    if matches!(end, SessionEnd::Cancelled) {
        if let Ok(leave) = SocketPacket::disconnect(&namespace).encode() {
            let _ = transport.send(&[EnginePacket::Message(leave)]).await;
        }
    }
    if let Err(e) = transport.close().await {
        debug!(error = %e, "Transport close failed");
    }
    // Unblocks a reader parked on a full channel.
    drop(in_rx);
    let _ = reader.await;
    end
}

async fn handle_packets(
    shared: &Shared,
    transport: &dyn EngineTransport,
    namespace: &str,
    packets: Vec<EnginePacket>,
) -> Option<SessionEnd> {
    for packet in packets {
        match packet {
            EnginePacket::Ping(data) => {
                if let Err(e) = transport.send(&[EnginePacket::Pong(data)]).await {
                    return Some(SessionEnd::Lost(e.to_string()));
                }
            }
            EnginePacket::Close => return Some(SessionEnd::Lost("transport close".to_string())),
            EnginePacket::Message(text) => {
                let socket_packet = match SocketPacket::decode(&text) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!(error = %e, "Dropping malformed packet");
                        continue;
                    }
                };
                if socket_packet.namespace != namespace {
                    continue;
                }
                match socket_packet.packet_type {
                    SocketPacketType::Event => shared.dispatch(&socket_packet),
                    SocketPacketType::Disconnect => return Some(SessionEnd::ServerDisconnect),
                    SocketPacketType::ConnectError => {
                        return Some(SessionEnd::Lost(socket_packet.error_message()));
                    }
                    SocketPacketType::Connect | SocketPacketType::Ack => {}
                }
            }
            EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
        }
    }
    None
}

async fn read_loop(
    transport: Arc<dyn EngineTransport>,
    tx: mpsc::Sender<Result<Vec<EnginePacket>>>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            () = cancel.cancelled() => return,
            received = transport.receive() => received,
        };
        let failed = received.is_err();
        if tx.send(received).await.is_err() || failed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportKind;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Always has a ping ready; answering one takes a few milliseconds.
    struct FloodingTransport;

    #[async_trait]
    impl EngineTransport for FloodingTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Polling
        }

        async fn send(&self, _packets: &[EnginePacket]) -> Result<()> {
            sleep(Duration::from_millis(5)).await;
            Ok(())
        }

        async fn receive(&self) -> Result<Vec<EnginePacket>> {
            Ok(vec![EnginePacket::Ping(None)])
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn handle() -> EventConnection {
        let mut config = ClientConfig::default();
        config.websocket_url = "http://127.0.0.1:9".to_string();
        EventConnection::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_starts_disconnected() {
        let connection = handle();
        assert!(!connection.is_connected());
        assert_eq!(connection.status(), ConnectionStatus::disconnected());
    }

    #[tokio::test]
    async fn test_disconnect_when_never_connected() {
        let connection = handle();
        connection.disconnect().await;
        connection.disconnect().await;
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_emit_when_disconnected_is_noop() {
        let connection = handle();
        connection.emit_keepalive(Keepalive { timestamp: 1 });
        assert!(connection.shared.outbound.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_event_name() {
        let connection = handle();
        let mut updates = connection.training_updates();
        let mut completions = connection.training_completions();

        let update = SocketPacket::decode(
            r#"2["training_update",{"job_id":"J1","network_id":"N1","epoch":1,"total_epochs":3,"accuracy":null,"elapsed_time":1.2,"progress":33.3}]"#,
        )
        .unwrap();
        let complete = SocketPacket::decode(
            r#"2["training_complete",{"job_id":"J1","network_id":"N1","status":"completed","accuracy":0.95,"message":"done"}]"#,
        )
        .unwrap();
        connection.shared.dispatch(&update);
        connection.shared.dispatch(&complete);

        let received = updates.next().await.unwrap();
        assert_eq!(received.epoch, 1);
        assert!(received.accuracy.is_none());
        let received = completions.next().await.unwrap();
        assert!((received.accuracy - 0.95).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_training_events_keep_arrival_order() {
        let connection = handle();
        let mut events = connection.training_events();

        for text in [
            r#"2["training_update",{"job_id":"J1","network_id":"N1","epoch":9,"total_epochs":9,"accuracy":0.9,"elapsed_time":9.0,"progress":100.0}]"#,
            r#"2["training_complete",{"job_id":"J1","network_id":"N1","status":"completed","accuracy":0.95,"message":"done"}]"#,
            r#"2["training_update",{"job_id":"J1","network_id":"N1","epoch":3,"total_epochs":9,"accuracy":0.5,"elapsed_time":3.0,"progress":33.3}]"#,
        ] {
            connection.shared.dispatch(&SocketPacket::decode(text).unwrap());
        }

        let names = [
            events.next().await.unwrap().name(),
            events.next().await.unwrap().name(),
            events.next().await.unwrap().name(),
        ];
        assert_eq!(names, ["training_update", "training_complete", "training_update"]);
    }

    #[tokio::test]
    async fn test_session_ends_with_reader_backlogged() {
        let connection = handle();
        let shared = Arc::clone(&connection.shared);
        let cancel = CancellationToken::new();
        let session = Established {
            transport: Arc::new(FloodingTransport),
            handshake: Handshake {
                sid: "s1".to_string(),
                upgrades: vec![],
                ping_interval: 25_000,
                ping_timeout: 20_000,
                max_payload: None,
            },
            socket_id: None,
            early: vec![],
        };

        let session_cancel = cancel.clone();
        let run = tokio::spawn(async move { run_session(&shared, session, &session_cancel).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let end = timeout(Duration::from_secs(2), run).await.expect("session did not end").unwrap();
        assert!(matches!(end, SessionEnd::Cancelled));
    }

    #[tokio::test]
    async fn test_streams_end_on_shutdown() {
        let connection = handle();
        let mut errors = connection.training_errors();
        connection.shutdown().await;
        assert!(errors.next().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let connection = handle();
        connection.connect();
        connection.connect();
        assert!(connection.driver.lock().unwrap().is_some());
        connection.disconnect().await;
        assert!(connection.driver.lock().unwrap().is_none());
    }
}
