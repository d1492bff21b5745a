//! Broker session lifecycle.
//!
//! [`ConnectionManager`] owns the MQTT client and the network loop that
//! drives it. The loop runs on its own task; it tracks [`ConnectionState`],
//! resubscribes to the control and request namespaces on every ConnAck and
//! hands inbound messages to a [`MessageHandler`].

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use entity_bridge_common::{MqttConfig, TopicBuilder};

use crate::error::{BridgeError, Result};
use crate::publisher::Transport;

/// Capacity of the client request buffer shared by publish and subscribe calls.
const REQUEST_CAPACITY: usize = 100;

/// Pause before the loop re-establishes a session that dropped after connecting.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long `disconnect` lets the loop flush the DISCONNECT packet.
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

/// Receives inbound messages on the network loop.
///
/// Implementations must return quickly: anything slow has to be handed off to
/// another task, or further inbound delivery stalls.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, topic: &str, payload: &[u8]);
}

/// Why a connection attempt failed.
///
/// The first five variants mirror the MQTT 3.1.1 CONNACK return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectErrorCode {
    UnacceptableProtocolVersion,
    IdentifierRejected,
    ServerUnavailable,
    BadCredentials,
    NotAuthorized,
    /// No broker answered (DNS, TCP or TLS failure).
    Unreachable,
}

impl ConnectErrorCode {
    /// Map a CONNACK return code; `None` means the connection was accepted.
    pub fn from_return_code(code: ConnectReturnCode) -> Option<Self> {
        match code {
            ConnectReturnCode::Success => None,
            ConnectReturnCode::RefusedProtocolVersion => Some(Self::UnacceptableProtocolVersion),
            ConnectReturnCode::BadClientId => Some(Self::IdentifierRejected),
            ConnectReturnCode::ServiceUnavailable => Some(Self::ServerUnavailable),
            ConnectReturnCode::BadUserNamePassword => Some(Self::BadCredentials),
            ConnectReturnCode::NotAuthorized => Some(Self::NotAuthorized),
        }
    }

    /// Broker return code, if the broker answered at all.
    pub fn return_code(&self) -> Option<u8> {
        match self {
            Self::UnacceptableProtocolVersion => Some(1),
            Self::IdentifierRejected => Some(2),
            Self::ServerUnavailable => Some(3),
            Self::BadCredentials => Some(4),
            Self::NotAuthorized => Some(5),
            Self::Unreachable => None,
        }
    }
}

impl fmt::Display for ConnectErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::UnacceptableProtocolVersion => "unacceptable protocol version",
            Self::IdentifierRejected => "identifier rejected",
            Self::ServerUnavailable => "server unavailable",
            Self::BadCredentials => "bad username or password",
            Self::NotAuthorized => "not authorized",
            Self::Unreachable => "broker unreachable",
        };
        match self.return_code() {
            Some(code) => write!(f, "{} (code {})", reason, code),
            None => write!(f, "{}", reason),
        }
    }
}

/// Session state, changed only by broker events or connect/disconnect calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Terminal until [`ConnectionManager::connect`] is called again.
    Error(ConnectErrorCode),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error(code) => write!(f, "error: {}", code),
        }
    }
}

struct Session {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
    closing: Arc<AtomicBool>,
}

/// Owns the broker session for one bridge instance.
pub struct ConnectionManager {
    mqtt: MqttConfig,
    topics: TopicBuilder,
    handler: Arc<dyn MessageHandler>,
    state: Arc<watch::Sender<ConnectionState>>,
    session: Mutex<Option<Session>>,
}

impl ConnectionManager {
    /// Create a manager; nothing is opened until [`connect`](Self::connect).
    pub fn new(mqtt: MqttConfig, topics: TopicBuilder, handler: Arc<dyn MessageHandler>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            mqtt,
            topics,
            handler,
            state: Arc::new(state),
            session: Mutex::new(None),
        }
    }

    /// Open the session and start the network loop.
    ///
    /// Returns once the loop is started; the outcome is reported through
    /// [`state`](Self::state) and [`wait_connected`](Self::wait_connected).
    /// There is no retry after a failed attempt, call this again instead.
    pub fn connect(&self) -> Result<()> {
        if self.mqtt.keep_alive_secs == 0 {
            return Err(BridgeError::config("keep-alive must be at least 1 second"));
        }
        if self.mqtt.client_id.trim().is_empty() {
            return Err(BridgeError::config("client id must not be empty"));
        }

        let mut session = self.lock_session();
        if let Some(active) = session.take() {
            let failed = matches!(self.state(), ConnectionState::Error(_));
            if !failed && !active.event_loop.is_finished() {
                tracing::debug!("MQTT network loop already running");
                *session = Some(active);
                return Ok(());
            }
            // A failed loop may still be winding down
            active.event_loop.abort();
        }

        let mut options = MqttOptions::new(&self.mqtt.client_id, &self.mqtt.host, self.mqtt.port);
        options.set_keep_alive(Duration::from_secs(self.mqtt.keep_alive_secs));
        if let Some((username, password)) = self.mqtt.credentials() {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let closing = Arc::new(AtomicBool::new(false));

        tracing::info!(
            host = %self.mqtt.host,
            port = self.mqtt.port,
            client_id = %self.mqtt.client_id,
            "Connecting to MQTT broker"
        );
        self.state.send_replace(ConnectionState::Connecting);

        let ctx = LoopContext {
            client: client.clone(),
            subscriptions: self.topics.subscriptions(),
            handler: self.handler.clone(),
            state: self.state.clone(),
            closing: closing.clone(),
        };
        let event_loop = tokio::spawn(run_event_loop(eventloop, ctx));

        *session = Some(Session {
            client,
            event_loop,
            closing,
        });

        Ok(())
    }

    /// Wait until the session is connected or has failed.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<()> {
        let mut rx = self.state.subscribe();
        let outcome = tokio::time::timeout(timeout, async {
            rx.wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Error(_)))
                .await
                .map(|state| *state)
        })
        .await;

        match outcome {
            Err(_) => Err(BridgeError::ConnectTimeout {
                secs: timeout.as_secs(),
            }),
            Ok(Err(_)) => Err(BridgeError::worker("connection state channel closed")),
            Ok(Ok(ConnectionState::Error(code))) => Err(BridgeError::Connection { code }),
            Ok(Ok(_)) => Ok(()),
        }
    }

    /// Current session state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Stop the network loop and tear down the session.
    ///
    /// Safe to call repeatedly and without an active session.
    pub async fn disconnect(&self) {
        let Some(session) = self.lock_session().take() else {
            tracing::debug!("No active MQTT session to disconnect");
            return;
        };

        session.closing.store(true, Ordering::SeqCst);
        let mut event_loop = session.event_loop;

        if self.state() == ConnectionState::Connected {
            if let Err(e) = session.client.disconnect().await {
                tracing::warn!(error = %e, "Failed to send MQTT disconnect");
            }
            // Let the loop flush the DISCONNECT packet before it is stopped
            if tokio::time::timeout(DISCONNECT_GRACE, &mut event_loop)
                .await
                .is_err()
            {
                tracing::debug!("Network loop did not stop in time, aborting");
            }
        }

        event_loop.abort();
        self.state.send_replace(ConnectionState::Disconnected);
        tracing::info!("Disconnected from MQTT broker");
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for ConnectionManager {
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    async fn send(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        let client = self
            .lock_session()
            .as_ref()
            .map(|s| s.client.clone())
            .ok_or_else(|| BridgeError::Publish {
                topic: topic.to_string(),
                message: "no active session".to_string(),
            })?;

        client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = session.take() {
            session.event_loop.abort();
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("host", &self.mqtt.host)
            .field("port", &self.mqtt.port)
            .field("state", &self.state())
            .finish()
    }
}

struct LoopContext {
    client: AsyncClient,
    subscriptions: [String; 2],
    handler: Arc<dyn MessageHandler>,
    state: Arc<watch::Sender<ConnectionState>>,
    closing: Arc<AtomicBool>,
}

impl LoopContext {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn on_connected(&self) {
        self.set_state(ConnectionState::Connected);
        tracing::info!("Connected to MQTT broker");

        // Subscriptions are not guaranteed to survive a reconnect
        for topic in &self.subscriptions {
            match self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                Ok(()) => tracing::info!(topic = %topic, "Subscribed"),
                Err(e) => tracing::warn!(topic = %topic, error = %e, "Failed to subscribe"),
            }
        }
    }

    fn on_message(&self, topic: &str, payload: &[u8]) {
        let handler = &self.handler;
        let delivered =
            std::panic::catch_unwind(AssertUnwindSafe(|| handler.on_message(topic, payload)));
        if delivered.is_err() {
            tracing::error!(topic = %topic, "Message handler panicked, message dropped");
        }
    }

    fn fail(&self, code: ConnectErrorCode) {
        tracing::error!(error = %code, "MQTT connection failed");
        self.set_state(ConnectionState::Error(code));
    }
}

async fn run_event_loop(mut eventloop: EventLoop, ctx: LoopContext) {
    let mut established = false;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                match ConnectErrorCode::from_return_code(ack.code) {
                    None => {
                        established = true;
                        ctx.on_connected();
                    }
                    Some(code) => {
                        ctx.fail(code);
                        break;
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                ctx.on_message(&publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::warn!("Broker closed the MQTT session");
                ctx.set_state(ConnectionState::Disconnected);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                ctx.set_state(ConnectionState::Disconnected);
                break;
            }
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(code)) => {
                ctx.fail(
                    ConnectErrorCode::from_return_code(code)
                        .unwrap_or(ConnectErrorCode::Unreachable),
                );
                break;
            }
            Err(e) if ctx.closing.load(Ordering::SeqCst) => {
                tracing::debug!(error = %e, "Network loop stopped during disconnect");
                ctx.set_state(ConnectionState::Disconnected);
                break;
            }
            Err(e) if established => {
                tracing::warn!(error = %e, "Unexpected MQTT disconnect, re-establishing session");
                ctx.set_state(ConnectionState::Disconnected);
                tokio::time::sleep(RECONNECT_DELAY).await;
                ctx.set_state(ConnectionState::Connecting);
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not reach MQTT broker");
                ctx.fail(ConnectErrorCode::Unreachable);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    struct NoopHandler;

    impl MessageHandler for NoopHandler {
        fn on_message(&self, _topic: &str, _payload: &[u8]) {}
    }

    fn manager(port: u16) -> ConnectionManager {
        let mqtt = MqttConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..MqttConfig::default()
        };
        ConnectionManager::new(mqtt, TopicBuilder::new("home"), Arc::new(NoopHandler))
    }

    #[test]
    fn test_return_code_mapping() {
        assert_eq!(
            ConnectErrorCode::from_return_code(ConnectReturnCode::Success),
            None
        );
        assert_eq!(
            ConnectErrorCode::from_return_code(ConnectReturnCode::BadUserNamePassword),
            Some(ConnectErrorCode::BadCredentials)
        );
        assert_eq!(
            ConnectErrorCode::from_return_code(ConnectReturnCode::NotAuthorized),
            Some(ConnectErrorCode::NotAuthorized)
        );
        assert_eq!(ConnectErrorCode::BadCredentials.return_code(), Some(4));
        assert_eq!(ConnectErrorCode::Unreachable.return_code(), None);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(
            ConnectErrorCode::BadCredentials.to_string(),
            "bad username or password (code 4)"
        );
        assert_eq!(
            ConnectionState::Error(ConnectErrorCode::Unreachable).to_string(),
            "error: broker unreachable"
        );
    }

    #[tokio::test]
    async fn test_initial_state_is_disconnected() {
        let manager = manager(1883);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_noop() {
        let manager = manager(1883);
        manager.disconnect().await;
        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_without_session_fails() {
        let manager = manager(1883);
        let result = manager.send("home/switch/fan/state", b"{}".to_vec(), true).await;
        assert!(matches!(result, Err(BridgeError::Publish { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_terminal() {
        // Nothing listens on port 1, the TCP connect is refused immediately
        let manager = manager(1);
        assert_ok!(manager.connect());

        let result = manager.wait_connected(Duration::from_secs(10)).await;
        assert!(matches!(
            result,
            Err(BridgeError::Connection {
                code: ConnectErrorCode::Unreachable
            })
        ));
        assert_eq!(
            manager.state(),
            ConnectionState::Error(ConnectErrorCode::Unreachable)
        );

        // A fresh connect is allowed after the terminal error
        assert_ok!(manager.connect());
        let result = manager.wait_connected(Duration::from_secs(10)).await;
        assert!(result.is_err());

        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_rejects_zero_keep_alive() {
        let mqtt = MqttConfig {
            keep_alive_secs: 0,
            ..MqttConfig::default()
        };
        let manager = ConnectionManager::new(mqtt, TopicBuilder::new("home"), Arc::new(NoopHandler));
        assert!(matches!(manager.connect(), Err(BridgeError::Config(_))));
    }
}
