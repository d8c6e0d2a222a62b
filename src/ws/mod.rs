//! Exchange event feed client.
//!
//! The feed is a Socket.IO server, spoken to directly over
//! `tokio-tungstenite` with the websocket transport only.

mod handlers;
pub mod protocol;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use alloy::primitives::Address;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder, backoff::Backoff};
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::watch, task::JoinHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};
use url::Url;

pub use handlers::{EventHandlers, decode_event};
use protocol::{EnginePacket, OpenInfo, SocketPacket};

use crate::error::KuruError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Feed connection settings.
#[derive(Clone, Debug)]
pub struct WsConfig {
    url: Url,
    market: Option<Address>,
    reconnect_interval: Duration,
    max_reconnect_attempts: u32,
    handshake_timeout: Duration,
}

impl WsConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            market: None,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Restricts the feed to events of a single market.
    pub fn with_market(mut self, market: Address) -> Self {
        self.market = Some(market);
        self
    }

    /// First reconnect delay, later delays grow up to twice this value.
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Consecutive failed reconnects after which the handler gives up.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn market(&self) -> Option<Address> {
        self.market
    }

    /// Socket.IO endpoint for the websocket transport.
    pub fn endpoint(&self) -> Url {
        let mut url = self.url.clone();
        url.set_path("/socket.io/");
        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("EIO", "4")
                .append_pair("transport", "websocket");
            if let Some(market) = self.market {
                query.append_pair("marketAddress", &market.to_string());
            }
        }
        url
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.reconnect_interval)
            .with_max_interval(self.reconnect_interval * 2)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Connection to the event feed relaying events to [`EventHandlers`].
///
/// After [`WebSocketHandler::connect`] events are read on a background task
/// which reconnects on dropped connections. The task stops on
/// [`WebSocketHandler::disconnect`], when the handler is dropped, or when
/// reconnecting fails `max_reconnect_attempts` times in a row.
pub struct WebSocketHandler {
    config: WsConfig,
    handlers: EventHandlers,
    connected: Arc<AtomicBool>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<Result<(), KuruError>>>,
}

impl WebSocketHandler {
    pub fn new(config: WsConfig, handlers: EventHandlers) -> Self {
        Self {
            config,
            handlers,
            connected: Arc::new(AtomicBool::new(false)),
            shutdown: None,
            task: None,
        }
    }

    /// Completes the Socket.IO handshake and starts reading events.
    pub async fn connect(&mut self) -> Result<(), KuruError> {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(KuruError::WebSocket("already connected".to_string()));
        }
        let (socket, open) = handshake(&self.config).await?;
        info!(url = %self.config.url, sid = %open.sid, "connected to feed");
        self.connected.store(true, Ordering::SeqCst);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connection = Connection {
            config: self.config.clone(),
            handlers: self.handlers.clone(),
            connected: self.connected.clone(),
            shutdown: shutdown_rx,
        };
        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(connection.run(socket, open)));
        Ok(())
    }

    /// Leaves the namespace, closes the socket and waits for the task to stop.
    pub async fn disconnect(&mut self) -> Result<(), KuruError> {
        if let Some(shutdown) = self.shutdown.take() {
            // Task already gone if nobody listens
            _ = shutdown.send(true);
        }
        let result = self.join().await;
        self.connected.store(false, Ordering::SeqCst);
        info!(url = %self.config.url, "disconnected from feed");
        result
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Waits until the connection task stops.
    ///
    /// Returns an error if it stopped because reconnecting failed.
    pub async fn wait(&mut self) -> Result<(), KuruError> {
        self.join().await
    }

    async fn join(&mut self) -> Result<(), KuruError> {
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| KuruError::Fatal(format!("feed task failed: {e}")))?,
            None => Ok(()),
        }
    }
}

enum Exit {
    Shutdown,
    Dropped(String),
}

struct Connection {
    config: WsConfig,
    handlers: EventHandlers,
    connected: Arc<AtomicBool>,
    shutdown: watch::Receiver<bool>,
}

impl Connection {
    async fn run(mut self, mut socket: WsStream, mut open: OpenInfo) -> Result<(), KuruError> {
        let mut backoff = self.config.backoff();
        loop {
            match self.read(&mut socket, &open).await {
                Exit::Shutdown => {
                    close(&mut socket).await;
                    self.connected.store(false, Ordering::SeqCst);
                    return Ok(());
                }
                Exit::Dropped(reason) => {
                    self.connected.store(false, Ordering::SeqCst);
                    warn!(%reason, "feed connection dropped");
                }
            }

            let mut attempt = 0;
            (socket, open) = loop {
                if attempt >= self.config.max_reconnect_attempts {
                    error!(attempts = attempt, "giving up reconnecting to feed");
                    return Err(KuruError::WebSocket(format!(
                        "reconnect failed after {attempt} attempts"
                    )));
                }
                attempt += 1;
                let delay = backoff
                    .next_backoff()
                    .unwrap_or(self.config.reconnect_interval * 2);
                warn!(attempt, ?delay, "reconnecting to feed");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.shutdown.changed() => return Ok(()),
                }
                match handshake(&self.config).await {
                    Ok(connected) => break connected,
                    Err(err) => warn!(attempt, %err, "feed reconnect failed"),
                }
            };
            backoff.reset();
            self.connected.store(true, Ordering::SeqCst);
            info!(sid = %open.sid, "reconnected to feed");
        }
    }

    async fn read(&mut self, socket: &mut WsStream, open: &OpenInfo) -> Exit {
        let liveness = open.liveness_timeout();
        loop {
            let message = tokio::select! {
                _ = self.shutdown.changed() => return Exit::Shutdown,
                message = tokio::time::timeout(liveness, socket.next()) => message,
            };
            let text = match message {
                Err(_) => return Exit::Dropped(format!("no ping within {liveness:?}")),
                Ok(None) => return Exit::Dropped("stream ended".to_string()),
                Ok(Some(Err(err))) => return Exit::Dropped(err.to_string()),
                Ok(Some(Ok(Message::Text(text)))) => text,
                Ok(Some(Ok(Message::Close(frame)))) => {
                    return Exit::Dropped(format!("closed by server: {frame:?}"));
                }
                Ok(Some(Ok(other))) => {
                    trace!(?other, "ignoring non-text frame");
                    continue;
                }
            };
            match EnginePacket::decode(text.as_str()) {
                Ok(EnginePacket::Ping(payload)) => {
                    if let Err(err) = send(socket, EnginePacket::Pong(payload)).await {
                        return Exit::Dropped(err.to_string());
                    }
                }
                Ok(EnginePacket::Message(SocketPacket::Event { name, data })) => {
                    self.handlers.handle(&name, data);
                }
                Ok(EnginePacket::Message(SocketPacket::Disconnect)) => {
                    return Exit::Dropped("namespace disconnected by server".to_string());
                }
                Ok(EnginePacket::Close) => {
                    return Exit::Dropped("engine.io close".to_string());
                }
                Ok(packet) => trace!(?packet, "ignoring feed packet"),
                Err(err) => warn!(%err, text = text.as_str(), "undecodable feed packet"),
            }
        }
    }
}

/// Opens the socket and joins the default namespace.
async fn handshake(config: &WsConfig) -> Result<(WsStream, OpenInfo), KuruError> {
    tokio::time::timeout(config.handshake_timeout, async {
        let endpoint = config.endpoint();
        debug!(%endpoint, "opening feed socket");
        let (mut socket, _) = connect_async(endpoint.as_str()).await?;

        let open = loop {
            match next_packet(&mut socket).await? {
                EnginePacket::Open(open) => break open,
                packet => trace!(?packet, "waiting for engine.io open"),
            }
        };
        socket.send(Message::text(protocol::CONNECT)).await?;
        loop {
            match next_packet(&mut socket).await? {
                EnginePacket::Message(SocketPacket::Connect(_)) => break,
                EnginePacket::Message(SocketPacket::ConnectError(data)) => {
                    return Err(KuruError::Protocol(format!("connect rejected: {data}")));
                }
                EnginePacket::Ping(payload) => send(&mut socket, EnginePacket::Pong(payload)).await?,
                packet => trace!(?packet, "waiting for namespace connect"),
            }
        }
        Ok::<_, KuruError>((socket, open))
    })
    .await
    .map_err(|_| KuruError::WebSocket("handshake timed out".to_string()))?
}

async fn next_packet(socket: &mut WsStream) -> Result<EnginePacket, KuruError> {
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => return EnginePacket::decode(text.as_str()),
            Some(Ok(Message::Close(frame))) => {
                return Err(KuruError::WebSocket(format!(
                    "closed during handshake: {frame:?}"
                )));
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Err(err.into()),
            None => {
                return Err(KuruError::WebSocket(
                    "stream ended during handshake".to_string(),
                ));
            }
        }
    }
}

async fn send(socket: &mut WsStream, packet: EnginePacket) -> Result<(), KuruError> {
    socket.send(Message::text(packet.encode())).await?;
    Ok(())
}

async fn close(socket: &mut WsStream) {
    if let Err(err) = socket.send(Message::text(protocol::DISCONNECT)).await {
        debug!(%err, "failed to send namespace disconnect");
    }
    if let Err(err) = socket.close(None).await {
        debug!(%err, "failed to close feed socket");
    }
}
