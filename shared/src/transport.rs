//! Message-oriented sockets over TCP and websocket connections.
//!
//! A [`Socket`] owns one connection at a time. Dialed sockets remember their
//! [`Endpoint`] and can be redialed by [`Socket::supervise`]; sockets handed
//! out by a [`Listener`] cannot. Reads and writes take separate locks, so one
//! task may block in [`Socket::recv`] while others send.
//!
//! Two flags are tracked independently: `connected` follows the underlying
//! connection and is observable through a [`watch`] channel, `closed` is set
//! once by the owner through [`Socket::close`] and stops supervision.

use crate::codec::{Codec, CodecError};
use crate::framing::{self, FrameError};
use crate::messages::Message;
use crate::{MAX_MESSAGE_SIZE, RECONNECT_DELAY};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid url: {0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme '{0}', expected tcp, ws or wss")]
    Scheme(String),

    #[error("url '{0}' has no host")]
    MissingHost(String),

    #[error("url '{0}' has no port")]
    MissingPort(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("dial failed: {0}")]
    Dial(String),

    /// Connection-level failure; the connection is unusable afterwards.
    #[error("network error: {0}")]
    Network(String),

    /// One message could not be encoded or decoded; the connection is fine.
    #[error("serialization error: {0}")]
    Serdes(#[from] CodecError),

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] EndpointError),
}

impl From<FrameError> for NetError {
    fn from(e: FrameError) -> Self {
        NetError::Network(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for NetError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        NetError::Network(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Tcp,
    Ws,
    Wss,
}

/// A parsed `tcp://`, `ws://` or `wss://` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    scheme: Scheme,
    host_port: String,
}

impl Endpoint {
    pub fn parse(input: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(input)?;
        let scheme = match url.scheme() {
            "tcp" => Scheme::Tcp,
            "ws" => Scheme::Ws,
            "wss" => Scheme::Wss,
            other => return Err(EndpointError::Scheme(other.to_string())),
        };
        let host = url
            .host_str()
            .ok_or_else(|| EndpointError::MissingHost(input.to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| EndpointError::MissingPort(input.to_string()))?;
        let host_port = format!("{}:{}", host, port);

        Ok(Self {
            url,
            scheme,
            host_port,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `host:port` suitable for socket address resolution.
    pub fn host_port(&self) -> &str {
        &self.host_port
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

enum FrameReader {
    Tcp(OwnedReadHalf),
    Ws(SplitStream<WsStream>),
}

impl FrameReader {
    /// Next payload, `None` for keepalives.
    async fn read_payload(&mut self) -> Result<Option<Vec<u8>>, NetError> {
        match self {
            FrameReader::Tcp(reader) => {
                let payload = framing::read_frame(reader).await?;
                Ok((!payload.is_empty()).then_some(payload))
            }
            FrameReader::Ws(stream) => match stream.next().await {
                None => Err(NetError::Network("connection closed".to_string())),
                Some(Err(e)) => Err(e.into()),
                Some(Ok(WsMessage::Binary(payload))) => {
                    if payload.len() > MAX_MESSAGE_SIZE {
                        return Err(NetError::Network(format!(
                            "payload size {} exceeds maximum {}",
                            payload.len(),
                            MAX_MESSAGE_SIZE
                        )));
                    }
                    Ok((!payload.is_empty()).then_some(payload))
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => Ok(None),
                Some(Ok(WsMessage::Close(_))) => {
                    Err(NetError::Network("connection closed".to_string()))
                }
                Some(Ok(WsMessage::Text(_))) => {
                    Err(NetError::Network("unexpected text frame".to_string()))
                }
            },
        }
    }
}

enum FrameWriter {
    Tcp(OwnedWriteHalf),
    Ws(SplitSink<WsStream, WsMessage>),
}

impl FrameWriter {
    async fn write_payload(&mut self, payload: Vec<u8>) -> Result<(), NetError> {
        match self {
            FrameWriter::Tcp(writer) => Ok(framing::write_frame(writer, &payload).await?),
            FrameWriter::Ws(sink) => {
                if payload.len() > MAX_MESSAGE_SIZE {
                    return Err(NetError::Network(format!(
                        "payload size {} exceeds maximum {}",
                        payload.len(),
                        MAX_MESSAGE_SIZE
                    )));
                }
                Ok(sink.send(WsMessage::Binary(payload)).await?)
            }
        }
    }

    async fn write_keepalive(&mut self) -> Result<(), NetError> {
        match self {
            FrameWriter::Tcp(writer) => Ok(framing::write_frame(writer, &[]).await?),
            FrameWriter::Ws(sink) => Ok(sink.send(WsMessage::Ping(Vec::new())).await?),
        }
    }

    async fn shutdown(&mut self) {
        let result = match self {
            FrameWriter::Tcp(writer) => writer.shutdown().await.map_err(|e| e.to_string()),
            FrameWriter::Ws(sink) => sink.close().await.map_err(|e| e.to_string()),
        };
        if let Err(e) = result {
            debug!("Ignoring error while shutting down connection: {}", e);
        }
    }
}

fn split_tcp(stream: TcpStream) -> (FrameReader, FrameWriter) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }
    let (reader, writer) = stream.into_split();
    (FrameReader::Tcp(reader), FrameWriter::Tcp(writer))
}

fn split_ws(stream: WsStream) -> (FrameReader, FrameWriter) {
    let (sink, stream) = stream.split();
    (FrameReader::Ws(stream), FrameWriter::Ws(sink))
}

pub struct Socket {
    endpoint: Option<Endpoint>,
    codec: Arc<Codec>,
    reader: Mutex<Option<FrameReader>>,
    writer: Mutex<Option<FrameWriter>>,
    connected: watch::Sender<bool>,
    closed: AtomicBool,
    reconnect_delay: Duration,
}

impl Socket {
    /// Creates an unconnected socket for `url`. Nothing is dialed yet.
    pub fn new(url: &str, codec: Arc<Codec>) -> Result<Self, EndpointError> {
        let endpoint = Endpoint::parse(url)?;
        Ok(Self::from_parts(Some(endpoint), codec, None))
    }

    fn from_parts(
        endpoint: Option<Endpoint>,
        codec: Arc<Codec>,
        halves: Option<(FrameReader, FrameWriter)>,
    ) -> Self {
        let (connected, _) = watch::channel(halves.is_some());
        let (reader, writer) = match halves {
            Some((reader, writer)) => (Some(reader), Some(writer)),
            None => (None, None),
        };

        Self {
            endpoint,
            codec,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            connected,
            closed: AtomicBool::new(false),
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Observes connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Connects (and performs the websocket handshake) to the endpoint.
    pub async fn dial(&self) -> Result<(), NetError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| NetError::Dial("accepted sockets cannot be redialed".to_string()))?;

        let halves = match endpoint.scheme() {
            Scheme::Tcp => {
                let stream = TcpStream::connect(endpoint.host_port())
                    .await
                    .map_err(|e| NetError::Dial(format!("{}: {}", endpoint, e)))?;
                split_tcp(stream)
            }
            Scheme::Ws => {
                let (stream, _) = tokio_tungstenite::connect_async(endpoint.url().as_str())
                    .await
                    .map_err(|e| NetError::Dial(format!("{}: {}", endpoint, e)))?;
                split_ws(stream)
            }
            Scheme::Wss => {
                return Err(NetError::Dial(format!(
                    "{}: this build has no TLS support, terminate TLS in front of the endpoint",
                    endpoint
                )));
            }
        };

        let (reader, writer) = halves;
        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(writer);
        self.connected.send_replace(true);

        if self.is_closed() {
            self.disconnect().await;
            return Err(NetError::Dial(format!("{}: socket closed while dialing", endpoint)));
        }

        debug!("Dialed {}", endpoint);
        Ok(())
    }

    /// Encodes and writes one message. A message too large for a frame is
    /// rejected as [`NetError::Serdes`] before anything is written, so the
    /// connection stays usable.
    pub async fn send(&self, message: &Message) -> Result<(), NetError> {
        let payload = self.codec.encode(message)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(CodecError::TooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            }
            .into());
        }
        let mut writer = self.writer.lock().await;
        let writer = writer
            .as_mut()
            .ok_or_else(|| NetError::Network("not connected".to_string()))?;
        writer.write_payload(payload).await
    }

    /// Sends an empty frame (a ping on websockets).
    pub async fn send_keepalive(&self) -> Result<(), NetError> {
        let mut writer = self.writer.lock().await;
        let writer = writer
            .as_mut()
            .ok_or_else(|| NetError::Network("not connected".to_string()))?;
        writer.write_keepalive().await
    }

    /// Waits for the next frame. `Ok(None)` is a keepalive.
    pub async fn recv(&self) -> Result<Option<Message>, NetError> {
        let mut state = self.connected.subscribe();
        if !*state.borrow_and_update() {
            let reason = if self.is_closed() { "socket closed" } else { "not connected" };
            return Err(NetError::Network(reason.to_string()));
        }

        let mut reader = self.reader.lock().await;
        let reader = reader
            .as_mut()
            .ok_or_else(|| NetError::Network("not connected".to_string()))?;

        let payload = tokio::select! {
            result = reader.read_payload() => result?,
            _ = state.changed() => {
                return Err(NetError::Network("connection hung up".to_string()));
            }
        };

        match payload {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Closes the socket for good. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.disconnect().await;
    }

    /// Drops the current connection without closing the socket.
    pub async fn disconnect(&self) {
        // Flip the flag first so a pending recv lets go of the reader lock.
        self.connected.send_replace(false);
        drop(self.reader.lock().await.take());
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await;
        }
    }

    /// Resolves once connected; returns false if the socket gets closed.
    pub async fn wait_connected(&self) -> bool {
        let mut state = self.connected.subscribe();
        loop {
            if *state.borrow_and_update() {
                return true;
            }
            if self.is_closed() {
                return false;
            }
            if state.changed().await.is_err() {
                return false;
            }
        }
    }

    async fn wait_closed(&self) {
        let mut state = self.connected.subscribe();
        loop {
            state.borrow_and_update();
            if self.is_closed() || state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Keeps the socket connected until [`Socket::close`] is called.
    ///
    /// Each round dials, runs `handler` to completion, drops the connection
    /// and waits the reconnect delay before dialing again.
    pub async fn supervise<F, Fut>(self: &Arc<Self>, mut handler: F)
    where
        F: FnMut(Arc<Socket>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let name = self
            .endpoint
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "accepted connection".to_string());

        while !self.is_closed() {
            match self.dial().await {
                Ok(()) => {
                    info!("Connected to {}", name);
                    handler(Arc::clone(self)).await;
                    self.disconnect().await;
                    if !self.is_closed() {
                        warn!("Connection to {} lost", name);
                    }
                }
                Err(e) => warn!("{}", e),
            }

            if self.is_closed() {
                break;
            }

            info!("Reconnecting to {} in {:?}", name, self.reconnect_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = self.wait_closed() => {}
            }
        }

        debug!("Supervision of {} ended", name);
    }
}

/// Accepts connections for a `tcp://` or `ws://` endpoint.
pub struct Listener {
    inner: TcpListener,
    scheme: Scheme,
    codec: Arc<Codec>,
}

impl Listener {
    pub async fn bind(url: &str, codec: Arc<Codec>) -> Result<Self, NetError> {
        let endpoint = Endpoint::parse(url)?;
        if endpoint.scheme() == Scheme::Wss {
            return Err(NetError::Network(format!(
                "{}: this build has no TLS support, terminate TLS in front of the listener",
                endpoint
            )));
        }

        let inner = TcpListener::bind(endpoint.host_port())
            .await
            .map_err(|e| NetError::Network(format!("bind {}: {}", endpoint, e)))?;

        Ok(Self {
            inner,
            scheme: endpoint.scheme(),
            codec,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.inner
            .local_addr()
            .map_err(|e| NetError::Network(e.to_string()))
    }

    pub async fn accept(&self) -> Result<(Socket, SocketAddr), NetError> {
        let (stream, addr) = self
            .inner
            .accept()
            .await
            .map_err(|e| NetError::Network(format!("accept: {}", e)))?;

        let halves = match self.scheme {
            Scheme::Ws | Scheme::Wss => {
                let stream = tokio_tungstenite::accept_async(MaybeTlsStream::Plain(stream))
                    .await
                    .map_err(|e| NetError::Network(format!("handshake with {}: {}", addr, e)))?;
                split_ws(stream)
            }
            Scheme::Tcp => split_tcp(stream),
        };

        Ok((Socket::from_parts(None, Arc::clone(&self.codec), Some(halves)), addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Component, Speech};
    use crate::messages::{ClientLogin, WorldUpdate};
    use crate::{EntityId, UserId};
    use std::sync::atomic::AtomicUsize;
    use tokio::io::AsyncWriteExt;
    use tokio::time::{sleep, timeout};

    fn codec() -> Arc<Codec> {
        Arc::new(Codec::standard())
    }

    async fn connected_pair(scheme: &str) -> (Socket, Socket) {
        let listener = Listener::bind(&format!("{}://127.0.0.1:0", scheme), codec())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let client = Socket::new(&format!("{}://{}", scheme, addr), codec()).unwrap();

        let (dialed, accepted) = tokio::join!(client.dial(), listener.accept());
        dialed.unwrap();
        let (server, _) = accepted.unwrap();
        (client, server)
    }

    #[test]
    fn test_endpoint_parsing() {
        let tcp = Endpoint::parse("tcp://127.0.0.1:9000").unwrap();
        assert_eq!(tcp.scheme(), Scheme::Tcp);
        assert_eq!(tcp.host_port(), "127.0.0.1:9000");

        let ws = Endpoint::parse("ws://localhost/game").unwrap();
        assert_eq!(ws.scheme(), Scheme::Ws);
        assert_eq!(ws.host_port(), "localhost:80");

        assert!(matches!(
            Endpoint::parse("udp://127.0.0.1:9000"),
            Err(EndpointError::Scheme(_))
        ));
        assert!(matches!(
            Endpoint::parse("tcp://127.0.0.1"),
            Err(EndpointError::MissingPort(_))
        ));
        assert!(Endpoint::parse("not a url").is_err());
    }

    #[tokio::test]
    async fn test_tcp_send_and_recv() {
        let (client, server) = connected_pair("tcp").await;
        assert!(client.is_connected());
        assert!(server.is_connected());

        let login = Message::from(ClientLogin { user_id: UserId(7) });
        client.send(&login).await.unwrap();
        assert_eq!(server.recv().await.unwrap(), Some(login));

        let update = Message::from(WorldUpdate { tick: 65535, ..Default::default() });
        server.send(&update).await.unwrap();
        assert_eq!(client.recv().await.unwrap(), Some(update));
    }

    #[tokio::test]
    async fn test_ws_send_and_recv() {
        let (client, server) = connected_pair("ws").await;

        let login = Message::from(ClientLogin { user_id: UserId(9) });
        client.send(&login).await.unwrap();
        assert_eq!(server.recv().await.unwrap(), Some(login.clone()));

        server.send(&login).await.unwrap();
        assert_eq!(client.recv().await.unwrap(), Some(login));
    }

    #[tokio::test]
    async fn test_keepalive_yields_none() {
        let (client, server) = connected_pair("tcp").await;
        client.send_keepalive().await.unwrap();
        assert_eq!(server.recv().await.unwrap(), None);

        let (client, server) = connected_pair("ws").await;
        client.send_keepalive().await.unwrap();
        assert_eq!(server.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_message_is_serdes_error() {
        let listener = Listener::bind("tcp://127.0.0.1:0", codec()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (raw, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let mut raw = raw.unwrap();
        let (server, _) = accepted.unwrap();

        // tag 250 is not registered, followed by a valid login frame
        framing::write_frame(&mut raw, &[250, 1, 2]).await.unwrap();
        let login = Codec::standard()
            .encode(&Message::from(ClientLogin { user_id: UserId(3) }))
            .unwrap();
        framing::write_frame(&mut raw, &login).await.unwrap();

        assert!(matches!(server.recv().await, Err(NetError::Serdes(_))));
        assert_eq!(
            server.recv().await.unwrap(),
            Some(Message::from(ClientLogin { user_id: UserId(3) }))
        );
    }

    #[tokio::test]
    async fn test_oversized_frame_is_network_error() {
        let listener = Listener::bind("tcp://127.0.0.1:0", codec()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (raw, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let mut raw = raw.unwrap();
        let (server, _) = accepted.unwrap();

        raw.write_all(&u16::MAX.to_be_bytes()).await.unwrap();
        raw.flush().await.unwrap();

        assert!(matches!(server.recv().await, Err(NetError::Network(_))));
    }

    #[tokio::test]
    async fn test_oversized_send_keeps_connection() {
        let (client, server) = connected_pair("tcp").await;

        let mut update = WorldUpdate::default();
        update.world_data.insert(
            EntityId(1),
            vec![Component::Speech(Speech { text: "x".repeat(MAX_MESSAGE_SIZE) })],
        );
        let result = client.send(&Message::from(update)).await;
        assert!(matches!(result, Err(NetError::Serdes(CodecError::TooLarge { .. }))));
        assert!(client.is_connected());

        let login = Message::from(ClientLogin { user_id: UserId(4) });
        client.send(&login).await.unwrap();
        assert_eq!(server.recv().await.unwrap(), Some(login));
    }

    #[tokio::test]
    async fn test_peer_close_is_network_error() {
        let (client, server) = connected_pair("tcp").await;
        server.close().await;
        assert!(matches!(client.recv().await, Err(NetError::Network(_))));
    }

    #[tokio::test]
    async fn test_close_wakes_pending_recv() {
        let (client, _server) = connected_pair("tcp").await;
        let client = Arc::new(client);

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.recv().await })
        };
        sleep(Duration::from_millis(20)).await;

        client.close().await;
        let result = timeout(Duration::from_secs(1), pending).await.unwrap().unwrap();
        assert!(matches!(result, Err(NetError::Network(_))));

        client.close().await;
        assert!(client.is_closed());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_send_without_connection_fails() {
        let socket = Socket::new("tcp://127.0.0.1:1", codec()).unwrap();
        let result = socket.send(&Message::from(ClientLogin { user_id: UserId(1) })).await;
        assert!(matches!(result, Err(NetError::Network(_))));
        assert!(!socket.is_closed());
    }

    #[tokio::test]
    async fn test_wss_dial_requires_tls() {
        let socket = Socket::new("wss://127.0.0.1:9443", codec()).unwrap();
        assert!(matches!(socket.dial().await, Err(NetError::Dial(_))));
    }

    #[tokio::test]
    async fn test_accepted_socket_cannot_redial() {
        let (_client, server) = connected_pair("tcp").await;
        assert!(server.endpoint().is_none());
        assert!(matches!(server.dial().await, Err(NetError::Dial(_))));
    }

    #[tokio::test]
    async fn test_supervise_redials_until_closed() {
        let listener = Listener::bind("tcp://127.0.0.1:0", codec()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let socket = Arc::new(
            Socket::new(&format!("tcp://{}", addr), codec())
                .unwrap()
                .with_reconnect_delay(Duration::from_millis(10)),
        );

        // Accept and immediately drop connections so every session ends.
        let acceptor = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((accepted, _)) => drop(accepted),
                    Err(_) => break,
                }
            }
        });

        let sessions = Arc::new(AtomicUsize::new(0));
        let supervisor = {
            let socket = Arc::clone(&socket);
            let sessions = Arc::clone(&sessions);
            tokio::spawn(async move {
                socket
                    .supervise(move |connection| {
                        let sessions = Arc::clone(&sessions);
                        async move {
                            sessions.fetch_add(1, Ordering::SeqCst);
                            while connection.recv().await.is_ok() {}
                        }
                    })
                    .await;
            })
        };

        timeout(Duration::from_secs(5), async {
            while sessions.load(Ordering::SeqCst) < 2 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        socket.close().await;
        timeout(Duration::from_secs(5), supervisor).await.unwrap().unwrap();
        assert!(!socket.wait_connected().await);
        acceptor.abort();
    }

    #[tokio::test]
    async fn test_wait_connected_after_dial() {
        let listener = Listener::bind("tcp://127.0.0.1:0", codec()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let socket = Arc::new(Socket::new(&format!("tcp://{}", addr), codec()).unwrap());

        let waiter = {
            let socket = Arc::clone(&socket);
            tokio::spawn(async move { socket.wait_connected().await })
        };

        let (dialed, _accepted) = tokio::join!(socket.dial(), listener.accept());
        dialed.unwrap();
        assert!(timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap());
    }
}
