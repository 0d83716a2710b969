//! Relay loops between downstream clients and the upstream server.

use crate::filter::ChatFilter;
use crate::room::Room;
use log::{debug, info, warn};
use shared::{
    ClientLogin, ClientLogout, Codec, Component, EndpointError, Listener, Message, NetError,
    Shutdown, Socket, UserId, WorldUpdate, RECONNECT_DELAY,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub upstream: String,
    /// Idle time after which a silent client is dropped
    pub timeout: Duration,
    /// Longest a single downstream send may take
    pub send_timeout: Duration,
    pub reconnect_delay: Duration,
    pub banned_words: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream: "tcp://127.0.0.1:9000".to_string(),
            timeout: Duration::from_secs(60),
            send_timeout: Duration::from_secs(1),
            reconnect_delay: RECONNECT_DELAY,
            banned_words: Vec::new(),
        }
    }
}

pub struct Relay {
    room: Room<Arc<Socket>>,
    upstream: Arc<Socket>,
    filter: ChatFilter,
    config: ProxyConfig,
    shutdown: Shutdown,
}

impl Relay {
    pub fn new(
        config: ProxyConfig,
        codec: Arc<Codec>,
        shutdown: Shutdown,
    ) -> Result<Arc<Self>, EndpointError> {
        let upstream = Socket::new(&config.upstream, codec)?.with_reconnect_delay(config.reconnect_delay);

        Ok(Arc::new(Self {
            room: Room::new(),
            upstream: Arc::new(upstream),
            filter: ChatFilter::new(&config.banned_words),
            config,
            shutdown,
        }))
    }

    pub fn room(&self) -> &Room<Arc<Socket>> {
        &self.room
    }

    pub fn upstream(&self) -> &Arc<Socket> {
        &self.upstream
    }

    /// Supervises the upstream connection and accepts clients until shutdown.
    pub async fn serve(self: Arc<Self>, listener: Listener) {
        let supervisor = tokio::spawn(Arc::clone(&self).supervise_upstream());

        loop {
            let upstream_ready = tokio::select! {
                ready = self.upstream.wait_connected() => ready,
                _ = self.shutdown.wait() => false,
            };
            if !upstream_ready {
                break;
            }

            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = self.shutdown.wait() => break,
            };

            match accepted {
                Ok((socket, addr)) => {
                    let socket = Arc::new(socket);
                    if !self.upstream.is_connected() {
                        info!("Refusing {}: upstream is down", addr);
                        socket.close().await;
                        continue;
                    }
                    tokio::spawn(Arc::clone(&self).handle_connection(socket, addr));
                }
                Err(e) => {
                    warn!("Failed to accept client: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }

        self.upstream.close().await;
        if let Err(e) = supervisor.await {
            warn!("Upstream supervisor panicked: {}", e);
        }
        info!("Relay stopped");
    }

    /// Keeps the upstream connection alive, replaying the roster on every
    /// (re)connect before relaying server traffic.
    pub async fn supervise_upstream(self: Arc<Self>) {
        let closer = {
            let relay = Arc::clone(&self);
            tokio::spawn(async move {
                relay.shutdown.wait().await;
                relay.upstream.close().await;
            })
        };

        let relay = Arc::clone(&self);
        self.upstream
            .supervise(move |_| {
                let relay = Arc::clone(&relay);
                async move {
                    let replayed = relay.replay_logins().await;
                    if replayed > 0 {
                        info!("Replayed {} logins upstream", replayed);
                    }
                    relay.handle_game_updates().await;
                }
            })
            .await;

        closer.abort();
    }

    /// Sends a `ClientLogin` upstream for every user in the room.
    pub async fn replay_logins(&self) -> usize {
        let mut replayed = 0;
        for user in self.room.user_ids() {
            match self.upstream.send(&ClientLogin { user_id: user }.into()).await {
                Ok(()) => replayed += 1,
                Err(e) => {
                    warn!("Roster replay interrupted: {}", e);
                    break;
                }
            }
        }
        replayed
    }

    /// Serves one downstream client from login to logout.
    pub async fn handle_connection(self: Arc<Self>, socket: Arc<Socket>, addr: SocketAddr) {
        let user = self.room.next_user_id();
        if let Err(e) = self.room.insert(user, Arc::clone(&socket)) {
            warn!("Rejecting {}: {}", addr, e);
            socket.close().await;
            return;
        }
        info!("{} connected from {}", user, addr);

        if let Err(e) = self.upstream.send(&ClientLogin { user_id: user }.into()).await {
            warn!("Login for {} not delivered, relying on roster replay: {}", user, e);
        }

        tokio::select! {
            _ = self.read_loop(user, &socket) => {}
            _ = self.shutdown.wait() => {}
        }

        self.room.remove(user);
        socket.close().await;
        if let Err(e) = self.upstream.send(&ClientLogout { user_id: user }.into()).await {
            debug!("Logout for {} not delivered: {}", user, e);
        }
        info!("{} disconnected", user);
    }

    async fn read_loop(&self, user: UserId, socket: &Socket) {
        loop {
            let received = match timeout(self.config.timeout, socket.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    info!("{} timed out after {:?}", user, self.config.timeout);
                    return;
                }
            };

            match received {
                Ok(Some(Message::WorldUpdate(mut update))) => {
                    self.sanitize(&mut update);
                    update.user_id = user;
                    if let Err(e) = self.upstream.send(&update.into()).await {
                        debug!("Dropping update from {}: {}", user, e);
                    }
                }
                Ok(Some(other)) => {
                    warn!("Protocol violation from {}: unexpected {:?}", user, other.kind());
                    return;
                }
                Ok(None) => {}
                Err(NetError::Serdes(e)) => warn!("Malformed message from {}: {}", user, e),
                Err(e) => {
                    debug!("Connection of {} ended: {}", user, e);
                    return;
                }
            }
        }
    }

    fn sanitize(&self, update: &mut WorldUpdate) {
        for component in update.components_mut() {
            if let Component::Speech(speech) = component {
                speech.text = self.filter.filter(&speech.text);
            }
        }
    }

    /// Relays server traffic to the addressed users until upstream fails.
    pub async fn handle_game_updates(&self) {
        loop {
            match self.upstream.recv().await {
                Ok(Some(message)) => self.route(message).await,
                Ok(None) => {}
                Err(NetError::Serdes(e)) => warn!("Malformed message from upstream: {}", e),
                Err(e) => {
                    warn!("Upstream read failed: {}", e);
                    return;
                }
            }
        }
    }

    async fn route(&self, mut message: Message) {
        match &message {
            Message::WorldUpdate(_) | Message::ClientLoginResp(_) | Message::ClientLogoutResp(_) => {}
            other => {
                warn!("Ignoring unexpected {:?} from upstream", other.kind());
                return;
            }
        }

        let user = message.user_id();
        let Some(connection) = self.room.get(user) else {
            // The logout response already confirms this user is gone.
            if !matches!(message, Message::ClientLogoutResp(_)) {
                debug!("{} is not here anymore, logging it out", user);
                if let Err(e) = self.upstream.send(&ClientLogout { user_id: user }.into()).await {
                    debug!("Logout for {} not delivered: {}", user, e);
                }
            }
            return;
        };

        message.clear_user_id();
        match timeout(self.config.send_timeout, connection.send(&message)).await {
            Ok(Ok(())) => {}
            Ok(Err(NetError::Serdes(e))) => warn!("Dropping unencodable message for {}: {}", user, e),
            Ok(Err(e)) => {
                info!("Dropping {}: {}", user, e);
                connection.close().await;
            }
            Err(_) => {
                info!("Dropping {}: send timed out", user);
                connection.close().await;
            }
        }
    }
}
