//! Server network layer: proxy connections and the authoritative tick loop

use crate::game::GameState;
use crate::login_map::{LoginMap, ProxyId};
use log::{debug, error, info, warn};
use shared::{
    ClientLoginResp, ClientLogoutResp, Codec, Listener, Message, NetError, Shutdown, Socket,
    UserId, WorldUpdate, DEFAULT_NETWORK_TICK_DIVIDER, MAX_MESSAGE_SIZE,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

type ProxyMap = Arc<RwLock<HashMap<ProxyId, mpsc::Sender<Message>>>>;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub network_tick_divider: u16,
    pub tick_rate: u32,
    /// Capacity of the queue between proxy read loops and the tick loop
    pub command_queue: usize,
    /// Capacity of each proxy's outbound queue
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "tcp://127.0.0.1:9000".to_string(),
            network_tick_divider: DEFAULT_NETWORK_TICK_DIVIDER,
            tick_rate: 60,
            command_queue: 1000,
            outbound_queue: 1024,
        }
    }
}

/// Work handed from proxy read loops to the tick loop
#[derive(Debug)]
pub enum GameCommand {
    Login { user: UserId, proxy: ProxyId },
    Logout { user: UserId, proxy: ProxyId },
    Update { user: UserId, update: WorldUpdate },
}

/// Authoritative server accepting relay proxy connections
pub struct Server {
    listener: Listener,
    codec: Arc<Codec>,
    config: ServerConfig,
    proxies: ProxyMap,
    logins: Arc<RwLock<LoginMap>>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, NetError> {
        let codec = Arc::new(Codec::standard());
        let listener = Listener::bind(&config.bind, Arc::clone(&codec)).await?;
        info!("Server listening on {}", config.bind);

        Ok(Self {
            listener,
            codec,
            config,
            proxies: Arc::new(RwLock::new(HashMap::new())),
            logins: Arc::new(RwLock::new(LoginMap::new())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.listener.local_addr()
    }

    /// Runs the accept loop and the tick loop until `shutdown` fires
    pub async fn run(self, shutdown: Shutdown) -> Result<(), NetError> {
        let Server {
            listener,
            codec,
            config,
            proxies,
            logins,
        } = self;

        let (cmd_tx, cmd_rx) = mpsc::channel::<GameCommand>(config.command_queue.max(1));

        let accept_handle = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&proxies),
            Arc::clone(&logins),
            cmd_tx,
            config.outbound_queue.max(1),
            shutdown.clone(),
        ));

        let mut tick_loop = TickLoop {
            game: GameState::new(config.network_tick_divider),
            codec,
            proxies,
            logins,
            commands: cmd_rx,
        };
        tick_loop.run(config.tick_rate, &shutdown).await;

        shutdown.trigger();
        if let Err(e) = accept_handle.await {
            error!("Accept loop panicked: {}", e);
        }
        info!("Server stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: Listener,
    proxies: ProxyMap,
    logins: Arc<RwLock<LoginMap>>,
    commands: mpsc::Sender<GameCommand>,
    outbound_queue: usize,
    shutdown: Shutdown,
) {
    let next_id = AtomicU64::new(1);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown.wait() => break,
        };

        match accepted {
            Ok((socket, addr)) => {
                let proxy = ProxyId(next_id.fetch_add(1, Ordering::Relaxed));
                info!("{} connected from {}", proxy, addr);

                tokio::spawn(handle_proxy(
                    proxy,
                    Arc::new(socket),
                    Arc::clone(&proxies),
                    Arc::clone(&logins),
                    commands.clone(),
                    outbound_queue,
                    shutdown.clone(),
                ));
            }
            Err(e) => {
                warn!("Failed to accept proxy connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Serves one proxy connection: an outbound writer task plus this read loop
async fn handle_proxy(
    proxy: ProxyId,
    socket: Arc<Socket>,
    proxies: ProxyMap,
    logins: Arc<RwLock<LoginMap>>,
    commands: mpsc::Sender<GameCommand>,
    outbound_queue: usize,
    shutdown: Shutdown,
) {
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(outbound_queue);
    proxies.write().await.insert(proxy, out_tx);

    let writer = {
        let socket = Arc::clone(&socket);
        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                match socket.send(&message).await {
                    Ok(()) => {}
                    // Includes messages too large for a frame; the link stays up.
                    Err(NetError::Serdes(e)) => warn!("Dropping unencodable message for {}: {}", proxy, e),
                    Err(e) => {
                        warn!("Send to {} failed: {}", proxy, e);
                        socket.close().await;
                        break;
                    }
                }
            }
        })
    };

    loop {
        let received = tokio::select! {
            received = socket.recv() => received,
            _ = shutdown.wait() => break,
        };

        let command = match received {
            Ok(Some(Message::ClientLogin(login))) => GameCommand::Login {
                user: login.user_id,
                proxy,
            },
            Ok(Some(Message::ClientLogout(logout))) => GameCommand::Logout {
                user: logout.user_id,
                proxy,
            },
            Ok(Some(Message::WorldUpdate(mut update))) => {
                update.retain_trusted();
                GameCommand::Update {
                    user: update.user_id,
                    update,
                }
            }
            Ok(Some(other)) => {
                warn!("Ignoring unexpected {:?} from {}", other.kind(), proxy);
                continue;
            }
            Ok(None) => continue,
            Err(NetError::Serdes(e)) => {
                warn!("Malformed message from {}: {}", proxy, e);
                continue;
            }
            Err(e) => {
                info!("{} disconnected: {}", proxy, e);
                break;
            }
        };

        if commands.send(command).await.is_err() {
            debug!("Tick loop gone, closing {}", proxy);
            break;
        }
    }

    proxies.write().await.remove(&proxy);
    socket.close().await;
    writer.abort();

    let orphaned = logins.read().await.users_on(proxy).len();
    if orphaned > 0 {
        info!("{} dropped with {} users bound, releasing at next broadcast", proxy, orphaned);
    }
}

/// The single task that owns and mutates the world
struct TickLoop {
    game: GameState,
    codec: Arc<Codec>,
    proxies: ProxyMap,
    logins: Arc<RwLock<LoginMap>>,
    commands: mpsc::Receiver<GameCommand>,
}

impl TickLoop {
    async fn run(&mut self, tick_rate: u32, shutdown: &Shutdown) {
        let step = Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1)));
        let dt = step.as_secs_f32();
        let mut interval_timer = interval(step);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Tick loop started: {} Hz, broadcast every {} steps",
            tick_rate,
            self.game.divider()
        );

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {}
                _ = shutdown.wait() => break,
            }

            while let Ok(command) = self.commands.try_recv() {
                self.handle_command(command).await;
            }

            self.game.step(dt);

            if let Some(tick) = self.game.advance() {
                self.broadcast(tick).await;
            }
        }
    }

    async fn handle_command(&mut self, command: GameCommand) {
        match command {
            GameCommand::Login { user, proxy } => {
                let entity = {
                    let mut logins = self.logins.write().await;
                    match logins.rebind(user, proxy) {
                        Some(entity) => {
                            info!("{} re-bound to {} with {}", user, proxy, entity);
                            entity
                        }
                        None => {
                            let entity = self.game.spawn_player();
                            logins.bind(user, entity, proxy);
                            info!("{} logged in via {} as {}", user, proxy, entity);
                            entity
                        }
                    }
                };

                self.send_to(
                    proxy,
                    ClientLoginResp {
                        user_id: user,
                        entity_id: entity,
                    }
                    .into(),
                )
                .await;
            }

            GameCommand::Logout { user, proxy } => {
                let login = self.logins.write().await.unbind(user);
                match login {
                    Some(login) => {
                        self.game.despawn(login.entity);
                        info!("{} logged out, releasing {}", user, login.entity);
                        self.send_to(
                            proxy,
                            ClientLogoutResp {
                                user_id: user,
                                entity_id: login.entity,
                            }
                            .into(),
                        )
                        .await;
                    }
                    None => debug!("Logout for unknown {}", user),
                }
            }

            GameCommand::Update { user, update } => {
                let mut logins = self.logins.write().await;
                let Some(login) = logins.get(user).copied() else {
                    warn!("Dropping update from unknown {}", user);
                    return;
                };

                // Entity keys come from the client; only its own entity is writable.
                let components = update.world_data.into_values().flatten().collect();
                if self.game.apply_trusted(login.entity, components) {
                    logins.record_ack(user, update.player_tick);
                }
            }
        }
    }

    /// Queues a message on a proxy's writer; returns false if the proxy is gone
    async fn send_to(&self, proxy: ProxyId, message: Message) -> bool {
        let proxies = self.proxies.read().await;
        let Some(sender) = proxies.get(&proxy) else {
            debug!("No connection for {}, dropping {:?}", proxy, message.kind());
            return false;
        };

        match sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!("Outbound queue of {} full, dropping {:?}", proxy, message.kind());
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    async fn broadcast(&mut self, tick: shared::Tick) {
        let snapshot = WorldUpdate {
            tick,
            delete: self.game.flush_deletes(),
            world_data: self.game.snapshot(),
            ..Default::default()
        };
        let entities = snapshot.world_data.len();

        // Ack and user id have a fixed encoded width, so one split serves
        // every user.
        let parts = match self.codec.split_world_update(snapshot, MAX_MESSAGE_SIZE) {
            Ok(parts) => parts,
            Err(e) => {
                error!("Snapshot for tick {} cannot be encoded: {}", tick, e);
                return;
            }
        };
        let logins = self.logins.read().await.logins();

        let mut orphaned = Vec::new();
        for (user, login) in logins {
            for part in &parts {
                let update = WorldUpdate {
                    player_tick: login.last_player_tick,
                    user_id: user,
                    ..part.clone()
                };
                if !self.send_to(login.proxy, update.into()).await {
                    orphaned.push(user);
                    break;
                }
            }
        }

        if !orphaned.is_empty() {
            let mut logins = self.logins.write().await;
            for user in orphaned {
                if let Some(login) = logins.unbind(user) {
                    info!("{} lost its proxy, releasing {}", user, login.entity);
                    self.game.despawn(login.entity);
                }
            }
        }

        if tick % 60 == 0 {
            debug!(
                "Tick {}: {} entities in {} parts, {} users",
                tick,
                entities,
                parts.len(),
                self.logins.read().await.len()
            );
        }
    }
}
