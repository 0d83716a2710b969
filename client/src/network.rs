use crate::game::ClientGameState;
use crate::input::Wander;
use log::{debug, info, warn};
use shared::{
    Codec, Component, EndpointError, Input, Message, NetError, Shutdown, Socket, Speech,
    WorldData, WorldUpdate, DEFAULT_NETWORK_TICK_DIVIDER, FIXED_TIMESTEP, RECONNECT_DELAY,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Proxy endpoint to connect to
    pub proxy: String,
    /// Must match the server so interpolation windows line up
    pub network_tick_divider: u16,
    /// Stop after this many simulation steps; run until shutdown if unset
    pub steps: Option<u64>,
    /// Said once after every (re)connect
    pub say: Option<String>,
    /// Send idle input instead of wandering
    pub idle: bool,
    pub seed: u64,
    /// Steps between two status lines
    pub status_every: u64,
    pub reconnect_delay: Duration,
    pub inbound_queue: usize,
    /// Messages waiting for the connection writer
    pub outbound_queue: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy: "tcp://127.0.0.1:9001".to_string(),
            network_tick_divider: DEFAULT_NETWORK_TICK_DIVIDER,
            steps: None,
            say: None,
            idle: false,
            seed: 7,
            status_every: 60,
            reconnect_delay: RECONNECT_DELAY,
            inbound_queue: 64,
            outbound_queue: 64,
        }
    }
}

/// What the connection task hands to the simulation loop.
#[derive(Debug)]
enum Inbound {
    /// A new session started; outbound messages go through this queue.
    Connected(mpsc::Sender<Message>),
    Message(Message),
}

/// Headless client: a supervised connection feeding a fixed-step
/// prediction loop.
pub struct Client {
    socket: Arc<Socket>,
    config: ClientConfig,
    state: ClientGameState,
    wander: Wander,
    pending_speech: Option<String>,
    outbound: Option<mpsc::Sender<Message>>,
}

impl Client {
    pub fn new(config: ClientConfig, codec: Arc<Codec>) -> Result<Self, EndpointError> {
        let socket = Socket::new(&config.proxy, codec)?.with_reconnect_delay(config.reconnect_delay);

        Ok(Self {
            socket: Arc::new(socket),
            state: ClientGameState::new(config.network_tick_divider),
            wander: Wander::new(config.seed, 30),
            pending_speech: None,
            outbound: None,
            config,
        })
    }

    pub fn socket(&self) -> &Arc<Socket> {
        &self.socket
    }

    pub fn state(&self) -> &ClientGameState {
        &self.state
    }

    /// Runs until the step budget is spent or shutdown is triggered, then
    /// hands back the final game state.
    pub async fn run(mut self, shutdown: Shutdown) -> ClientGameState {
        let (inbound_tx, mut inbound_rx) = mpsc::channel(self.config.inbound_queue.max(1));

        let supervisor = {
            let socket = Arc::clone(&self.socket);
            let outbound_queue = self.config.outbound_queue.max(1);
            tokio::spawn(async move {
                socket
                    .supervise(move |socket| session(socket, inbound_tx.clone(), outbound_queue))
                    .await;
            })
        };

        let mut ticker = interval(FIXED_TIMESTEP);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut steps: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait() => break,
            }

            while let Ok(inbound) = inbound_rx.try_recv() {
                self.handle_inbound(inbound);
            }
            self.simulate(Instant::now());

            steps += 1;
            if self.config.status_every > 0 && steps % self.config.status_every == 0 {
                self.log_status();
            }
            if self.config.steps.map_or(false, |limit| steps >= limit) {
                break;
            }
        }

        self.outbound = None;
        self.socket.close().await;
        drop(inbound_rx);
        if let Err(e) = supervisor.await {
            warn!("Connection supervisor panicked: {}", e);
        }
        info!("Client stopped after {} steps", steps);
        self.state
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Connected(outbound) => {
                self.state.reset();
                self.pending_speech = self.config.say.clone();
                self.outbound = Some(outbound);
            }
            Inbound::Message(Message::ClientLoginResp(resp)) => {
                self.state.set_local_entity(resp.entity_id);
            }
            Inbound::Message(Message::WorldUpdate(update)) => {
                self.state.apply_world_update(update, Instant::now());
            }
            Inbound::Message(other) => debug!("Ignoring {:?}", other.kind()),
        }
    }

    /// One fixed step: sample input, predict, queue it for sending,
    /// interpolate. Never waits on the network.
    fn simulate(&mut self, now: Instant) {
        let input = if self.config.idle {
            Input::default()
        } else {
            self.wander.next_input()
        };
        let player_tick = self.state.record_input(input, now);

        if let Some(entity) = self.state.local_entity().filter(|_| self.outbound.is_some()) {
            let mut components = vec![Component::Input(input)];
            if let Some(text) = self.pending_speech.take() {
                components.push(Component::Speech(Speech { text }));
            }
            let update = WorldUpdate {
                player_tick,
                world_data: WorldData::from([(entity, components)]),
                ..Default::default()
            };
            self.queue(update.into());
        }

        self.state.step();
        self.state.render(FIXED_TIMESTEP);
    }

    fn queue(&mut self, message: Message) {
        let Some(outbound) = &self.outbound else {
            return;
        };
        match outbound.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                warn!("Outbound queue full, dropping {:?}", message.kind());
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Session ended, holding input until reconnect");
                self.outbound = None;
            }
        }
    }

    fn log_status(&self) {
        let indicator = if self.socket.is_connected() { "connected" } else { "offline" };
        match self.state.local_position() {
            Some(position) => info!(
                "[{}] tick {:?} at ({:.1}, {:.1}), {} entities, rtt {:?}",
                indicator,
                self.state.last_tick(),
                position.x,
                position.y,
                self.state.entity_count(),
                self.state.inputs().rtt()
            ),
            None => info!("[{}] waiting for login", indicator),
        }
    }
}

/// One connected session: a reader feeding the simulation loop and a
/// writer draining its outbound queue. Ends when either side stops.
async fn session(socket: Arc<Socket>, inbound: mpsc::Sender<Inbound>, outbound_queue: usize) {
    let (outbound_tx, outbound_rx) = mpsc::channel(outbound_queue);
    if inbound.send(Inbound::Connected(outbound_tx)).await.is_err() {
        return;
    }

    tokio::select! {
        _ = read_loop(&socket, &inbound) => {}
        _ = write_loop(&socket, outbound_rx) => {}
    }
}

async fn write_loop(socket: &Socket, mut outbound: mpsc::Receiver<Message>) {
    while let Some(message) = outbound.recv().await {
        match socket.send(&message).await {
            Ok(()) => {}
            Err(NetError::Serdes(e)) => warn!("Dropping unencodable {:?}: {}", message.kind(), e),
            Err(e) => {
                info!("Proxy connection ended: {}", e);
                return;
            }
        }
    }
}

async fn read_loop(socket: &Socket, inbound: &mpsc::Sender<Inbound>) {
    loop {
        match socket.recv().await {
            Ok(Some(message)) => {
                if inbound.send(Inbound::Message(message)).await.is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(NetError::Serdes(e)) => warn!("Malformed message from proxy: {}", e),
            Err(e) => {
                info!("Proxy connection ended: {}", e);
                return;
            }
        }
    }
}
