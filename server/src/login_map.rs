//! Login bindings between users, their entities and their relay proxies
//!
//! Every logged-in user is bound to:
//! - the entity the server spawned for it
//! - the proxy connection its traffic arrives on and broadcasts go back to
//! - the newest input tick (PlayerTick) the server has applied for it
//!
//! The map is shared as `Arc<RwLock<LoginMap>>`; all mutation happens under
//! the write lock.

use shared::tick::{tick_greater_than, PlayerTick};
use shared::{EntityId, UserId};
use std::collections::HashMap;
use std::fmt;

/// Server-local identifier of an accepted proxy connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(pub u64);

impl fmt::Display for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy-{}", self.0)
    }
}

/// A single user binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Login {
    /// Entity controlled by this user
    pub entity: EntityId,
    /// Proxy connection currently relaying this user
    pub proxy: ProxyId,
    /// Newest PlayerTick applied, echoed back in broadcasts as the ack
    pub last_player_tick: PlayerTick,
    /// Whether any input has been acknowledged yet
    acked: bool,
}

/// Maps logged-in users to their bindings
#[derive(Debug, Default)]
pub struct LoginMap {
    logins: HashMap<UserId, Login>,
}

impl LoginMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a user to a freshly spawned entity
    ///
    /// Returns the previous binding if the user was already known; callers
    /// are expected to try [`LoginMap::rebind`] first.
    pub fn bind(&mut self, user: UserId, entity: EntityId, proxy: ProxyId) -> Option<Login> {
        self.logins.insert(
            user,
            Login {
                entity,
                proxy,
                last_player_tick: 0,
                acked: false,
            },
        )
    }

    /// Moves an existing binding to `proxy`
    ///
    /// Used when a proxy replays its roster after reconnecting. Returns the
    /// user's entity, or None if the user has no binding yet.
    pub fn rebind(&mut self, user: UserId, proxy: ProxyId) -> Option<EntityId> {
        let login = self.logins.get_mut(&user)?;
        login.proxy = proxy;
        Some(login.entity)
    }

    pub fn unbind(&mut self, user: UserId) -> Option<Login> {
        self.logins.remove(&user)
    }

    pub fn get(&self, user: UserId) -> Option<&Login> {
        self.logins.get(&user)
    }

    /// Records an applied input tick
    ///
    /// The watermark only moves forward in wrapping order; a stale or
    /// duplicate tick is ignored and false is returned.
    pub fn record_ack(&mut self, user: UserId, player_tick: PlayerTick) -> bool {
        let Some(login) = self.logins.get_mut(&user) else {
            return false;
        };

        if login.acked && !tick_greater_than(player_tick, login.last_player_tick) {
            return false;
        }

        login.last_player_tick = player_tick;
        login.acked = true;
        true
    }

    /// Snapshot of every binding, ordered by user id
    pub fn logins(&self) -> Vec<(UserId, Login)> {
        let mut logins: Vec<(UserId, Login)> =
            self.logins.iter().map(|(user, login)| (*user, *login)).collect();
        logins.sort_by_key(|(user, _)| *user);
        logins
    }

    /// Users currently relayed through `proxy`
    pub fn users_on(&self, proxy: ProxyId) -> Vec<UserId> {
        let mut users: Vec<UserId> = self
            .logins
            .iter()
            .filter(|(_, login)| login.proxy == proxy)
            .map(|(user, _)| *user)
            .collect();
        users.sort();
        users
    }

    pub fn len(&self) -> usize {
        self.logins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logins.is_empty()
    }
}
