//! Protocol pieces shared by the server, the relay proxies and the clients:
//! identifiers, wrapping ticks, the component and message catalogs, the wire
//! codec, the framed socket and the deterministic movement step that both
//! sides of the prediction loop must agree on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod codec;
pub mod components;
pub mod config;
pub mod framing;
pub mod messages;
pub mod movement;
pub mod shutdown;
pub mod store;
pub mod tick;
pub mod transport;

pub use codec::{Codec, CodecError, Registry, RegistryError};
pub use components::{Body, Collider, Component, ComponentKind, ComponentType, Input, Position, Speech};
pub use messages::{
    ClientLogin, ClientLoginResp, ClientLogout, ClientLogoutResp, Message, MessageKind,
    WorldData, WorldUpdate,
};
pub use config::{ConfigError, NetFlags};
pub use movement::move_character;
pub use shutdown::Shutdown;
pub use store::{EntityStore, World};
pub use tick::{PlayerTick, Tick};
pub use transport::{Endpoint, EndpointError, Listener, NetError, Socket};

/// Largest payload a single frame may carry.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Fixed simulation step shared by client prediction and server authority.
pub const FIXED_TIMESTEP: Duration = Duration::from_nanos(16_666_667);

/// Simulation steps per sent broadcast unless configured otherwise.
pub const DEFAULT_NETWORK_TICK_DIVIDER: u16 = 4;

/// Delay between reconnect attempts of a supervised socket.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Movement speed in world units per second.
pub const PLAYER_SPEED: f32 = 125.0;

/// Where freshly logged-in players appear.
pub const SPAWN_POSITION: Position = Position { x: 100.0, y: 100.0 };

/// Server-allocated identifier of a replicated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Sentinel meaning "no entity".
    pub const INVALID: EntityId = EntityId(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Proxy-assigned identifier of a login session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct UserId(pub u64);

impl UserId {
    /// Value carried by messages after the relay strips the user id.
    pub const CLEARED: UserId = UserId(0);
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_entity_id() {
        assert!(!EntityId::INVALID.is_valid());
        assert!(EntityId(42).is_valid());
        assert_eq!(EntityId::default(), EntityId::INVALID);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(EntityId(7).to_string(), "e7");
        assert_eq!(UserId(9).to_string(), "u9");
    }

    #[test]
    fn test_fixed_timestep_is_sixty_hertz() {
        let hz = 1.0 / FIXED_TIMESTEP.as_secs_f64();
        assert!((hz - 60.0).abs() < 0.01);
    }
}
