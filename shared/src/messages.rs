//! Messages exchanged between clients, relay proxies and the server.

use crate::components::Component;
use crate::tick::{PlayerTick, Tick};
use crate::{EntityId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-entity component lists carried by a [`WorldUpdate`].
pub type WorldData = BTreeMap<EntityId, Vec<Component>>;

/// Sent upstream by a proxy when a user connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLogin {
    pub user_id: UserId,
}

/// Server answer binding a user to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLoginResp {
    pub user_id: UserId,
    pub entity_id: EntityId,
}

/// Sent upstream by a proxy when a user goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLogout {
    pub user_id: UserId,
}

/// Server confirmation that a user's entity was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLogoutResp {
    pub user_id: UserId,
    pub entity_id: EntityId,
}

/// State propagation in both directions.
///
/// Client to server it carries the client's input for `player_tick`;
/// server to client it is a snapshot at `tick` acknowledging `player_tick`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldUpdate {
    pub tick: Tick,
    pub player_tick: PlayerTick,
    pub user_id: UserId,
    pub world_data: WorldData,
    pub delete: Vec<EntityId>,
}

impl WorldUpdate {
    /// Drops every component a client is not allowed to push.
    pub fn retain_trusted(&mut self) {
        for components in self.world_data.values_mut() {
            components.retain(Component::is_client_trusted);
        }
        self.world_data.retain(|_, components| !components.is_empty());
    }

    /// All components across every entity, in entity order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.world_data.values().flatten()
    }

    pub fn components_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.world_data.values_mut().flatten()
    }
}

/// Discriminant of a [`Message`], used as registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ClientLogin,
    ClientLoginResp,
    ClientLogout,
    ClientLogoutResp,
    WorldUpdate,
}

impl MessageKind {
    /// Registration order of the message catalog.
    pub const ALL: [MessageKind; 5] = [
        MessageKind::ClientLogin,
        MessageKind::ClientLoginResp,
        MessageKind::ClientLogout,
        MessageKind::ClientLogoutResp,
        MessageKind::WorldUpdate,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ClientLogin(ClientLogin),
    ClientLoginResp(ClientLoginResp),
    ClientLogout(ClientLogout),
    ClientLogoutResp(ClientLogoutResp),
    WorldUpdate(WorldUpdate),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::ClientLogin(_) => MessageKind::ClientLogin,
            Message::ClientLoginResp(_) => MessageKind::ClientLoginResp,
            Message::ClientLogout(_) => MessageKind::ClientLogout,
            Message::ClientLogoutResp(_) => MessageKind::ClientLogoutResp,
            Message::WorldUpdate(_) => MessageKind::WorldUpdate,
        }
    }

    /// The user this message is about or addressed to.
    pub fn user_id(&self) -> UserId {
        match self {
            Message::ClientLogin(m) => m.user_id,
            Message::ClientLoginResp(m) => m.user_id,
            Message::ClientLogout(m) => m.user_id,
            Message::ClientLogoutResp(m) => m.user_id,
            Message::WorldUpdate(m) => m.user_id,
        }
    }

    /// Hides the user id before a message leaves the relay for a client.
    pub fn clear_user_id(&mut self) {
        let user_id = match self {
            Message::ClientLogin(m) => &mut m.user_id,
            Message::ClientLoginResp(m) => &mut m.user_id,
            Message::ClientLogout(m) => &mut m.user_id,
            Message::ClientLogoutResp(m) => &mut m.user_id,
            Message::WorldUpdate(m) => &mut m.user_id,
        };
        *user_id = UserId::CLEARED;
    }
}

impl From<ClientLogin> for Message {
    fn from(m: ClientLogin) -> Self {
        Message::ClientLogin(m)
    }
}

impl From<ClientLoginResp> for Message {
    fn from(m: ClientLoginResp) -> Self {
        Message::ClientLoginResp(m)
    }
}

impl From<ClientLogout> for Message {
    fn from(m: ClientLogout) -> Self {
        Message::ClientLogout(m)
    }
}

impl From<ClientLogoutResp> for Message {
    fn from(m: ClientLogoutResp) -> Self {
        Message::ClientLogoutResp(m)
    }
}

impl From<WorldUpdate> for Message {
    fn from(m: WorldUpdate) -> Self {
        Message::WorldUpdate(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Body, Input, Position, Speech};

    #[test]
    fn test_retain_trusted_strips_position() {
        let mut update = WorldUpdate::default();
        update.world_data.insert(
            EntityId(3),
            vec![
                Component::Position(Position::new(999.0, 999.0)),
                Component::Input(Input { up: true, ..Default::default() }),
                Component::Speech(Speech { text: "hello".to_string() }),
            ],
        );
        update
            .world_data
            .insert(EntityId(4), vec![Component::Body(Body { rgba: 1 })]);

        update.retain_trusted();

        assert_eq!(update.world_data.len(), 1);
        let kept = &update.world_data[&EntityId(3)];
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(Component::is_client_trusted));
    }

    #[test]
    fn test_clear_user_id() {
        let mut messages = vec![
            Message::from(ClientLogin { user_id: UserId(7) }),
            Message::from(ClientLoginResp { user_id: UserId(7), entity_id: EntityId(42) }),
            Message::from(ClientLogout { user_id: UserId(7) }),
            Message::from(ClientLogoutResp { user_id: UserId(7), entity_id: EntityId(42) }),
            Message::from(WorldUpdate { user_id: UserId(7), ..Default::default() }),
        ];

        for message in &mut messages {
            assert_eq!(message.user_id(), UserId(7));
            message.clear_user_id();
            assert_eq!(message.user_id(), UserId::CLEARED);
        }
    }

    #[test]
    fn test_kind_order_matches_catalog() {
        let kinds = [
            Message::from(ClientLogin { user_id: UserId(1) }).kind(),
            Message::from(ClientLoginResp { user_id: UserId(1), entity_id: EntityId(1) }).kind(),
            Message::from(ClientLogout { user_id: UserId(1) }).kind(),
            Message::from(ClientLogoutResp { user_id: UserId(1), entity_id: EntityId(1) }).kind(),
            Message::from(WorldUpdate::default()).kind(),
        ];
        assert_eq!(kinds, MessageKind::ALL);
    }
}
