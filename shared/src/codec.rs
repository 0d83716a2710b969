//! Tagged-union wire codec.
//!
//! Every message is encoded as a one byte tag followed by its bincode
//! payload. The tag is the position of the message kind in the message
//! [`Registry`]; components inside a [`WorldUpdate`] are tagged the same way
//! through the component registry. Both ends must build their registries
//! from the same ordered lists.

use crate::components::{Component, ComponentKind};
use crate::messages::{Message, MessageKind, WorldData, WorldUpdate};
use crate::{EntityId, UserId};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::mem;

/// Errors produced while encoding or decoding a message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value's type is missing from this codec's registry.
    #[error("type {0} is not registered")]
    UnknownType(String),

    /// The tag read from the wire does not map to a registered type.
    #[error("unknown tag {0}")]
    UnknownTag(u8),

    #[error("empty message")]
    Empty,

    #[error("malformed payload: {0}")]
    Payload(#[from] bincode::Error),

    /// The encoded message does not fit in a single frame.
    #[error("encoded size {size} exceeds the frame limit of {max}")]
    TooLarge { size: usize, max: usize },
}

/// Errors detected while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("type {0} registered twice")]
    Duplicate(String),

    #[error("{count} types exceed the registry capacity of 256")]
    Overflow { count: usize },
}

/// Order-stable table mapping kinds to one byte wire tags.
#[derive(Debug, Clone)]
pub struct Registry<K> {
    kinds: Vec<K>,
}

impl<K> Registry<K> {
    /// Maximum number of distinct types a one byte tag can address.
    pub const CAPACITY: usize = 256;

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl<K: Copy + Eq + Debug> Registry<K> {
    /// Builds a registry where each kind's tag is its index in `kinds`.
    pub fn new(kinds: &[K]) -> Result<Self, RegistryError> {
        if kinds.len() > Self::CAPACITY {
            return Err(RegistryError::Overflow { count: kinds.len() });
        }

        for (index, kind) in kinds.iter().enumerate() {
            if kinds[..index].contains(kind) {
                return Err(RegistryError::Duplicate(format!("{:?}", kind)));
            }
        }

        Ok(Self {
            kinds: kinds.to_vec(),
        })
    }

    pub fn tag_of(&self, kind: K) -> Option<u8> {
        self.kinds
            .iter()
            .position(|k| *k == kind)
            .and_then(|index| u8::try_from(index).ok())
    }

    pub fn kind_of(&self, tag: u8) -> Option<K> {
        self.kinds.get(usize::from(tag)).copied()
    }
}

/// `WorldUpdate` as laid out on the wire: entity keys reduced to `u32` and
/// each component pre-encoded as a tagged blob.
#[derive(Serialize, Deserialize)]
struct WireWorldUpdate {
    tick: u16,
    player_tick: u16,
    user_id: u64,
    world_data: Vec<(u32, Vec<Vec<u8>>)>,
    delete: Vec<u32>,
}

/// Encoder/decoder for the message and component catalogs.
#[derive(Debug, Clone)]
pub struct Codec {
    messages: Registry<MessageKind>,
    components: Registry<ComponentKind>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::standard()
    }
}

impl Codec {
    pub fn new(messages: Registry<MessageKind>, components: Registry<ComponentKind>) -> Self {
        Self {
            messages,
            components,
        }
    }

    /// Codec over the full catalogs in their canonical order.
    pub fn standard() -> Self {
        Self {
            messages: Registry {
                kinds: MessageKind::ALL.to_vec(),
            },
            components: Registry {
                kinds: ComponentKind::ALL.to_vec(),
            },
        }
    }

    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, CodecError> {
        let tag = self
            .messages
            .tag_of(message.kind())
            .ok_or_else(|| CodecError::UnknownType(format!("{:?}", message.kind())))?;

        let mut out = Vec::with_capacity(64);
        out.push(tag);

        match message {
            Message::ClientLogin(m) => bincode::serialize_into(&mut out, m)?,
            Message::ClientLoginResp(m) => bincode::serialize_into(&mut out, m)?,
            Message::ClientLogout(m) => bincode::serialize_into(&mut out, m)?,
            Message::ClientLogoutResp(m) => bincode::serialize_into(&mut out, m)?,
            Message::WorldUpdate(m) => {
                let wire = self.world_update_to_wire(m)?;
                bincode::serialize_into(&mut out, &wire)?;
            }
        }

        Ok(out)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Message, CodecError> {
        let (&tag, payload) = bytes.split_first().ok_or(CodecError::Empty)?;
        let kind = self
            .messages
            .kind_of(tag)
            .ok_or(CodecError::UnknownTag(tag))?;

        let message = match kind {
            MessageKind::ClientLogin => Message::ClientLogin(bincode::deserialize(payload)?),
            MessageKind::ClientLoginResp => Message::ClientLoginResp(bincode::deserialize(payload)?),
            MessageKind::ClientLogout => Message::ClientLogout(bincode::deserialize(payload)?),
            MessageKind::ClientLogoutResp => {
                Message::ClientLogoutResp(bincode::deserialize(payload)?)
            }
            MessageKind::WorldUpdate => {
                let wire: WireWorldUpdate = bincode::deserialize(payload)?;
                Message::WorldUpdate(self.world_update_from_wire(wire)?)
            }
        };

        Ok(message)
    }

    /// Splits `update` into parts that each encode to at most `max_size`
    /// bytes.
    ///
    /// Every part keeps the tick, player tick and user id of `update`.
    /// Deletions are packed first so they go out with the first part. An
    /// entity too large for a frame of its own is left out with a warning.
    /// An update with nothing to carry still yields one part.
    pub fn split_world_update(
        &self,
        update: WorldUpdate,
        max_size: usize,
    ) -> Result<Vec<WorldUpdate>, CodecError> {
        let header = WorldUpdate {
            tick: update.tick,
            player_tick: update.player_tick,
            user_id: update.user_id,
            ..Default::default()
        };
        let base = self.encode(&Message::WorldUpdate(header.clone()))?.len();
        let delete_cost = bincode::serialized_size(&0u32)? as usize;

        let mut parts = Vec::new();
        let mut current = header.clone();
        let mut size = base;

        for entity in update.delete {
            if size + delete_cost > max_size && !current.delete.is_empty() {
                parts.push(mem::replace(&mut current, header.clone()));
                size = base;
            }
            current.delete.push(entity);
            size += delete_cost;
        }

        for (entity, components) in update.world_data {
            let blobs = components
                .iter()
                .map(|component| self.encode_component(component))
                .collect::<Result<Vec<_>, _>>()?;
            let cost = bincode::serialized_size(&(entity.0, &blobs))? as usize;

            if base + cost > max_size {
                warn!("{} needs {} bytes and does not fit in a frame, leaving it out", entity, base + cost);
                continue;
            }
            if size + cost > max_size {
                parts.push(mem::replace(&mut current, header.clone()));
                size = base;
            }
            current.world_data.insert(entity, components);
            size += cost;
        }

        if parts.is_empty() || !current.delete.is_empty() || !current.world_data.is_empty() {
            parts.push(current);
        }
        Ok(parts)
    }

    fn world_update_to_wire(&self, update: &WorldUpdate) -> Result<WireWorldUpdate, CodecError> {
        let mut world_data = Vec::with_capacity(update.world_data.len());
        for (entity, components) in &update.world_data {
            let blobs = components
                .iter()
                .map(|component| self.encode_component(component))
                .collect::<Result<Vec<_>, _>>()?;
            world_data.push((entity.0, blobs));
        }

        Ok(WireWorldUpdate {
            tick: update.tick,
            player_tick: update.player_tick,
            user_id: update.user_id.0,
            world_data,
            delete: update.delete.iter().map(|id| id.0).collect(),
        })
    }

    fn world_update_from_wire(&self, wire: WireWorldUpdate) -> Result<WorldUpdate, CodecError> {
        let mut world_data = WorldData::new();
        for (entity, blobs) in wire.world_data {
            let mut components = Vec::with_capacity(blobs.len());
            for blob in &blobs {
                if let Some(component) = self.decode_component(entity, blob)? {
                    components.push(component);
                }
            }
            world_data.insert(EntityId(entity), components);
        }

        Ok(WorldUpdate {
            tick: wire.tick,
            player_tick: wire.player_tick,
            user_id: UserId(wire.user_id),
            world_data,
            delete: wire.delete.into_iter().map(EntityId).collect(),
        })
    }

    fn encode_component(&self, component: &Component) -> Result<Vec<u8>, CodecError> {
        let tag = self
            .components
            .tag_of(component.kind())
            .ok_or_else(|| CodecError::UnknownType(format!("{:?}", component.kind())))?;

        let mut out = vec![tag];
        match component {
            Component::Position(v) => bincode::serialize_into(&mut out, v)?,
            Component::Input(v) => bincode::serialize_into(&mut out, v)?,
            Component::Body(v) => bincode::serialize_into(&mut out, v)?,
            Component::Speech(v) => bincode::serialize_into(&mut out, v)?,
            Component::Collider(v) => bincode::serialize_into(&mut out, v)?,
        }
        Ok(out)
    }

    /// Unknown component tags fail the whole message; a known tag with a
    /// corrupt payload only drops that component.
    fn decode_component(&self, entity: u32, blob: &[u8]) -> Result<Option<Component>, CodecError> {
        let Some((&tag, payload)) = blob.split_first() else {
            warn!("Skipping empty component blob on entity {}", entity);
            return Ok(None);
        };
        let kind = self
            .components
            .kind_of(tag)
            .ok_or(CodecError::UnknownTag(tag))?;

        let decoded = match kind {
            ComponentKind::Position => bincode::deserialize(payload).map(Component::Position),
            ComponentKind::Input => bincode::deserialize(payload).map(Component::Input),
            ComponentKind::Body => bincode::deserialize(payload).map(Component::Body),
            ComponentKind::Speech => bincode::deserialize(payload).map(Component::Speech),
            ComponentKind::Collider => bincode::deserialize(payload).map(Component::Collider),
        };

        match decoded {
            Ok(component) => Ok(Some(component)),
            Err(e) => {
                warn!("Skipping undecodable {:?} on entity {}: {}", kind, entity, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Body, Collider, Input, Position, Speech};
    use crate::messages::{ClientLogin, ClientLoginResp, ClientLogout, ClientLogoutResp};
    use crate::MAX_MESSAGE_SIZE;

    fn sample_update(tick: u16, player_tick: u16) -> WorldUpdate {
        let mut update = WorldUpdate {
            tick,
            player_tick,
            user_id: UserId(99),
            ..Default::default()
        };
        update.world_data.insert(
            EntityId(42),
            vec![
                Component::Position(Position::new(100.0, -25.5)),
                Component::Input(Input { left: true, up: true, ..Default::default() }),
                Component::Body(Body { rgba: 0x11223344 }),
                Component::Speech(Speech { text: "gg".to_string() }),
                Component::Collider(Collider { radius: 8.0 }),
            ],
        );
        update.world_data.insert(EntityId(7), Vec::new());
        update.delete = vec![EntityId(3), EntityId(4)];
        update
    }

    #[test]
    fn test_standard_catalogs_are_valid() {
        assert!(Registry::new(&MessageKind::ALL).is_ok());
        assert!(Registry::new(&ComponentKind::ALL).is_ok());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let result = Registry::new(&[MessageKind::ClientLogin, MessageKind::ClientLogin]);
        assert!(matches!(result, Err(RegistryError::Duplicate(_))));
    }

    #[test]
    fn test_registry_rejects_overflow() {
        let kinds: Vec<u16> = (0..300).collect();
        let result = Registry::new(&kinds);
        assert_eq!(result.unwrap_err(), RegistryError::Overflow { count: 300 });

        let kinds: Vec<u16> = (0..256).collect();
        let registry = Registry::new(&kinds).unwrap();
        assert_eq!(registry.tag_of(255), Some(255));
    }

    #[test]
    fn test_tag_follows_registration_order() {
        let codec = Codec::standard();
        let bytes = codec
            .encode(&Message::from(ClientLogout { user_id: UserId(1) }))
            .unwrap();
        assert_eq!(bytes[0], 2);

        let bytes = codec.encode(&Message::from(WorldUpdate::default())).unwrap();
        assert_eq!(bytes[0], 4);
    }

    #[test]
    fn test_roundtrip_all_messages() {
        let codec = Codec::standard();
        let messages = vec![
            Message::from(ClientLogin { user_id: UserId(7) }),
            Message::from(ClientLoginResp { user_id: UserId(7), entity_id: EntityId(42) }),
            Message::from(ClientLogout { user_id: UserId(u64::MAX) }),
            Message::from(ClientLogoutResp { user_id: UserId(7), entity_id: EntityId(42) }),
            Message::from(sample_update(12, 34)),
        ];

        for message in messages {
            let bytes = codec.encode(&message).unwrap();
            let decoded = codec.decode(&bytes).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_roundtrip_tick_boundaries() {
        let codec = Codec::standard();
        for tick in [0u16, 1, 65534, 65535] {
            let message = Message::from(sample_update(tick, tick));
            let decoded = codec.decode(&codec.encode(&message).unwrap()).unwrap();
            match decoded {
                Message::WorldUpdate(update) => {
                    assert_eq!(update.tick, tick);
                    assert_eq!(update.player_tick, tick);
                }
                other => panic!("Unexpected message {:?}", other),
            }
        }
    }

    #[test]
    fn test_encode_unregistered_message_type() {
        let messages = Registry::new(&[MessageKind::ClientLogin]).unwrap();
        let components = Registry::new(&ComponentKind::ALL).unwrap();
        let codec = Codec::new(messages, components);

        let result = codec.encode(&Message::from(WorldUpdate::default()));
        assert!(matches!(result, Err(CodecError::UnknownType(_))));
    }

    #[test]
    fn test_encode_unregistered_component_type() {
        let messages = Registry::new(&MessageKind::ALL).unwrap();
        let components = Registry::new(&[ComponentKind::Position]).unwrap();
        let codec = Codec::new(messages, components);

        let result = codec.encode(&Message::from(sample_update(0, 0)));
        assert!(matches!(result, Err(CodecError::UnknownType(_))));
    }

    #[test]
    fn test_decode_unknown_message_tag() {
        let codec = Codec::standard();
        let result = codec.decode(&[200, 0, 0]);
        assert!(matches!(result, Err(CodecError::UnknownTag(200))));
    }

    #[test]
    fn test_decode_empty() {
        let codec = Codec::standard();
        assert!(matches!(codec.decode(&[]), Err(CodecError::Empty)));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let codec = Codec::standard();
        let bytes = codec
            .encode(&Message::from(ClientLoginResp { user_id: UserId(1), entity_id: EntityId(2) }))
            .unwrap();
        let result = codec.decode(&bytes[..bytes.len() - 2]);
        assert!(matches!(result, Err(CodecError::Payload(_))));
    }

    fn crowded_update(players: u32) -> WorldUpdate {
        let mut update = WorldUpdate {
            tick: 65535,
            player_tick: 17,
            user_id: UserId(5),
            delete: vec![EntityId(900), EntityId(901)],
            ..Default::default()
        };
        for id in 1..=players {
            update.world_data.insert(
                EntityId(id),
                vec![
                    Component::Input(Input::default()),
                    Component::Body(Body { rgba: id }),
                    Component::Speech(Speech { text: "hello there".to_string() }),
                    Component::Position(Position::new(100.0, 100.0)),
                    Component::Collider(Collider { radius: 16.0 }),
                ],
            );
        }
        update
    }

    #[test]
    fn test_split_keeps_every_part_within_limit() {
        let codec = Codec::standard();
        let update = crowded_update(60);
        assert!(codec.encode(&Message::from(update.clone())).unwrap().len() > MAX_MESSAGE_SIZE);

        let parts = codec.split_world_update(update.clone(), MAX_MESSAGE_SIZE).unwrap();
        assert!(parts.len() > 1);

        let mut entities = WorldData::new();
        for (index, part) in parts.iter().enumerate() {
            let bytes = codec.encode(&Message::from(part.clone())).unwrap();
            assert!(bytes.len() <= MAX_MESSAGE_SIZE);
            assert_eq!(part.tick, 65535);
            assert_eq!(part.player_tick, 17);
            assert_eq!(part.user_id, UserId(5));
            if index == 0 {
                assert_eq!(part.delete, update.delete);
            } else {
                assert!(part.delete.is_empty());
            }
            entities.extend(part.world_data.clone());
        }
        assert_eq!(entities, update.world_data);
    }

    #[test]
    fn test_split_small_update_is_unchanged() {
        let codec = Codec::standard();
        let update = sample_update(3, 4);
        let parts = codec.split_world_update(update.clone(), MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(parts, vec![update]);

        let empty = WorldUpdate { tick: 9, ..Default::default() };
        let parts = codec.split_world_update(empty.clone(), MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(parts, vec![empty]);
    }

    #[test]
    fn test_split_fills_parts_exactly() {
        let codec = Codec::standard();
        let parts = codec.split_world_update(crowded_update(60), 1024).unwrap();
        for part in &parts {
            assert!(codec.encode(&Message::from(part.clone())).unwrap().len() <= 1024);
        }
        let total: usize = parts.iter().map(|part| part.world_data.len()).sum();
        assert_eq!(total, 60);
    }

    #[test]
    fn test_split_leaves_out_entity_larger_than_a_frame() {
        let codec = Codec::standard();
        let mut update = crowded_update(2);
        update.world_data.insert(
            EntityId(77),
            vec![Component::Speech(Speech { text: "x".repeat(2 * MAX_MESSAGE_SIZE) })],
        );

        let parts = codec.split_world_update(update, MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(!parts[0].world_data.contains_key(&EntityId(77)));
        assert_eq!(parts[0].world_data.len(), 2);
    }

    #[test]
    fn test_corrupt_component_is_skipped() {
        let codec = Codec::standard();
        let position_tag = codec.components.tag_of(ComponentKind::Position).unwrap();
        let input_tag = codec.components.tag_of(ComponentKind::Input).unwrap();

        let mut input_blob = vec![input_tag];
        bincode::serialize_into(&mut input_blob, &Input { right: true, ..Default::default() })
            .unwrap();

        let wire = WireWorldUpdate {
            tick: 5,
            player_tick: 6,
            user_id: 0,
            world_data: vec![(42, vec![vec![position_tag, 1], input_blob])],
            delete: vec![],
        };
        let mut bytes = vec![codec.messages.tag_of(MessageKind::WorldUpdate).unwrap()];
        bincode::serialize_into(&mut bytes, &wire).unwrap();

        match codec.decode(&bytes).unwrap() {
            Message::WorldUpdate(update) => {
                let components = &update.world_data[&EntityId(42)];
                assert_eq!(components.len(), 1);
                assert_eq!(components[0].kind(), ComponentKind::Input);
            }
            other => panic!("Unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_unknown_component_tag_fails_message() {
        let codec = Codec::standard();
        let wire = WireWorldUpdate {
            tick: 0,
            player_tick: 0,
            user_id: 0,
            world_data: vec![(1, vec![vec![77, 0, 0]])],
            delete: vec![],
        };
        let mut bytes = vec![codec.messages.tag_of(MessageKind::WorldUpdate).unwrap()];
        bincode::serialize_into(&mut bytes, &wire).unwrap();

        assert!(matches!(codec.decode(&bytes), Err(CodecError::UnknownTag(77))));
    }
}
