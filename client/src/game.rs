//! Client-side view of the replicated world.
//!
//! Remote entities are interpolated between buffered authoritative samples.
//! The local player is predicted: every input moves its target immediately,
//! and every authoritative sample is reconciled by replaying the inputs the
//! server has not acknowledged yet on top of it.

use crate::input::InputBuffer;
use crate::transform_buffer::{ServerTransform, ServerTransformBuffer};
use log::{debug, info, warn};
use shared::tick::{tick_delta, PlayerTick, Tick};
use shared::{move_character, Component, EntityId, Input, Position, WorldUpdate, FIXED_TIMESTEP};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Added to every interpolation window to absorb network jitter.
pub const INTERPOLATION_MARGIN: Duration = Duration::from_millis(10);

/// Gaps wider than this are treated as a single tick.
pub const MAX_TICK_GAP: i32 = 3;

/// Interpolation state of one replicated entity
#[derive(Debug, Clone)]
pub struct EntityView {
    pub buffer: ServerTransformBuffer,
    pub from: Position,
    pub to: Position,
    pub rendered: Position,
    pub remaining: Duration,
    pub duration: Duration,
    pub components: Vec<Component>,
    last_server_tick: Option<Tick>,
}

impl EntityView {
    fn new(position: Position) -> Self {
        Self {
            buffer: ServerTransformBuffer::new(),
            from: position,
            to: position,
            rendered: position,
            remaining: Duration::ZERO,
            duration: Duration::ZERO,
            components: Vec::new(),
            last_server_tick: None,
        }
    }

    /// Interpolation progress in [0, 1]
    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = self.duration.saturating_sub(self.remaining);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }
}

fn position_of(components: &[Component]) -> Option<Position> {
    components.iter().find_map(|component| match component {
        Component::Position(position) => Some(*position),
        _ => None,
    })
}

pub struct ClientGameState {
    local_entity: Option<EntityId>,
    entities: BTreeMap<EntityId, EntityView>,
    inputs: InputBuffer,
    last_tick: Option<Tick>,
    divider: u16,
}

impl ClientGameState {
    pub fn new(network_tick_divider: u16) -> Self {
        Self {
            local_entity: None,
            entities: BTreeMap::new(),
            inputs: InputBuffer::new(),
            last_tick: None,
            divider: network_tick_divider.max(1),
        }
    }

    /// Forgets everything learned from the previous session.
    pub fn reset(&mut self) {
        self.local_entity = None;
        self.entities.clear();
        self.inputs = InputBuffer::new();
        self.last_tick = None;
    }

    pub fn set_local_entity(&mut self, entity: EntityId) {
        info!("Controlling entity {}", entity);
        self.local_entity = Some(entity);
    }

    pub fn local_entity(&self) -> Option<EntityId> {
        self.local_entity
    }

    pub fn last_tick(&self) -> Option<Tick> {
        self.last_tick
    }

    pub fn inputs(&self) -> &InputBuffer {
        &self.inputs
    }

    pub fn entity(&self, entity: EntityId) -> Option<&EntityView> {
        self.entities.get(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Where the local player is currently drawn.
    pub fn local_position(&self) -> Option<Position> {
        self.local_entity
            .and_then(|entity| self.entities.get(&entity))
            .map(|view| view.rendered)
    }

    /// Buffers a local input and predicts its effect on the local player.
    pub fn record_input(&mut self, input: Input, now: Instant) -> PlayerTick {
        let player_tick = self.inputs.push(input, now);
        let dt = FIXED_TIMESTEP.as_secs_f32();

        if let Some(view) = self.local_entity.and_then(|entity| self.entities.get_mut(&entity)) {
            view.to = move_character(&input, view.to, dt);
        }
        player_tick
    }

    /// Takes in an authoritative snapshot.
    ///
    /// Returns false if the update was not newer than the last one applied.
    pub fn apply_world_update(&mut self, update: WorldUpdate, now: Instant) -> bool {
        if let Some(last) = self.last_tick {
            if tick_delta(last, update.tick) <= 0 {
                debug!("Skipping update for tick {} (already at {})", update.tick, last);
                return false;
            }
        }
        self.last_tick = Some(update.tick);
        self.inputs.acknowledge(update.player_tick, now);

        for (entity, components) in update.world_data {
            let position = position_of(&components);
            let view = self
                .entities
                .entry(entity)
                .or_insert_with(|| EntityView::new(position.unwrap_or_default()));
            view.components = components;

            if let Some(position) = position {
                let sample = ServerTransform::new(position, update.tick, update.player_tick);
                if view.buffer.is_full() {
                    warn!("Transform buffer of {} is full, dropping its oldest sample", entity);
                    view.buffer.remove();
                }
                if let Err(e) = view.buffer.add(sample) {
                    warn!("Sample for {} lost: {}", entity, e);
                }
            }
        }

        for entity in update.delete {
            if self.entities.remove(&entity).is_some() {
                debug!("Removed {}", entity);
            }
            if self.local_entity == Some(entity) {
                warn!("Local entity {} was deleted by the server", entity);
                self.local_entity = None;
            }
        }
        true
    }

    /// Authoritative position with every unacknowledged input replayed.
    pub fn extrapolate(&self, position: Position, acked: PlayerTick) -> Position {
        let dt = FIXED_TIMESTEP.as_secs_f32();
        self.inputs
            .pending_after(acked)
            .fold(position, |position, sample| move_character(&sample.input, position, dt))
    }

    /// Starts interpolating toward any sample that has not been targeted yet.
    pub fn step(&mut self) {
        let window = FIXED_TIMESTEP * u32::from(self.divider);

        let mut targets = Vec::new();
        for (entity, view) in self.entities.iter_mut() {
            let Some(sample) = view.buffer.peek_mut() else {
                continue;
            };
            if sample.handled {
                continue;
            }
            sample.handled = true;

            let gap = match view.last_server_tick {
                Some(last) => match tick_delta(last, sample.server_tick) {
                    gap @ 1..=MAX_TICK_GAP => gap,
                    _ => 1,
                },
                None => 1,
            };
            view.last_server_tick = Some(sample.server_tick);
            view.from = view.rendered;
            view.duration = window * gap as u32 + INTERPOLATION_MARGIN;
            view.remaining = view.duration;
            targets.push((*entity, sample.position, sample.player_tick));
        }

        for (entity, position, acked) in targets {
            let target = if Some(entity) == self.local_entity {
                self.extrapolate(position, acked)
            } else {
                position
            };
            if let Some(view) = self.entities.get_mut(&entity) {
                view.to = target;
            }
        }
    }

    /// Advances interpolation by `dt` of wall-clock time.
    pub fn render(&mut self, dt: Duration) {
        for view in self.entities.values_mut() {
            view.remaining = view.remaining.saturating_sub(dt);
            view.rendered = view.from.lerp(view.to, view.progress());

            let targeted = view.buffer.peek().map_or(false, |sample| sample.handled);
            if targeted && (view.remaining.is_zero() || view.buffer.len() > 2) {
                view.buffer.remove();
            }
        }
    }
}
