use crate::delete_list::DeleteList;
use log::{debug, info};
use rand::Rng;
use shared::tick::Tick;
use shared::{
    move_character, Body, Collider, Component, ComponentKind, EntityId, EntityStore, Input,
    Position, Speech, World, WorldData, DEFAULT_NETWORK_TICK_DIVIDER, SPAWN_POSITION,
};

/// Collision radius given to every player entity.
pub const PLAYER_RADIUS: f32 = 16.0;

/// Authoritative world plus the broadcast clock.
#[derive(Debug)]
pub struct GameState {
    world: World,
    tick: Tick,
    steps: u64,
    divider: u16,
    spawn: Position,
    deletes: DeleteList,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_TICK_DIVIDER)
    }
}

impl GameState {
    /// `divider` is clamped to at least 1.
    pub fn new(divider: u16) -> Self {
        Self {
            world: World::new(),
            tick: 0,
            steps: 0,
            divider: divider.max(1),
            spawn: SPAWN_POSITION,
            deletes: DeleteList::new(),
        }
    }

    pub fn with_spawn(mut self, spawn: Position) -> Self {
        self.spawn = spawn;
        self
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn divider(&self) -> u16 {
        self.divider
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Allocates a player entity with its default components.
    pub fn spawn_player(&mut self) -> EntityId {
        let entity = self.world.new_entity();
        let rgba = rand::thread_rng().gen::<u32>() | 0xff;

        self.world.write(
            entity,
            vec![
                Input::default().into(),
                Body { rgba }.into(),
                Speech::default().into(),
                self.spawn.into(),
                Collider { radius: PLAYER_RADIUS }.into(),
            ],
        );

        info!("Spawned {} at ({}, {})", entity, self.spawn.x, self.spawn.y);
        entity
    }

    /// Queues an entity for removal at the next broadcast.
    pub fn despawn(&self, entity: EntityId) {
        self.deletes.push(entity);
    }

    /// Writes client-sent components onto `entity`, keeping only the kinds
    /// a client is allowed to control.
    pub fn apply_trusted(&mut self, entity: EntityId, components: Vec<Component>) -> bool {
        let trusted: Vec<Component> = components
            .into_iter()
            .filter(Component::is_client_trusted)
            .collect();
        if trusted.is_empty() {
            return self.world.contains(entity);
        }
        self.world.write(entity, trusted)
    }

    /// Runs one simulation step of `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        let mut moves = Vec::new();
        self.world
            .for_each(&[ComponentKind::Input, ComponentKind::Position], |entity, components| {
                let input = components.iter().find_map(|c| match c {
                    Component::Input(input) => Some(*input),
                    _ => None,
                });
                let position = components.iter().find_map(|c| match c {
                    Component::Position(position) => Some(*position),
                    _ => None,
                });
                if let (Some(input), Some(position)) = (input, position) {
                    if !input.is_idle() {
                        moves.push((entity, move_character(&input, position, dt)));
                    }
                }
            });

        for (entity, position) in moves {
            self.world.set(entity, position);
        }
    }

    /// Counts a step and reports whether a broadcast is due on it.
    ///
    /// Only every `divider`-th step broadcasts; the tick advances once per
    /// broadcast and the new value is returned.
    pub fn advance(&mut self) -> Option<Tick> {
        self.steps += 1;
        if self.steps % u64::from(self.divider) != 0 {
            return None;
        }
        self.tick = self.tick.wrapping_add(1);
        Some(self.tick)
    }

    /// Drains the delete list and removes those entities from the world.
    pub fn flush_deletes(&mut self) -> Vec<EntityId> {
        let deleted = self.deletes.drain();
        for entity in &deleted {
            if self.world.delete(*entity) {
                debug!("Deleted {}", entity);
            }
        }
        deleted
    }

    pub fn snapshot(&self) -> WorldData {
        self.world.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::PLAYER_SPEED;

    #[test]
    fn test_spawn_seeds_components() {
        let mut game = GameState::new(4);
        let entity = game.spawn_player();

        let world = game.world();
        assert_eq!(world.get::<Position>(entity), Some(&SPAWN_POSITION));
        assert_eq!(world.get::<Input>(entity), Some(&Input::default()));
        assert!(world.get::<Body>(entity).is_some());
        assert!(world.get::<Speech>(entity).is_some());
        assert_eq!(world.get::<Collider>(entity).unwrap().radius, PLAYER_RADIUS);
    }

    #[test]
    fn test_broadcast_every_divider_steps() {
        let mut game = GameState::new(4);
        let sent: Vec<Option<Tick>> = (0..8).map(|_| game.advance()).collect();

        assert_eq!(
            sent,
            vec![None, None, None, Some(1), None, None, None, Some(2)]
        );
        assert_eq!(game.tick(), 2);
    }

    #[test]
    fn test_divider_of_one_broadcasts_every_step() {
        let mut game = GameState::new(0);
        assert_eq!(game.divider(), 1);
        assert_eq!(game.advance(), Some(1));
        assert_eq!(game.advance(), Some(2));
    }

    #[test]
    fn test_tick_wraps() {
        let mut game = GameState::new(1);
        game.tick = 65535;
        assert_eq!(game.advance(), Some(0));
    }

    #[test]
    fn test_apply_trusted_ignores_position() {
        let mut game = GameState::new(4);
        let entity = game.spawn_player();

        let applied = game.apply_trusted(
            entity,
            vec![
                Position::new(999.0, 999.0).into(),
                Input { right: true, ..Default::default() }.into(),
            ],
        );

        assert!(applied);
        assert_eq!(game.world().get::<Position>(entity), Some(&SPAWN_POSITION));
        assert!(game.world().get::<Input>(entity).unwrap().right);
    }

    #[test]
    fn test_step_moves_by_input() {
        let mut game = GameState::new(4);
        let entity = game.spawn_player();
        game.apply_trusted(entity, vec![Input { right: true, ..Default::default() }.into()]);

        game.step(0.5);

        let position = game.world().get::<Position>(entity).unwrap();
        assert_approx_eq!(position.x, SPAWN_POSITION.x + PLAYER_SPEED * 0.5);
        assert_approx_eq!(position.y, SPAWN_POSITION.y);
    }

    #[test]
    fn test_despawn_applies_on_flush() {
        let mut game = GameState::new(4);
        let entity = game.spawn_player();

        game.despawn(entity);
        assert!(game.world().contains(entity));

        assert_eq!(game.flush_deletes(), vec![entity]);
        assert!(!game.world().contains(entity));
        assert!(game.flush_deletes().is_empty());
    }
}
