//! Entity storage boundary.
//!
//! The replication code only needs to create entities, read and write
//! components by kind, delete entities and iterate over entities carrying a
//! set of components. [`World`] is the in-memory store the server uses.

use crate::components::{Component, ComponentKind, ComponentType};
use crate::messages::WorldData;
use crate::EntityId;
use std::collections::BTreeMap;

pub trait EntityStore {
    /// Allocates a fresh entity with no components.
    fn new_entity(&mut self) -> EntityId;

    fn read(&self, entity: EntityId, kind: ComponentKind) -> Option<&Component>;

    /// Inserts or replaces components by kind. Returns false if the entity
    /// does not exist.
    fn write(&mut self, entity: EntityId, components: Vec<Component>) -> bool;

    fn delete(&mut self, entity: EntityId) -> bool;

    /// Calls `f` for every entity that has all `required` kinds, in id order.
    fn for_each<F>(&self, required: &[ComponentKind], f: F)
    where
        F: FnMut(EntityId, &[Component]);
}

#[derive(Debug, Clone)]
pub struct World {
    entities: BTreeMap<EntityId, Vec<Component>>,
    next_id: u32,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn get<T: ComponentType>(&self, entity: EntityId) -> Option<&T> {
        self.read(entity, T::KIND).and_then(T::from_component)
    }

    pub fn set<T: ComponentType>(&mut self, entity: EntityId, value: T) -> bool {
        self.write(entity, vec![value.into_component()])
    }

    /// Every entity with all of its components.
    pub fn snapshot(&self) -> WorldData {
        self.entities
            .iter()
            .map(|(id, components)| (*id, components.clone()))
            .collect()
    }
}

impl EntityStore for World {
    fn new_entity(&mut self) -> EntityId {
        loop {
            let id = EntityId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if id.is_valid() && !self.entities.contains_key(&id) {
                self.entities.insert(id, Vec::new());
                return id;
            }
        }
    }

    fn read(&self, entity: EntityId, kind: ComponentKind) -> Option<&Component> {
        self.entities
            .get(&entity)?
            .iter()
            .find(|component| component.kind() == kind)
    }

    fn write(&mut self, entity: EntityId, components: Vec<Component>) -> bool {
        let Some(stored) = self.entities.get_mut(&entity) else {
            return false;
        };

        for component in components {
            match stored.iter_mut().find(|c| c.kind() == component.kind()) {
                Some(slot) => *slot = component,
                None => stored.push(component),
            }
        }
        true
    }

    fn delete(&mut self, entity: EntityId) -> bool {
        self.entities.remove(&entity).is_some()
    }

    fn for_each<F>(&self, required: &[ComponentKind], mut f: F)
    where
        F: FnMut(EntityId, &[Component]),
    {
        for (id, components) in &self.entities {
            let matches = required
                .iter()
                .all(|kind| components.iter().any(|c| c.kind() == *kind));
            if matches {
                f(*id, components);
            }
        }
    }
}
