//! Entities waiting to be removed at the next broadcast.

use shared::EntityId;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct DeleteList {
    pending: Mutex<Vec<EntityId>>,
}

impl DeleteList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EntityId>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues an entity for deletion. Duplicates are ignored.
    pub fn push(&self, entity: EntityId) {
        let mut pending = self.lock();
        if !pending.contains(&entity) {
            pending.push(entity);
        }
    }

    /// Takes every queued entity, leaving the list empty.
    pub fn drain(&self) -> Vec<EntityId> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
