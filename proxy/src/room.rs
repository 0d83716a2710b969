//! The set of users connected to this relay.

use shared::UserId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("{0} is already in the room")]
    DuplicateUser(UserId),
}

/// Users keyed by id, each with its downstream connection handle `C`.
///
/// Ids come from a counter local to this room and are never reused.
pub struct Room<C> {
    members: Mutex<HashMap<UserId, C>>,
    next_id: AtomicU64,
}

impl<C: Clone> Default for Room<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clone> Room<C> {
    pub fn new() -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
            // 0 is reserved for cleared user ids
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, C>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_user_id(&self) -> UserId {
        UserId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Adds a user. An id that is already present is rejected and the
    /// existing entry is left untouched.
    pub fn insert(&self, user: UserId, connection: C) -> Result<(), RoomError> {
        let mut members = self.lock();
        if members.contains_key(&user) {
            return Err(RoomError::DuplicateUser(user));
        }
        members.insert(user, connection);
        Ok(())
    }

    pub fn remove(&self, user: UserId) -> Option<C> {
        self.lock().remove(&user)
    }

    pub fn get(&self, user: UserId) -> Option<C> {
        self.lock().get(&user).cloned()
    }

    /// Current members in id order.
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.lock().keys().copied().collect();
        users.sort();
        users
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
