//! Fixed-capacity ring of authoritative positions for one entity.

use shared::tick::{tick_delta, PlayerTick, Tick};
use shared::Position;

pub const TRANSFORM_BUFFER_CAPACITY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("transform buffer is full ({capacity} samples)")]
    CapacityExceeded { capacity: usize },
}

/// An authoritative position sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerTransform {
    pub position: Position,
    pub server_tick: Tick,
    /// Input ack carried by the update this sample came from.
    pub player_tick: PlayerTick,
    /// Set once the sample became the interpolation target.
    pub handled: bool,
}

impl ServerTransform {
    pub fn new(position: Position, server_tick: Tick, player_tick: PlayerTick) -> Self {
        Self {
            position,
            server_tick,
            player_tick,
            handled: false,
        }
    }
}

/// Ring buffer with independent read and write cursors. Writes never
/// overtake reads: adding to a full buffer fails.
#[derive(Debug, Clone)]
pub struct ServerTransformBuffer {
    slots: [Option<ServerTransform>; TRANSFORM_BUFFER_CAPACITY],
    read: usize,
    write: usize,
    len: usize,
}

impl Default for ServerTransformBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerTransformBuffer {
    pub fn new() -> Self {
        Self {
            slots: [None; TRANSFORM_BUFFER_CAPACITY],
            read: 0,
            write: 0,
            len: 0,
        }
    }

    pub fn add(&mut self, transform: ServerTransform) -> Result<(), BufferError> {
        if self.is_full() {
            return Err(BufferError::CapacityExceeded {
                capacity: TRANSFORM_BUFFER_CAPACITY,
            });
        }
        self.slots[self.write] = Some(transform);
        self.write = (self.write + 1) % TRANSFORM_BUFFER_CAPACITY;
        self.len += 1;
        Ok(())
    }

    /// Oldest sample.
    pub fn peek(&self) -> Option<&ServerTransform> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.read].as_ref()
    }

    pub fn peek_mut(&mut self) -> Option<&mut ServerTransform> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.read].as_mut()
    }

    /// Removes and returns the oldest sample.
    pub fn remove(&mut self) -> Option<ServerTransform> {
        if self.len == 0 {
            return None;
        }
        let transform = self.slots[self.read].take();
        self.read = (self.read + 1) % TRANSFORM_BUFFER_CAPACITY;
        self.len -= 1;
        transform
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == TRANSFORM_BUFFER_CAPACITY
    }

    /// Server ticks spanned between the oldest and newest sample.
    pub fn delay(&self) -> i32 {
        if self.len == 0 {
            return 0;
        }
        let newest = (self.write + TRANSFORM_BUFFER_CAPACITY - 1) % TRANSFORM_BUFFER_CAPACITY;
        match (&self.slots[self.read], &self.slots[newest]) {
            (Some(oldest), Some(newest)) => tick_delta(oldest.server_tick, newest.server_tick),
            _ => 0,
        }
    }
}
