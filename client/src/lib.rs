//! # Headless Game Client
//!
//! Connects to a relay proxy, sends one input per fixed simulation step and
//! keeps a smoothed, predicted view of the replicated world.
//!
//! ## Client-Side Prediction
//! Every input is applied to the local player immediately with the same
//! movement step the server runs, so the player moves without waiting for a
//! round trip.
//!
//! ## Server Reconciliation
//! Authoritative snapshots acknowledge the last input the server applied.
//! Acknowledged inputs are dropped from the input buffer; the rest are
//! replayed on top of the authoritative position to get the new target.
//!
//! ## Interpolation
//! Remote entities are drawn between two buffered authoritative samples over
//! one network tick plus a small margin, so snapshots arriving at a lower rate
//! than the simulation still produce continuous motion.
//!
//! ## Module Organization
//! - `input`: input sequencing, acknowledgment, RTT estimation and the
//!   wander pattern used when running headless
//! - `transform_buffer`: fixed-capacity ring of authoritative samples
//! - `game`: prediction, reconciliation and interpolation state
//! - `network`: the supervised proxy connection and the fixed-step loop

pub mod game;
pub mod input;
pub mod network;
pub mod transform_buffer;
