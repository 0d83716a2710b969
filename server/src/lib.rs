//! # Authoritative Game Server
//!
//! This library runs the canonical simulation that every client predicts
//! against. Clients never talk to it directly: relay proxies multiplex their
//! users onto one connection each, and the server answers per user.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server owns the only writable copy of the world. Clients may push
//! their `Input` and `Speech` components; positions are always computed here
//! with the same deterministic movement step the clients replay.
//!
//! ### Login Lifecycle
//! - `ClientLogin` spawns an entity and binds the user to it
//! - a repeated login (a proxy replaying its roster after a reconnect)
//!   re-binds the user to the new proxy connection and keeps the entity
//! - `ClientLogout` releases the binding and queues the entity for deletion
//! - users whose proxy connection disappeared are released at the next
//!   broadcast
//!
//! ### Broadcast Cadence
//! The simulation advances every fixed step; a broadcast is sent every
//! `network_tick_divider` steps and the wrapping `Tick` advances once per
//! sent broadcast. Each logged-in user receives the full world, the list of
//! deleted entities and the newest `PlayerTick` applied for it.
//!
//! ## Architecture Design
//!
//! ### Tasks
//! - **Accept loop**: hands each proxy connection to its own task
//! - **Proxy read loops**: decode messages and push commands into a bounded
//!   queue; they never touch the world
//! - **Proxy writers**: one per connection, fed through a bounded queue the
//!   tick loop fills with `try_send`, so a slow proxy cannot stall a tick
//! - **Tick loop**: drains the command queue, steps the world and
//!   broadcasts
//!
//! ### Shared State
//! The login map sits behind an async `RwLock` and the delete list behind
//! a mutex. The world itself is owned by the tick loop.
//!
//! ## Module Organization
//!
//! - `login_map`: user to entity/proxy bindings and input acknowledgments
//! - `delete_list`: entities waiting for removal at the next broadcast
//! - `game`: world state, spawning, movement step and broadcast clock
//! - `network`: listener, proxy connections, command routing, tick loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use shared::Shutdown;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run(Shutdown::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod delete_list;
pub mod game;
pub mod login_map;
pub mod network;
