//! # Relay Proxy
//!
//! Multiplexes many client connections onto a single upstream connection to
//! the authoritative server.
//!
//! ## Lifecycle of a Client
//! 1. The relay assigns a fresh `UserId` and adds the connection to its room
//! 2. `ClientLogin` is sent upstream on the user's behalf
//! 3. Every `WorldUpdate` from the client has its speech filtered, is stamped
//!    with the user id and forwarded upstream; any other message ends the
//!    connection
//! 4. On disconnect, protocol violation or 60 s of silence the user is
//!    removed from the room and `ClientLogout` is sent upstream
//!
//! ## Upstream Link
//! Server traffic is routed to the addressed user with the user id cleared,
//! so clients never learn their own or anyone else's id. Traffic for users
//! that already left triggers a `ClientLogout` so the server catches up.
//!
//! The upstream socket is supervised: whenever it reconnects, a
//! `ClientLogin` is replayed for every user in the room before relaying
//! resumes. New clients are only accepted while upstream is connected.
//!
//! ## Module Organization
//! - `room`: user registry with a relay-local id counter
//! - `filter`: chat text sanitizing
//! - `relay`: the downstream and upstream loops

pub mod filter;
pub mod relay;
pub mod room;
