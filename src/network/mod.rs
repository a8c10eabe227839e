//! Network Module
//!
//! TCP transport adapter for the engine.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept loop, polls for shutdown)
//! - One thread per connection, capped at `max_connections`
//! - Requests routed through `Engine::execute`

mod server;
mod connection;
mod client;

pub use server::Server;
pub use connection::Connection;
pub use client::Client;
