//! The OPC UA server engine: sessions, subscriptions and monitored items
//! on top of the secure-channel transport and an in-memory address space.
//!
//! The load-bearing pieces are the session manager (lifecycle, token
//! lookup, timeout watchdog), the subscription engine (per-subscription
//! publishing timers, keep-alive and lifetime counters, retransmission
//! queues) and the monitored-item engine (sampling, deadband filtering,
//! bounded queues). Publish requests are credits: they park in a
//! per-session queue until a subscription has something to say.

#![warn(missing_docs)]

pub mod address_space;
pub mod authenticator;
pub mod config;
pub mod diagnostics;
pub mod events;
pub mod info;
pub mod server;
pub mod session;
pub mod subscriptions;
mod transport;

#[cfg(test)]
mod tests;

pub use address_space::{AddressSpace, MethodCallable, MethodContext};
pub use authenticator::UserToken;
pub use config::ServerConfig;
pub use events::Event;
pub use server::Server;
pub use session::{Session, SessionManager};
pub use subscriptions::SubscriptionCache;
