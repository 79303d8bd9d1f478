//! Shared plumbing for OPC UA clients and servers: the transport framing,
//! chunk manager and secure channel machinery, plus the request and
//! response message enums spanning the supported service set.

#![warn(missing_docs)]

pub mod comms;
mod messages;

pub use messages::{Message, RequestMessage, ResponseMessage};
