//! The service handlers spawned by the message handler.

mod attributes;
mod method;
mod view;

pub(crate) use attributes::{history_read, history_update, read, write};
pub(crate) use method::call;
pub(crate) use view::{
    browse, browse_next, register_nodes, translate_browse_paths, unregister_nodes,
};
