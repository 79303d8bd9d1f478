//! The header carried by every service request.

use crate::{
    date_time::DateTime, extension_object::ExtensionObject, node_id::NodeId, string::UAString,
    ua_encodable,
};

ua_encodable! {
    /// Common parameters of every service request.
    pub struct RequestHeader {
        /// The session's secret authentication token.
        pub authentication_token: NodeId,
        /// When the client sent the request.
        pub timestamp: DateTime,
        /// Client-assigned handle echoed back in the response.
        pub request_handle: u32,
        /// Bit mask selecting which diagnostics to return.
        pub return_diagnostics: u32,
        /// Identifier entered into the audit log.
        pub audit_entry_id: UAString,
        /// How long the client will wait, in milliseconds. 0 means no hint.
        pub timeout_hint: u32,
        /// Reserved for protocol extensions.
        pub additional_header: ExtensionObject,
    }
}

impl RequestHeader {
    /// A header with the given token and handle, stamped now.
    pub fn new(authentication_token: impl Into<NodeId>, request_handle: u32) -> RequestHeader {
        RequestHeader {
            authentication_token: authentication_token.into(),
            timestamp: DateTime::now(),
            request_handle,
            ..Default::default()
        }
    }

    /// A placeholder header for internally generated requests.
    pub fn dummy() -> RequestHeader {
        RequestHeader::new(NodeId::null(), 1)
    }
}
