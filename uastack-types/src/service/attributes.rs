//! Read and Write service types.

use crate::{
    data_value::DataValue, diagnostic_info::DiagnosticInfo, node_id::NodeId,
    qualified_name::QualifiedName, request_header::RequestHeader,
    response_header::ResponseHeader, status_code::StatusCode, string::UAString, ua_encodable,
    ua_message,
};

use super::support::TimestampsToReturn;

ua_encodable! {
    /// Identifies one attribute of one node to read.
    pub struct ReadValueId {
        /// The node.
        pub node_id: NodeId,
        /// The attribute, a value from `AttributeId`.
        pub attribute_id: u32,
        /// Sub-range of an array value, unused when empty.
        pub index_range: UAString,
        /// Requested data encoding for structured values.
        pub data_encoding: QualifiedName,
    }
}

impl ReadValueId {
    /// Read the Value attribute of the given node.
    pub fn value_of(node_id: impl Into<NodeId>) -> ReadValueId {
        ReadValueId {
            node_id: node_id.into(),
            attribute_id: crate::attribute::AttributeId::Value as u32,
            ..Default::default()
        }
    }
}

ua_encodable! {
    /// Request to read attributes.
    pub struct ReadRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// Oldest acceptable cached value age in milliseconds. 0 forces a
        /// fresh read.
        pub max_age: f64,
        /// Which timestamps to return.
        pub timestamps_to_return: TimestampsToReturn,
        /// The attributes to read.
        pub nodes_to_read: Option<Vec<ReadValueId>>,
    }
}
ua_message!(ReadRequest, ReadRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response carrying one DataValue per read operation.
    pub struct ReadResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Values in request order.
        pub results: Option<Vec<DataValue>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(ReadResponse, ReadResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// One attribute write.
    pub struct WriteValue {
        /// The node.
        pub node_id: NodeId,
        /// The attribute, a value from `AttributeId`.
        pub attribute_id: u32,
        /// Sub-range of an array value, unused when empty.
        pub index_range: UAString,
        /// The value to write.
        pub value: DataValue,
    }
}

ua_encodable! {
    /// Request to write attributes.
    pub struct WriteRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The writes to perform.
        pub nodes_to_write: Option<Vec<WriteValue>>,
    }
}
ua_message!(WriteRequest, WriteRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response carrying one status per write operation.
    pub struct WriteResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Statuses in request order.
        pub results: Option<Vec<StatusCode>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(WriteResponse, WriteResponse_Encoding_DefaultBinary);
