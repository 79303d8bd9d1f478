//! HistoryRead and HistoryUpdate service types. The engine only dispatches
//! these; storage back-ends are external.

use crate::{
    byte_string::ByteString, diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject,
    node_id::NodeId, qualified_name::QualifiedName, request_header::RequestHeader,
    response_header::ResponseHeader, status_code::StatusCode, string::UAString, ua_encodable,
    ua_message,
};

use super::support::TimestampsToReturn;

ua_encodable! {
    /// One node to read history from.
    pub struct HistoryReadValueId {
        /// The node.
        pub node_id: NodeId,
        /// Sub-range of array values.
        pub index_range: UAString,
        /// Requested data encoding for structured values.
        pub data_encoding: QualifiedName,
        /// Continuation point from an earlier result.
        pub continuation_point: ByteString,
    }
}

ua_encodable! {
    /// History data or events for one node.
    pub struct HistoryReadResult {
        /// Operation status.
        pub status_code: StatusCode,
        /// Token to continue the read, null when done.
        pub continuation_point: ByteString,
        /// HistoryData or HistoryEvent payload.
        pub history_data: ExtensionObject,
    }
}

ua_encodable! {
    /// Request to read history.
    pub struct HistoryReadRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// ReadRawModifiedDetails or similar selector.
        pub history_read_details: ExtensionObject,
        /// Which timestamps to return.
        pub timestamps_to_return: TimestampsToReturn,
        /// If true, release continuation points without reading.
        pub release_continuation_points: bool,
        /// The nodes to read.
        pub nodes_to_read: Option<Vec<HistoryReadValueId>>,
    }
}
ua_message!(HistoryReadRequest, HistoryReadRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to HistoryRead.
    pub struct HistoryReadResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Results in request order.
        pub results: Option<Vec<HistoryReadResult>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(HistoryReadResponse, HistoryReadResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Result of one history update operation.
    pub struct HistoryUpdateResult {
        /// Operation status.
        pub status_code: StatusCode,
        /// Status per updated entry.
        pub operation_results: Option<Vec<StatusCode>>,
        /// Diagnostics per updated entry.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_encodable! {
    /// Request to update history.
    pub struct HistoryUpdateRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// UpdateDataDetails or similar payloads.
        pub history_update_details: Option<Vec<ExtensionObject>>,
    }
}
ua_message!(HistoryUpdateRequest, HistoryUpdateRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to HistoryUpdate.
    pub struct HistoryUpdateResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Results in request order.
        pub results: Option<Vec<HistoryUpdateResult>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(HistoryUpdateResponse, HistoryUpdateResponse_Encoding_DefaultBinary);
