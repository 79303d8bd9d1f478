//! Call service types.

use crate::{
    diagnostic_info::DiagnosticInfo, node_id::NodeId, request_header::RequestHeader,
    response_header::ResponseHeader, status_code::StatusCode, ua_encodable, ua_message,
    variant::Variant,
};

ua_encodable! {
    /// One method invocation.
    pub struct CallMethodRequest {
        /// The object or object type the method belongs to.
        pub object_id: NodeId,
        /// The method node.
        pub method_id: NodeId,
        /// Input arguments in declaration order.
        pub input_arguments: Option<Vec<Variant>>,
    }
}

ua_encodable! {
    /// Result of one method invocation.
    pub struct CallMethodResult {
        /// Overall operation status.
        pub status_code: StatusCode,
        /// Per-argument validation results.
        pub input_argument_results: Option<Vec<StatusCode>>,
        /// Per-argument diagnostics.
        pub input_argument_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
        /// The method's output arguments.
        pub output_arguments: Option<Vec<Variant>>,
    }
}

impl CallMethodResult {
    /// A result carrying only a failing status.
    pub fn from_status(status_code: StatusCode) -> CallMethodResult {
        CallMethodResult {
            status_code,
            ..Default::default()
        }
    }
}

ua_encodable! {
    /// Request to call methods.
    pub struct CallRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The invocations to perform.
        pub methods_to_call: Option<Vec<CallMethodRequest>>,
    }
}
ua_message!(CallRequest, CallRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to Call.
    pub struct CallResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Results in request order.
        pub results: Option<Vec<CallMethodResult>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(CallResponse, CallResponse_Encoding_DefaultBinary);
