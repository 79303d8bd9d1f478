//! The header carried by every service response.

use crate::{
    date_time::DateTime, diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject,
    request_header::RequestHeader, status_code::StatusCode, string::UAString, ua_encodable,
};

ua_encodable! {
    /// Common parameters of every service response.
    pub struct ResponseHeader {
        /// When the server sent the response.
        pub timestamp: DateTime,
        /// The handle from the matching request.
        pub request_handle: u32,
        /// The service-level result.
        pub service_result: StatusCode,
        /// Service-level diagnostics.
        pub service_diagnostics: DiagnosticInfo,
        /// Strings referenced by diagnostic infos in this response.
        pub string_table: Option<Vec<UAString>>,
        /// Reserved for protocol extensions.
        pub additional_header: ExtensionObject,
    }
}

impl ResponseHeader {
    /// A good response header for the given request.
    pub fn new_good(request_header: &RequestHeader) -> ResponseHeader {
        ResponseHeader::new_service_result(request_header.request_handle, StatusCode::Good)
    }

    /// A response header with the given service result.
    pub fn new_service_result(request_handle: u32, service_result: StatusCode) -> ResponseHeader {
        ResponseHeader {
            timestamp: DateTime::now(),
            request_handle,
            service_result,
            ..Default::default()
        }
    }
}
