//! The discovery and secure channel service types: FindServers,
//! GetEndpoints, OpenSecureChannel and CloseSecureChannel.

use crate::{
    byte_string::ByteString, request_header::RequestHeader, response_header::ResponseHeader,
    string::UAString, ua_encodable, ua_message,
};

use super::support::{
    ApplicationDescription, ChannelSecurityToken, EndpointDescription, MessageSecurityMode,
    SecurityTokenRequestType,
};

ua_encodable! {
    /// Request for the servers known at this endpoint.
    pub struct FindServersRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The url the client used to reach this endpoint.
        pub endpoint_url: UAString,
        /// Locales for the returned names, in preference order.
        pub locale_ids: Option<Vec<UAString>>,
        /// Only servers with these application URIs, empty for all.
        pub server_uris: Option<Vec<UAString>>,
    }
}
ua_message!(FindServersRequest, FindServersRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response listing the servers known here.
    pub struct FindServersResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// The matching servers.
        pub servers: Option<Vec<ApplicationDescription>>,
    }
}
ua_message!(FindServersResponse, FindServersResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request for the endpoints a server exposes.
    pub struct GetEndpointsRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The url the client used to reach this endpoint.
        pub endpoint_url: UAString,
        /// Locales for the returned names, in preference order.
        pub locale_ids: Option<Vec<UAString>>,
        /// Only endpoints with these transport profiles, empty for all.
        pub profile_uris: Option<Vec<UAString>>,
    }
}
ua_message!(GetEndpointsRequest, GetEndpointsRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response listing the endpoints.
    pub struct GetEndpointsResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// The endpoints matching the request.
        pub endpoints: Option<Vec<EndpointDescription>>,
    }
}
ua_message!(GetEndpointsResponse, GetEndpointsResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to open or renew a secure channel.
    pub struct OpenSecureChannelRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// Protocol version the client speaks, currently 0.
        pub client_protocol_version: u32,
        /// Issue a new token or renew the current one.
        pub request_type: SecurityTokenRequestType,
        /// Requested message security.
        pub security_mode: MessageSecurityMode,
        /// Client entropy for key derivation.
        pub client_nonce: ByteString,
        /// Requested token lifetime in milliseconds.
        pub requested_lifetime: u32,
    }
}
ua_message!(OpenSecureChannelRequest, OpenSecureChannelRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response carrying the issued channel token.
    pub struct OpenSecureChannelResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Protocol version the server speaks.
        pub server_protocol_version: u32,
        /// The issued or renewed token.
        pub security_token: ChannelSecurityToken,
        /// Server entropy for key derivation.
        pub server_nonce: ByteString,
    }
}
ua_message!(OpenSecureChannelResponse, OpenSecureChannelResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to close the secure channel. No response is sent.
    pub struct CloseSecureChannelRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
    }
}
ua_message!(CloseSecureChannelRequest, CloseSecureChannelRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to CloseSecureChannel, never actually sent over the wire.
    pub struct CloseSecureChannelResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
    }
}
ua_message!(CloseSecureChannelResponse, CloseSecureChannelResponse_Encoding_DefaultBinary);
