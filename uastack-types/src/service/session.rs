//! CreateSession, ActivateSession and CloseSession service types.

use crate::{
    byte_string::ByteString, diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject,
    node_id::NodeId, request_header::RequestHeader, response_header::ResponseHeader,
    status_code::StatusCode, string::UAString, ua_encodable, ua_message,
};

use super::support::{ApplicationDescription, EndpointDescription, SignatureData, SignedSoftwareCertificate};

ua_encodable! {
    /// Request to create a session.
    pub struct CreateSessionRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// Description of the client application.
        pub client_description: ApplicationDescription,
        /// URI of the server the client believes it is talking to.
        pub server_uri: UAString,
        /// The endpoint URL the client connected to.
        pub endpoint_url: UAString,
        /// Human readable session name.
        pub session_name: UAString,
        /// Client entropy for signature proofs.
        pub client_nonce: ByteString,
        /// The client application instance certificate.
        pub client_certificate: ByteString,
        /// Requested session timeout in milliseconds.
        pub requested_session_timeout: f64,
        /// Largest response the client accepts, 0 for no limit.
        pub max_response_message_size: u32,
    }
}
ua_message!(CreateSessionRequest, CreateSessionRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response carrying the new session's identifiers.
    pub struct CreateSessionResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Public identifier of the session.
        pub session_id: NodeId,
        /// Secret token the client presents on every later request.
        pub authentication_token: NodeId,
        /// The granted session timeout in milliseconds.
        pub revised_session_timeout: f64,
        /// Server entropy for signature proofs.
        pub server_nonce: ByteString,
        /// The server application instance certificate.
        pub server_certificate: ByteString,
        /// All endpoints this server exposes for the url.
        pub server_endpoints: Option<Vec<EndpointDescription>>,
        /// Obsolete, always empty.
        pub server_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        /// Server proof over client certificate and nonce.
        pub server_signature: SignatureData,
        /// Largest request the server accepts, 0 for no limit.
        pub max_request_message_size: u32,
    }
}
ua_message!(CreateSessionResponse, CreateSessionResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to activate a session, binding user identity and channel.
    pub struct ActivateSessionRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// Client proof over server certificate and nonce.
        pub client_signature: SignatureData,
        /// Obsolete, always empty.
        pub client_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        /// Locales the client prefers, in order.
        pub locale_ids: Option<Vec<UAString>>,
        /// The user identity, an AnonymousIdentityToken or
        /// UserNameIdentityToken extension object.
        pub user_identity_token: ExtensionObject,
        /// Signature produced with the identity token's secret, if any.
        pub user_token_signature: SignatureData,
    }
}
ua_message!(ActivateSessionRequest, ActivateSessionRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to session activation.
    pub struct ActivateSessionResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Fresh server entropy for the next activation.
        pub server_nonce: ByteString,
        /// Results for the software certificates, unused.
        pub results: Option<Vec<StatusCode>>,
        /// Diagnostics for the results, unused.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(ActivateSessionResponse, ActivateSessionResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to close a session.
    pub struct CloseSessionRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// If false, live subscriptions are kept for later transfer.
        pub delete_subscriptions: bool,
    }
}
ua_message!(CloseSessionRequest, CloseSessionRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to CloseSession.
    pub struct CloseSessionResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
    }
}
ua_message!(CloseSessionResponse, CloseSessionResponse_Encoding_DefaultBinary);
