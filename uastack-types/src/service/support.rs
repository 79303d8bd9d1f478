//! Enumerations and structures shared across the service sets.

use crate::{
    byte_string::ByteString, date_time::DateTime, localized_text::LocalizedText, node_id::NodeId,
    request_header::RequestHeader, response_header::ResponseHeader, status_code::StatusCode,
    string::UAString, ua_encodable, ua_enum, ua_message,
};

ua_enum! {
    /// How messages on a secure channel are protected.
    pub enum MessageSecurityMode: i32 {
        #[default]
        Invalid = 0,
        None = 1,
        Sign = 2,
        SignAndEncrypt = 3,
    }
}

ua_enum! {
    /// Whether an OpenSecureChannel issues a fresh token or renews one.
    pub enum SecurityTokenRequestType: i32 {
        #[default]
        Issue = 0,
        Renew = 1,
    }
}

ua_enum! {
    /// The role of an application.
    pub enum ApplicationType: i32 {
        #[default]
        Server = 0,
        Client = 1,
        ClientAndServer = 2,
        DiscoveryServer = 3,
    }
}

ua_enum! {
    /// The kind of user identity token accepted by an endpoint.
    pub enum UserTokenType: i32 {
        #[default]
        Anonymous = 0,
        UserName = 1,
        Certificate = 2,
        IssuedToken = 3,
    }
}

ua_enum! {
    /// Which timestamps to return on read and monitor operations.
    pub enum TimestampsToReturn: i32 {
        Source = 0,
        Server = 1,
        #[default]
        Both = 2,
        Neither = 3,
        Invalid = 4,
    }
}

ua_enum! {
    /// The state of the server.
    pub enum ServerState: i32 {
        #[default]
        Running = 0,
        Failed = 1,
        NoConfiguration = 2,
        Suspended = 3,
        Shutdown = 4,
        Test = 5,
        CommunicationFault = 6,
        Unknown = 7,
    }
}

ua_enum! {
    /// The class of a node.
    pub enum NodeClass: i32 {
        #[default]
        Unspecified = 0,
        Object = 1,
        Variable = 2,
        Method = 4,
        ObjectType = 8,
        VariableType = 16,
        ReferenceType = 32,
        DataType = 64,
        View = 128,
    }
}

ua_encodable! {
    /// Describes an OPC UA application and how to discover it.
    pub struct ApplicationDescription {
        /// Globally unique application instance URI.
        pub application_uri: UAString,
        /// URI for the product.
        pub product_uri: UAString,
        /// Human readable application name.
        pub application_name: LocalizedText,
        /// Kind of application.
        pub application_type: ApplicationType,
        /// Gateway through which the server can be reached, if any.
        pub gateway_server_uri: UAString,
        /// Discovery profile supported, if any.
        pub discovery_profile_uri: UAString,
        /// URLs the application can be discovered on.
        pub discovery_urls: Option<Vec<UAString>>,
    }
}
ua_message!(ApplicationDescription, ApplicationDescription_Encoding_DefaultBinary);

ua_encodable! {
    /// A digital signature and the algorithm that produced it.
    pub struct SignatureData {
        /// URI of the signature algorithm.
        pub algorithm: UAString,
        /// The signature bytes.
        pub signature: ByteString,
    }
}
ua_message!(SignatureData, SignatureData_Encoding_DefaultBinary);

impl SignatureData {
    /// An empty signature, used on unsecured channels.
    pub fn null() -> SignatureData {
        SignatureData::default()
    }
}

ua_encodable! {
    /// A user identity token policy supported by an endpoint.
    pub struct UserTokenPolicy {
        /// Endpoint-unique policy identifier.
        pub policy_id: UAString,
        /// The kind of token.
        pub token_type: UserTokenType,
        /// For issued tokens, the token type URI.
        pub issued_token_type: UAString,
        /// For issued tokens, where to obtain one.
        pub issuer_endpoint_url: UAString,
        /// Security policy used to encrypt the token, if different from
        /// the endpoint's.
        pub security_policy_uri: UAString,
    }
}

impl UserTokenPolicy {
    /// The policy accepting anonymous users.
    pub fn anonymous() -> UserTokenPolicy {
        UserTokenPolicy {
            policy_id: "anonymous".into(),
            token_type: UserTokenType::Anonymous,
            ..Default::default()
        }
    }

    /// The policy accepting user name and password.
    pub fn username() -> UserTokenPolicy {
        UserTokenPolicy {
            policy_id: "username".into(),
            token_type: UserTokenType::UserName,
            ..Default::default()
        }
    }
}

ua_encodable! {
    /// An endpoint a client can connect to.
    pub struct EndpointDescription {
        /// The endpoint URL, `opc.tcp://host:port/path`.
        pub endpoint_url: UAString,
        /// The server behind the endpoint.
        pub server: ApplicationDescription,
        /// The server's application instance certificate.
        pub server_certificate: ByteString,
        /// Message security on this endpoint.
        pub security_mode: MessageSecurityMode,
        /// Security policy on this endpoint.
        pub security_policy_uri: UAString,
        /// Identity tokens accepted here.
        pub user_identity_tokens: Option<Vec<UserTokenPolicy>>,
        /// Transport profile, opc.tcp binary here.
        pub transport_profile_uri: UAString,
        /// Relative security level, higher is more secure.
        pub security_level: u8,
    }
}

ua_encodable! {
    /// A software certificate and its signature.
    pub struct SignedSoftwareCertificate {
        /// The DER encoded certificate.
        pub certificate_data: ByteString,
        /// Signature over the certificate data.
        pub signature: ByteString,
    }
}

ua_encodable! {
    /// The token identifying an open secure channel epoch.
    pub struct ChannelSecurityToken {
        /// Server-assigned channel id.
        pub channel_id: u32,
        /// Server-assigned token id, changes on renewal.
        pub token_id: u32,
        /// When the token was issued.
        pub created_at: DateTime,
        /// Token lifetime in milliseconds.
        pub revised_lifetime: u32,
    }
}
ua_message!(ChannelSecurityToken, ChannelSecurityToken_Encoding_DefaultBinary);

ua_encodable! {
    /// An anonymous user identity.
    pub struct AnonymousIdentityToken {
        /// The id of the policy this token satisfies.
        pub policy_id: UAString,
    }
}
ua_message!(AnonymousIdentityToken, AnonymousIdentityToken_Encoding_DefaultBinary);

ua_encodable! {
    /// A user name and password identity.
    pub struct UserNameIdentityToken {
        /// The id of the policy this token satisfies.
        pub policy_id: UAString,
        /// The user name.
        pub user_name: UAString,
        /// The password, encrypted per the policy (plaintext on None).
        pub password: ByteString,
        /// URI of the encryption algorithm applied to the password.
        pub encryption_algorithm: UAString,
    }
}
ua_message!(UserNameIdentityToken, UserNameIdentityToken_Encoding_DefaultBinary);

ua_encodable! {
    /// The response sent when a service fails as a whole.
    pub struct ServiceFault {
        /// The header carrying the failing status.
        pub response_header: ResponseHeader,
    }
}
ua_message!(ServiceFault, ServiceFault_Encoding_DefaultBinary);

impl ServiceFault {
    /// Create a fault for the given request handle and status.
    pub fn new(request_handle: u32, service_result: StatusCode) -> ServiceFault {
        ServiceFault {
            response_header: ResponseHeader::new_service_result(request_handle, service_result),
        }
    }
}

ua_encodable! {
    /// A method argument definition.
    pub struct Argument {
        /// The argument name.
        pub name: UAString,
        /// Data type of the argument value.
        pub data_type: NodeId,
        /// Scalar (-1), any (0), or the array rank.
        pub value_rank: i32,
        /// Fixed array dimensions, if any.
        pub array_dimensions: Option<Vec<u32>>,
        /// Human readable description.
        pub description: LocalizedText,
    }
}
ua_message!(Argument, Argument_Encoding_DefaultBinary);

ua_encodable! {
    /// A low/high range, as held by EURange properties.
    pub struct Range {
        /// Lowest value.
        pub low: f64,
        /// Highest value.
        pub high: f64,
    }
}
ua_message!(Range, Range_Encoding_DefaultBinary);

ua_encodable! {
    /// Identification of the software build.
    pub struct BuildInfo {
        /// URI of the product.
        pub product_uri: UAString,
        /// The manufacturer.
        pub manufacturer_name: UAString,
        /// The product name.
        pub product_name: UAString,
        /// Software version.
        pub software_version: UAString,
        /// Build number.
        pub build_number: UAString,
        /// When the build was made.
        pub build_date: DateTime,
    }
}
ua_message!(BuildInfo, BuildInfo_Encoding_DefaultBinary);

ua_encodable! {
    /// The value of the Server_ServerStatus variable.
    pub struct ServerStatusDataType {
        /// When the server started.
        pub start_time: DateTime,
        /// The server's current time.
        pub current_time: DateTime,
        /// Current run state.
        pub state: ServerState,
        /// Build identification.
        pub build_info: BuildInfo,
        /// Seconds until shutdown when state is Shutdown.
        pub seconds_till_shutdown: u32,
        /// Reason for a pending shutdown.
        pub shutdown_reason: LocalizedText,
    }
}
ua_message!(ServerStatusDataType, ServerStatusDataType_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to cancel outstanding requests by handle.
    pub struct CancelRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The request handle to cancel.
        pub request_handle: u32,
    }
}
ua_message!(CancelRequest, CancelRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to a Cancel request.
    pub struct CancelResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// How many requests were actually cancelled.
        pub cancel_count: u32,
    }
}
ua_message!(CancelResponse, CancelResponse_Encoding_DefaultBinary);
