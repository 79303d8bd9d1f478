use std::io::{Read, Write};

use log::debug;
use uastack_types::{
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error},
    MessageInfo, NodeId, ObjectId, RequestHeader, *,
};

use crate::comms::message_chunk::MessageChunkType;

use super::Message;

macro_rules! request_enum {
    ($($name:ident: $value:ident; $enc:ident),* $(,)?) => {
        /// Every service request this stack can receive.
        #[derive(Debug, PartialEq, Clone)]
        pub enum RequestMessage {
            $(
                #[allow(missing_docs)]
                $name(Box<$value>),
            )*
        }

        $(
            impl From<$value> for RequestMessage {
                fn from(value: $value) -> Self {
                    Self::$name(Box::new(value))
                }
            }
        )*

        impl BinaryEncodable for RequestMessage {
            fn byte_len(&self) -> usize {
                match self {
                    $( Self::$name(value) => value.byte_len(), )*
                }
            }

            fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
                match self {
                    $( Self::$name(value) => value.encode(stream), )*
                }
            }
        }

        impl RequestMessage {
            /// The common request header.
            pub fn request_header(&self) -> &RequestHeader {
                match self {
                    $( Self::$name(value) => &value.request_header, )*
                }
            }
        }

        impl Message for RequestMessage {
            fn request_handle(&self) -> u32 {
                self.request_header().request_handle
            }

            fn decode_by_object_id<S: Read + ?Sized>(
                stream: &mut S,
                object_id: ObjectId,
                options: &DecodingOptions,
            ) -> EncodingResult<Self> {
                match object_id {
                    $(
                        ObjectId::$enc => {
                            Ok($value::decode(stream, options)?.into())
                        }
                    )*
                    _ => {
                        debug!("decoding unsupported for object id {:?}", object_id);
                        // An unknown service is a protocol error scoped to
                        // this request, not the channel. The request
                        // header still decodes, which recovers the handle
                        // a fault needs.
                        let header = RequestHeader::decode(stream, options)?;
                        Err(Error::new(
                            StatusCode::BadServiceUnsupported,
                            format!("No request decoder for {:?}", object_id),
                        )
                        .with_request_handle(header.request_handle))
                    }
                }
            }

            fn type_id(&self) -> NodeId {
                match self {
                    $( Self::$name(value) => value.object_id().into(), )*
                }
            }

            fn message_type(&self) -> MessageChunkType {
                match self {
                    Self::OpenSecureChannel(_) => MessageChunkType::OpenSecureChannel,
                    Self::CloseSecureChannel(_) => MessageChunkType::CloseSecureChannel,
                    _ => MessageChunkType::Message,
                }
            }
        }
    };
}

request_enum! {
    OpenSecureChannel: OpenSecureChannelRequest; OpenSecureChannelRequest_Encoding_DefaultBinary,
    CloseSecureChannel: CloseSecureChannelRequest; CloseSecureChannelRequest_Encoding_DefaultBinary,
    FindServers: FindServersRequest; FindServersRequest_Encoding_DefaultBinary,
    GetEndpoints: GetEndpointsRequest; GetEndpointsRequest_Encoding_DefaultBinary,
    CreateSession: CreateSessionRequest; CreateSessionRequest_Encoding_DefaultBinary,
    ActivateSession: ActivateSessionRequest; ActivateSessionRequest_Encoding_DefaultBinary,
    CloseSession: CloseSessionRequest; CloseSessionRequest_Encoding_DefaultBinary,
    Cancel: CancelRequest; CancelRequest_Encoding_DefaultBinary,
    Read: ReadRequest; ReadRequest_Encoding_DefaultBinary,
    Write: WriteRequest; WriteRequest_Encoding_DefaultBinary,
    Browse: BrowseRequest; BrowseRequest_Encoding_DefaultBinary,
    BrowseNext: BrowseNextRequest; BrowseNextRequest_Encoding_DefaultBinary,
    TranslateBrowsePathsToNodeIds: TranslateBrowsePathsToNodeIdsRequest; TranslateBrowsePathsToNodeIdsRequest_Encoding_DefaultBinary,
    RegisterNodes: RegisterNodesRequest; RegisterNodesRequest_Encoding_DefaultBinary,
    UnregisterNodes: UnregisterNodesRequest; UnregisterNodesRequest_Encoding_DefaultBinary,
    Call: CallRequest; CallRequest_Encoding_DefaultBinary,
    CreateSubscription: CreateSubscriptionRequest; CreateSubscriptionRequest_Encoding_DefaultBinary,
    ModifySubscription: ModifySubscriptionRequest; ModifySubscriptionRequest_Encoding_DefaultBinary,
    DeleteSubscriptions: DeleteSubscriptionsRequest; DeleteSubscriptionsRequest_Encoding_DefaultBinary,
    SetPublishingMode: SetPublishingModeRequest; SetPublishingModeRequest_Encoding_DefaultBinary,
    Publish: PublishRequest; PublishRequest_Encoding_DefaultBinary,
    Republish: RepublishRequest; RepublishRequest_Encoding_DefaultBinary,
    TransferSubscriptions: TransferSubscriptionsRequest; TransferSubscriptionsRequest_Encoding_DefaultBinary,
    CreateMonitoredItems: CreateMonitoredItemsRequest; CreateMonitoredItemsRequest_Encoding_DefaultBinary,
    ModifyMonitoredItems: ModifyMonitoredItemsRequest; ModifyMonitoredItemsRequest_Encoding_DefaultBinary,
    DeleteMonitoredItems: DeleteMonitoredItemsRequest; DeleteMonitoredItemsRequest_Encoding_DefaultBinary,
    SetMonitoringMode: SetMonitoringModeRequest; SetMonitoringModeRequest_Encoding_DefaultBinary,
    SetTriggering: SetTriggeringRequest; SetTriggeringRequest_Encoding_DefaultBinary,
    HistoryRead: HistoryReadRequest; HistoryReadRequest_Encoding_DefaultBinary,
    HistoryUpdate: HistoryUpdateRequest; HistoryUpdateRequest_Encoding_DefaultBinary,
}
