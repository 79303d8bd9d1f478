//! The request and response message enums spanning every supported
//! service.

use std::io::Read;

use uastack_types::{
    encoding::{BinaryEncodable, DecodingOptions, EncodingResult},
    NodeId, ObjectId,
};

mod request;
mod response;

pub use request::RequestMessage;
pub use response::ResponseMessage;

use crate::comms::message_chunk::MessageChunkType;

/// A full service message: encodable, classifiable by chunk type, and
/// decodable given the object id that prefixes it on the wire.
pub trait Message: BinaryEncodable {
    /// The request handle from the message's header.
    fn request_handle(&self) -> u32;

    /// Decode a message body known to be of the type `object_id` names.
    fn decode_by_object_id<S: Read + ?Sized>(
        stream: &mut S,
        object_id: ObjectId,
        options: &DecodingOptions,
    ) -> EncodingResult<Self>
    where
        Self: Sized;

    /// The node id of the message's binary encoding, written before the
    /// body.
    fn type_id(&self) -> NodeId;

    /// Which chunk type carries this message.
    fn message_type(&self) -> MessageChunkType;
}
