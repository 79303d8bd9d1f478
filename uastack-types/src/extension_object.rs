//! Implementation of `ExtensionObject`, a type-tagged opaque payload.

use std::io::{Cursor, Read, Write};

use crate::{
    byte_string::ByteString,
    encoding::{
        read_u8, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
        Error, MessageInfo,
    },
    node_id::NodeId,
    node_ids::ObjectId,
    string::XmlElement,
};

/// The body of an extension object.
#[derive(PartialEq, Debug, Clone, Default)]
pub enum ExtensionObjectBody {
    /// No body.
    #[default]
    None,
    /// A binary-encoded body. Kept as raw bytes so payloads whose type is
    /// unknown to this decoder re-encode bit-exactly.
    ByteString(ByteString),
    /// An XML-encoded body, carried opaquely.
    XmlElement(XmlElement),
}

/// A structure serialized with an identifier for its encoding, so that it
/// can be carried through by parties that do not understand it.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ExtensionObject {
    /// Node id of the encoding node, e.g. the type's DefaultBinary node.
    pub node_id: NodeId,
    /// The payload.
    pub body: ExtensionObjectBody,
}

impl BinaryEncodable for ExtensionObject {
    fn byte_len(&self) -> usize {
        let mut size = self.node_id.byte_len() + 1;
        size += match &self.body {
            ExtensionObjectBody::None => 0,
            ExtensionObjectBody::ByteString(value) => value.byte_len(),
            ExtensionObjectBody::XmlElement(value) => value.byte_len(),
        };
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.node_id.encode(stream)?;
        match &self.body {
            ExtensionObjectBody::None => write_u8(stream, 0x0),
            ExtensionObjectBody::ByteString(value) => {
                write_u8(stream, 0x1)?;
                value.encode(stream)
            }
            ExtensionObjectBody::XmlElement(value) => {
                write_u8(stream, 0x2)?;
                value.encode(stream)
            }
        }
    }
}

impl BinaryDecodable for ExtensionObject {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let node_id = NodeId::decode(stream, options)?;
        let body = match read_u8(stream)? {
            0x0 => ExtensionObjectBody::None,
            0x1 => {
                let _lock = options.depth_lock()?;
                ExtensionObjectBody::ByteString(ByteString::decode(stream, options)?)
            }
            0x2 => {
                let _lock = options.depth_lock()?;
                ExtensionObjectBody::XmlElement(XmlElement::decode(stream, options)?)
            }
            encoding => {
                return Err(Error::decoding(format!(
                    "Invalid extension object encoding {}",
                    encoding
                )));
            }
        };
        Ok(ExtensionObject { node_id, body })
    }
}

impl ExtensionObject {
    /// An extension object with no body and the null node id.
    pub fn null() -> ExtensionObject {
        ExtensionObject::default()
    }

    /// Test if the object has no body and a null node id.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null() && matches!(self.body, ExtensionObjectBody::None)
    }

    /// Test if the object is empty, regardless of its type id.
    pub fn is_empty(&self) -> bool {
        matches!(self.body, ExtensionObjectBody::None)
    }

    /// Serialize an encodable value into an extension object, tagged with
    /// the value's binary encoding id.
    pub fn from_message<T>(value: &T) -> ExtensionObject
    where
        T: BinaryEncodable + MessageInfo,
    {
        let mut stream = Cursor::new(Vec::with_capacity(value.byte_len()));
        // Writing a plain struct into a memory buffer cannot fail.
        let _ = value.encode(&mut stream);
        ExtensionObject {
            node_id: value.object_id().into(),
            body: ExtensionObjectBody::ByteString(ByteString::from(stream.into_inner())),
        }
    }

    /// The object id of the encoding node, if it is one known to this stack.
    pub fn object_id(&self) -> Option<ObjectId> {
        self.node_id.as_object_id().ok()
    }

    /// Decode the body as `T`, verifying the type tag first. Unknown tags
    /// yield `BadDataTypeIdUnknown` so callers can fall back to carrying
    /// the payload opaquely.
    pub fn decode_inner<T>(&self, options: &DecodingOptions) -> EncodingResult<T>
    where
        T: BinaryDecodable + MessageInfo + Default,
    {
        let expected = T::default().object_id();
        if self.node_id != expected {
            return Err(Error::new(
                crate::status_code::StatusCode::BadDataTypeIdUnknown,
                format!("Extension object type is {}, not {:?}", self.node_id, expected),
            ));
        }
        match &self.body {
            ExtensionObjectBody::ByteString(bytes) => {
                let mut stream = Cursor::new(bytes.as_slice());
                T::decode(&mut stream, options)
            }
            _ => Err(Error::decoding("Extension object has no binary body")),
        }
    }

    /// Decode the body as `T` if the type tag matches, otherwise `None`.
    pub fn inner_as<T>(&self, options: &DecodingOptions) -> Option<T>
    where
        T: BinaryDecodable + MessageInfo + Default,
    {
        self.decode_inner(options).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{ExtensionObject, ExtensionObjectBody};
    use crate::byte_string::ByteString;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};
    use crate::node_id::NodeId;

    #[test]
    fn unknown_type_round_trips_bit_exact() {
        // A payload whose type id no decoder in this process knows.
        let blob = ExtensionObject {
            node_id: NodeId::new(4, 99_1234u32),
            body: ExtensionObjectBody::ByteString(ByteString::from(vec![9u8, 8, 7, 6, 5])),
        };
        let bytes = blob.encode_to_vec();
        let mut s = std::io::Cursor::new(bytes.clone());
        let decoded = ExtensionObject::decode(&mut s, &DecodingOptions::default()).unwrap();
        assert_eq!(decoded, blob);
        assert_eq!(decoded.encode_to_vec(), bytes);
    }

    #[test]
    fn null_round_trip() {
        let null = ExtensionObject::null();
        let mut s = std::io::Cursor::new(null.encode_to_vec());
        assert_eq!(
            ExtensionObject::decode(&mut s, &DecodingOptions::default()).unwrap(),
            null
        );
    }
}
