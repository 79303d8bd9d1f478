//! Implementation of `NodeId`.

use std::{
    fmt,
    io::{Read, Write},
    str::FromStr,
    sync::LazyLock,
};

use regex::Regex;

use crate::{
    byte_string::ByteString,
    encoding::{
        read_u16, read_u32, read_u8, write_u16, write_u32, write_u8, BinaryDecodable,
        BinaryEncodable, DecodingOptions, EncodingResult, Error,
    },
    guid::Guid,
    node_ids::{DataTypeId, MethodId, ObjectId, ReferenceTypeId, VariableId},
    status_code::StatusCode,
    string::UAString,
};

/// The kind of identifier: numeric, string, guid or opaque bytes.
#[derive(Eq, PartialEq, Clone, Debug, Hash)]
pub enum Identifier {
    /// Numeric identifier, i=123
    Numeric(u32),
    /// String identifier, s=...
    String(UAString),
    /// Guid identifier, g=...
    Guid(Guid),
    /// Opaque identifier, b=...
    ByteString(ByteString),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={}", *v),
            Identifier::String(v) => write!(f, "s={}", v),
            Identifier::Guid(v) => write!(f, "g={}", v),
            Identifier::ByteString(v) => write!(f, "b={}", v.as_base64()),
        }
    }
}

impl FromStr for Identifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 2 {
            return Err(());
        }
        let (k, v) = s.split_at(2);
        match k {
            "i=" => v.parse::<u32>().map(|v| v.into()).map_err(|_| ()),
            "s=" => Ok(UAString::from(v).into()),
            "g=" => Guid::from_str(v).map(|v| v.into()).map_err(|_| ()),
            "b=" => ByteString::from_base64(v).map(|v| v.into()).ok_or(()),
            _ => Err(()),
        }
    }
}

impl From<u32> for Identifier {
    fn from(v: u32) -> Self {
        Identifier::Numeric(v)
    }
}

impl From<&str> for Identifier {
    fn from(v: &str) -> Self {
        Identifier::String(v.into())
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Identifier::String(v.into())
    }
}

impl From<UAString> for Identifier {
    fn from(v: UAString) -> Self {
        Identifier::String(v)
    }
}

impl From<Guid> for Identifier {
    fn from(v: Guid) -> Self {
        Identifier::Guid(v)
    }
}

impl From<ByteString> for Identifier {
    fn from(v: ByteString) -> Self {
        Identifier::ByteString(v)
    }
}

/// Error returned from working with node IDs.
#[derive(Debug, thiserror::Error)]
#[error("node id is not of the expected kind")]
pub struct NodeIdError;

/// An identifier for a node in the address space of a server. Two node ids
/// are equal iff both namespace and identifier match exactly.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct NodeId {
    /// The index of the namespace the identifier lives in.
    pub namespace: u16,
    /// The identifier itself.
    pub identifier: Identifier,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        } else {
            write!(f, "{}", self.identifier)
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

impl BinaryEncodable for NodeId {
    fn byte_len(&self) -> usize {
        match &self.identifier {
            Identifier::Numeric(value) => {
                if self.namespace == 0 && *value <= 255 {
                    2
                } else if self.namespace <= 255 && *value <= 65535 {
                    4
                } else {
                    7
                }
            }
            Identifier::String(value) => 3 + value.byte_len(),
            Identifier::Guid(value) => 3 + value.byte_len(),
            Identifier::ByteString(value) => 3 + value.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // The first byte tags which of the six on-wire encodings follows.
        match &self.identifier {
            Identifier::Numeric(value) => {
                if self.namespace == 0 && *value <= 255 {
                    // Two-byte form
                    write_u8(stream, 0x0)?;
                    write_u8(stream, *value as u8)
                } else if self.namespace <= 255 && *value <= 65535 {
                    // Four-byte form
                    write_u8(stream, 0x1)?;
                    write_u8(stream, self.namespace as u8)?;
                    write_u16(stream, *value as u16)
                } else {
                    write_u8(stream, 0x2)?;
                    write_u16(stream, self.namespace)?;
                    write_u32(stream, *value)
                }
            }
            Identifier::String(value) => {
                write_u8(stream, 0x3)?;
                write_u16(stream, self.namespace)?;
                value.encode(stream)
            }
            Identifier::Guid(value) => {
                write_u8(stream, 0x4)?;
                write_u16(stream, self.namespace)?;
                value.encode(stream)
            }
            Identifier::ByteString(value) => {
                write_u8(stream, 0x5)?;
                write_u16(stream, self.namespace)?;
                value.encode(stream)
            }
        }
    }
}

impl BinaryDecodable for NodeId {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let node_id = match read_u8(stream)? {
            0x0 => {
                let value = read_u8(stream)?;
                NodeId::new(0, u32::from(value))
            }
            0x1 => {
                let namespace = read_u8(stream)?;
                let value = read_u16(stream)?;
                NodeId::new(u16::from(namespace), u32::from(value))
            }
            0x2 => {
                let namespace = read_u16(stream)?;
                let value = read_u32(stream)?;
                NodeId::new(namespace, value)
            }
            0x3 => {
                let namespace = read_u16(stream)?;
                let value = UAString::decode(stream, options)?;
                NodeId::new(namespace, value)
            }
            0x4 => {
                let namespace = read_u16(stream)?;
                let value = Guid::decode(stream, options)?;
                NodeId::new(namespace, value)
            }
            0x5 => {
                let namespace = read_u16(stream)?;
                let value = ByteString::decode(stream, options)?;
                NodeId::new(namespace, value)
            }
            tag => {
                return Err(Error::decoding(format!(
                    "Unrecognized node id encoding {}",
                    tag
                )));
            }
        };
        Ok(node_id)
    }
}

impl FromStr for NodeId {
    type Err = StatusCode;

    // Parses the `ns=<namespaceindex>;<type>=<value>` text form, where the
    // `ns=0;` prefix is omitted for namespace 0.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        static RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^(ns=(?P<ns>[0-9]+);)?(?P<t>[isgb]=.+)$").unwrap());

        let captures = RE.captures(s).ok_or(StatusCode::BadNodeIdInvalid)?;

        let namespace = if let Some(ns) = captures.name("ns") {
            ns.as_str()
                .parse::<u16>()
                .map_err(|_| StatusCode::BadNodeIdInvalid)?
        } else {
            0
        };

        let t = captures.name("t").unwrap();
        Identifier::from_str(t.as_str())
            .map(|t| NodeId::new(namespace, t))
            .map_err(|_| StatusCode::BadNodeIdInvalid)
    }
}

impl From<&NodeId> for NodeId {
    fn from(v: &NodeId) -> Self {
        v.clone()
    }
}

impl<'a> From<(u16, &'a str)> for NodeId {
    fn from(v: (u16, &'a str)) -> Self {
        Self::new(v.0, UAString::from(v.1))
    }
}

impl From<(u16, u32)> for NodeId {
    fn from(v: (u16, u32)) -> Self {
        Self::new(v.0, v.1)
    }
}

// Cheap comparisons against well-known id constants.
impl PartialEq<(u16, u32)> for NodeId {
    fn eq(&self, other: &(u16, u32)) -> bool {
        self.namespace == other.0
            && matches!(&self.identifier, Identifier::Numeric(s) if s == &other.1)
    }
}

impl PartialEq<ObjectId> for NodeId {
    fn eq(&self, other: &ObjectId) -> bool {
        *self == (0u16, *other as u32)
    }
}

impl PartialEq<VariableId> for NodeId {
    fn eq(&self, other: &VariableId) -> bool {
        *self == (0u16, *other as u32)
    }
}

impl PartialEq<MethodId> for NodeId {
    fn eq(&self, other: &MethodId) -> bool {
        *self == (0u16, *other as u32)
    }
}

impl PartialEq<ReferenceTypeId> for NodeId {
    fn eq(&self, other: &ReferenceTypeId) -> bool {
        *self == (0u16, *other as u32)
    }
}

impl PartialEq<DataTypeId> for NodeId {
    fn eq(&self, other: &DataTypeId) -> bool {
        *self == (0u16, *other as u32)
    }
}

impl PartialEq<crate::node_ids::ObjectTypeId> for NodeId {
    fn eq(&self, other: &crate::node_ids::ObjectTypeId) -> bool {
        *self == (0u16, *other as u32)
    }
}

impl PartialEq<crate::node_ids::VariableTypeId> for NodeId {
    fn eq(&self, other: &crate::node_ids::VariableTypeId) -> bool {
        *self == (0u16, *other as u32)
    }
}

impl NodeId {
    /// Construct a new NodeId from anything that converts into an
    /// `Identifier`: u32, &str, String, UAString, Guid or ByteString.
    pub fn new<T>(namespace: u16, value: T) -> NodeId
    where
        T: Into<Identifier>,
    {
        NodeId {
            namespace,
            identifier: value.into(),
        }
    }

    /// Test if the node id is null, i.e. namespace 0 and identifier 0.
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// Return the null node id.
    pub fn null() -> NodeId {
        NodeId::new(0, 0u32)
    }

    /// Extract an `ObjectId`, provided the node id holds one.
    pub fn as_object_id(&self) -> std::result::Result<ObjectId, NodeIdError> {
        match self.identifier {
            Identifier::Numeric(id) if self.namespace == 0 => {
                ObjectId::try_from(id).map_err(|_| NodeIdError)
            }
            _ => Err(NodeIdError),
        }
    }

    /// Extract a `ReferenceTypeId`, provided the node id holds one.
    pub fn as_reference_type_id(&self) -> std::result::Result<ReferenceTypeId, NodeIdError> {
        match self.identifier {
            Identifier::Numeric(id) if self.namespace == 0 && !self.is_null() => {
                ReferenceTypeId::try_from(id).map_err(|_| NodeIdError)
            }
            _ => Err(NodeIdError),
        }
    }

    /// Get the numeric value of this node id, if it is numeric.
    pub fn as_u32(&self) -> Option<u32> {
        match &self.identifier {
            Identifier::Numeric(i) => Some(*i),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Identifier, NodeId};
    use crate::byte_string::ByteString;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};
    use crate::guid::Guid;

    fn round_trip(id: &NodeId) -> NodeId {
        let mut s = std::io::Cursor::new(id.encode_to_vec());
        NodeId::decode(&mut s, &DecodingOptions::default()).unwrap()
    }

    #[test]
    fn compressed_encodings() {
        // Two byte form
        let id = NodeId::new(0, 255u32);
        assert_eq!(id.byte_len(), 2);
        assert_eq!(round_trip(&id), id);
        // Four byte form
        let id = NodeId::new(2, 1025u32);
        assert_eq!(id.byte_len(), 4);
        assert_eq!(round_trip(&id), id);
        // Full numeric
        let id = NodeId::new(500, 0x1234_5678u32);
        assert_eq!(id.byte_len(), 7);
        assert_eq!(round_trip(&id), id);
    }

    #[test]
    fn all_identifier_kinds_round_trip() {
        let ids = [
            NodeId::null(),
            NodeId::new(1, "a string id"),
            NodeId::new(2, Guid::new()),
            NodeId::new(3, ByteString::from(vec![1u8, 2, 3, 4])),
        ];
        for id in &ids {
            assert_eq!(&round_trip(id), id);
        }
    }

    #[test]
    fn from_str() {
        assert_eq!(NodeId::from_str("i=13").unwrap(), NodeId::new(0, 13u32));
        assert_eq!(
            NodeId::from_str("ns=2;s=Demo.Static").unwrap(),
            NodeId::new(2, "Demo.Static")
        );
        assert!(NodeId::from_str("nonsense").is_err());
    }

    #[test]
    fn null() {
        assert!(NodeId::null().is_null());
        assert!(!NodeId::new(1, 0u32).is_null());
        assert_eq!(NodeId::null().identifier, Identifier::Numeric(0));
    }
}
