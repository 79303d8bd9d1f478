//! Implementation of `ExpandedNodeId`.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::{
    encoding::{
        read_u32, read_u8, write_u32, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions,
        EncodingResult,
    },
    node_id::NodeId,
    string::UAString,
};

/// A `NodeId` extended with an optional namespace URI and server index,
/// allowing it to reference nodes in another server's address space.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Default)]
pub struct ExpandedNodeId {
    /// The inner node id.
    pub node_id: NodeId,
    /// Explicit namespace URI. When set, the node id's namespace index is
    /// ignored by consumers.
    pub namespace_uri: UAString,
    /// Index into the server table, 0 for the local server.
    pub server_index: u32,
}

const HAS_NAMESPACE_URI: u8 = 0x80;
const HAS_SERVER_INDEX: u8 = 0x40;

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace_uri.is_null() {
            write!(f, "{}", self.node_id)
        } else {
            write!(f, "nsu={};{}", self.namespace_uri, self.node_id.identifier)
        }
    }
}

impl BinaryEncodable for ExpandedNodeId {
    fn byte_len(&self) -> usize {
        let mut size = self.node_id.byte_len();
        if !self.namespace_uri.is_null() {
            size += self.namespace_uri.byte_len();
        }
        if self.server_index != 0 {
            size += 4;
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // The node id encodes with expansion flags folded into its tag byte,
        // so write it to a scratch buffer and patch the first byte.
        let mut data = self.node_id.encode_to_vec();
        if !self.namespace_uri.is_null() {
            data[0] |= HAS_NAMESPACE_URI;
        }
        if self.server_index != 0 {
            data[0] |= HAS_SERVER_INDEX;
        }
        crate::encoding::process_encode_io_result(stream.write_all(&data))?;
        if !self.namespace_uri.is_null() {
            self.namespace_uri.encode(stream)?;
        }
        if self.server_index != 0 {
            write_u32(stream, self.server_index)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for ExpandedNodeId {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let tag = read_u8(stream)?;
        // Feed the tag minus the expansion flags back into the node id
        // decoder by chaining a one-byte prefix onto the stream.
        let prefix = [tag & !(HAS_NAMESPACE_URI | HAS_SERVER_INDEX)];
        let mut chained = std::io::Read::chain(&prefix[..], stream);
        let node_id = NodeId::decode(&mut chained, options)?;
        let stream = chained.into_inner().1;

        let namespace_uri = if tag & HAS_NAMESPACE_URI != 0 {
            UAString::decode(stream, options)?
        } else {
            UAString::null()
        };
        let server_index = if tag & HAS_SERVER_INDEX != 0 {
            read_u32(stream)?
        } else {
            0
        };
        Ok(ExpandedNodeId {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        ExpandedNodeId {
            node_id,
            namespace_uri: UAString::null(),
            server_index: 0,
        }
    }
}

impl From<&NodeId> for ExpandedNodeId {
    fn from(node_id: &NodeId) -> Self {
        node_id.clone().into()
    }
}

impl ExpandedNodeId {
    /// Create an expanded node id referring to the local server.
    pub fn new(node_id: impl Into<NodeId>) -> ExpandedNodeId {
        node_id.into().into()
    }

    /// The null expanded node id.
    pub fn null() -> ExpandedNodeId {
        Self::new(NodeId::null())
    }

    /// Test if the expanded node id is null.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null() && self.namespace_uri.is_null() && self.server_index == 0
    }

    /// True if this refers to a node in the local server's address space.
    pub fn is_local(&self) -> bool {
        self.namespace_uri.is_null() && self.server_index == 0
    }
}

#[cfg(test)]
mod tests {
    use super::ExpandedNodeId;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};
    use crate::node_id::NodeId;
    use crate::string::UAString;

    fn round_trip(id: &ExpandedNodeId) -> ExpandedNodeId {
        let mut s = std::io::Cursor::new(id.encode_to_vec());
        ExpandedNodeId::decode(&mut s, &DecodingOptions::default()).unwrap()
    }

    #[test]
    fn expansions_round_trip() {
        let plain = ExpandedNodeId::new(NodeId::new(1, 1234u32));
        assert_eq!(round_trip(&plain), plain);

        let with_uri = ExpandedNodeId {
            node_id: NodeId::new(0, "x"),
            namespace_uri: UAString::from("urn:some:namespace"),
            server_index: 0,
        };
        assert_eq!(round_trip(&with_uri), with_uri);

        let with_both = ExpandedNodeId {
            node_id: NodeId::new(0, 77u32),
            namespace_uri: UAString::from("urn:other"),
            server_index: 3,
        };
        assert_eq!(round_trip(&with_both), with_both);
        assert!(!with_both.is_local());
    }
}
