//! Implementation of `Guid`, a 16-byte globally unique identifier.

use std::{
    fmt,
    io::{Read, Write},
    str::FromStr,
};

use uuid::Uuid;

use crate::encoding::{
    process_decode_io_result, process_encode_io_result, read_u16, read_u32, write_u16, write_u32,
    BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};

/// A 16-byte globally unique identifier. On the wire this is a
/// `(u32, u16, u16, [u8; 8])` tuple with the integer fields little-endian.
#[derive(Eq, PartialEq, Clone, Hash, Default)]
pub struct Guid {
    uuid: Uuid,
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl FromStr for Guid {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(|uuid| Guid { uuid }).map_err(|_| ())
    }
}

impl BinaryEncodable for Guid {
    fn byte_len(&self) -> usize {
        16
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let (data1, data2, data3, data4) = self.uuid.as_fields();
        write_u32(stream, data1)?;
        write_u16(stream, data2)?;
        write_u16(stream, data3)?;
        process_encode_io_result(stream.write_all(data4))
    }
}

impl BinaryDecodable for Guid {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let data1 = read_u32(stream)?;
        let data2 = read_u16(stream)?;
        let data3 = read_u16(stream)?;
        let mut data4 = [0u8; 8];
        process_decode_io_result(stream.read_exact(&mut data4))?;
        Ok(Guid {
            uuid: Uuid::from_fields(data1, data2, data3, &data4),
        })
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Guid { uuid }
    }
}

impl Guid {
    /// The nil guid, all zeroes.
    pub fn null() -> Guid {
        Guid { uuid: Uuid::nil() }
    }

    /// Test if the guid is nil.
    pub fn is_null(&self) -> bool {
        self.uuid.is_nil()
    }

    /// Create a new random guid.
    pub fn new() -> Guid {
        Guid {
            uuid: Uuid::new_v4(),
        }
    }

    /// The guid as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.uuid.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Guid;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn round_trip() {
        let guid = Guid::from_str("72962b91-fa75-4ae6-8d28-b404dc7daf63").unwrap();
        let bytes = guid.encode_to_vec();
        assert_eq!(bytes.len(), 16);
        // First field is little-endian on the wire.
        assert_eq!(&bytes[0..4], &[0x91, 0x2B, 0x96, 0x72]);
        let mut s = std::io::Cursor::new(bytes);
        assert_eq!(Guid::decode(&mut s, &DecodingOptions::default()).unwrap(), guid);
    }
}
