//! Implementation of `ByteString`, a nullable byte buffer.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::encoding::{
    process_decode_io_result, process_encode_io_result, read_i32, write_i32, BinaryDecodable,
    BinaryEncodable, DecodingOptions, EncodingResult, Error,
};

/// A sequence of octets, which on the wire may be null.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default)]
pub struct ByteString {
    /// The raw bytes, `None` when null.
    pub value: Option<Vec<u8>>,
}

impl BinaryEncodable for ByteString {
    fn byte_len(&self) -> usize {
        4 + self.value.as_ref().map_or(0, |v| v.len())
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self.value {
            Some(ref value) => {
                write_i32(stream, value.len() as i32)?;
                process_encode_io_result(stream.write_all(value))
            }
            None => write_i32(stream, -1),
        }
    }
}

impl BinaryDecodable for ByteString {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len == -1 {
            return Ok(ByteString::null());
        }
        if len < -1 {
            return Err(Error::decoding("ByteString length is negative"));
        }
        if len as usize > options.max_byte_string_length {
            return Err(Error::decoding(format!(
                "ByteString length {} exceeds decoding limit {}",
                len, options.max_byte_string_length
            )));
        }
        let mut value = vec![0u8; len as usize];
        process_decode_io_result(stream.read_exact(&mut value))?;
        Ok(ByteString { value: Some(value) })
    }
}

impl From<&[u8]> for ByteString {
    fn from(value: &[u8]) -> Self {
        ByteString {
            value: Some(value.to_vec()),
        }
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(value: Vec<u8>) -> Self {
        ByteString { value: Some(value) }
    }
}

impl ByteString {
    /// Return a null byte string.
    pub fn null() -> ByteString {
        ByteString { value: None }
    }

    /// Test if the byte string is null.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Test if the byte string is null or empty.
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().map_or(true, |v| v.is_empty())
    }

    /// The bytes, or an empty slice when null.
    pub fn as_slice(&self) -> &[u8] {
        self.value.as_deref().unwrap_or(&[])
    }

    /// Create a byte string from a base64 encoded string.
    pub fn from_base64(data: &str) -> Option<ByteString> {
        STANDARD.decode(data).map(Self::from).ok()
    }

    /// Encode the byte string as base64.
    pub fn as_base64(&self) -> String {
        STANDARD.encode(self.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::ByteString;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn round_trip() {
        for v in [
            ByteString::null(),
            ByteString::from(vec![]),
            ByteString::from(vec![0u8, 1, 2, 255]),
        ] {
            let mut s = std::io::Cursor::new(v.encode_to_vec());
            assert_eq!(
                ByteString::decode(&mut s, &DecodingOptions::default()).unwrap(),
                v
            );
        }
    }

    #[test]
    fn base64() {
        let v = ByteString::from(vec![1u8, 2, 3]);
        assert_eq!(ByteString::from_base64(&v.as_base64()), Some(v));
        assert!(ByteString::from_base64("!!not base64!!").is_none());
    }
}
