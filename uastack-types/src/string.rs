//! Implementation of `UAString`, a nullable UTF-8 string.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::encoding::{
    process_decode_io_result, read_i32, write_i32, BinaryDecodable, BinaryEncodable,
    DecodingOptions, EncodingResult, Error,
};

/// A string value, which on the wire may be null (distinct from empty).
/// Internally an `Option<String>`, where `None` is the null string.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default)]
pub struct UAString {
    value: Option<String>,
}

/// An XML element is just a string in the binary encoding.
pub type XmlElement = UAString;

impl fmt::Display for UAString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(ref value) => write!(f, "{}", value),
            None => write!(f, "[null]"),
        }
    }
}

impl BinaryEncodable for UAString {
    fn byte_len(&self) -> usize {
        4 + self.value.as_ref().map_or(0, |s| s.len())
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self.value {
            Some(ref value) => {
                write_i32(stream, value.len() as i32)?;
                crate::encoding::process_encode_io_result(stream.write_all(value.as_bytes()))
            }
            None => write_i32(stream, -1),
        }
    }
}

impl BinaryDecodable for UAString {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len == -1 {
            return Ok(UAString::null());
        }
        if len < -1 {
            return Err(Error::decoding("String length is negative"));
        }
        if len as usize > options.max_string_length {
            return Err(Error::decoding(format!(
                "String length {} exceeds decoding limit {}",
                len, options.max_string_length
            )));
        }
        let mut buf = vec![0u8; len as usize];
        process_decode_io_result(stream.read_exact(&mut buf))?;
        let value = String::from_utf8(buf).map_err(Error::decoding)?;
        Ok(UAString::from(value))
    }
}

impl From<&str> for UAString {
    fn from(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
        }
    }
}

impl From<&String> for UAString {
    fn from(value: &String) -> Self {
        Self {
            value: Some(value.clone()),
        }
    }
}

impl From<String> for UAString {
    fn from(value: String) -> Self {
        Self { value: Some(value) }
    }
}

impl From<Option<String>> for UAString {
    fn from(value: Option<String>) -> Self {
        Self { value }
    }
}

impl AsRef<str> for UAString {
    fn as_ref(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

impl PartialEq<str> for UAString {
    fn eq(&self, other: &str) -> bool {
        self.value.as_deref() == Some(other)
    }
}

impl UAString {
    /// The inner value, `None` when null.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Test if the string is null.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Return a null string.
    pub fn null() -> UAString {
        UAString { value: None }
    }

    /// Test if the string is null or empty.
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().map_or(true, |v| v.is_empty())
    }

    /// The length of the string in bytes, -1 for null.
    pub fn len(&self) -> isize {
        self.value.as_ref().map_or(-1, |v| v.len() as isize)
    }
}

#[cfg(test)]
mod tests {
    use super::UAString;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn null_and_empty_are_distinct() {
        let null = UAString::null();
        let empty = UAString::from("");
        assert!(null.is_null() && null.is_empty());
        assert!(!empty.is_null() && empty.is_empty());
        assert_ne!(null, empty);

        let null_bytes = null.encode_to_vec();
        let empty_bytes = empty.encode_to_vec();
        assert_eq!(null_bytes, vec![0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(empty_bytes, vec![0, 0, 0, 0]);

        let options = DecodingOptions::default();
        let mut s = std::io::Cursor::new(null_bytes);
        assert_eq!(UAString::decode(&mut s, &options).unwrap(), null);
        let mut s = std::io::Cursor::new(empty_bytes);
        assert_eq!(UAString::decode(&mut s, &options).unwrap(), empty);
    }

    #[test]
    fn unicode_round_trip() {
        let value = UAString::from("温度センサー № 4");
        let mut s = std::io::Cursor::new(value.encode_to_vec());
        let decoded = UAString::decode(&mut s, &DecodingOptions::default()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(value.byte_len(), 4 + "温度センサー № 4".len());
    }
}
