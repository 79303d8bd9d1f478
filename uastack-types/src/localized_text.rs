//! Implementation of `LocalizedText`, human readable text with a locale.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::{
    encoding::{
        read_u8, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
    },
    string::UAString,
};

/// Human readable text with an optional locale identifier. On the wire a
/// bit mask selects which of the two fields is present.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Default)]
pub struct LocalizedText {
    /// The locale, e.g. "en-US".
    pub locale: UAString,
    /// The text in that locale.
    pub text: UAString,
}

const HAS_LOCALE: u8 = 0x1;
const HAS_TEXT: u8 = 0x2;

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl BinaryEncodable for LocalizedText {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if !self.locale.is_null() {
            size += self.locale.byte_len();
        }
        if !self.text.is_null() {
            size += self.text.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let mut mask = 0u8;
        if !self.locale.is_null() {
            mask |= HAS_LOCALE;
        }
        if !self.text.is_null() {
            mask |= HAS_TEXT;
        }
        write_u8(stream, mask)?;
        if !self.locale.is_null() {
            self.locale.encode(stream)?;
        }
        if !self.text.is_null() {
            self.text.encode(stream)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for LocalizedText {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let mask = read_u8(stream)?;
        let locale = if mask & HAS_LOCALE != 0 {
            UAString::decode(stream, options)?
        } else {
            UAString::null()
        };
        let text = if mask & HAS_TEXT != 0 {
            UAString::decode(stream, options)?
        } else {
            UAString::null()
        };
        Ok(LocalizedText { locale, text })
    }
}

impl From<&str> for LocalizedText {
    fn from(value: &str) -> Self {
        LocalizedText {
            locale: UAString::null(),
            text: value.into(),
        }
    }
}

impl LocalizedText {
    /// Create a new localized text with a locale.
    pub fn new(locale: &str, text: &str) -> LocalizedText {
        LocalizedText {
            locale: locale.into(),
            text: text.into(),
        }
    }

    /// A null localized text.
    pub fn null() -> LocalizedText {
        LocalizedText {
            locale: UAString::null(),
            text: UAString::null(),
        }
    }

    /// Test if both fields are null.
    pub fn is_null(&self) -> bool {
        self.locale.is_null() && self.text.is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::LocalizedText;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn partial_fields_round_trip() {
        for v in [
            LocalizedText::null(),
            LocalizedText::from("text only"),
            LocalizedText::new("en", "both"),
        ] {
            let mut s = std::io::Cursor::new(v.encode_to_vec());
            assert_eq!(
                LocalizedText::decode(&mut s, &DecodingOptions::default()).unwrap(),
                v
            );
        }
    }
}
