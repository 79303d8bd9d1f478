//! Implementation of `QualifiedName`, a namespace-qualified browse name.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::{
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult},
    string::UAString,
};

/// A name qualified by a namespace index. Comparison is case sensitive.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Default)]
pub struct QualifiedName {
    /// The namespace index.
    pub namespace_index: u16,
    /// The name, unique within the namespace.
    pub name: UAString,
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index != 0 {
            write!(f, "{}:{}", self.namespace_index, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

impl BinaryEncodable for QualifiedName {
    fn byte_len(&self) -> usize {
        2 + self.name.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.namespace_index.encode(stream)?;
        self.name.encode(stream)
    }
}

impl BinaryDecodable for QualifiedName {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(QualifiedName {
            namespace_index: u16::decode(stream, options)?,
            name: UAString::decode(stream, options)?,
        })
    }
}

impl From<&str> for QualifiedName {
    fn from(value: &str) -> Self {
        QualifiedName {
            namespace_index: 0,
            name: value.into(),
        }
    }
}

impl From<(u16, &str)> for QualifiedName {
    fn from(value: (u16, &str)) -> Self {
        QualifiedName {
            namespace_index: value.0,
            name: value.1.into(),
        }
    }
}

impl QualifiedName {
    /// Create a new qualified name.
    pub fn new(namespace_index: u16, name: impl Into<UAString>) -> QualifiedName {
        QualifiedName {
            namespace_index,
            name: name.into(),
        }
    }

    /// A null qualified name, namespace 0 with a null name.
    pub fn null() -> QualifiedName {
        QualifiedName {
            namespace_index: 0,
            name: UAString::null(),
        }
    }

    /// Test if the name is null.
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && self.name.is_null()
    }
}
