//! Declarative macros generating the binary codec impls for plain structs
//! and wire enums, standing in for a derive macro.

/// Define a struct whose binary encoding is the concatenation of its
/// fields, and implement `BinaryEncodable`/`BinaryDecodable` for it.
#[macro_export]
macro_rules! ua_encodable {
    (
        $(#[$attr:meta])*
        pub struct $name:ident {
            $($(#[$fattr:meta])* pub $field:ident : $ftype:ty),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Default)]
        pub struct $name {
            $(
                $(#[$fattr])*
                pub $field: $ftype,
            )+
        }

        impl $crate::encoding::BinaryEncodable for $name {
            fn byte_len(&self) -> usize {
                0 $(+ $crate::encoding::BinaryEncodable::byte_len(&self.$field))+
            }

            fn encode<S: std::io::Write + ?Sized>(
                &self,
                stream: &mut S,
            ) -> $crate::encoding::EncodingResult<()> {
                $( $crate::encoding::BinaryEncodable::encode(&self.$field, stream)?; )+
                Ok(())
            }
        }

        impl $crate::encoding::BinaryDecodable for $name {
            fn decode<S: std::io::Read + ?Sized>(
                stream: &mut S,
                options: &$crate::encoding::DecodingOptions,
            ) -> $crate::encoding::EncodingResult<Self> {
                Ok(Self {
                    $( $field: $crate::encoding::BinaryDecodable::decode(stream, options)?, )+
                })
            }
        }
    };
}

/// Tag a type with the object id of its DefaultBinary encoding node.
#[macro_export]
macro_rules! ua_message {
    ($name:ident, $encoding_id:ident) => {
        impl $crate::encoding::MessageInfo for $name {
            fn object_id(&self) -> $crate::node_ids::ObjectId {
                $crate::node_ids::ObjectId::$encoding_id
            }
        }
    };
}

/// Define an enum encoded as its integer repr on the wire. Unknown values
/// fail decoding with `BadDecodingError`.
#[macro_export]
macro_rules! ua_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident: $repr:ident {
            $($(#[$vattr:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
        #[repr($repr)]
        pub enum $name {
            $(
                $(#[$vattr])*
                #[allow(missing_docs)]
                $variant = $value,
            )+
        }

        impl TryFrom<$repr> for $name {
            type Error = ();
            fn try_from(value: $repr) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok($name::$variant), )+
                    _ => Err(()),
                }
            }
        }

        impl $crate::encoding::BinaryEncodable for $name {
            fn byte_len(&self) -> usize {
                std::mem::size_of::<$repr>()
            }

            fn encode<S: std::io::Write + ?Sized>(
                &self,
                stream: &mut S,
            ) -> $crate::encoding::EncodingResult<()> {
                $crate::encoding::BinaryEncodable::encode(&(*self as $repr), stream)
            }
        }

        impl $crate::encoding::BinaryDecodable for $name {
            fn decode<S: std::io::Read + ?Sized>(
                stream: &mut S,
                options: &$crate::encoding::DecodingOptions,
            ) -> $crate::encoding::EncodingResult<Self> {
                let value =
                    <$repr as $crate::encoding::BinaryDecodable>::decode(stream, options)?;
                Self::try_from(value).map_err(|_| {
                    $crate::encoding::Error::decoding(format!(
                        "Value {} is not valid for enum {}",
                        value,
                        stringify!($name)
                    ))
                })
            }
        }
    };
}
