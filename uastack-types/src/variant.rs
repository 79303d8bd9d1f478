//! Implementation of `Variant`, the discriminated union over every built-in
//! type, scalar or array valued.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::{
    byte_string::ByteString,
    data_value::DataValue,
    date_time::DateTime,
    diagnostic_info::DiagnosticInfo,
    encoding::{
        read_i32, read_u8, write_i32, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions,
        EncodingResult, Error,
    },
    expanded_node_id::ExpandedNodeId,
    extension_object::ExtensionObject,
    guid::Guid,
    localized_text::LocalizedText,
    node_id::NodeId,
    node_ids::DataTypeId,
    qualified_name::QualifiedName,
    status_code::StatusCode,
    string::{UAString, XmlElement},
};

/// The scalar type tag of a variant value, also its encoding mask value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum VariantScalarTypeId {
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    XmlElement = 16,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    Variant = 24,
    DiagnosticInfo = 25,
}

impl TryFrom<u8> for VariantScalarTypeId {
    type Error = ();
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use VariantScalarTypeId::*;
        Ok(match value {
            1 => Boolean,
            2 => SByte,
            3 => Byte,
            4 => Int16,
            5 => UInt16,
            6 => Int32,
            7 => UInt32,
            8 => Int64,
            9 => UInt64,
            10 => Float,
            11 => Double,
            12 => String,
            13 => DateTime,
            14 => Guid,
            15 => ByteString,
            16 => XmlElement,
            17 => NodeId,
            18 => ExpandedNodeId,
            19 => StatusCode,
            20 => QualifiedName,
            21 => LocalizedText,
            22 => ExtensionObject,
            23 => DataValue,
            24 => Variant,
            25 => DiagnosticInfo,
            _ => return Err(()),
        })
    }
}

/// An array variant value: element type, flat element list, and optional
/// multi-dimensional shape.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Array {
    /// The scalar type of every element.
    pub value_type: Option<VariantScalarTypeId>,
    /// The elements in row-major order.
    pub values: Vec<Variant>,
    /// Dimension lengths for a multi-dimensional array, `None` for a
    /// one-dimensional one.
    pub dimensions: Option<Vec<u32>>,
}

impl Array {
    /// Create a one-dimensional array.
    pub fn new(value_type: VariantScalarTypeId, values: Vec<Variant>) -> Array {
        Array {
            value_type: Some(value_type),
            values,
            dimensions: None,
        }
    }

    /// Create a multi-dimensional array. The product of the dimensions must
    /// equal the element count.
    pub fn new_multi(
        value_type: VariantScalarTypeId,
        values: Vec<Variant>,
        dimensions: Vec<u32>,
    ) -> Array {
        Array {
            value_type: Some(value_type),
            values,
            dimensions: Some(dimensions),
        }
    }

    /// True if every element matches the declared scalar type and the
    /// dimensions, if present, multiply out to the element count.
    pub fn is_valid(&self) -> bool {
        let type_ok = match self.value_type {
            Some(t) => self.values.iter().all(|v| v.scalar_type_id() == Some(t)),
            None => self.values.is_empty(),
        };
        let dims_ok = match &self.dimensions {
            Some(dims) => {
                dims.iter().map(|d| *d as usize).product::<usize>() == self.values.len()
            }
            None => true,
        };
        type_ok && dims_ok
    }
}

/// A value of any built-in type.
#[derive(PartialEq, Debug, Clone, Default)]
pub enum Variant {
    /// An empty variant, carrying no value at all.
    #[default]
    Empty,
    #[allow(missing_docs)]
    Boolean(bool),
    #[allow(missing_docs)]
    SByte(i8),
    #[allow(missing_docs)]
    Byte(u8),
    #[allow(missing_docs)]
    Int16(i16),
    #[allow(missing_docs)]
    UInt16(u16),
    #[allow(missing_docs)]
    Int32(i32),
    #[allow(missing_docs)]
    UInt32(u32),
    #[allow(missing_docs)]
    Int64(i64),
    #[allow(missing_docs)]
    UInt64(u64),
    #[allow(missing_docs)]
    Float(f32),
    #[allow(missing_docs)]
    Double(f64),
    #[allow(missing_docs)]
    String(UAString),
    #[allow(missing_docs)]
    DateTime(Box<DateTime>),
    #[allow(missing_docs)]
    Guid(Box<Guid>),
    #[allow(missing_docs)]
    StatusCode(StatusCode),
    #[allow(missing_docs)]
    ByteString(ByteString),
    #[allow(missing_docs)]
    XmlElement(XmlElement),
    #[allow(missing_docs)]
    QualifiedName(Box<QualifiedName>),
    #[allow(missing_docs)]
    LocalizedText(Box<LocalizedText>),
    #[allow(missing_docs)]
    NodeId(Box<NodeId>),
    #[allow(missing_docs)]
    ExpandedNodeId(Box<ExpandedNodeId>),
    #[allow(missing_docs)]
    ExtensionObject(ExtensionObject),
    #[allow(missing_docs)]
    DataValue(Box<DataValue>),
    #[allow(missing_docs)]
    DiagnosticInfo(Box<DiagnosticInfo>),
    /// An array of one of the above.
    Array(Box<Array>),
}

const ARRAY_VALUES_BIT: u8 = 1 << 7;
const ARRAY_DIMENSIONS_BIT: u8 = 1 << 6;

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "[empty]"),
            Variant::String(v) => write!(f, "{}", v),
            Variant::LocalizedText(v) => write!(f, "{}", v),
            other => write!(f, "{:?}", other),
        }
    }
}

macro_rules! from_scalar {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Variant::$variant(value)
                }
            }
        )+
    };
}

from_scalar! {
    bool => Boolean, i8 => SByte, u8 => Byte, i16 => Int16, u16 => UInt16,
    i32 => Int32, u32 => UInt32, i64 => Int64, u64 => UInt64,
    f32 => Float, f64 => Double, UAString => String, StatusCode => StatusCode,
    ByteString => ByteString, ExtensionObject => ExtensionObject,
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.into())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value.into())
    }
}

impl From<DateTime> for Variant {
    fn from(value: DateTime) -> Self {
        Variant::DateTime(Box::new(value))
    }
}

impl From<NodeId> for Variant {
    fn from(value: NodeId) -> Self {
        Variant::NodeId(Box::new(value))
    }
}

impl From<ExpandedNodeId> for Variant {
    fn from(value: ExpandedNodeId) -> Self {
        Variant::ExpandedNodeId(Box::new(value))
    }
}

impl From<QualifiedName> for Variant {
    fn from(value: QualifiedName) -> Self {
        Variant::QualifiedName(Box::new(value))
    }
}

impl From<LocalizedText> for Variant {
    fn from(value: LocalizedText) -> Self {
        Variant::LocalizedText(Box::new(value))
    }
}

impl From<Guid> for Variant {
    fn from(value: Guid) -> Self {
        Variant::Guid(Box::new(value))
    }
}

impl From<Array> for Variant {
    fn from(value: Array) -> Self {
        Variant::Array(Box::new(value))
    }
}

impl Variant {
    /// The scalar type tag, `None` for Empty or Array values.
    pub fn scalar_type_id(&self) -> Option<VariantScalarTypeId> {
        use VariantScalarTypeId as T;
        Some(match self {
            Variant::Empty | Variant::Array(_) => return None,
            Variant::Boolean(_) => T::Boolean,
            Variant::SByte(_) => T::SByte,
            Variant::Byte(_) => T::Byte,
            Variant::Int16(_) => T::Int16,
            Variant::UInt16(_) => T::UInt16,
            Variant::Int32(_) => T::Int32,
            Variant::UInt32(_) => T::UInt32,
            Variant::Int64(_) => T::Int64,
            Variant::UInt64(_) => T::UInt64,
            Variant::Float(_) => T::Float,
            Variant::Double(_) => T::Double,
            Variant::String(_) => T::String,
            Variant::DateTime(_) => T::DateTime,
            Variant::Guid(_) => T::Guid,
            Variant::StatusCode(_) => T::StatusCode,
            Variant::ByteString(_) => T::ByteString,
            Variant::XmlElement(_) => T::XmlElement,
            Variant::QualifiedName(_) => T::QualifiedName,
            Variant::LocalizedText(_) => T::LocalizedText,
            Variant::NodeId(_) => T::NodeId,
            Variant::ExpandedNodeId(_) => T::ExpandedNodeId,
            Variant::ExtensionObject(_) => T::ExtensionObject,
            Variant::DataValue(_) => T::DataValue,
            Variant::DiagnosticInfo(_) => T::DiagnosticInfo,
        })
    }

    /// The data type node id of this value, `None` for Empty.
    pub fn data_type_id(&self) -> Option<DataTypeId> {
        use VariantScalarTypeId as T;
        let scalar = match self {
            Variant::Array(array) => array.value_type?,
            other => other.scalar_type_id()?,
        };
        Some(match scalar {
            T::Boolean => DataTypeId::Boolean,
            T::SByte => DataTypeId::SByte,
            T::Byte => DataTypeId::Byte,
            T::Int16 => DataTypeId::Int16,
            T::UInt16 => DataTypeId::UInt16,
            T::Int32 => DataTypeId::Int32,
            T::UInt32 => DataTypeId::UInt32,
            T::Int64 => DataTypeId::Int64,
            T::UInt64 => DataTypeId::UInt64,
            T::Float => DataTypeId::Float,
            T::Double => DataTypeId::Double,
            T::String => DataTypeId::String,
            T::DateTime => DataTypeId::DateTime,
            T::Guid => DataTypeId::Guid,
            T::ByteString => DataTypeId::ByteString,
            T::XmlElement => DataTypeId::XmlElement,
            T::NodeId => DataTypeId::NodeId,
            T::ExpandedNodeId => DataTypeId::ExpandedNodeId,
            T::StatusCode => DataTypeId::StatusCode,
            T::QualifiedName => DataTypeId::QualifiedName,
            T::LocalizedText => DataTypeId::LocalizedText,
            T::ExtensionObject => DataTypeId::Structure,
            T::DataValue => DataTypeId::DataValue,
            T::Variant => DataTypeId::BaseDataType,
            T::DiagnosticInfo => DataTypeId::DiagnosticInfo,
        })
    }

    /// Test if the variant is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    /// Interpret a numeric value as f64, used by deadband filtering.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::SByte(v) => Some(*v as f64),
            Variant::Byte(v) => Some(*v as f64),
            Variant::Int16(v) => Some(*v as f64),
            Variant::UInt16(v) => Some(*v as f64),
            Variant::Int32(v) => Some(*v as f64),
            Variant::UInt32(v) => Some(*v as f64),
            Variant::Int64(v) => Some(*v as f64),
            Variant::UInt64(v) => Some(*v as f64),
            Variant::Float(v) => Some(*v as f64),
            Variant::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempt to convert this value to the target scalar type, following
    /// the lossless conversions writes are permitted to apply. Returns
    /// `Empty` when no conversion exists.
    pub fn convert_to(&self, target: VariantScalarTypeId) -> Variant {
        use VariantScalarTypeId as T;
        if self.scalar_type_id() == Some(target) {
            return self.clone();
        }
        macro_rules! widen {
            ($v:expr, $($to:ident => $ty:ty),+ $(,)?) => {
                match target {
                    $( T::$to => {
                        match <$ty>::try_from(*$v) {
                            Ok(x) => Variant::$to(x),
                            Err(_) => Variant::Empty,
                        }
                    })+
                    T::Float => Variant::Float(*$v as f32),
                    T::Double => Variant::Double(*$v as f64),
                    _ => Variant::Empty,
                }
            };
        }
        match self {
            Variant::SByte(v) => widen!(v, Int16 => i16, Int32 => i32, Int64 => i64),
            Variant::Byte(v) => {
                widen!(v, Int16 => i16, UInt16 => u16, Int32 => i32, UInt32 => u32, Int64 => i64, UInt64 => u64)
            }
            Variant::Int16(v) => widen!(v, Int32 => i32, Int64 => i64),
            Variant::UInt16(v) => {
                widen!(v, Int32 => i32, UInt32 => u32, Int64 => i64, UInt64 => u64)
            }
            Variant::Int32(v) => widen!(v, Int64 => i64),
            Variant::UInt32(v) => widen!(v, Int64 => i64, UInt64 => u64),
            Variant::Float(v) => match target {
                T::Double => Variant::Double(*v as f64),
                _ => Variant::Empty,
            },
            _ => Variant::Empty,
        }
    }

    // Encoded length of the value body, excluding the encoding mask.
    fn value_byte_len(&self) -> usize {
        match self {
            Variant::Empty => 0,
            Variant::Boolean(v) => v.byte_len(),
            Variant::SByte(v) => v.byte_len(),
            Variant::Byte(v) => v.byte_len(),
            Variant::Int16(v) => v.byte_len(),
            Variant::UInt16(v) => v.byte_len(),
            Variant::Int32(v) => v.byte_len(),
            Variant::UInt32(v) => v.byte_len(),
            Variant::Int64(v) => v.byte_len(),
            Variant::UInt64(v) => v.byte_len(),
            Variant::Float(v) => v.byte_len(),
            Variant::Double(v) => v.byte_len(),
            Variant::String(v) => v.byte_len(),
            Variant::DateTime(v) => v.byte_len(),
            Variant::Guid(v) => v.byte_len(),
            Variant::StatusCode(v) => v.byte_len(),
            Variant::ByteString(v) => v.byte_len(),
            Variant::XmlElement(v) => v.byte_len(),
            Variant::QualifiedName(v) => v.byte_len(),
            Variant::LocalizedText(v) => v.byte_len(),
            Variant::NodeId(v) => v.byte_len(),
            Variant::ExpandedNodeId(v) => v.byte_len(),
            Variant::ExtensionObject(v) => v.byte_len(),
            Variant::DataValue(v) => v.byte_len(),
            Variant::DiagnosticInfo(v) => v.byte_len(),
            Variant::Array(array) => {
                let mut size = 4;
                size += array
                    .values
                    .iter()
                    .map(|v| v.value_byte_len())
                    .sum::<usize>();
                if let Some(ref dimensions) = array.dimensions {
                    size += 4 + dimensions.len() * 4;
                }
                size
            }
        }
    }

    // Encode the value body, excluding the encoding mask.
    fn encode_value<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self {
            Variant::Empty => Ok(()),
            Variant::Boolean(v) => v.encode(stream),
            Variant::SByte(v) => v.encode(stream),
            Variant::Byte(v) => v.encode(stream),
            Variant::Int16(v) => v.encode(stream),
            Variant::UInt16(v) => v.encode(stream),
            Variant::Int32(v) => v.encode(stream),
            Variant::UInt32(v) => v.encode(stream),
            Variant::Int64(v) => v.encode(stream),
            Variant::UInt64(v) => v.encode(stream),
            Variant::Float(v) => v.encode(stream),
            Variant::Double(v) => v.encode(stream),
            Variant::String(v) => v.encode(stream),
            Variant::DateTime(v) => v.encode(stream),
            Variant::Guid(v) => v.encode(stream),
            Variant::StatusCode(v) => v.encode(stream),
            Variant::ByteString(v) => v.encode(stream),
            Variant::XmlElement(v) => v.encode(stream),
            Variant::QualifiedName(v) => v.encode(stream),
            Variant::LocalizedText(v) => v.encode(stream),
            Variant::NodeId(v) => v.encode(stream),
            Variant::ExpandedNodeId(v) => v.encode(stream),
            Variant::ExtensionObject(v) => v.encode(stream),
            Variant::DataValue(v) => v.encode(stream),
            Variant::DiagnosticInfo(v) => v.encode(stream),
            Variant::Array(array) => {
                write_i32(stream, array.values.len() as i32)?;
                for value in &array.values {
                    value.encode_value(stream)?;
                }
                if let Some(ref dimensions) = array.dimensions {
                    write_i32(stream, dimensions.len() as i32)?;
                    for d in dimensions {
                        d.encode(stream)?;
                    }
                }
                Ok(())
            }
        }
    }

    // The encoding mask byte: scalar type tag plus array bits.
    fn encoding_mask(&self) -> u8 {
        match self {
            Variant::Empty => 0,
            Variant::Array(array) => {
                let mut mask = array.value_type.map(|t| t as u8).unwrap_or(0) | ARRAY_VALUES_BIT;
                if array.dimensions.is_some() {
                    mask |= ARRAY_DIMENSIONS_BIT;
                }
                mask
            }
            scalar => scalar.scalar_type_id().map(|t| t as u8).unwrap_or(0),
        }
    }

    fn decode_scalar<S: Read + ?Sized>(
        type_id: VariantScalarTypeId,
        stream: &mut S,
        options: &DecodingOptions,
    ) -> EncodingResult<Variant> {
        use VariantScalarTypeId as T;
        Ok(match type_id {
            T::Boolean => Variant::Boolean(bool::decode(stream, options)?),
            T::SByte => Variant::SByte(i8::decode(stream, options)?),
            T::Byte => Variant::Byte(u8::decode(stream, options)?),
            T::Int16 => Variant::Int16(i16::decode(stream, options)?),
            T::UInt16 => Variant::UInt16(u16::decode(stream, options)?),
            T::Int32 => Variant::Int32(i32::decode(stream, options)?),
            T::UInt32 => Variant::UInt32(u32::decode(stream, options)?),
            T::Int64 => Variant::Int64(i64::decode(stream, options)?),
            T::UInt64 => Variant::UInt64(u64::decode(stream, options)?),
            T::Float => Variant::Float(f32::decode(stream, options)?),
            T::Double => Variant::Double(f64::decode(stream, options)?),
            T::String => Variant::String(UAString::decode(stream, options)?),
            T::DateTime => Variant::DateTime(Box::new(DateTime::decode(stream, options)?)),
            T::Guid => Variant::Guid(Box::new(Guid::decode(stream, options)?)),
            T::StatusCode => Variant::StatusCode(StatusCode::decode(stream, options)?),
            T::ByteString => Variant::ByteString(ByteString::decode(stream, options)?),
            T::XmlElement => Variant::XmlElement(XmlElement::decode(stream, options)?),
            T::QualifiedName => {
                Variant::QualifiedName(Box::new(QualifiedName::decode(stream, options)?))
            }
            T::LocalizedText => {
                Variant::LocalizedText(Box::new(LocalizedText::decode(stream, options)?))
            }
            T::NodeId => Variant::NodeId(Box::new(NodeId::decode(stream, options)?)),
            T::ExpandedNodeId => {
                Variant::ExpandedNodeId(Box::new(ExpandedNodeId::decode(stream, options)?))
            }
            T::ExtensionObject => {
                Variant::ExtensionObject(ExtensionObject::decode(stream, options)?)
            }
            T::DataValue => Variant::DataValue(Box::new(DataValue::decode(stream, options)?)),
            T::DiagnosticInfo => {
                Variant::DiagnosticInfo(Box::new(DiagnosticInfo::decode(stream, options)?))
            }
            T::Variant => {
                // A nested variant is boxed inside an array element slot.
                let _lock = options.depth_lock()?;
                Variant::decode(stream, options)?
            }
        })
    }
}

impl BinaryEncodable for Variant {
    fn byte_len(&self) -> usize {
        1 + self.value_byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, self.encoding_mask())?;
        self.encode_value(stream)
    }
}

impl BinaryDecodable for Variant {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let mask = read_u8(stream)?;
        if mask == 0 {
            return Ok(Variant::Empty);
        }
        let type_id = VariantScalarTypeId::try_from(mask & 0x3F)
            .map_err(|_| Error::decoding(format!("Invalid variant type {}", mask & 0x3F)))?;

        if mask & ARRAY_VALUES_BIT == 0 {
            return Self::decode_scalar(type_id, stream, options);
        }

        let _lock = options.depth_lock()?;
        let len = read_i32(stream)?;
        if len < -1 {
            return Err(Error::decoding("Array length is negative"));
        }
        if len as usize > options.max_array_length {
            return Err(Error::decoding(format!(
                "Array length {} exceeds decoding limit {}",
                len, options.max_array_length
            )));
        }
        let len = len.max(0) as usize;
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(Self::decode_scalar(type_id, stream, options)?);
        }
        let dimensions = if mask & ARRAY_DIMENSIONS_BIT != 0 {
            Option::<Vec<u32>>::decode(stream, options)?
        } else {
            None
        };
        Ok(Variant::Array(Box::new(Array {
            value_type: Some(type_id),
            values,
            dimensions,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::{Array, Variant, VariantScalarTypeId};
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};
    use crate::node_ids::DataTypeId;
    use crate::status_code::StatusCode;

    fn round_trip(v: &Variant) -> Variant {
        let bytes = v.encode_to_vec();
        assert_eq!(bytes.len(), v.byte_len());
        let mut s = std::io::Cursor::new(bytes);
        Variant::decode(&mut s, &DecodingOptions::default()).unwrap()
    }

    #[test]
    fn scalars_round_trip() {
        let values = vec![
            Variant::Empty,
            Variant::Boolean(true),
            Variant::SByte(-2),
            Variant::Byte(5),
            Variant::Int16(-3000),
            Variant::UInt16(3000),
            Variant::Int32(-3_000_000),
            Variant::UInt32(3_000_000),
            Variant::Int64(-3_000_000_000),
            Variant::UInt64(3_000_000_000),
            Variant::Float(2.5),
            Variant::Double(-1.25e10),
            Variant::from("hello"),
            Variant::from(crate::date_time::DateTime::now()),
            Variant::from(crate::guid::Guid::new()),
            Variant::StatusCode(StatusCode::BadTimeout),
            Variant::from(crate::byte_string::ByteString::from(vec![1u8, 2])),
            Variant::from(crate::qualified_name::QualifiedName::new(1, "q")),
            Variant::from(crate::localized_text::LocalizedText::from("t")),
            Variant::from(crate::node_id::NodeId::new(2, "node")),
        ];
        for v in &values {
            assert_eq!(&round_trip(v), v);
        }
    }

    #[test]
    fn arrays_round_trip() {
        let arr = Variant::from(Array::new(
            VariantScalarTypeId::Int32,
            vec![Variant::Int32(1), Variant::Int32(2), Variant::Int32(3)],
        ));
        assert_eq!(round_trip(&arr), arr);

        let multi = Variant::from(Array::new_multi(
            VariantScalarTypeId::Double,
            vec![
                Variant::Double(1.0),
                Variant::Double(2.0),
                Variant::Double(3.0),
                Variant::Double(4.0),
            ],
            vec![2, 2],
        ));
        assert_eq!(round_trip(&multi), multi);
        assert_eq!(multi.data_type_id(), Some(DataTypeId::Double));
    }

    #[test]
    fn array_validity() {
        let ok = Array::new(VariantScalarTypeId::Byte, vec![Variant::Byte(1)]);
        assert!(ok.is_valid());
        let mixed = Array::new(
            VariantScalarTypeId::Byte,
            vec![Variant::Byte(1), Variant::Int32(2)],
        );
        assert!(!mixed.is_valid());
        let bad_dims = Array::new_multi(
            VariantScalarTypeId::Byte,
            vec![Variant::Byte(1), Variant::Byte(2)],
            vec![3],
        );
        assert!(!bad_dims.is_valid());
    }

    #[test]
    fn integer_widening() {
        assert_eq!(
            Variant::Int16(-5).convert_to(VariantScalarTypeId::Int32),
            Variant::Int32(-5)
        );
        assert_eq!(
            Variant::Byte(5).convert_to(VariantScalarTypeId::UInt64),
            Variant::UInt64(5)
        );
        assert_eq!(
            Variant::Int32(-5).convert_to(VariantScalarTypeId::UInt16),
            Variant::Empty
        );
        assert_eq!(
            Variant::Float(1.5).convert_to(VariantScalarTypeId::Double),
            Variant::Double(1.5)
        );
    }
}
