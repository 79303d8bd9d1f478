//! OPC UA data types and their binary codec.
//!
//! Everything that crosses the wire lives here: the built-in scalar types,
//! `Variant`, `DataValue`, `ExtensionObject`, the service request and
//! response structures, and the relative path grammar. All encodings are
//! little-endian OPC UA Binary.

#![warn(missing_docs)]

pub mod attribute;
pub mod byte_string;
pub mod constants;
pub mod data_value;
pub mod date_time;
pub mod diagnostic_info;
pub mod encoding;
pub mod expanded_node_id;
pub mod extension_object;
pub mod guid;
pub mod localized_text;
mod macros;
pub mod node_id;
pub mod node_ids;
pub mod qualified_name;
pub mod relative_path;
pub mod request_header;
pub mod response_header;
pub mod service;
pub mod status_code;
pub mod string;
pub mod variant;

pub use attribute::AttributeId;
pub use byte_string::ByteString;
pub use data_value::DataValue;
pub use date_time::DateTime;
pub use diagnostic_info::DiagnosticInfo;
pub use encoding::{
    BinaryDecodable, BinaryEncodable, DecodingOptions, DepthGauge, EncodingResult, Error,
    MessageInfo,
};
pub use expanded_node_id::ExpandedNodeId;
pub use extension_object::{ExtensionObject, ExtensionObjectBody};
pub use guid::Guid;
pub use localized_text::LocalizedText;
pub use node_id::{Identifier, NodeId};
pub use node_ids::{
    DataTypeId, MethodId, ObjectId, ObjectTypeId, ReferenceTypeId, VariableId, VariableTypeId,
};
pub use qualified_name::QualifiedName;
pub use request_header::RequestHeader;
pub use response_header::ResponseHeader;
pub use service::*;
pub use status_code::StatusCode;
pub use string::{UAString, XmlElement};
pub use variant::{Array, Variant, VariantScalarTypeId};
