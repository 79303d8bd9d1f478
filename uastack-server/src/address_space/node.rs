//! The node classes stored in the address space.

use bitflags::bitflags;
use uastack_types::{
    AttributeId, DataTypeId, DataValue, DateTime, LocalizedText, NodeClass, NodeId, QualifiedName,
    StatusCode, Variant, VariantScalarTypeId,
};

bitflags! {
    /// The AccessLevel attribute bits of a variable.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct AccessLevel: u8 {
        /// The current value can be read.
        const CURRENT_READ = 1;
        /// The current value can be written.
        const CURRENT_WRITE = 2;
        /// History can be read.
        const HISTORY_READ = 4;
        /// History can be written.
        const HISTORY_WRITE = 8;
    }
}

bitflags! {
    /// The EventNotifier attribute bits of an object.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct EventNotifier: u8 {
        /// The object emits events subscribers can listen to.
        const SUBSCRIBE_TO_EVENTS = 1;
        /// Event history can be read.
        const HISTORY_READ = 4;
        /// Event history can be written.
        const HISTORY_WRITE = 8;
    }
}

/// Attributes every node carries.
#[derive(Debug, Clone)]
pub struct NodeBase {
    /// The node's identifier.
    pub node_id: NodeId,
    /// The namespace-qualified browse name.
    pub browse_name: QualifiedName,
    /// The display name.
    pub display_name: LocalizedText,
    /// An optional description.
    pub description: Option<LocalizedText>,
}

impl NodeBase {
    /// Create the common attributes of a node.
    pub fn new(
        node_id: impl Into<NodeId>,
        browse_name: impl Into<QualifiedName>,
        display_name: &str,
    ) -> NodeBase {
        NodeBase {
            node_id: node_id.into(),
            browse_name: browse_name.into(),
            display_name: display_name.into(),
            description: None,
        }
    }
}

/// An object node.
#[derive(Debug, Clone, Default)]
pub struct Object {
    /// Event notifier bits.
    pub event_notifier: EventNotifier,
}

/// A variable node.
#[derive(Debug, Clone)]
pub struct Variable {
    /// The current value.
    pub value: DataValue,
    /// The declared data type.
    pub data_type: NodeId,
    /// Scalar (-1), any (0) or array rank.
    pub value_rank: i32,
    /// Access level bits.
    pub access_level: AccessLevel,
    /// Access level bits for the requesting user.
    pub user_access_level: AccessLevel,
    /// Fastest sampling the underlying source supports, in ms.
    pub minimum_sampling_interval: f64,
    /// Whether history is collected.
    pub historizing: bool,
}

impl Variable {
    /// A read-only scalar variable holding `value`.
    pub fn new_value(data_type: DataTypeId, value: impl Into<Variant>) -> Variable {
        Variable {
            value: DataValue::new_now(value),
            data_type: data_type.into(),
            value_rank: -1,
            access_level: AccessLevel::CURRENT_READ,
            user_access_level: AccessLevel::CURRENT_READ,
            minimum_sampling_interval: 0.0,
            historizing: false,
        }
    }

    /// Make the variable writable.
    pub fn writable(mut self) -> Variable {
        self.access_level |= AccessLevel::CURRENT_WRITE;
        self.user_access_level |= AccessLevel::CURRENT_WRITE;
        self
    }

    /// Make the variable an array of the given rank.
    pub fn with_value_rank(mut self, value_rank: i32) -> Variable {
        self.value_rank = value_rank;
        self
    }

    /// The scalar type the declared data type maps to, if it is a
    /// built-in type.
    pub fn scalar_type(&self) -> Option<VariantScalarTypeId> {
        let id = self.data_type.as_u32()?;
        if self.data_type.namespace != 0 {
            return None;
        }
        VariantScalarTypeId::try_from(u8::try_from(id).ok()?).ok()
    }
}

/// A method node. The callable itself lives in the method registry.
#[derive(Debug, Clone)]
pub struct Method {
    /// Whether the method may be called at all.
    pub executable: bool,
    /// Whether the requesting user may call it.
    pub user_executable: bool,
}

impl Default for Method {
    fn default() -> Self {
        Method {
            executable: true,
            user_executable: true,
        }
    }
}

/// A reference type node.
#[derive(Debug, Clone)]
pub struct ReferenceType {
    /// Whether the type is abstract.
    pub is_abstract: bool,
    /// Whether the reference reads the same in both directions.
    pub symmetric: bool,
    /// Name of the inverse direction, for asymmetric types.
    pub inverse_name: Option<LocalizedText>,
}

/// An object type node.
#[derive(Debug, Clone, Default)]
pub struct ObjectType {
    /// Whether the type is abstract.
    pub is_abstract: bool,
}

/// A variable type node.
#[derive(Debug, Clone, Default)]
pub struct VariableType {
    /// Whether the type is abstract.
    pub is_abstract: bool,
    /// The declared data type of instances.
    pub data_type: NodeId,
}

/// A data type node.
#[derive(Debug, Clone, Default)]
pub struct DataType {
    /// Whether the type is abstract.
    pub is_abstract: bool,
}

/// A view node.
#[derive(Debug, Clone, Default)]
pub struct View {
    /// Whether the view contains no loops.
    pub contains_no_loops: bool,
}

/// The class-specific part of a node.
#[derive(Debug, Clone)]
pub enum NodeType {
    #[allow(missing_docs)]
    Object(Object),
    #[allow(missing_docs)]
    Variable(Variable),
    #[allow(missing_docs)]
    Method(Method),
    #[allow(missing_docs)]
    ObjectType(ObjectType),
    #[allow(missing_docs)]
    VariableType(VariableType),
    #[allow(missing_docs)]
    ReferenceType(ReferenceType),
    #[allow(missing_docs)]
    DataType(DataType),
    #[allow(missing_docs)]
    View(View),
}

/// One node: the common attributes plus the class-specific ones.
#[derive(Debug, Clone)]
pub struct Node {
    /// Common attributes.
    pub base: NodeBase,
    /// Class-specific attributes.
    pub node_type: NodeType,
}

impl Node {
    /// Create a node.
    pub fn new(base: NodeBase, node_type: NodeType) -> Node {
        Node { base, node_type }
    }

    /// The node's class.
    pub fn node_class(&self) -> NodeClass {
        match &self.node_type {
            NodeType::Object(_) => NodeClass::Object,
            NodeType::Variable(_) => NodeClass::Variable,
            NodeType::Method(_) => NodeClass::Method,
            NodeType::ObjectType(_) => NodeClass::ObjectType,
            NodeType::VariableType(_) => NodeClass::VariableType,
            NodeType::ReferenceType(_) => NodeClass::ReferenceType,
            NodeType::DataType(_) => NodeClass::DataType,
            NodeType::View(_) => NodeClass::View,
        }
    }

    /// The variable attributes, if this is a variable.
    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.node_type {
            NodeType::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// The mutable variable attributes, if this is a variable.
    pub fn as_variable_mut(&mut self) -> Option<&mut Variable> {
        match &mut self.node_type {
            NodeType::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Read one attribute as a DataValue. Unknown or inapplicable
    /// attributes produce `BadAttributeIdInvalid`.
    pub fn read_attribute(&self, attribute_id: AttributeId) -> DataValue {
        let value: Variant = match attribute_id {
            AttributeId::NodeId => self.base.node_id.clone().into(),
            AttributeId::NodeClass => Variant::Int32(self.node_class() as i32),
            AttributeId::BrowseName => self.base.browse_name.clone().into(),
            AttributeId::DisplayName => self.base.display_name.clone().into(),
            AttributeId::Description => match &self.base.description {
                Some(description) => description.clone().into(),
                None => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::Value => {
                return match &self.node_type {
                    NodeType::Variable(v) => {
                        if v.access_level.contains(AccessLevel::CURRENT_READ) {
                            v.value.clone()
                        } else {
                            DataValue::new_status(StatusCode::BadNotReadable)
                        }
                    }
                    _ => DataValue::new_status(StatusCode::BadAttributeIdInvalid),
                };
            }
            AttributeId::DataType => match &self.node_type {
                NodeType::Variable(v) => v.data_type.clone().into(),
                NodeType::VariableType(v) => v.data_type.clone().into(),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::ValueRank => match &self.node_type {
                NodeType::Variable(v) => Variant::Int32(v.value_rank),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::AccessLevel => match &self.node_type {
                NodeType::Variable(v) => Variant::Byte(v.access_level.bits()),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::UserAccessLevel => match &self.node_type {
                NodeType::Variable(v) => Variant::Byte(v.user_access_level.bits()),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::MinimumSamplingInterval => match &self.node_type {
                NodeType::Variable(v) => Variant::Double(v.minimum_sampling_interval),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::Historizing => match &self.node_type {
                NodeType::Variable(v) => Variant::Boolean(v.historizing),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::EventNotifier => match &self.node_type {
                NodeType::Object(o) => Variant::Byte(o.event_notifier.bits()),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::Executable => match &self.node_type {
                NodeType::Method(m) => Variant::Boolean(m.executable),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::UserExecutable => match &self.node_type {
                NodeType::Method(m) => Variant::Boolean(m.user_executable),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::IsAbstract => match &self.node_type {
                NodeType::ObjectType(t) => Variant::Boolean(t.is_abstract),
                NodeType::VariableType(t) => Variant::Boolean(t.is_abstract),
                NodeType::ReferenceType(t) => Variant::Boolean(t.is_abstract),
                NodeType::DataType(t) => Variant::Boolean(t.is_abstract),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::Symmetric => match &self.node_type {
                NodeType::ReferenceType(t) => Variant::Boolean(t.symmetric),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::InverseName => match &self.node_type {
                NodeType::ReferenceType(t) => match &t.inverse_name {
                    Some(name) => name.clone().into(),
                    None => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
                },
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::ContainsNoLoops => match &self.node_type {
                NodeType::View(v) => Variant::Boolean(v.contains_no_loops),
                _ => return DataValue::new_status(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::WriteMask | AttributeId::UserWriteMask => Variant::UInt32(0),
            AttributeId::ArrayDimensions => {
                return DataValue::new_status(StatusCode::BadAttributeIdInvalid);
            }
        };
        DataValue {
            value: Some(value),
            status: Some(StatusCode::Good),
            source_timestamp: Some(DateTime::now()),
            server_timestamp: Some(DateTime::now()),
            ..Default::default()
        }
    }

    /// Write one attribute. Only the Value attribute of writable
    /// variables is mutable; integer values are widened to the declared
    /// type where that loses nothing.
    pub fn write_attribute(
        &mut self,
        attribute_id: AttributeId,
        value: DataValue,
    ) -> Result<(), StatusCode> {
        if attribute_id != AttributeId::Value {
            return Err(StatusCode::BadNotWritable);
        }
        let Some(variable) = self.as_variable_mut() else {
            return Err(StatusCode::BadAttributeIdInvalid);
        };
        if !variable.access_level.contains(AccessLevel::CURRENT_WRITE)
            || !variable.user_access_level.contains(AccessLevel::CURRENT_WRITE)
        {
            return Err(StatusCode::BadNotWritable);
        }

        let Some(incoming) = value.value.clone() else {
            return Err(StatusCode::BadTypeMismatch);
        };
        let coerced = match (variable.scalar_type(), incoming.scalar_type_id()) {
            (Some(declared), Some(actual)) if declared != actual => {
                let converted = incoming.convert_to(declared);
                if converted.is_empty() {
                    return Err(StatusCode::BadTypeMismatch);
                }
                converted
            }
            _ => incoming,
        };

        variable.value = DataValue {
            value: Some(coerced),
            status: value.status.or(Some(StatusCode::Good)),
            source_timestamp: value.source_timestamp.or_else(|| Some(DateTime::now())),
            source_picoseconds: value.source_picoseconds,
            server_timestamp: Some(DateTime::now()),
            server_picoseconds: None,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uastack_types::{AttributeId, DataTypeId, DataValue, NodeClass, StatusCode, Variant};

    use super::{Node, NodeBase, NodeType, Variable};

    fn double_variable(writable: bool) -> Node {
        let mut variable = Variable::new_value(DataTypeId::Double, 1.0f64);
        if writable {
            variable = variable.writable();
        }
        Node::new(
            NodeBase::new((1, "v"), (1, "v"), "v"),
            NodeType::Variable(variable),
        )
    }

    #[test]
    fn read_attributes() {
        let node = double_variable(false);
        assert_eq!(
            node.read_attribute(AttributeId::Value).value,
            Some(Variant::Double(1.0))
        );
        assert_eq!(
            node.read_attribute(AttributeId::NodeClass).value,
            Some(Variant::Int32(NodeClass::Variable as i32))
        );
        assert_eq!(
            node.read_attribute(AttributeId::Executable).status(),
            StatusCode::BadAttributeIdInvalid
        );
    }

    #[test]
    fn write_rules() {
        let mut read_only = double_variable(false);
        let err = read_only
            .write_attribute(AttributeId::Value, DataValue::from(Variant::Double(2.0)))
            .unwrap_err();
        assert_eq!(err, StatusCode::BadNotWritable);

        let mut writable = double_variable(true);
        writable
            .write_attribute(AttributeId::Value, DataValue::from(Variant::Double(2.0)))
            .unwrap();
        assert_eq!(
            writable.read_attribute(AttributeId::Value).value,
            Some(Variant::Double(2.0))
        );

        // Int32 widens to Double, a string does not.
        writable
            .write_attribute(AttributeId::Value, DataValue::from(Variant::Int32(3)))
            .unwrap();
        assert_eq!(
            writable.read_attribute(AttributeId::Value).value,
            Some(Variant::Double(3.0))
        );
        let err = writable
            .write_attribute(AttributeId::Value, DataValue::from(Variant::from("nope")))
            .unwrap_err();
        assert_eq!(err, StatusCode::BadTypeMismatch);
    }
}
