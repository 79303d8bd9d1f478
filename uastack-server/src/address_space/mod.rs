//! The in-memory address space: an arena of nodes, reference edges between
//! arena indices, and the accessor operations the services dispatch to.
//!
//! Nodes are stored in an arena and referenced by 32-bit indices so that
//! reference cycles need no shared ownership; lookup by `NodeId` goes
//! through a hash table keyed on the identifier.

mod core_namespace;
mod method;
pub mod node;

pub use core_namespace::populate_core_namespace;
pub use method::{MethodCallable, MethodContext};

use hashbrown::HashMap;
use log::debug;
use uastack_types::{
    AttributeId, BrowseDescription, BrowseDirection, BrowseResultMask, DataValue, ExpandedNodeId,
    LocalizedText, NodeClass, NodeId, QualifiedName, ReferenceDescription, ReferenceTypeId,
    RelativePathElement, StatusCode, Variant,
};

use node::{Node, NodeType};

/// One directed reference edge as stored on a node.
#[derive(Debug, Clone)]
struct ReferenceEdge {
    reference_type: NodeId,
    target: u32,
    is_forward: bool,
}

struct NodeEntry {
    node: Node,
    references: Vec<ReferenceEdge>,
}

/// The node graph plus the method registry bound to it.
pub struct AddressSpace {
    nodes: Vec<NodeEntry>,
    index: HashMap<NodeId, u32>,
    namespaces: Vec<String>,
    methods: method::MethodRegistry,
}

impl AddressSpace {
    /// An address space holding the core namespace subset the engine
    /// itself requires.
    pub fn new() -> AddressSpace {
        let mut space = AddressSpace {
            nodes: Vec::with_capacity(256),
            index: HashMap::with_capacity(256),
            namespaces: vec!["http://opcfoundation.org/UA/".to_string()],
            methods: method::MethodRegistry::default(),
        };
        populate_core_namespace(&mut space);
        space
    }

    /// Register an additional namespace, returning its index.
    pub fn register_namespace(&mut self, uri: &str) -> u16 {
        if let Some(i) = self.namespaces.iter().position(|n| n == uri) {
            return i as u16;
        }
        self.namespaces.push(uri.to_string());
        (self.namespaces.len() - 1) as u16
    }

    /// The namespace URI table.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Insert a node. Fails if the id is already taken.
    pub fn insert(&mut self, node: Node) -> Result<(), StatusCode> {
        let node_id = node.base.node_id.clone();
        if node_id.is_null() || self.index.contains_key(&node_id) {
            return Err(StatusCode::BadNodeIdInvalid);
        }
        let index = self.nodes.len() as u32;
        self.nodes.push(NodeEntry {
            node,
            references: Vec::new(),
        });
        self.index.insert(node_id, index);
        Ok(())
    }

    /// Insert a node under a parent with the given reference type.
    pub fn insert_under(
        &mut self,
        node: Node,
        parent: &NodeId,
        reference_type: impl Into<NodeId>,
    ) -> Result<(), StatusCode> {
        let node_id = node.base.node_id.clone();
        self.insert(node)?;
        self.insert_reference(parent, &node_id, reference_type)
    }

    /// Insert a reference between two existing nodes. The inverse edge is
    /// stored on the target so browsing works in both directions.
    pub fn insert_reference(
        &mut self,
        source: &NodeId,
        target: &NodeId,
        reference_type: impl Into<NodeId>,
    ) -> Result<(), StatusCode> {
        let reference_type = reference_type.into();
        let source_index = *self.index.get(source).ok_or(StatusCode::BadNodeIdUnknown)?;
        let target_index = *self.index.get(target).ok_or(StatusCode::BadNodeIdUnknown)?;
        self.nodes[source_index as usize].references.push(ReferenceEdge {
            reference_type: reference_type.clone(),
            target: target_index,
            is_forward: true,
        });
        self.nodes[target_index as usize].references.push(ReferenceEdge {
            reference_type,
            target: source_index,
            is_forward: false,
        });
        Ok(())
    }

    /// Find a node by id.
    pub fn find(&self, node_id: &NodeId) -> Option<&Node> {
        self.index
            .get(node_id)
            .map(|i| &self.nodes[*i as usize].node)
    }

    /// Find a node by id, mutably.
    pub fn find_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        let index = *self.index.get(node_id)?;
        Some(&mut self.nodes[index as usize].node)
    }

    /// True if `sub` equals `base` or is a (transitive) subtype of it,
    /// following HasSubtype references.
    pub fn is_subtype_of(&self, sub: &NodeId, base: &NodeId) -> bool {
        if sub == base {
            return true;
        }
        let Some(&start) = self.index.get(sub) else {
            return false;
        };
        let Some(&base_index) = self.index.get(base) else {
            return false;
        };
        // Walk up the inverse HasSubtype edges.
        let mut current = start;
        let mut hops = 0;
        loop {
            hops += 1;
            if hops > 64 {
                // A type hierarchy this deep means a cycle, bail out.
                return false;
            }
            let parent = self.nodes[current as usize].references.iter().find(|r| {
                !r.is_forward && r.reference_type == ReferenceTypeId::HasSubtype
            });
            match parent {
                Some(edge) if edge.target == base_index => return true,
                Some(edge) => current = edge.target,
                None => return false,
            }
        }
    }

    fn reference_matches(
        &self,
        edge: &ReferenceEdge,
        reference_type: &NodeId,
        include_subtypes: bool,
    ) -> bool {
        if reference_type.is_null() {
            return true;
        }
        if include_subtypes {
            self.is_subtype_of(&edge.reference_type, reference_type)
        } else {
            &edge.reference_type == reference_type
        }
    }

    /// The references of one node matching a browse description. Paging is
    /// the caller's concern; results come back in insertion order.
    pub fn browse_node(
        &self,
        description: &BrowseDescription,
    ) -> Result<Vec<ReferenceDescription>, StatusCode> {
        let node_index = *self
            .index
            .get(&description.node_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;

        if !description.reference_type_id.is_null()
            && self.find(&description.reference_type_id).is_none()
        {
            return Err(StatusCode::BadReferenceTypeIdInvalid);
        }

        let (want_forward, want_inverse) = match description.browse_direction {
            BrowseDirection::Forward => (true, false),
            BrowseDirection::Inverse => (false, true),
            BrowseDirection::Both => (true, true),
            BrowseDirection::Invalid => {
                return Err(StatusCode::BadBrowseDirectionInvalid);
            }
        };

        let result_mask =
            BrowseResultMask::from_bits_truncate(description.result_mask);
        let mut results = Vec::new();
        for edge in &self.nodes[node_index as usize].references {
            if edge.is_forward && !want_forward || !edge.is_forward && !want_inverse {
                continue;
            }
            if !self.reference_matches(
                edge,
                &description.reference_type_id,
                description.include_subtypes,
            ) {
                continue;
            }
            let target = &self.nodes[edge.target as usize].node;
            let node_class = target.node_class();
            if description.node_class_mask != 0
                && description.node_class_mask & node_class as u32 == 0
            {
                continue;
            }
            results.push(ReferenceDescription {
                reference_type_id: if result_mask.contains(BrowseResultMask::REFERENCE_TYPE) {
                    edge.reference_type.clone()
                } else {
                    NodeId::null()
                },
                is_forward: edge.is_forward,
                node_id: ExpandedNodeId::new(target.base.node_id.clone()),
                browse_name: if result_mask.contains(BrowseResultMask::BROWSE_NAME) {
                    target.base.browse_name.clone()
                } else {
                    QualifiedName::null()
                },
                display_name: if result_mask.contains(BrowseResultMask::DISPLAY_NAME) {
                    target.base.display_name.clone()
                } else {
                    LocalizedText::null()
                },
                node_class: if result_mask.contains(BrowseResultMask::NODE_CLASS) {
                    node_class
                } else {
                    NodeClass::Unspecified
                },
                type_definition: if result_mask.contains(BrowseResultMask::TYPE_DEFINITION) {
                    self.type_definition_of(edge.target)
                } else {
                    ExpandedNodeId::null()
                },
            });
        }
        Ok(results)
    }

    fn type_definition_of(&self, index: u32) -> ExpandedNodeId {
        let entry = &self.nodes[index as usize];
        match entry.node.node_type {
            NodeType::Object(_) | NodeType::Variable(_) => entry
                .references
                .iter()
                .find(|r| r.is_forward && r.reference_type == ReferenceTypeId::HasTypeDefinition)
                .map(|r| {
                    ExpandedNodeId::new(self.nodes[r.target as usize].node.base.node_id.clone())
                })
                .unwrap_or_else(ExpandedNodeId::null),
            _ => ExpandedNodeId::null(),
        }
    }

    /// Follow one relative path element from a node, returning every
    /// matching target. A null target name matches all targets.
    pub fn follow_path_element(
        &self,
        from: &NodeId,
        element: &RelativePathElement,
    ) -> Vec<NodeId> {
        let Some(&node_index) = self.index.get(from) else {
            return Vec::new();
        };
        let mut targets = Vec::new();
        for edge in &self.nodes[node_index as usize].references {
            if edge.is_forward == element.is_inverse {
                continue;
            }
            if !self.reference_matches(
                edge,
                &element.reference_type_id,
                element.include_subtypes,
            ) {
                continue;
            }
            let target = &self.nodes[edge.target as usize].node;
            if element.target_name.is_null()
                || target.base.browse_name == element.target_name
            {
                targets.push(target.base.node_id.clone());
            }
        }
        targets
    }

    /// Read one attribute of one node, honoring `max_age` semantics at the
    /// variable itself (all values here are current, so max age never
    /// forces a refresh).
    pub fn read_attribute(&self, node_id: &NodeId, attribute_id: u32) -> DataValue {
        let Ok(attribute_id) = AttributeId::try_from(attribute_id) else {
            return DataValue::new_status(StatusCode::BadAttributeIdInvalid);
        };
        // CurrentTime is always the moment of the read.
        if attribute_id == AttributeId::Value
            && *node_id == uastack_types::VariableId::Server_ServerStatus_CurrentTime
        {
            return DataValue::new_now(uastack_types::DateTime::now());
        }
        match self.find(node_id) {
            Some(node) => node.read_attribute(attribute_id),
            None => DataValue::new_status(StatusCode::BadNodeIdUnknown),
        }
    }

    /// Write one attribute of one node.
    pub fn write_attribute(
        &mut self,
        node_id: &NodeId,
        attribute_id: u32,
        value: DataValue,
    ) -> StatusCode {
        let Ok(attribute_id) = AttributeId::try_from(attribute_id) else {
            return StatusCode::BadAttributeIdInvalid;
        };
        match self.find_mut(node_id) {
            Some(node) => match node.write_attribute(attribute_id, value) {
                Ok(()) => StatusCode::Good,
                Err(status) => status,
            },
            None => StatusCode::BadNodeIdUnknown,
        }
    }

    /// Update a variable's value, for server-side producers.
    pub fn set_variable_value(
        &mut self,
        node_id: &NodeId,
        value: impl Into<Variant>,
    ) -> Result<(), StatusCode> {
        let node = self.find_mut(node_id).ok_or(StatusCode::BadNodeIdUnknown)?;
        let variable = node
            .as_variable_mut()
            .ok_or(StatusCode::BadAttributeIdInvalid)?;
        variable.value = DataValue::new_now(value);
        Ok(())
    }

    /// Bind a callable to a method node.
    pub fn register_method(
        &mut self,
        object_id: impl Into<NodeId>,
        method_id: impl Into<NodeId>,
        callable: Box<dyn MethodCallable>,
    ) {
        self.methods.register(object_id.into(), method_id.into(), callable);
    }

    /// The declared input arguments of a method, from its InputArguments
    /// property.
    pub fn method_input_arguments(&self, method_id: &NodeId) -> Option<Vec<uastack_types::Argument>> {
        let element = RelativePathElement {
            reference_type_id: ReferenceTypeId::HasProperty.into(),
            is_inverse: false,
            include_subtypes: true,
            target_name: QualifiedName::new(0, "InputArguments"),
        };
        let property_id = self.follow_path_element(method_id, &element).pop()?;
        let property = self.find(&property_id)?.as_variable()?;
        let Some(Variant::Array(array)) = &property.value.value else {
            return None;
        };
        let options = uastack_types::DecodingOptions::minimal();
        let arguments = array
            .values
            .iter()
            .filter_map(|v| match v {
                Variant::ExtensionObject(object) => {
                    object.decode_inner::<uastack_types::Argument>(&options).ok()
                }
                _ => None,
            })
            .collect::<Vec<_>>();
        Some(arguments)
    }

    /// Invoke a method after validating executability and arguments.
    /// Panics in user functors are caught and surfaced as
    /// `BadInternalError` so the session survives.
    pub fn call_method(
        &mut self,
        context: &MethodContext,
        input_arguments: &[Variant],
    ) -> uastack_types::CallMethodResult {
        use uastack_types::CallMethodResult;

        let Some(node) = self.find(&context.method_id) else {
            return CallMethodResult::from_status(StatusCode::BadMethodInvalid);
        };
        let NodeType::Method(method) = &node.node_type else {
            return CallMethodResult::from_status(StatusCode::BadMethodInvalid);
        };
        if !method.executable || !method.user_executable {
            return CallMethodResult::from_status(StatusCode::BadUserAccessDenied);
        }
        if self.find(&context.object_id).is_none() {
            return CallMethodResult::from_status(StatusCode::BadNodeIdUnknown);
        }

        // Validate the argument count and types against the declaration.
        if let Some(declared) = self.method_input_arguments(&context.method_id) {
            if input_arguments.len() < declared.len() {
                return CallMethodResult::from_status(StatusCode::BadArgumentsMissing);
            }
            if input_arguments.len() > declared.len() {
                return CallMethodResult::from_status(StatusCode::BadTooManyArguments);
            }
            let mut argument_results = Vec::with_capacity(declared.len());
            let mut all_good = true;
            for (argument, declaration) in input_arguments.iter().zip(declared.iter()) {
                let ok = argument_type_matches(argument, declaration);
                all_good &= ok;
                argument_results.push(if ok {
                    StatusCode::Good
                } else {
                    StatusCode::BadTypeMismatch
                });
            }
            if !all_good {
                return CallMethodResult {
                    status_code: StatusCode::BadInvalidArgument,
                    input_argument_results: Some(argument_results),
                    ..Default::default()
                };
            }
        }

        match self
            .methods
            .invoke(context, input_arguments)
        {
            Ok(output_arguments) => CallMethodResult {
                status_code: StatusCode::Good,
                output_arguments: Some(output_arguments),
                ..Default::default()
            },
            Err(status) => {
                debug!(
                    "Method {} on {} failed with {}",
                    context.method_id, context.object_id, status
                );
                CallMethodResult::from_status(status)
            }
        }
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

// Scalar arguments must match the declared data type; a declared
// BaseDataType accepts anything, and subtype aliases of built-in types
// accept their base encoding.
fn argument_type_matches(value: &Variant, declaration: &uastack_types::Argument) -> bool {
    use uastack_types::DataTypeId;
    if declaration.data_type == DataTypeId::BaseDataType {
        return true;
    }
    // Empty variants only satisfy optional arguments, which the
    // declaration cannot express, so reject them.
    let Some(actual) = value.data_type_id() else {
        return false;
    };
    if declaration.data_type == actual {
        return true;
    }
    declaration.data_type == DataTypeId::UtcTime && actual == DataTypeId::DateTime
        || declaration.data_type == DataTypeId::Duration && actual == DataTypeId::Double
        || declaration.data_type == DataTypeId::ServerState && actual == DataTypeId::Int32
        || declaration.data_type == DataTypeId::Enumeration && actual == DataTypeId::Int32
}

#[cfg(test)]
mod tests {
    use uastack_types::{
        BrowseDescription, BrowseDirection, BrowseResultMask, NodeClass, NodeId, ObjectId,
        QualifiedName, ReferenceTypeId, RelativePathElement, VariableId,
    };

    use super::AddressSpace;

    fn browse_all(space: &AddressSpace, node_id: impl Into<NodeId>) -> Vec<QualifiedName> {
        let description = BrowseDescription {
            node_id: node_id.into(),
            browse_direction: BrowseDirection::Forward,
            reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: BrowseResultMask::all().bits(),
        };
        space
            .browse_node(&description)
            .unwrap()
            .into_iter()
            .map(|r| r.browse_name)
            .collect()
    }

    #[test]
    fn objects_folder_contains_server() {
        let space = AddressSpace::new();
        let names = browse_all(&space, ObjectId::ObjectsFolder);
        assert!(names.contains(&QualifiedName::new(0, "Server")));
    }

    #[test]
    fn subtype_checks() {
        let space = AddressSpace::new();
        assert!(space.is_subtype_of(
            &ReferenceTypeId::Organizes.into(),
            &ReferenceTypeId::HierarchicalReferences.into()
        ));
        assert!(space.is_subtype_of(
            &ReferenceTypeId::HasProperty.into(),
            &ReferenceTypeId::Aggregates.into()
        ));
        assert!(!space.is_subtype_of(
            &ReferenceTypeId::HasProperty.into(),
            &ReferenceTypeId::Organizes.into()
        ));
    }

    #[test]
    fn follow_path_to_current_time() {
        let space = AddressSpace::new();
        let element = RelativePathElement {
            reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
            is_inverse: false,
            include_subtypes: true,
            target_name: QualifiedName::new(0, "ServerStatus"),
        };
        let status = space
            .follow_path_element(&ObjectId::Server.into(), &element)
            .pop()
            .unwrap();
        assert_eq!(status, VariableId::Server_ServerStatus);

        let element = RelativePathElement {
            reference_type_id: ReferenceTypeId::Aggregates.into(),
            is_inverse: false,
            include_subtypes: true,
            target_name: QualifiedName::new(0, "CurrentTime"),
        };
        let time = space.follow_path_element(&status, &element).pop().unwrap();
        assert_eq!(time, VariableId::Server_ServerStatus_CurrentTime);
    }

    #[test]
    fn browse_node_class_mask() {
        let space = AddressSpace::new();
        let description = BrowseDescription {
            node_id: ObjectId::Server.into(),
            browse_direction: BrowseDirection::Forward,
            reference_type_id: NodeId::null(),
            include_subtypes: true,
            node_class_mask: NodeClass::Method as u32,
            result_mask: BrowseResultMask::all().bits(),
        };
        let results = space.browse_node(&description).unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.node_class == NodeClass::Method));
    }
}
