//! The namespace 0 subset the engine exposes: the folder skeleton, the
//! reference type hierarchy, and the Server object with its status
//! variables and standard methods.

use uastack_types::{
    Argument, Array, DataTypeId, DataValue, DateTime, ExtensionObject, LocalizedText, MethodId,
    NodeId, ObjectId, ObjectTypeId, QualifiedName, ReferenceTypeId, ServerState, UAString,
    VariableId, VariableTypeId, Variant, VariantScalarTypeId,
};

use super::{
    node::{Method, Node, NodeBase, NodeType, Object, ReferenceType, Variable},
    AddressSpace,
};

fn node(id: impl Into<NodeId>, name: &str, node_type: NodeType) -> Node {
    Node::new(NodeBase::new(id, (0, name), name), node_type)
}

fn reference_type(
    space: &mut AddressSpace,
    id: ReferenceTypeId,
    name: &str,
    is_abstract: bool,
    symmetric: bool,
    inverse_name: Option<&str>,
    supertype: Option<ReferenceTypeId>,
) {
    let n = node(
        id,
        name,
        NodeType::ReferenceType(ReferenceType {
            is_abstract,
            symmetric,
            inverse_name: inverse_name.map(LocalizedText::from),
        }),
    );
    match supertype {
        Some(supertype) => {
            let _ = space.insert_under(n, &supertype.into(), ReferenceTypeId::HasSubtype);
        }
        None => {
            let _ = space.insert(n);
        }
    }
}

fn folder(space: &mut AddressSpace, id: ObjectId, name: &str) {
    let _ = space.insert(node(id, name, NodeType::Object(Object::default())));
    let _ = space.insert_reference(
        &id.into(),
        &ObjectTypeId::FolderType.into(),
        ReferenceTypeId::HasTypeDefinition,
    );
}

fn property(
    space: &mut AddressSpace,
    parent: impl Into<NodeId>,
    id: impl Into<NodeId>,
    name: &str,
    variable: Variable,
) {
    let id = id.into();
    let _ = space.insert_under(
        node(id.clone(), name, NodeType::Variable(variable)),
        &parent.into(),
        ReferenceTypeId::HasProperty,
    );
    let _ = space.insert_reference(
        &id,
        &VariableTypeId::PropertyType.into(),
        ReferenceTypeId::HasTypeDefinition,
    );
}

fn component_variable(
    space: &mut AddressSpace,
    parent: impl Into<NodeId>,
    id: impl Into<NodeId>,
    name: &str,
    variable: Variable,
) {
    let id = id.into();
    let _ = space.insert_under(
        node(id.clone(), name, NodeType::Variable(variable)),
        &parent.into(),
        ReferenceTypeId::HasComponent,
    );
    let _ = space.insert_reference(
        &id,
        &VariableTypeId::BaseDataVariableType.into(),
        ReferenceTypeId::HasTypeDefinition,
    );
}

fn arguments_value(arguments: &[Argument]) -> Variant {
    let values = arguments
        .iter()
        .map(|a| Variant::ExtensionObject(ExtensionObject::from_message(a)))
        .collect();
    Variant::from(Array::new(VariantScalarTypeId::ExtensionObject, values))
}

fn argument(name: &str, data_type: DataTypeId, value_rank: i32) -> Argument {
    Argument {
        name: name.into(),
        data_type: data_type.into(),
        value_rank,
        array_dimensions: if value_rank == 1 { Some(vec![0]) } else { None },
        description: LocalizedText::null(),
    }
}

fn method(
    space: &mut AddressSpace,
    id: MethodId,
    name: &str,
    input: &[Argument],
    output: &[Argument],
    input_id: Option<VariableId>,
    output_id: Option<VariableId>,
) {
    let _ = space.insert_under(
        node(id, name, NodeType::Method(Method::default())),
        &ObjectId::Server.into(),
        ReferenceTypeId::HasComponent,
    );
    if let Some(input_id) = input_id {
        let variable = Variable {
            value: DataValue::new_now(arguments_value(input)),
            data_type: DataTypeId::Argument.into(),
            value_rank: 1,
            ..Variable::new_value(DataTypeId::Argument, Variant::Empty)
        };
        property(space, id, input_id, "InputArguments", variable);
    }
    if let Some(output_id) = output_id {
        let variable = Variable {
            value: DataValue::new_now(arguments_value(output)),
            data_type: DataTypeId::Argument.into(),
            value_rank: 1,
            ..Variable::new_value(DataTypeId::Argument, Variant::Empty)
        };
        property(space, id, output_id, "OutputArguments", variable);
    }
}

fn string_array(values: &[String]) -> Variant {
    Variant::from(Array::new(
        VariantScalarTypeId::String,
        values
            .iter()
            .map(|v| Variant::String(UAString::from(v.as_str())))
            .collect(),
    ))
}

/// Build the core namespace into an empty address space.
pub fn populate_core_namespace(space: &mut AddressSpace) {
    // The reference type hierarchy. Everything the browse services filter
    // on hangs off References.
    reference_type(space, ReferenceTypeId::References, "References", true, true, None, None);
    reference_type(
        space,
        ReferenceTypeId::HierarchicalReferences,
        "HierarchicalReferences",
        true,
        false,
        Some("InverseHierarchicalReferences"),
        Some(ReferenceTypeId::References),
    );
    reference_type(
        space,
        ReferenceTypeId::NonHierarchicalReferences,
        "NonHierarchicalReferences",
        true,
        true,
        None,
        Some(ReferenceTypeId::References),
    );
    reference_type(
        space,
        ReferenceTypeId::HasChild,
        "HasChild",
        true,
        false,
        Some("ChildOf"),
        Some(ReferenceTypeId::HierarchicalReferences),
    );
    reference_type(
        space,
        ReferenceTypeId::Organizes,
        "Organizes",
        false,
        false,
        Some("OrganizedBy"),
        Some(ReferenceTypeId::HierarchicalReferences),
    );
    reference_type(
        space,
        ReferenceTypeId::HasEventSource,
        "HasEventSource",
        false,
        false,
        Some("EventSourceOf"),
        Some(ReferenceTypeId::HierarchicalReferences),
    );
    reference_type(
        space,
        ReferenceTypeId::HasNotifier,
        "HasNotifier",
        false,
        false,
        Some("NotifierOf"),
        Some(ReferenceTypeId::HasEventSource),
    );
    reference_type(
        space,
        ReferenceTypeId::Aggregates,
        "Aggregates",
        true,
        false,
        Some("AggregatedBy"),
        Some(ReferenceTypeId::HasChild),
    );
    reference_type(
        space,
        ReferenceTypeId::HasSubtype,
        "HasSubtype",
        false,
        false,
        Some("SubtypeOf"),
        Some(ReferenceTypeId::HasChild),
    );
    reference_type(
        space,
        ReferenceTypeId::HasComponent,
        "HasComponent",
        false,
        false,
        Some("ComponentOf"),
        Some(ReferenceTypeId::Aggregates),
    );
    reference_type(
        space,
        ReferenceTypeId::HasProperty,
        "HasProperty",
        false,
        false,
        Some("PropertyOf"),
        Some(ReferenceTypeId::Aggregates),
    );
    reference_type(
        space,
        ReferenceTypeId::HasOrderedComponent,
        "HasOrderedComponent",
        false,
        false,
        Some("OrderedComponentOf"),
        Some(ReferenceTypeId::HasComponent),
    );
    reference_type(
        space,
        ReferenceTypeId::HasTypeDefinition,
        "HasTypeDefinition",
        false,
        false,
        Some("TypeDefinitionOf"),
        Some(ReferenceTypeId::NonHierarchicalReferences),
    );
    reference_type(
        space,
        ReferenceTypeId::HasModellingRule,
        "HasModellingRule",
        false,
        false,
        Some("ModellingRuleOf"),
        Some(ReferenceTypeId::NonHierarchicalReferences),
    );
    reference_type(
        space,
        ReferenceTypeId::HasEncoding,
        "HasEncoding",
        false,
        false,
        Some("EncodingOf"),
        Some(ReferenceTypeId::NonHierarchicalReferences),
    );
    reference_type(
        space,
        ReferenceTypeId::HasDescription,
        "HasDescription",
        false,
        false,
        Some("DescriptionOf"),
        Some(ReferenceTypeId::NonHierarchicalReferences),
    );
    reference_type(
        space,
        ReferenceTypeId::GeneratesEvent,
        "GeneratesEvent",
        false,
        false,
        Some("GeneratedBy"),
        Some(ReferenceTypeId::NonHierarchicalReferences),
    );

    // A few type nodes referenced by HasTypeDefinition.
    let _ = space.insert(node(
        ObjectTypeId::BaseObjectType,
        "BaseObjectType",
        NodeType::ObjectType(Default::default()),
    ));
    let _ = space.insert_under(
        node(ObjectTypeId::FolderType, "FolderType", NodeType::ObjectType(Default::default())),
        &ObjectTypeId::BaseObjectType.into(),
        ReferenceTypeId::HasSubtype,
    );
    let _ = space.insert_under(
        node(ObjectTypeId::ServerType, "ServerType", NodeType::ObjectType(Default::default())),
        &ObjectTypeId::BaseObjectType.into(),
        ReferenceTypeId::HasSubtype,
    );
    let _ = space.insert(node(
        VariableTypeId::BaseVariableType,
        "BaseVariableType",
        NodeType::VariableType(Default::default()),
    ));
    let _ = space.insert_under(
        node(
            VariableTypeId::BaseDataVariableType,
            "BaseDataVariableType",
            NodeType::VariableType(Default::default()),
        ),
        &VariableTypeId::BaseVariableType.into(),
        ReferenceTypeId::HasSubtype,
    );
    let _ = space.insert_under(
        node(
            VariableTypeId::PropertyType,
            "PropertyType",
            NodeType::VariableType(Default::default()),
        ),
        &VariableTypeId::BaseVariableType.into(),
        ReferenceTypeId::HasSubtype,
    );
    let _ = space.insert_under(
        node(
            VariableTypeId::ServerStatusType,
            "ServerStatusType",
            NodeType::VariableType(Default::default()),
        ),
        &VariableTypeId::BaseDataVariableType.into(),
        ReferenceTypeId::HasSubtype,
    );
    let _ = space.insert_under(
        node(
            ObjectTypeId::BaseEventType,
            "BaseEventType",
            NodeType::ObjectType(Default::default()),
        ),
        &ObjectTypeId::BaseObjectType.into(),
        ReferenceTypeId::HasSubtype,
    );

    // The folder skeleton.
    folder(space, ObjectId::RootFolder, "Root");
    folder(space, ObjectId::ObjectsFolder, "Objects");
    folder(space, ObjectId::TypesFolder, "Types");
    folder(space, ObjectId::ViewsFolder, "Views");
    let root: NodeId = ObjectId::RootFolder.into();
    let _ = space.insert_reference(
        &root,
        &ObjectId::ObjectsFolder.into(),
        ReferenceTypeId::Organizes,
    );
    let _ = space.insert_reference(
        &root,
        &ObjectId::TypesFolder.into(),
        ReferenceTypeId::Organizes,
    );
    let _ = space.insert_reference(
        &root,
        &ObjectId::ViewsFolder.into(),
        ReferenceTypeId::Organizes,
    );

    // The Server object and its mandatory children.
    let _ = space.insert_under(
        node(ObjectId::Server, "Server", NodeType::Object(Object::default())),
        &ObjectId::ObjectsFolder.into(),
        ReferenceTypeId::Organizes,
    );
    let server: NodeId = ObjectId::Server.into();
    let _ = space.insert_reference(
        &server,
        &ObjectTypeId::ServerType.into(),
        ReferenceTypeId::HasTypeDefinition,
    );

    property(
        space,
        ObjectId::Server,
        VariableId::Server_ServerArray,
        "ServerArray",
        Variable {
            value: DataValue::new_now(string_array(&[])),
            value_rank: 1,
            ..Variable::new_value(DataTypeId::String, Variant::Empty)
        },
    );
    property(
        space,
        ObjectId::Server,
        VariableId::Server_NamespaceArray,
        "NamespaceArray",
        Variable {
            value: DataValue::new_now(string_array(&[])),
            value_rank: 1,
            ..Variable::new_value(DataTypeId::String, Variant::Empty)
        },
    );
    property(
        space,
        ObjectId::Server,
        VariableId::Server_ServiceLevel,
        "ServiceLevel",
        Variable::new_value(DataTypeId::Byte, Variant::Byte(255)),
    );

    component_variable(
        space,
        ObjectId::Server,
        VariableId::Server_ServerStatus,
        "ServerStatus",
        Variable::new_value(DataTypeId::ServerStatusDataType, Variant::Empty),
    );
    let status: NodeId = VariableId::Server_ServerStatus.into();
    let _ = space.insert_reference(
        &status,
        &VariableTypeId::ServerStatusType.into(),
        ReferenceTypeId::HasTypeDefinition,
    );
    component_variable(
        space,
        status.clone(),
        VariableId::Server_ServerStatus_StartTime,
        "StartTime",
        Variable::new_value(DataTypeId::UtcTime, Variant::from(DateTime::now())),
    );
    component_variable(
        space,
        status.clone(),
        VariableId::Server_ServerStatus_CurrentTime,
        "CurrentTime",
        Variable::new_value(DataTypeId::UtcTime, Variant::from(DateTime::now())),
    );
    component_variable(
        space,
        status.clone(),
        VariableId::Server_ServerStatus_State,
        "State",
        Variable::new_value(DataTypeId::ServerState, Variant::Int32(ServerState::Running as i32)),
    );
    component_variable(
        space,
        status,
        VariableId::Server_ServerStatus_BuildInfo,
        "BuildInfo",
        Variable::new_value(DataTypeId::BuildInfo, Variant::Empty),
    );

    let _ = space.insert_under(
        node(
            ObjectId::Server_ServerCapabilities,
            "ServerCapabilities",
            NodeType::Object(Object::default()),
        ),
        &server,
        ReferenceTypeId::HasComponent,
    );
    let _ = space.insert_under(
        node(
            ObjectId::Server_ServerDiagnostics,
            "ServerDiagnostics",
            NodeType::Object(Object::default()),
        ),
        &server,
        ReferenceTypeId::HasComponent,
    );
    property(
        space,
        ObjectId::Server_ServerDiagnostics,
        VariableId::Server_ServerDiagnostics_EnabledFlag,
        "EnabledFlag",
        Variable::new_value(DataTypeId::Boolean, Variant::Boolean(true)),
    );

    // The standard server methods. Their callables are bound by the
    // server once the subscription engine exists.
    method(
        space,
        MethodId::Server_GetMonitoredItems,
        "GetMonitoredItems",
        &[argument("SubscriptionId", DataTypeId::UInt32, -1)],
        &[
            argument("ServerHandles", DataTypeId::UInt32, 1),
            argument("ClientHandles", DataTypeId::UInt32, 1),
        ],
        Some(VariableId::Server_GetMonitoredItems_InputArguments),
        Some(VariableId::Server_GetMonitoredItems_OutputArguments),
    );
    method(
        space,
        MethodId::Server_SetSubscriptionDurable,
        "SetSubscriptionDurable",
        &[
            argument("SubscriptionId", DataTypeId::UInt32, -1),
            argument("LifetimeInHours", DataTypeId::UInt32, -1),
        ],
        &[argument("RevisedLifetimeInHours", DataTypeId::UInt32, -1)],
        Some(VariableId::Server_SetSubscriptionDurable_InputArguments),
        Some(VariableId::Server_SetSubscriptionDurable_OutputArguments),
    );
    method(
        space,
        MethodId::Server_ResendData,
        "ResendData",
        &[argument("SubscriptionId", DataTypeId::UInt32, -1)],
        &[],
        Some(VariableId::Server_ResendData_InputArguments),
        None,
    );
    method(
        space,
        MethodId::Server_RequestServerStateChange,
        "RequestServerStateChange",
        &[
            argument("State", DataTypeId::ServerState, -1),
            argument("EstimatedReturnTime", DataTypeId::DateTime, -1),
            argument("SecondsTillShutdown", DataTypeId::UInt32, -1),
            argument("Reason", DataTypeId::LocalizedText, -1),
            argument("Restart", DataTypeId::Boolean, -1),
        ],
        &[],
        Some(VariableId::Server_RequestServerStateChange_InputArguments),
        None,
    );
}
