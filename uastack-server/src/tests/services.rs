//! Scenario tests for the view, attribute and method services.

use uastack_core::ResponseMessage;
use uastack_types::{
    relative_path::standard_reference_type_resolver, AttributeId, BrowseDescription,
    BrowseDirection, BrowsePath, BrowseRequest, BrowseResultMask, CallMethodRequest, CallRequest,
    DataTypeId, MethodId, NodeClass, NodeId, ObjectId, QualifiedName, ReadRequest, ReadValueId,
    ReferenceTypeId, RelativePath, RequestHeader, StatusCode, TimestampsToReturn,
    TranslateBrowsePathsToNodeIdsRequest, VariableId, Variant, ViewDescription, WriteRequest,
    WriteValue,
};

use crate::session::services;

use super::{active_session, service_request, test_server};

#[tokio::test]
async fn browse_objects_folder_finds_server() {
    let server = test_server();
    let (session, session_id, _) = active_session(&server);

    let request = BrowseRequest {
        request_header: RequestHeader::dummy(),
        view: ViewDescription::default(),
        requested_max_references_per_node: 0,
        nodes_to_browse: Some(vec![BrowseDescription {
            node_id: ObjectId::ObjectsFolder.into(),
            browse_direction: BrowseDirection::Forward,
            reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: BrowseResultMask::all().bits(),
        }]),
    };
    let response = services::browse(service_request(&server, session, session_id, request)).await;
    let ResponseMessage::Browse(response) = response.message else {
        panic!("expected browse response");
    };
    let results = response.results.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status_code, StatusCode::Good);
    let references = results[0].references.as_ref().unwrap();
    let server_ref = references
        .iter()
        .find(|r| r.node_id.node_id == ObjectId::Server)
        .expect("Server reference present");
    assert!(server_ref.is_forward);
    assert_eq!(server_ref.browse_name, QualifiedName::new(0, "Server"));
    assert_eq!(server_ref.node_class, NodeClass::Object);
}

#[tokio::test]
async fn browse_pages_with_continuation_points() {
    let server = test_server();
    let (session, session_id, _) = active_session(&server);

    let request = BrowseRequest {
        request_header: RequestHeader::dummy(),
        view: ViewDescription::default(),
        requested_max_references_per_node: 2,
        nodes_to_browse: Some(vec![BrowseDescription {
            node_id: ObjectId::Server.into(),
            browse_direction: BrowseDirection::Forward,
            reference_type_id: NodeId::null(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: BrowseResultMask::all().bits(),
        }]),
    };
    let response = services::browse(service_request(
        &server,
        session.clone(),
        session_id,
        request,
    ))
    .await;
    let ResponseMessage::Browse(response) = response.message else {
        panic!("expected browse response");
    };
    let result = &response.results.unwrap()[0];
    assert_eq!(result.references.as_ref().unwrap().len(), 2);
    assert!(!result.continuation_point.is_null());

    // Continue until the continuation point is exhausted.
    let mut continuation_point = result.continuation_point.clone();
    let mut total = 2;
    while !continuation_point.is_null() {
        let request = uastack_types::BrowseNextRequest {
            request_header: RequestHeader::dummy(),
            release_continuation_points: false,
            continuation_points: Some(vec![continuation_point.clone()]),
        };
        let response = services::browse_next(service_request(
            &server,
            session.clone(),
            session_id,
            request,
        ))
        .await;
        let ResponseMessage::BrowseNext(response) = response.message else {
            panic!("expected browse next response");
        };
        let result = &response.results.unwrap()[0];
        assert_eq!(result.status_code, StatusCode::Good);
        total += result.references.as_ref().map_or(0, |r| r.len());
        continuation_point = result.continuation_point.clone();
    }
    assert!(total > 2, "expected more references than one page");

    // A consumed continuation point is invalid.
    let request = uastack_types::BrowseNextRequest {
        request_header: RequestHeader::dummy(),
        release_continuation_points: false,
        continuation_points: Some(vec![uastack_types::ByteString::from(vec![1u8, 2, 3])]),
    };
    let response =
        services::browse_next(service_request(&server, session, session_id, request)).await;
    let ResponseMessage::BrowseNext(response) = response.message else {
        panic!("expected browse next response");
    };
    assert_eq!(
        response.results.unwrap()[0].status_code,
        StatusCode::BadContinuationPointInvalid
    );
}

#[tokio::test]
async fn read_server_state_is_running() {
    let server = test_server();
    let (session, session_id, _) = active_session(&server);

    let request = ReadRequest {
        request_header: RequestHeader::dummy(),
        max_age: 0.0,
        timestamps_to_return: TimestampsToReturn::Both,
        nodes_to_read: Some(vec![ReadValueId::value_of(
            VariableId::Server_ServerStatus_State,
        )]),
    };
    let response = services::read(service_request(&server, session, session_id, request)).await;
    let ResponseMessage::Read(response) = response.message else {
        panic!("expected read response");
    };
    let value = &response.results.unwrap()[0];
    assert_eq!(value.value, Some(Variant::Int32(0)));
    let source = value.source_timestamp.expect("source timestamp");
    let age_ms = uastack_types::DateTime::now().ms_since(&source);
    assert!(age_ms < 5_000, "timestamp too old: {} ms", age_ms);
}

#[tokio::test]
async fn write_rules_are_enforced() {
    let server = test_server();
    let (session, session_id, _) = active_session(&server);
    let variable = super::add_double_variable(&server, "writable");

    let request = WriteRequest {
        request_header: RequestHeader::dummy(),
        nodes_to_write: Some(vec![
            WriteValue {
                node_id: variable.clone(),
                attribute_id: AttributeId::Value as u32,
                index_range: Default::default(),
                value: Variant::Double(42.0).into(),
            },
            // The state variable is not writable.
            WriteValue {
                node_id: VariableId::Server_ServerStatus_State.into(),
                attribute_id: AttributeId::Value as u32,
                index_range: Default::default(),
                value: Variant::Int32(4).into(),
            },
            // Unknown attribute.
            WriteValue {
                node_id: variable.clone(),
                attribute_id: 99,
                index_range: Default::default(),
                value: Variant::Double(1.0).into(),
            },
        ]),
    };
    let response = services::write(service_request(&server, session, session_id, request)).await;
    let ResponseMessage::Write(response) = response.message else {
        panic!("expected write response");
    };
    let results = response.results.unwrap();
    assert_eq!(results[0], StatusCode::Good);
    assert_eq!(results[1], StatusCode::BadNotWritable);
    assert_eq!(results[2], StatusCode::BadAttributeIdInvalid);

    let space = server.address_space();
    let value = space
        .read()
        .read_attribute(&variable, AttributeId::Value as u32);
    assert_eq!(value.value, Some(Variant::Double(42.0)));
}

#[tokio::test]
async fn translate_path_to_current_time() {
    let server = test_server();
    let (session, session_id, _) = active_session(&server);

    let relative_path = RelativePath::parse(
        "/0:ServerStatus.0:CurrentTime",
        &standard_reference_type_resolver,
    )
    .unwrap();
    let request = TranslateBrowsePathsToNodeIdsRequest {
        request_header: RequestHeader::dummy(),
        browse_paths: Some(vec![BrowsePath {
            starting_node: ObjectId::Server.into(),
            relative_path,
        }]),
    };
    let response = services::translate_browse_paths(service_request(
        &server,
        session,
        session_id,
        request,
    ))
    .await;
    let ResponseMessage::TranslateBrowsePathsToNodeIds(response) = response.message else {
        panic!("expected translate response");
    };
    let result = &response.results.unwrap()[0];
    assert_eq!(result.status_code, StatusCode::Good);
    let targets = result.targets.as_ref().unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(
        targets[0].target_id.node_id,
        VariableId::Server_ServerStatus_CurrentTime
    );
    assert_eq!(targets[0].remaining_path_index, u32::MAX);
}

#[tokio::test]
async fn translate_no_match() {
    let server = test_server();
    let (session, session_id, _) = active_session(&server);

    let relative_path =
        RelativePath::parse("/0:NoSuchNode", &standard_reference_type_resolver).unwrap();
    let request = TranslateBrowsePathsToNodeIdsRequest {
        request_header: RequestHeader::dummy(),
        browse_paths: Some(vec![BrowsePath {
            starting_node: ObjectId::Server.into(),
            relative_path,
        }]),
    };
    let response = services::translate_browse_paths(service_request(
        &server,
        session,
        session_id,
        request,
    ))
    .await;
    let ResponseMessage::TranslateBrowsePathsToNodeIds(response) = response.message else {
        panic!("expected translate response");
    };
    assert_eq!(
        response.results.unwrap()[0].status_code,
        StatusCode::BadNoMatch
    );
}

#[tokio::test]
async fn call_get_monitored_items() {
    let server = test_server();
    let (session, session_id, _) = active_session(&server);
    let subscription_id = super::create_subscription(&server, session_id, 100.0, 60, 10, 0);

    let request = CallRequest {
        request_header: RequestHeader::dummy(),
        methods_to_call: Some(vec![
            CallMethodRequest {
                object_id: ObjectId::Server.into(),
                method_id: MethodId::Server_GetMonitoredItems.into(),
                input_arguments: Some(vec![Variant::UInt32(subscription_id)]),
            },
            // Wrong argument type.
            CallMethodRequest {
                object_id: ObjectId::Server.into(),
                method_id: MethodId::Server_GetMonitoredItems.into(),
                input_arguments: Some(vec![Variant::from("nope")]),
            },
            // Unknown method.
            CallMethodRequest {
                object_id: ObjectId::Server.into(),
                method_id: NodeId::new(5, 1234u32),
                input_arguments: None,
            },
        ]),
    };
    let response = services::call(service_request(&server, session, session_id, request)).await;
    let ResponseMessage::Call(response) = response.message else {
        panic!("expected call response");
    };
    let results = response.results.unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);
    let outputs = results[0].output_arguments.as_ref().unwrap();
    assert_eq!(outputs.len(), 2);
    assert!(matches!(outputs[0], Variant::Array(_)));
    assert_eq!(results[1].status_code, StatusCode::BadInvalidArgument);
    assert_eq!(
        results[1].input_argument_results.as_ref().unwrap()[0],
        StatusCode::BadTypeMismatch
    );
    assert_eq!(results[2].status_code, StatusCode::BadMethodInvalid);
}

#[tokio::test]
async fn history_read_is_dispatched_but_unsupported() {
    let server = test_server();
    let (session, session_id, _) = active_session(&server);

    let request = uastack_types::HistoryReadRequest {
        request_header: RequestHeader::dummy(),
        history_read_details: Default::default(),
        timestamps_to_return: TimestampsToReturn::Both,
        release_continuation_points: false,
        nodes_to_read: Some(vec![uastack_types::HistoryReadValueId {
            node_id: VariableId::Server_ServerStatus_State.into(),
            ..Default::default()
        }]),
    };
    let response =
        services::history_read(service_request(&server, session, session_id, request)).await;
    let ResponseMessage::HistoryRead(response) = response.message else {
        panic!("expected history read response");
    };
    assert_eq!(
        response.results.unwrap()[0].status_code,
        StatusCode::BadHistoryOperationUnsupported
    );
}

#[tokio::test]
async fn read_rejects_empty_and_bogus_requests() {
    let server = test_server();
    let (session, session_id, _) = active_session(&server);

    let request = ReadRequest {
        request_header: RequestHeader::dummy(),
        max_age: 0.0,
        timestamps_to_return: TimestampsToReturn::Both,
        nodes_to_read: None,
    };
    let response = services::read(service_request(
        &server,
        session.clone(),
        session_id,
        request,
    ))
    .await;
    assert_eq!(
        super::expect_fault(response.message),
        StatusCode::BadNothingToDo
    );

    let request = ReadRequest {
        request_header: RequestHeader::dummy(),
        max_age: -1.0,
        timestamps_to_return: TimestampsToReturn::Both,
        nodes_to_read: Some(vec![ReadValueId::value_of(
            VariableId::Server_ServerStatus_State,
        )]),
    };
    let response = services::read(service_request(&server, session, session_id, request)).await;
    assert_eq!(
        super::expect_fault(response.message),
        StatusCode::BadMaxAgeInvalid
    );
}

#[tokio::test]
async fn read_unknown_node_is_per_operation_error() {
    let server = test_server();
    let (session, session_id, _) = active_session(&server);

    let request = ReadRequest {
        request_header: RequestHeader::dummy(),
        max_age: 0.0,
        timestamps_to_return: TimestampsToReturn::Both,
        nodes_to_read: Some(vec![
            ReadValueId::value_of(NodeId::new(7, "missing")),
            ReadValueId {
                node_id: VariableId::Server_ServerStatus_State.into(),
                attribute_id: AttributeId::DataType as u32,
                ..Default::default()
            },
        ]),
    };
    let response = services::read(service_request(&server, session, session_id, request)).await;
    let ResponseMessage::Read(response) = response.message else {
        panic!("expected read response");
    };
    // Semantic errors ride inside the results; the service is Good.
    assert_eq!(response.response_header.service_result, StatusCode::Good);
    let results = response.results.unwrap();
    assert_eq!(results[0].status(), StatusCode::BadNodeIdUnknown);
    assert_eq!(
        results[1].value,
        Some(Variant::from(NodeId::from(DataTypeId::ServerState)))
    );
}
