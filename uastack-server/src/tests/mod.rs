//! Service-level tests driving whole services against a server instance
//! with the core namespace, without a socket in the way.

mod services;
mod sessions;
mod subscription_flow;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::oneshot;
use uastack_core::ResponseMessage;
use uastack_types::{
    ActivateSessionRequest, AnonymousIdentityToken, ByteString, CreateSessionRequest,
    CreateSubscriptionRequest, DataTypeId, ExtensionObject, NodeId, PublishRequest,
    RequestHeader, StatusCode, SubscriptionAcknowledgement, Variant,
};

use crate::{
    address_space::node::{Node, NodeBase, NodeType, Variable},
    config::ServerConfig,
    server::Server,
    session::{instance::Session, message_handler::Request},
    subscriptions::PendingPublish,
};

pub(crate) fn test_server() -> Server {
    let mut config = ServerConfig::new("test-server", "urn:test-server");
    config.subscriptions.min_publishing_interval_ms = 100.0;
    config.subscriptions.min_sampling_interval_ms = 10.0;
    Server::new(config)
}

/// Create and activate an anonymous session, returning its lock, numeric
/// id and authentication token.
pub(crate) fn active_session(server: &Server) -> (Arc<RwLock<Session>>, u32, NodeId) {
    let manager = server.session_manager();
    let subscriptions = server.subscriptions();
    let create = CreateSessionRequest {
        request_header: RequestHeader::dummy(),
        endpoint_url: "opc.tcp://localhost:4840/".into(),
        session_name: "test".into(),
        requested_session_timeout: 60_000.0,
        ..Default::default()
    };
    let response = manager
        .write()
        .create_session(1, &create, &subscriptions)
        .expect("create session");

    let activate = ActivateSessionRequest {
        request_header: RequestHeader::new(response.authentication_token.clone(), 2),
        user_identity_token: ExtensionObject::from_message(&AnonymousIdentityToken {
            policy_id: "anonymous".into(),
        }),
        ..Default::default()
    };
    manager
        .write()
        .activate_session(1, &ByteString::null(), &activate, &subscriptions)
        .expect("activate session");

    let session = manager
        .read()
        .find_by_token(&response.authentication_token)
        .expect("session exists");
    let session_id = session.read().session_id_numeric();
    (session, session_id, response.authentication_token)
}

/// Build the request wrapper service handlers take.
pub(crate) fn service_request<T>(
    server: &Server,
    session: Arc<RwLock<Session>>,
    session_id: u32,
    request: T,
) -> Request<T> {
    Request {
        request: Box::new(request),
        request_id: 1,
        request_handle: 1,
        info: server.info().clone(),
        session,
        session_id,
        address_space: server.address_space(),
        subscriptions: server.subscriptions(),
    }
}

/// Create a subscription through the engine, returning its id.
pub(crate) fn create_subscription(
    server: &Server,
    session_id: u32,
    publishing_interval: f64,
    lifetime_count: u32,
    max_keep_alive_count: u32,
    max_notifications_per_publish: u32,
) -> u32 {
    let response = server
        .subscriptions()
        .create_subscription(
            session_id,
            &CreateSubscriptionRequest {
                request_header: RequestHeader::dummy(),
                requested_publishing_interval: publishing_interval,
                requested_lifetime_count: lifetime_count,
                requested_max_keep_alive_count: max_keep_alive_count,
                max_notifications_per_publish,
                publishing_enabled: true,
                priority: 0,
            },
            server.info(),
        )
        .expect("create subscription");
    response.subscription_id
}

/// Park a publish credit, returning the channel its response arrives on.
pub(crate) fn send_publish(
    server: &Server,
    session_id: u32,
    acks: Vec<SubscriptionAcknowledgement>,
) -> oneshot::Receiver<ResponseMessage> {
    let (send, recv) = oneshot::channel();
    let publish = PendingPublish {
        response: send,
        request: Box::new(PublishRequest {
            request_header: RequestHeader::dummy(),
            subscription_acknowledgements: if acks.is_empty() { None } else { Some(acks) },
        }),
        ack_results: None,
        deadline: Instant::now() + Duration::from_secs(30),
    };
    let space = server.address_space();
    let space = space.read();
    server
        .subscriptions()
        .enqueue_publish_request(session_id, &space, publish);
    recv
}

/// Tick the publish driver until the receiver resolves or the timeout
/// runs out.
pub(crate) async fn pump_until_response(
    server: &Server,
    mut recv: oneshot::Receiver<ResponseMessage>,
    timeout: Duration,
) -> ResponseMessage {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(message) = recv.try_recv() {
            return message;
        }
        assert!(Instant::now() < deadline, "no publish response in time");
        {
            let space = server.address_space();
            let space = space.read();
            server
                .subscriptions()
                .periodic_tick(&space, &server.info().diagnostics);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Add a writable Double variable under the Objects folder.
pub(crate) fn add_double_variable(server: &Server, name: &str) -> NodeId {
    use uastack_types::{ObjectId, ReferenceTypeId};
    let node_id = NodeId::new(2, name);
    let space = server.address_space();
    let mut space = space.write();
    space
        .insert_under(
            Node::new(
                NodeBase::new(node_id.clone(), (2, name), name),
                NodeType::Variable(
                    Variable::new_value(DataTypeId::Double, Variant::Double(0.0)).writable(),
                ),
            ),
            &ObjectId::ObjectsFolder.into(),
            ReferenceTypeId::Organizes,
        )
        .expect("insert variable");
    node_id
}

/// Write a new value into a variable node.
pub(crate) fn write_value(server: &Server, node_id: &NodeId, value: f64) {
    let space = server.address_space();
    space
        .write()
        .set_variable_value(node_id, Variant::Double(value))
        .expect("set value");
}

/// Unwrap a publish response, panicking on faults.
pub(crate) fn expect_publish_response(
    message: ResponseMessage,
) -> uastack_types::PublishResponse {
    match message {
        ResponseMessage::Publish(response) => *response,
        ResponseMessage::ServiceFault(fault) => panic!(
            "publish failed: {}",
            fault.response_header.service_result
        ),
        other => panic!("unexpected response {:?}", other),
    }
}

/// Unwrap a service fault, panicking on anything else.
pub(crate) fn expect_fault(message: ResponseMessage) -> StatusCode {
    match message {
        ResponseMessage::ServiceFault(fault) => fault.response_header.service_result,
        other => panic!("expected fault, got {:?}", other),
    }
}
