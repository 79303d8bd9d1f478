//! Session manager behavior: admission, eviction, activation rules and
//! the timeout bookkeeping.

use uastack_types::{
    ActivateSessionRequest, AnonymousIdentityToken, ByteString, CreateSessionRequest,
    ExtensionObject, RequestHeader, StatusCode, UserNameIdentityToken,
};

use crate::diagnostics::ServerDiagnostics;

use super::{active_session, test_server};

fn create_request(timeout_ms: f64) -> CreateSessionRequest {
    CreateSessionRequest {
        request_header: RequestHeader::dummy(),
        endpoint_url: "opc.tcp://localhost:4840/".into(),
        session_name: "s".into(),
        requested_session_timeout: timeout_ms,
        ..Default::default()
    }
}

#[tokio::test]
async fn session_timeout_is_clamped() {
    let server = test_server();
    let manager = server.session_manager();
    let subscriptions = server.subscriptions();

    let response = manager
        .write()
        .create_session(1, &create_request(1.0), &subscriptions)
        .unwrap();
    // Clamped up to the ten second floor.
    assert_eq!(response.revised_session_timeout, 10_000.0);

    let response = manager
        .write()
        .create_session(1, &create_request(1.0e12), &subscriptions)
        .unwrap();
    assert_eq!(
        response.revised_session_timeout,
        server.info().config.limits.max_session_timeout_ms as f64
    );
}

#[tokio::test]
async fn bad_endpoint_url_is_rejected() {
    let server = test_server();
    let manager = server.session_manager();
    let subscriptions = server.subscriptions();

    let mut request = create_request(60_000.0);
    request.endpoint_url = Default::default();
    let err = manager
        .write()
        .create_session(1, &request, &subscriptions)
        .unwrap_err();
    assert_eq!(err, StatusCode::BadTcpEndpointUrlInvalid);

    let mut request = create_request(60_000.0);
    request.endpoint_url = "opc.tcp://localhost:4840/otherserver".into();
    let err = manager
        .write()
        .create_session(1, &request, &subscriptions)
        .unwrap_err();
    assert_eq!(err, StatusCode::BadTcpEndpointUrlInvalid);
}

#[tokio::test]
async fn admission_evicts_oldest_inactive_session() {
    let mut config = crate::config::ServerConfig::new("s", "urn:s");
    config.limits.max_sessions = 2;
    let server = crate::server::Server::new(config);
    let manager = server.session_manager();
    let subscriptions = server.subscriptions();

    // One activated session, one that never activates.
    let (_, _, _) = active_session(&server);
    let stale = manager
        .write()
        .create_session(1, &create_request(60_000.0), &subscriptions)
        .unwrap();

    // The table is full; the inactive session is evicted to admit the
    // newcomer.
    let admitted = manager
        .write()
        .create_session(1, &create_request(60_000.0), &subscriptions)
        .unwrap();
    assert!(manager
        .read()
        .find_by_token(&stale.authentication_token)
        .is_none());
    assert!(manager
        .read()
        .find_by_token(&admitted.authentication_token)
        .is_some());
    assert_eq!(manager.read().len(), 2);
}

#[tokio::test]
async fn admission_fails_when_all_sessions_active() {
    let mut config = crate::config::ServerConfig::new("s", "urn:s");
    config.limits.max_sessions = 2;
    let server = crate::server::Server::new(config);
    let manager = server.session_manager();
    let subscriptions = server.subscriptions();

    let _a = active_session(&server);
    let _b = active_session(&server);
    let err = manager
        .write()
        .create_session(1, &create_request(60_000.0), &subscriptions)
        .unwrap_err();
    assert_eq!(err, StatusCode::BadTooManySessions);
    assert_eq!(
        ServerDiagnostics::value(&server.info().diagnostics.rejected_session_count),
        1
    );
}

#[tokio::test]
async fn activate_with_unknown_token_fails() {
    let server = test_server();
    let manager = server.session_manager();
    let subscriptions = server.subscriptions();

    let activate = ActivateSessionRequest {
        request_header: RequestHeader::new(uastack_types::NodeId::new(0, 999u32), 1),
        ..Default::default()
    };
    let err = manager
        .write()
        .activate_session(1, &ByteString::null(), &activate, &subscriptions)
        .unwrap_err();
    assert_eq!(err, StatusCode::BadSessionIdInvalid);
}

#[tokio::test]
async fn inactive_session_is_pinned_to_its_channel() {
    let server = test_server();
    let manager = server.session_manager();
    let subscriptions = server.subscriptions();

    let created = manager
        .write()
        .create_session(7, &create_request(60_000.0), &subscriptions)
        .unwrap();
    let activate = ActivateSessionRequest {
        request_header: RequestHeader::new(created.authentication_token.clone(), 1),
        user_identity_token: ExtensionObject::from_message(&AnonymousIdentityToken {
            policy_id: "anonymous".into(),
        }),
        ..Default::default()
    };
    // Activating from a different channel fails while the session has
    // never been activated.
    let err = manager
        .write()
        .activate_session(8, &ByteString::null(), &activate, &subscriptions)
        .unwrap_err();
    assert_eq!(err, StatusCode::BadSecureChannelIdInvalid);

    // On its own channel it works.
    manager
        .write()
        .activate_session(7, &ByteString::null(), &activate, &subscriptions)
        .unwrap();

    // Once activated, a re-bind from a new channel with the same client
    // identity succeeds, and the session follows the new channel.
    manager
        .write()
        .activate_session(9, &ByteString::null(), &activate, &subscriptions)
        .unwrap();
    let session = manager
        .read()
        .find_by_token(&created.authentication_token)
        .unwrap();
    assert_eq!(session.read().secure_channel_id(), 9);
}

#[tokio::test]
async fn rebind_with_different_client_certificate_fails() {
    let server = test_server();
    let manager = server.session_manager();
    let subscriptions = server.subscriptions();

    let mut request = create_request(60_000.0);
    request.client_certificate = ByteString::from(vec![1u8, 2, 3]);
    let created = manager
        .write()
        .create_session(7, &request, &subscriptions)
        .unwrap();
    let activate = ActivateSessionRequest {
        request_header: RequestHeader::new(created.authentication_token.clone(), 1),
        user_identity_token: ExtensionObject::from_message(&AnonymousIdentityToken {
            policy_id: "anonymous".into(),
        }),
        ..Default::default()
    };
    manager
        .write()
        .activate_session(7, &ByteString::from(vec![1u8, 2, 3]), &activate, &subscriptions)
        .unwrap();

    // A different application identity cannot steal the session.
    let err = manager
        .write()
        .activate_session(8, &ByteString::from(vec![9u8, 9, 9]), &activate, &subscriptions)
        .unwrap_err();
    assert_eq!(err, StatusCode::BadApplicationSignatureInvalid);
}

#[tokio::test]
async fn username_identity_is_validated_at_activation() {
    let mut config = crate::config::ServerConfig::new("s", "urn:s");
    config.allow_anonymous = false;
    config.users.push(crate::config::ServerUser {
        user: "sample".to_string(),
        password: "sample1".to_string(),
    });
    let server = crate::server::Server::new(config);
    let manager = server.session_manager();
    let subscriptions = server.subscriptions();

    let created = manager
        .write()
        .create_session(1, &create_request(60_000.0), &subscriptions)
        .unwrap();

    let activate_with = |password: &str| ActivateSessionRequest {
        request_header: RequestHeader::new(created.authentication_token.clone(), 1),
        user_identity_token: ExtensionObject::from_message(&UserNameIdentityToken {
            policy_id: "username".into(),
            user_name: "sample".into(),
            password: ByteString::from(password.as_bytes()),
            encryption_algorithm: Default::default(),
        }),
        ..Default::default()
    };

    let err = manager
        .write()
        .activate_session(1, &ByteString::null(), &activate_with("wrong"), &subscriptions)
        .unwrap_err();
    assert_eq!(err, StatusCode::BadUserAccessDenied);

    manager
        .write()
        .activate_session(1, &ByteString::null(), &activate_with("sample1"), &subscriptions)
        .unwrap();
}

#[tokio::test]
async fn close_session_requires_known_token() {
    let server = test_server();
    let manager = server.session_manager();
    let subscriptions = server.subscriptions();

    let err = manager
        .write()
        .close_session(
            1,
            &uastack_types::CloseSessionRequest {
                request_header: RequestHeader::new(uastack_types::NodeId::new(0, 5u32), 1),
                delete_subscriptions: true,
            },
            &subscriptions,
        )
        .unwrap_err();
    assert_eq!(err, StatusCode::BadSessionIdInvalid);
}

#[tokio::test]
async fn channel_loss_marks_sessions_not_closed() {
    let server = test_server();
    let manager = server.session_manager();
    let (session, _, token) = active_session(&server);

    manager.write().on_channel_closed(1);
    assert_eq!(
        session.read().state(),
        crate::session::SessionState::ChannelLost
    );
    // The session is still findable for a later re-bind.
    assert!(manager.read().find_by_token(&token).is_some());

    let (next_deadline, expired) = manager.read().check_session_expiry();
    assert!(expired.is_empty());
    assert!(next_deadline > std::time::Instant::now());
}
