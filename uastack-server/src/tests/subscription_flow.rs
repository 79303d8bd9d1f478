//! End-to-end publish flows: keep-alives, data changes, transfer,
//! republish and publish queue overflow.

use std::time::Duration;

use uastack_types::{
    encoding::DecodingOptions, DataChangeNotification, MonitoredItemCreateRequest,
    MonitoringMode, MonitoringParameters, ReadValueId, RequestHeader, StatusCode,
    SubscriptionAcknowledgement, TimestampsToReturn, Variant,
};

use super::{
    active_session, add_double_variable, create_subscription, expect_fault,
    expect_publish_response, pump_until_response, send_publish, test_server, write_value,
};

fn create_item(
    server: &crate::server::Server,
    session_id: u32,
    subscription_id: u32,
    node_id: &uastack_types::NodeId,
    queue_size: u32,
) -> u32 {
    let space = server.address_space();
    let space = space.read();
    let results = server
        .subscriptions()
        .create_monitored_items(
            session_id,
            subscription_id,
            TimestampsToReturn::Both,
            &[MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::value_of(node_id.clone()),
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 11,
                    sampling_interval: 10.0,
                    filter: Default::default(),
                    queue_size,
                    discard_oldest: true,
                },
            }],
            &space,
            server.info(),
        )
        .expect("create items");
    assert_eq!(results[0].status_code, StatusCode::Good);
    results[0].monitored_item_id
}

fn data_change_values(response: &uastack_types::PublishResponse) -> Vec<Variant> {
    let options = DecodingOptions::default();
    response
        .notification_message
        .notification_data
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(|object| object.decode_inner::<DataChangeNotification>(&options).ok())
        .flat_map(|notification| notification.monitored_items.unwrap_or_default())
        .filter_map(|item| item.value.value)
        .collect()
}

#[tokio::test]
async fn keep_alive_when_nothing_changes() {
    let server = test_server();
    let (_, session_id, _) = active_session(&server);
    let subscription_id = create_subscription(&server, session_id, 100.0, 60, 2, 0);

    let recv = send_publish(&server, session_id, Vec::new());
    let response = pump_until_response(&server, recv, Duration::from_secs(3)).await;
    let response = expect_publish_response(response);
    assert_eq!(response.subscription_id, subscription_id);
    assert!(response.notification_message.is_keep_alive());
    assert_eq!(response.notification_message.sequence_number, 1);

    // The next credit produces the next keep-alive in sequence.
    let recv = send_publish(&server, session_id, Vec::new());
    let response = pump_until_response(&server, recv, Duration::from_secs(3)).await;
    let response = expect_publish_response(response);
    assert!(response.notification_message.is_keep_alive());
    assert_eq!(response.notification_message.sequence_number, 2);
}

#[tokio::test]
async fn data_change_reaches_publish() {
    let server = test_server();
    let (_, session_id, _) = active_session(&server);
    let variable = add_double_variable(&server, "measurement");
    let subscription_id = create_subscription(&server, session_id, 100.0, 60, 10, 0);
    create_item(&server, session_id, subscription_id, &variable, 10);

    write_value(&server, &variable, 1.5);
    let recv = send_publish(&server, session_id, Vec::new());
    let response = pump_until_response(&server, recv, Duration::from_secs(3)).await;
    let response = expect_publish_response(response);
    assert!(!response.notification_message.is_keep_alive());
    let values = data_change_values(&response);
    assert!(values.contains(&Variant::Double(1.5)), "got {:?}", values);

    // The dispatched message is available for republish until it is
    // acknowledged.
    let sequence_number = response.notification_message.sequence_number;
    let republished = server
        .subscriptions()
        .republish(
            session_id,
            &uastack_types::RepublishRequest {
                request_header: RequestHeader::dummy(),
                subscription_id,
                retransmit_sequence_number: sequence_number,
            },
        )
        .expect("republish");
    assert_eq!(
        republished.notification_message.sequence_number,
        sequence_number
    );

    // Acknowledge it on the next publish and republish stops working.
    let recv = send_publish(
        &server,
        session_id,
        vec![SubscriptionAcknowledgement {
            subscription_id,
            sequence_number,
        }],
    );
    let response = pump_until_response(&server, recv, Duration::from_secs(3)).await;
    let response = expect_publish_response(response);
    assert_eq!(response.results, Some(vec![StatusCode::Good]));
    let err = server
        .subscriptions()
        .republish(
            session_id,
            &uastack_types::RepublishRequest {
                request_header: RequestHeader::dummy(),
                subscription_id,
                retransmit_sequence_number: sequence_number,
            },
        )
        .unwrap_err();
    assert_eq!(err, StatusCode::BadMessageNotAvailable);
}

#[tokio::test]
async fn transfer_preserves_pending_notifications() {
    let server = test_server();
    let (_, session_a, _) = active_session(&server);
    let (_, session_b, _) = active_session(&server);
    let variable = add_double_variable(&server, "transfer-source");

    // One notification per publish so the backlog drains in order.
    let subscription_id = create_subscription(&server, session_a, 100.0, 60, 10, 1);
    create_item(&server, session_a, subscription_id, &variable, 10);

    // Produce five values, ticking between writes so each is sampled.
    for (i, value) in [1.0, 2.0, 3.0, 4.0, 5.0].iter().enumerate() {
        write_value(&server, &variable, *value);
        for _ in 0..20 {
            {
                let space = server.address_space();
                let space = space.read();
                server
                    .subscriptions()
                    .periodic_tick(&space, &server.info().diagnostics);
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        let _ = i;
    }

    // Transfer to session B before any publish.
    let transfer = {
        let space = server.address_space();
        let space = space.read();
        server
            .subscriptions()
            .transfer(
                session_b,
                &[subscription_id],
                false,
                &space,
                &server.info().diagnostics,
            )
            .expect("transfer")
    };
    assert_eq!(transfer[0].status_code, StatusCode::Good);

    // The backlog arrives on session B, in order, with no gaps.
    let mut values = Vec::new();
    let mut sequence_numbers = Vec::new();
    for _ in 0..5 {
        let recv = send_publish(&server, session_b, Vec::new());
        let response = pump_until_response(&server, recv, Duration::from_secs(3)).await;
        let response = expect_publish_response(response);
        if response.notification_message.is_keep_alive() {
            break;
        }
        sequence_numbers.push(response.notification_message.sequence_number);
        values.extend(data_change_values(&response));
    }
    assert_eq!(
        values,
        vec![
            Variant::Double(1.0),
            Variant::Double(2.0),
            Variant::Double(3.0),
            Variant::Double(4.0),
            Variant::Double(5.0)
        ]
    );
    for pair in sequence_numbers.windows(2) {
        assert_eq!(pair[1], pair[0] + 1, "sequence gap in {:?}", sequence_numbers);
    }

    // Publishing on the old session finds no subscription.
    let recv = send_publish(&server, session_a, Vec::new());
    let response = pump_until_response(&server, recv, Duration::from_secs(3)).await;
    assert_eq!(expect_fault(response), StatusCode::BadNoSubscription);
}

#[tokio::test]
async fn transfer_to_same_session_is_nothing_to_do() {
    let server = test_server();
    let (_, session_id, _) = active_session(&server);
    let subscription_id = create_subscription(&server, session_id, 100.0, 60, 10, 0);

    let space = server.address_space();
    let space = space.read();
    let results = server
        .subscriptions()
        .transfer(
            session_id,
            &[subscription_id, 999_999],
            false,
            &space,
            &server.info().diagnostics,
        )
        .expect("transfer");
    assert_eq!(results[0].status_code, StatusCode::BadNothingToDo);
    assert_eq!(results[1].status_code, StatusCode::BadSubscriptionIdInvalid);
}

#[tokio::test]
async fn publish_queue_overflow_fails_oldest() {
    let server = test_server();
    let (_, session_id, _) = active_session(&server);
    // Publishing disabled: credits pile up.
    let response = server
        .subscriptions()
        .create_subscription(
            session_id,
            &uastack_types::CreateSubscriptionRequest {
                request_header: RequestHeader::dummy(),
                requested_publishing_interval: 100.0,
                requested_lifetime_count: 600,
                requested_max_keep_alive_count: 200,
                max_notifications_per_publish: 0,
                publishing_enabled: false,
                priority: 0,
            },
            server.info(),
        )
        .expect("create subscription");
    let _ = response.subscription_id;

    let cap = server
        .info()
        .config
        .subscriptions
        .max_publish_requests_per_session;
    let mut receivers = Vec::new();
    for _ in 0..cap + 1 {
        receivers.push(send_publish(&server, session_id, Vec::new()));
    }
    // The oldest credit was completed with the overflow status.
    let first = receivers.remove(0).await.expect("oldest completed");
    assert_eq!(expect_fault(first), StatusCode::BadTooManyPublishRequests);
}

#[tokio::test]
async fn publish_without_subscription_fails() {
    let server = test_server();
    let (_, session_id, _) = active_session(&server);
    let recv = send_publish(&server, session_id, Vec::new());
    let response = recv.await.expect("completed at once");
    assert_eq!(expect_fault(response), StatusCode::BadNoSubscription);
}

#[tokio::test]
async fn session_close_detaches_subscriptions_for_transfer() {
    let server = test_server();
    let (_, session_a, token_a) = active_session(&server);
    let variable = add_double_variable(&server, "orphan-source");
    let subscription_id = create_subscription(&server, session_a, 100.0, 600, 10, 1);
    create_item(&server, session_a, subscription_id, &variable, 10);

    // Close session A keeping the subscriptions.
    let manager = server.session_manager();
    manager
        .write()
        .close_session(
            1,
            &uastack_types::CloseSessionRequest {
                request_header: RequestHeader::new(token_a, 9),
                delete_subscriptions: false,
            },
            &server.subscriptions(),
        )
        .expect("close session");

    // The orphaned subscription is still transferable to a new session.
    let (_, session_b, _) = active_session(&server);
    let space = server.address_space();
    let results = {
        let space = space.read();
        server
            .subscriptions()
            .transfer(
                session_b,
                &[subscription_id],
                true,
                &space,
                &server.info().diagnostics,
            )
            .expect("transfer")
    };
    assert_eq!(results[0].status_code, StatusCode::Good);

    // send_initial_values requeued the current value.
    let recv = send_publish(&server, session_b, Vec::new());
    let response = pump_until_response(&server, recv, Duration::from_secs(3)).await;
    let response = expect_publish_response(response);
    assert!(!response.notification_message.is_keep_alive());
}

#[tokio::test]
async fn event_item_delivers_filtered_events() {
    use uastack_types::{ContentFilter, EventFilter, ExtensionObject, ObjectId};

    let server = test_server();
    let (_, session_id, _) = active_session(&server);
    let subscription_id = create_subscription(&server, session_id, 100.0, 60, 10, 0);

    let filter = EventFilter {
        select_clauses: Some(crate::events::base_event_select_clauses(&[
            "Severity", "Message",
        ])),
        where_clause: ContentFilter { elements: None },
    };
    {
        let space = server.address_space();
        let space = space.read();
        let results = server
            .subscriptions()
            .create_monitored_items(
                session_id,
                subscription_id,
                TimestampsToReturn::Both,
                &[MonitoredItemCreateRequest {
                    item_to_monitor: ReadValueId {
                        node_id: ObjectId::Server.into(),
                        attribute_id: uastack_types::AttributeId::EventNotifier as u32,
                        ..Default::default()
                    },
                    monitoring_mode: MonitoringMode::Reporting,
                    requested_parameters: MonitoringParameters {
                        client_handle: 21,
                        sampling_interval: 0.0,
                        filter: ExtensionObject::from_message(&filter),
                        queue_size: 10,
                        discard_oldest: true,
                    },
                }],
                &space,
                server.info(),
            )
            .expect("create event item");
        assert_eq!(results[0].status_code, StatusCode::Good);
    }

    let event = crate::events::Event::new(
        uastack_types::ObjectTypeId::BaseEventType,
        ObjectId::Server,
        "Server",
        "something happened",
        700,
    );
    server.raise_event(&ObjectId::Server.into(), &event);

    let recv = send_publish(&server, session_id, Vec::new());
    let response = pump_until_response(&server, recv, Duration::from_secs(3)).await;
    let response = expect_publish_response(response);
    assert!(!response.notification_message.is_keep_alive());

    let options = DecodingOptions::default();
    let events: Vec<uastack_types::EventFieldList> = response
        .notification_message
        .notification_data
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(|object| {
            object
                .decode_inner::<uastack_types::EventNotificationList>(&options)
                .ok()
        })
        .flat_map(|list| list.events.unwrap_or_default())
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].client_handle, 21);
    let fields = events[0].event_fields.as_ref().unwrap();
    assert_eq!(fields[0], Variant::UInt16(700));
}

#[tokio::test]
async fn get_monitored_items_and_durable() {
    let server = test_server();
    let (_, session_id, _) = active_session(&server);
    let variable = add_double_variable(&server, "durable-source");
    let subscription_id = create_subscription(&server, session_id, 100.0, 60, 10, 0);

    // Durable while empty.
    let revised = server
        .subscriptions()
        .set_subscription_durable(subscription_id, 100)
        .expect("durable");
    assert_eq!(revised, 100);

    let item_id = create_item(&server, session_id, subscription_id, &variable, 5);
    let (server_handles, client_handles) = server
        .subscriptions()
        .get_monitored_items(subscription_id)
        .expect("handles");
    assert_eq!(server_handles, vec![item_id]);
    assert_eq!(client_handles, vec![11]);

    // Not durable once items exist.
    let err = server
        .subscriptions()
        .set_subscription_durable(subscription_id, 10)
        .unwrap_err();
    assert_eq!(err, StatusCode::BadInvalidState);
}
