//! The server-global subscription engine: ownership of subscriptions by
//! sessions, the orphanage for detached subscriptions, publish credit
//! matching, and transfer between sessions.

pub mod monitored_item;
pub mod session_subscriptions;
pub mod subscription;

pub use monitored_item::{FilterType, MonitoredItem, Notification};
pub use session_subscriptions::{PendingPublish, SessionSubscriptions};
pub use subscription::{Subscription, SubscriptionState, TickReason};

use std::time::Instant;

use hashbrown::HashMap;
use log::{debug, info};
use parking_lot::RwLock;
use uastack_types::{
    encoding::DecodingOptions, CreateSubscriptionRequest, DeadbandType,
    ModifySubscriptionRequest, MonitoredItemCreateRequest, MonitoredItemCreateResult,
    MonitoredItemModifyRequest, MonitoredItemModifyResult, MonitoringMode, NodeId,
    QualifiedName, Range, ReferenceTypeId, RelativePathElement,
    RepublishRequest, RepublishResponse, ResponseHeader, StatusCode, TimestampsToReturn,
    TransferResult, Variant,
};

use crate::{
    address_space::AddressSpace,
    authenticator::UserToken,
    config::SubscriptionLimits,
    diagnostics::ServerDiagnostics,
    events::Event,
    info::ServerInfo,
};

struct SessionEntry {
    subs: SessionSubscriptions,
    /// Detached entries belong to closed sessions: their lifetime
    /// counters run, but no publish credit can ever arrive.
    detached: bool,
}

struct Inner {
    sessions: HashMap<u32, SessionEntry>,
    /// Which session owns each subscription. Subscription ids are
    /// server-global, which is what makes transfer possible.
    owner: HashMap<u32, u32>,
}

/// The server-global subscription engine.
pub struct SubscriptionCache {
    limits: SubscriptionLimits,
    inner: RwLock<Inner>,
}

impl SubscriptionCache {
    /// Create the cache with the configured limits.
    pub fn new(limits: SubscriptionLimits) -> SubscriptionCache {
        SubscriptionCache {
            limits,
            inner: RwLock::new(Inner {
                sessions: HashMap::new(),
                owner: HashMap::new(),
            }),
        }
    }

    /// Ensure a session entry exists, updating its user token. Called on
    /// session activation.
    pub fn ensure_session(&self, session_id: u32, user_token: &UserToken) {
        let mut inner = self.inner.write();
        match inner.sessions.get_mut(&session_id) {
            Some(entry) => {
                entry.detached = false;
                entry.subs.set_user_token(user_token.clone());
            }
            None => {
                inner.sessions.insert(
                    session_id,
                    SessionEntry {
                        subs: SessionSubscriptions::new(
                            session_id,
                            user_token.clone(),
                            self.limits.clone(),
                        ),
                        detached: false,
                    },
                );
            }
        }
    }

    /// The subscription ids owned by a session.
    pub fn session_subscription_ids(&self, session_id: u32) -> Vec<u32> {
        let inner = self.inner.read();
        inner
            .sessions
            .get(&session_id)
            .map(|e| e.subs.subscription_ids())
            .unwrap_or_default()
    }

    fn total_subscriptions(inner: &Inner) -> usize {
        inner.sessions.values().map(|e| e.subs.len()).sum()
    }

    /// Create a subscription on a session.
    pub fn create_subscription(
        &self,
        session_id: u32,
        request: &CreateSubscriptionRequest,
        info: &ServerInfo,
    ) -> Result<uastack_types::CreateSubscriptionResponse, StatusCode> {
        let mut inner = self.inner.write();
        if Self::total_subscriptions(&inner) >= self.limits.max_subscriptions {
            return Err(StatusCode::BadTooManySubscriptions);
        }
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return Err(StatusCode::BadSessionIdInvalid);
        };
        if entry.subs.len() >= self.limits.max_subscriptions_per_session {
            return Err(StatusCode::BadTooManySubscriptions);
        }

        let revised = subscription::revise_subscription_parameters(
            request.requested_publishing_interval,
            request.requested_lifetime_count,
            request.requested_max_keep_alive_count,
            &self.limits,
        );
        let subscription_id = info.id_handles.subscription_id.next();
        let max_notifications = match (
            request.max_notifications_per_publish as usize,
            self.limits.max_notifications_per_publish,
        ) {
            (0, server_cap) => server_cap,
            (requested, 0) => requested,
            (requested, server_cap) => requested.min(server_cap),
        };
        let subscription = Subscription::new(
            subscription_id,
            revised,
            request.publishing_enabled,
            max_notifications,
            request.priority,
        );
        entry.subs.insert(subscription);
        inner.owner.insert(subscription_id, session_id);
        info.diagnostics.on_create_subscription();
        info!(
            "Session {} created subscription {} with interval {} ms",
            session_id, subscription_id, revised.publishing_interval
        );

        Ok(uastack_types::CreateSubscriptionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            subscription_id,
            revised_publishing_interval: revised.publishing_interval,
            revised_lifetime_count: revised.lifetime_count,
            revised_max_keep_alive_count: revised.max_keep_alive_count,
        })
    }

    /// Modify a subscription's parameters.
    pub fn modify_subscription(
        &self,
        session_id: u32,
        request: &ModifySubscriptionRequest,
    ) -> Result<uastack_types::ModifySubscriptionResponse, StatusCode> {
        let mut inner = self.inner.write();
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return Err(StatusCode::BadSessionIdInvalid);
        };
        let Some(subscription) = entry.subs.get_mut(request.subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        let revised = subscription::revise_subscription_parameters(
            request.requested_publishing_interval,
            request.requested_lifetime_count,
            request.requested_max_keep_alive_count,
            &self.limits,
        );
        let max_notifications = request.max_notifications_per_publish as usize;
        subscription.modify(revised, max_notifications, request.priority);
        Ok(uastack_types::ModifySubscriptionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            revised_publishing_interval: revised.publishing_interval,
            revised_lifetime_count: revised.lifetime_count,
            revised_max_keep_alive_count: revised.max_keep_alive_count,
        })
    }

    /// Enable or disable publishing on a set of subscriptions.
    pub fn set_publishing_mode(
        &self,
        session_id: u32,
        publishing_enabled: bool,
        subscription_ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        if subscription_ids.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let mut inner = self.inner.write();
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return Err(StatusCode::BadSessionIdInvalid);
        };
        Ok(subscription_ids
            .iter()
            .map(|id| match entry.subs.get_mut(*id) {
                Some(subscription) => {
                    subscription.set_publishing_enabled(publishing_enabled);
                    StatusCode::Good
                }
                None => StatusCode::BadSubscriptionIdInvalid,
            })
            .collect())
    }

    /// Delete subscriptions, releasing their monitored items.
    pub fn delete_subscriptions(
        &self,
        session_id: u32,
        subscription_ids: &[u32],
        diagnostics: &ServerDiagnostics,
    ) -> Result<Vec<StatusCode>, StatusCode> {
        if subscription_ids.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let mut inner = self.inner.write();
        if !inner.sessions.contains_key(&session_id) {
            return Err(StatusCode::BadSessionIdInvalid);
        }
        let results = subscription_ids
            .iter()
            .map(|id| {
                let entry = inner.sessions.get_mut(&session_id).expect("entry exists");
                if entry.subs.remove(*id).is_some() {
                    inner.owner.remove(id);
                    diagnostics.on_destroy_subscription();
                    StatusCode::Good
                } else {
                    StatusCode::BadSubscriptionIdInvalid
                }
            })
            .collect();
        Ok(results)
    }

    /// Park a publish credit, then immediately try to satisfy it from the
    /// session's subscriptions. The credit is always completed, one way
    /// or another.
    pub fn enqueue_publish_request(
        &self,
        session_id: u32,
        address_space: &AddressSpace,
        mut publish: PendingPublish,
    ) {
        let mut inner = self.inner.write();
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            publish.complete_with_fault(StatusCode::BadNoSubscription);
            return;
        };
        publish.ack_results = entry.subs.process_acknowledgements(&publish.request);
        entry.subs.enqueue_publish(publish);
        entry
            .subs
            .tick(address_space, Instant::now(), TickReason::ReceivedPublishRequest);
    }

    /// Look up a message in the retransmission queue of a subscription.
    pub fn republish(
        &self,
        session_id: u32,
        request: &RepublishRequest,
    ) -> Result<RepublishResponse, StatusCode> {
        let mut inner = self.inner.write();
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return Err(StatusCode::BadSessionIdInvalid);
        };
        let Some(subscription) = entry.subs.get_mut(request.subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        let notification_message =
            subscription.republish(request.retransmit_sequence_number)?;
        Ok(RepublishResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            notification_message,
        })
    }

    // Resolve the EURange property of a node, needed by percent deadband.
    fn eu_range_of(address_space: &AddressSpace, node_id: &NodeId) -> Option<(f64, f64)> {
        let element = RelativePathElement {
            reference_type_id: ReferenceTypeId::HasProperty.into(),
            is_inverse: false,
            include_subtypes: true,
            target_name: QualifiedName::new(0, "EURange"),
        };
        let property_id = address_space.follow_path_element(node_id, &element).pop()?;
        let value = address_space
            .read_attribute(&property_id, uastack_types::AttributeId::Value as u32);
        let Some(Variant::ExtensionObject(object)) = value.value else {
            return None;
        };
        let range = object
            .decode_inner::<Range>(&DecodingOptions::minimal())
            .ok()?;
        Some((range.low, range.high))
    }

    /// Create monitored items on a subscription.
    pub fn create_monitored_items(
        &self,
        session_id: u32,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        items_to_create: &[MonitoredItemCreateRequest],
        address_space: &AddressSpace,
        info: &ServerInfo,
    ) -> Result<Vec<MonitoredItemCreateResult>, StatusCode> {
        if items_to_create.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let mut inner = self.inner.write();
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return Err(StatusCode::BadSessionIdInvalid);
        };
        let Some(subscription) = entry.subs.get_mut(subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        let max_items = self.limits.max_monitored_items_per_subscription;
        if max_items > 0 && subscription.monitored_item_count() + items_to_create.len() > max_items
        {
            return Err(StatusCode::BadTooManyMonitoredItems);
        }

        let options = DecodingOptions::default();
        let results = items_to_create
            .iter()
            .map(|request| {
                // The monitored node must exist up front.
                if address_space
                    .find(&request.item_to_monitor.node_id)
                    .is_none()
                {
                    return MonitoredItemCreateResult {
                        status_code: StatusCode::BadNodeIdUnknown,
                        ..Default::default()
                    };
                }
                let needs_range = request
                    .requested_parameters
                    .filter
                    .decode_inner::<uastack_types::DataChangeFilter>(&options)
                    .ok()
                    .is_some_and(|f| f.deadband_type == DeadbandType::Percent as u32);
                let eu_range = if needs_range {
                    Self::eu_range_of(address_space, &request.item_to_monitor.node_id)
                } else {
                    None
                };
                let id = info.id_handles.monitored_item_id.next();
                match MonitoredItem::new(
                    id,
                    request,
                    timestamps_to_return,
                    &self.limits,
                    &options,
                    eu_range,
                ) {
                    Ok(item) => {
                        let result = MonitoredItemCreateResult {
                            status_code: StatusCode::Good,
                            monitored_item_id: id,
                            revised_sampling_interval: item.sampling_interval(),
                            revised_queue_size: item.queue_size() as u32,
                            filter_result: Default::default(),
                        };
                        subscription.insert_monitored_item(item);
                        result
                    }
                    Err(status_code) => MonitoredItemCreateResult {
                        status_code,
                        ..Default::default()
                    },
                }
            })
            .collect();
        Ok(results)
    }

    /// Modify monitored items on a subscription.
    pub fn modify_monitored_items(
        &self,
        session_id: u32,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        items_to_modify: &[MonitoredItemModifyRequest],
    ) -> Result<Vec<MonitoredItemModifyResult>, StatusCode> {
        if items_to_modify.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let mut inner = self.inner.write();
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return Err(StatusCode::BadSessionIdInvalid);
        };
        let Some(subscription) = entry.subs.get_mut(subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        let options = DecodingOptions::default();
        let results = items_to_modify
            .iter()
            .map(|request| {
                match subscription
                    .monitored_items_mut()
                    .get_mut(&request.monitored_item_id)
                {
                    Some(item) => match item.modify(
                        &request.requested_parameters,
                        timestamps_to_return,
                        &self.limits,
                        &options,
                    ) {
                        Ok(()) => MonitoredItemModifyResult {
                            status_code: StatusCode::Good,
                            revised_sampling_interval: item.sampling_interval(),
                            revised_queue_size: item.queue_size() as u32,
                            filter_result: Default::default(),
                        },
                        Err(status_code) => MonitoredItemModifyResult {
                            status_code,
                            ..Default::default()
                        },
                    },
                    None => MonitoredItemModifyResult {
                        status_code: StatusCode::BadMonitoredItemIdInvalid,
                        ..Default::default()
                    },
                }
            })
            .collect();
        Ok(results)
    }

    /// Delete monitored items from a subscription.
    pub fn delete_monitored_items(
        &self,
        session_id: u32,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        if monitored_item_ids.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let mut inner = self.inner.write();
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return Err(StatusCode::BadSessionIdInvalid);
        };
        let Some(subscription) = entry.subs.get_mut(subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        Ok(monitored_item_ids
            .iter()
            .map(|id| {
                if subscription.remove_monitored_item(*id).is_some() {
                    StatusCode::Good
                } else {
                    StatusCode::BadMonitoredItemIdInvalid
                }
            })
            .collect())
    }

    /// Change the monitoring mode of items.
    pub fn set_monitoring_mode(
        &self,
        session_id: u32,
        subscription_id: u32,
        monitoring_mode: MonitoringMode,
        monitored_item_ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        if monitored_item_ids.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let mut inner = self.inner.write();
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return Err(StatusCode::BadSessionIdInvalid);
        };
        let Some(subscription) = entry.subs.get_mut(subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        Ok(monitored_item_ids
            .iter()
            .map(
                |id| match subscription.monitored_items_mut().get_mut(id) {
                    Some(item) => {
                        item.set_monitoring_mode(monitoring_mode);
                        StatusCode::Good
                    }
                    None => StatusCode::BadMonitoredItemIdInvalid,
                },
            )
            .collect())
    }

    /// Add and remove triggering links on a triggering item.
    #[allow(clippy::type_complexity)]
    pub fn set_triggering(
        &self,
        session_id: u32,
        subscription_id: u32,
        triggering_item_id: u32,
        links_to_add: &[u32],
        links_to_remove: &[u32],
    ) -> Result<(Vec<StatusCode>, Vec<StatusCode>), StatusCode> {
        if links_to_add.is_empty() && links_to_remove.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let mut inner = self.inner.write();
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return Err(StatusCode::BadSessionIdInvalid);
        };
        let Some(subscription) = entry.subs.get_mut(subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        if !subscription
            .monitored_items()
            .contains_key(&triggering_item_id)
        {
            return Err(StatusCode::BadMonitoredItemIdInvalid);
        }
        let known: Vec<u32> = subscription.monitored_items().keys().copied().collect();
        let items = subscription.monitored_items_mut();
        let add_results = links_to_add
            .iter()
            .map(|id| {
                if !known.contains(id) {
                    return StatusCode::BadMonitoredItemIdInvalid;
                }
                items
                    .get_mut(&triggering_item_id)
                    .expect("triggering item exists")
                    .add_trigger(*id);
                StatusCode::Good
            })
            .collect();
        let remove_results = links_to_remove
            .iter()
            .map(|id| {
                if items
                    .get_mut(&triggering_item_id)
                    .expect("triggering item exists")
                    .remove_trigger(*id)
                {
                    StatusCode::Good
                } else {
                    StatusCode::BadMonitoredItemIdInvalid
                }
            })
            .collect();
        Ok((add_results, remove_results))
    }

    /// Transfer subscriptions to `target_session_id`. Both sessions must
    /// hold the same user identity.
    pub fn transfer(
        &self,
        target_session_id: u32,
        subscription_ids: &[u32],
        send_initial_values: bool,
        address_space: &AddressSpace,
        diagnostics: &ServerDiagnostics,
    ) -> Result<Vec<TransferResult>, StatusCode> {
        if subscription_ids.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let mut inner = self.inner.write();
        if !inner.sessions.contains_key(&target_session_id) {
            return Err(StatusCode::BadSessionIdInvalid);
        }
        ServerDiagnostics::increment(&diagnostics.transfer_request_count);

        let results = subscription_ids
            .iter()
            .map(|id| {
                let Some(&source_session_id) = inner.owner.get(id) else {
                    return TransferResult {
                        status_code: StatusCode::BadSubscriptionIdInvalid,
                        available_sequence_numbers: None,
                    };
                };
                if source_session_id == target_session_id {
                    return TransferResult {
                        status_code: StatusCode::BadNothingToDo,
                        available_sequence_numbers: None,
                    };
                }
                let same_user = {
                    let source = inner.sessions.get(&source_session_id);
                    let target = inner.sessions.get(&target_session_id);
                    match (source, target) {
                        (Some(source), Some(target)) => source
                            .subs
                            .user_token()
                            .is_same_user(target.subs.user_token()),
                        _ => false,
                    }
                };
                if !same_user {
                    return TransferResult {
                        status_code: StatusCode::BadUserAccessDenied,
                        available_sequence_numbers: None,
                    };
                }

                let Some(mut subscription) = inner
                    .sessions
                    .get_mut(&source_session_id)
                    .and_then(|e| e.subs.remove(*id))
                else {
                    return TransferResult {
                        status_code: StatusCode::BadSubscriptionIdInvalid,
                        available_sequence_numbers: None,
                    };
                };

                if send_initial_values {
                    // Data change items re-queue their current value,
                    // event items do not.
                    for item in subscription.monitored_items_mut().values_mut() {
                        item.resend_current_value(address_space);
                    }
                }
                subscription.reset_lifetime_counter();
                let available = subscription.available_sequence_numbers();

                let target = inner
                    .sessions
                    .get_mut(&target_session_id)
                    .expect("target exists");
                target.subs.insert(subscription);
                inner.owner.insert(*id, target_session_id);
                ServerDiagnostics::increment(&diagnostics.transferred_to_alt_client_count);
                info!(
                    "Subscription {} transferred from session {} to {}",
                    id, source_session_id, target_session_id
                );
                TransferResult {
                    status_code: StatusCode::Good,
                    available_sequence_numbers: Some(available),
                }
            })
            .collect();
        Ok(results)
    }

    /// Handles of all items on a subscription, for GetMonitoredItems.
    /// Works on any session's subscription since the caller has already
    /// proven ownership of the session the method runs in.
    pub fn get_monitored_items(&self, subscription_id: u32) -> Result<(Vec<u32>, Vec<u32>), StatusCode> {
        let inner = self.inner.read();
        let Some(&session_id) = inner.owner.get(&subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        let subscription = inner
            .sessions
            .get(&session_id)
            .and_then(|e| e.subs.get(subscription_id))
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        Ok(subscription.get_handles())
    }

    /// Make a subscription durable. Fails once it has monitored items.
    pub fn set_subscription_durable(
        &self,
        subscription_id: u32,
        lifetime_hours: u32,
    ) -> Result<u32, StatusCode> {
        let mut inner = self.inner.write();
        let Some(&session_id) = inner.owner.get(&subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        let subscription = inner
            .sessions
            .get_mut(&session_id)
            .and_then(|e| e.subs.get_mut(subscription_id))
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        subscription.set_durable(lifetime_hours, &self.limits)
    }

    /// Ask a subscription to resend the current value of every data
    /// change item.
    pub fn resend_data(&self, subscription_id: u32) -> Result<(), StatusCode> {
        let mut inner = self.inner.write();
        let Some(&session_id) = inner.owner.get(&subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        let subscription = inner
            .sessions
            .get_mut(&session_id)
            .and_then(|e| e.subs.get_mut(subscription_id))
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        subscription.set_resend_data();
        Ok(())
    }

    /// Offer an event to every item monitoring `source`.
    pub fn notify_event(&self, source: &NodeId, event: &Event) {
        let mut inner = self.inner.write();
        for entry in inner.sessions.values_mut() {
            for id in entry.subs.subscription_ids() {
                if let Some(subscription) = entry.subs.get_mut(id) {
                    for item in subscription.monitored_items_mut().values_mut() {
                        if &item.item_to_monitor().node_id == source {
                            item.notify_event(event);
                        }
                    }
                }
            }
        }
    }

    /// The session closed. Either delete its subscriptions or detach them
    /// to the orphanage where their lifetime counters keep running until
    /// they expire or another session transfers them back.
    pub fn on_session_closed(
        &self,
        session_id: u32,
        delete_subscriptions: bool,
        diagnostics: &ServerDiagnostics,
    ) {
        let mut inner = self.inner.write();
        let Some(entry) = inner.sessions.get_mut(&session_id) else {
            return;
        };
        entry.subs.drain_publish_queue(StatusCode::BadSessionClosed);
        if delete_subscriptions {
            let Some(entry) = inner.sessions.remove(&session_id) else {
                return;
            };
            for id in entry.subs.subscription_ids() {
                inner.owner.remove(&id);
                diagnostics.on_destroy_subscription();
            }
            debug!(
                "Session {} closed, its subscriptions were deleted",
                session_id
            );
        } else {
            entry.detached = true;
            debug!(
                "Session {} closed, its subscriptions were detached to the orphanage",
                session_id
            );
        }
    }

    /// Drive every subscription's publishing timer. Called at the tick
    /// granularity of the server's publish driver.
    pub fn periodic_tick(&self, address_space: &AddressSpace, diagnostics: &ServerDiagnostics) {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let mut emptied: Vec<u32> = Vec::new();
        for (session_id, entry) in inner.sessions.iter_mut() {
            entry
                .subs
                .tick(address_space, now, TickReason::TickTimerFired);
            // Closed subscriptions of a detached session can never send
            // their final status change; drop them outright.
            let removed = entry.subs.sweep_closed(entry.detached);
            for _ in &removed {
                diagnostics.on_destroy_subscription();
            }
            if entry.detached && entry.subs.is_empty() {
                emptied.push(*session_id);
            }
        }
        // Reconcile the owner map with what actually survived.
        let inner = &mut *inner;
        let sessions = &inner.sessions;
        inner.owner.retain(|sub_id, session_id| {
            sessions
                .get(session_id)
                .is_some_and(|e| e.subs.get(*sub_id).is_some())
        });
        for session_id in emptied {
            inner.sessions.remove(&session_id);
        }
    }
}
