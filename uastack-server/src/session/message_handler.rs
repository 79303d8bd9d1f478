//! Dispatch of requests that have passed validation: they arrived on an
//! open channel and reference an activated session.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use uastack_core::{RequestMessage, ResponseMessage};
use uastack_types::{
    CancelResponse, PublishRequest, ResponseHeader, ServiceFault, SetTriggeringResponse,
    StatusCode,
};

use crate::{
    address_space::AddressSpace,
    info::ServerInfo,
    session::{instance::Session, services},
    subscriptions::{PendingPublish, SubscriptionCache},
};

/// A finished response and the request id it answers.
pub struct Response {
    /// The message to send.
    pub message: ResponseMessage,
    /// Correlates with the request's chunks.
    pub request_id: u32,
}

impl Response {
    /// Build a response from a service result, mapping errors to faults.
    pub fn from_result<T: Into<ResponseMessage>>(
        result: Result<T, StatusCode>,
        request_handle: u32,
        request_id: u32,
    ) -> Response {
        let message = match result {
            Ok(message) => message.into(),
            Err(status) => ServiceFault::new(request_handle, status).into(),
        };
        Response {
            message,
            request_id,
        }
    }
}

/// How a handled message resolves.
pub enum HandleMessageResult {
    /// Spawned as a task; the response arrives when it completes.
    AsyncMessage(JoinHandle<Response>),
    /// A parked publish request resolving through a callback channel.
    PublishResponse(PendingPublishRequest),
    /// Resolved synchronously.
    SyncMessage(Response),
}

/// The receiving end of a parked publish request.
pub struct PendingPublishRequest {
    request_id: u32,
    request_handle: u32,
    recv: tokio::sync::oneshot::Receiver<ResponseMessage>,
}

impl PendingPublishRequest {
    /// Wait for the publish to be satisfied. This can take arbitrarily
    /// long: the request is a credit the subscriptions draw on.
    pub async fn recv(self) -> Response {
        match self.recv.await {
            Ok(message) => Response {
                message,
                request_id: self.request_id,
            },
            Err(_) => {
                warn!("Publish response sender dropped without completing");
                Response {
                    message: ServiceFault::new(self.request_handle, StatusCode::BadInternalError)
                        .into(),
                    request_id: self.request_id,
                }
            }
        }
    }
}

/// Context handed to every spawned service handler.
pub(crate) struct Request<T> {
    pub request: Box<T>,
    pub request_id: u32,
    pub request_handle: u32,
    pub info: Arc<ServerInfo>,
    pub session: Arc<RwLock<Session>>,
    pub session_id: u32,
    pub address_space: Arc<RwLock<AddressSpace>>,
    pub subscriptions: Arc<SubscriptionCache>,
}

/// Build a fault response for a request wrapper.
macro_rules! service_fault {
    ($req:ident, $status:expr) => {
        Response {
            message: uastack_types::ServiceFault::new($req.request_handle, $status).into(),
            request_id: $req.request_id,
        }
    };
}
pub(crate) use service_fault;

/// Unwrap a service's operation array, rejecting empty and oversized
/// requests.
pub(crate) fn take_service_items<T>(
    items: Option<Vec<T>>,
    limit: usize,
) -> Result<Vec<T>, StatusCode> {
    let items = items.unwrap_or_default();
    if items.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    if limit > 0 && items.len() > limit {
        return Err(StatusCode::BadTooManyOperations);
    }
    Ok(items)
}

/// Handles requests for one connection once session validation has
/// happened.
pub(crate) struct MessageHandler {
    info: Arc<ServerInfo>,
    address_space: Arc<RwLock<AddressSpace>>,
    subscriptions: Arc<SubscriptionCache>,
}

macro_rules! async_service_call {
    ($service:path, $slf:ident, $request:ident, $data:ident) => {
        HandleMessageResult::AsyncMessage(tokio::task::spawn($service(Request {
            request: $request,
            request_id: $data.request_id,
            request_handle: $data.request_handle,
            info: $slf.info.clone(),
            session: $data.session,
            session_id: $data.session_id,
            address_space: $slf.address_space.clone(),
            subscriptions: $slf.subscriptions.clone(),
        })))
    };
}

struct RequestData {
    request_id: u32,
    request_handle: u32,
    session: Arc<RwLock<Session>>,
    session_id: u32,
}

impl MessageHandler {
    pub fn new(
        info: Arc<ServerInfo>,
        address_space: Arc<RwLock<AddressSpace>>,
        subscriptions: Arc<SubscriptionCache>,
    ) -> MessageHandler {
        MessageHandler {
            info,
            address_space,
            subscriptions,
        }
    }

    /// The subscription engine this handler feeds.
    pub fn subscriptions(&self) -> &SubscriptionCache {
        &self.subscriptions
    }

    /// Dispatch one message. Returns synchronously; the result object may
    /// resolve later.
    pub fn handle_message(
        &mut self,
        message: RequestMessage,
        session: Arc<RwLock<Session>>,
        session_id: u32,
        request_id: u32,
    ) -> HandleMessageResult {
        let data = RequestData {
            request_id,
            request_handle: message.request_header().request_handle,
            session,
            session_id,
        };
        // Channel and session management requests never reach this point.
        match message {
            RequestMessage::Read(request) => {
                async_service_call!(services::read, self, request, data)
            }
            RequestMessage::Write(request) => {
                async_service_call!(services::write, self, request, data)
            }
            RequestMessage::Browse(request) => {
                async_service_call!(services::browse, self, request, data)
            }
            RequestMessage::BrowseNext(request) => {
                async_service_call!(services::browse_next, self, request, data)
            }
            RequestMessage::TranslateBrowsePathsToNodeIds(request) => {
                async_service_call!(services::translate_browse_paths, self, request, data)
            }
            RequestMessage::RegisterNodes(request) => {
                async_service_call!(services::register_nodes, self, request, data)
            }
            RequestMessage::UnregisterNodes(request) => {
                async_service_call!(services::unregister_nodes, self, request, data)
            }
            RequestMessage::Call(request) => {
                async_service_call!(services::call, self, request, data)
            }
            RequestMessage::HistoryRead(request) => {
                async_service_call!(services::history_read, self, request, data)
            }
            RequestMessage::HistoryUpdate(request) => {
                async_service_call!(services::history_update, self, request, data)
            }

            RequestMessage::CreateSubscription(request) => {
                HandleMessageResult::SyncMessage(Response::from_result(
                    self.subscriptions
                        .create_subscription(data.session_id, &request, &self.info),
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::ModifySubscription(request) => {
                HandleMessageResult::SyncMessage(Response::from_result(
                    self.subscriptions
                        .modify_subscription(data.session_id, &request),
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::SetPublishingMode(request) => {
                let result = self
                    .subscriptions
                    .set_publishing_mode(
                        data.session_id,
                        request.publishing_enabled,
                        request.subscription_ids.as_deref().unwrap_or(&[]),
                    )
                    .map(|results| uastack_types::SetPublishingModeResponse {
                        response_header: ResponseHeader::new_good(&request.request_header),
                        results: Some(results),
                        diagnostic_infos: None,
                    });
                HandleMessageResult::SyncMessage(Response::from_result(
                    result,
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::DeleteSubscriptions(request) => {
                let result = self
                    .subscriptions
                    .delete_subscriptions(
                        data.session_id,
                        request.subscription_ids.as_deref().unwrap_or(&[]),
                        &self.info.diagnostics,
                    )
                    .map(|results| uastack_types::DeleteSubscriptionsResponse {
                        response_header: ResponseHeader::new_good(&request.request_header),
                        results: Some(results),
                        diagnostic_infos: None,
                    });
                HandleMessageResult::SyncMessage(Response::from_result(
                    result,
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::TransferSubscriptions(request) => {
                let address_space = self.address_space.read();
                let result = self
                    .subscriptions
                    .transfer(
                        data.session_id,
                        request.subscription_ids.as_deref().unwrap_or(&[]),
                        request.send_initial_values,
                        &address_space,
                        &self.info.diagnostics,
                    )
                    .map(
                        |results| uastack_types::TransferSubscriptionsResponse {
                            response_header: ResponseHeader::new_good(&request.request_header),
                            results: Some(results),
                            diagnostic_infos: None,
                        },
                    );
                HandleMessageResult::SyncMessage(Response::from_result(
                    result,
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::CreateMonitoredItems(request) => {
                let address_space = self.address_space.read();
                let result = self
                    .subscriptions
                    .create_monitored_items(
                        data.session_id,
                        request.subscription_id,
                        request.timestamps_to_return,
                        request.items_to_create.as_deref().unwrap_or(&[]),
                        &address_space,
                        &self.info,
                    )
                    .map(
                        |results| uastack_types::CreateMonitoredItemsResponse {
                            response_header: ResponseHeader::new_good(&request.request_header),
                            results: Some(results),
                            diagnostic_infos: None,
                        },
                    );
                HandleMessageResult::SyncMessage(Response::from_result(
                    result,
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::ModifyMonitoredItems(request) => {
                let result = self
                    .subscriptions
                    .modify_monitored_items(
                        data.session_id,
                        request.subscription_id,
                        request.timestamps_to_return,
                        request.items_to_modify.as_deref().unwrap_or(&[]),
                    )
                    .map(
                        |results| uastack_types::ModifyMonitoredItemsResponse {
                            response_header: ResponseHeader::new_good(&request.request_header),
                            results: Some(results),
                            diagnostic_infos: None,
                        },
                    );
                HandleMessageResult::SyncMessage(Response::from_result(
                    result,
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::DeleteMonitoredItems(request) => {
                let result = self
                    .subscriptions
                    .delete_monitored_items(
                        data.session_id,
                        request.subscription_id,
                        request.monitored_item_ids.as_deref().unwrap_or(&[]),
                    )
                    .map(
                        |results| uastack_types::DeleteMonitoredItemsResponse {
                            response_header: ResponseHeader::new_good(&request.request_header),
                            results: Some(results),
                            diagnostic_infos: None,
                        },
                    );
                HandleMessageResult::SyncMessage(Response::from_result(
                    result,
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::SetMonitoringMode(request) => {
                let result = self
                    .subscriptions
                    .set_monitoring_mode(
                        data.session_id,
                        request.subscription_id,
                        request.monitoring_mode,
                        request.monitored_item_ids.as_deref().unwrap_or(&[]),
                    )
                    .map(|results| uastack_types::SetMonitoringModeResponse {
                        response_header: ResponseHeader::new_good(&request.request_header),
                        results: Some(results),
                        diagnostic_infos: None,
                    });
                HandleMessageResult::SyncMessage(Response::from_result(
                    result,
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::SetTriggering(request) => {
                let result = self
                    .subscriptions
                    .set_triggering(
                        data.session_id,
                        request.subscription_id,
                        request.triggering_item_id,
                        request.links_to_add.as_deref().unwrap_or(&[]),
                        request.links_to_remove.as_deref().unwrap_or(&[]),
                    )
                    .map(|(add_results, remove_results)| SetTriggeringResponse {
                        response_header: ResponseHeader::new_good(&request.request_header),
                        add_results: Some(add_results),
                        add_diagnostic_infos: None,
                        remove_results: Some(remove_results),
                        remove_diagnostic_infos: None,
                    });
                HandleMessageResult::SyncMessage(Response::from_result(
                    result,
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::Republish(request) => {
                HandleMessageResult::SyncMessage(Response::from_result(
                    self.subscriptions.republish(data.session_id, &request),
                    data.request_handle,
                    data.request_id,
                ))
            }
            RequestMessage::Publish(request) => self.publish(request, data),

            RequestMessage::Cancel(request) => {
                // Handlers run to completion; there is nothing in flight
                // to cancel by the time this is processed.
                HandleMessageResult::SyncMessage(Response {
                    message: CancelResponse {
                        response_header: ResponseHeader::new_good(&request.request_header),
                        cancel_count: 0,
                    }
                    .into(),
                    request_id: data.request_id,
                })
            }

            message => {
                debug!("Unsupported service: {:?}", message.request_header());
                HandleMessageResult::SyncMessage(Response {
                    message: ServiceFault::new(
                        message.request_header().request_handle,
                        StatusCode::BadServiceUnsupported,
                    )
                    .into(),
                    request_id,
                })
            }
        }
    }

    fn publish(&self, request: Box<PublishRequest>, data: RequestData) -> HandleMessageResult {
        let (send, recv) = tokio::sync::oneshot::channel();
        let timeout_ms = match request.request_header.timeout_hint {
            0 => self.info.config.limits.publish_timeout_default_ms,
            hint => hint as u64,
        };
        let pending = PendingPublish {
            response: send,
            request,
            ack_results: None,
            deadline: Instant::now() + std::time::Duration::from_millis(timeout_ms),
        };
        {
            let address_space = self.address_space.read();
            self.subscriptions
                .enqueue_publish_request(data.session_id, &address_space, pending);
        }
        HandleMessageResult::PublishResponse(PendingPublishRequest {
            request_id: data.request_id,
            request_handle: data.request_handle,
            recv,
        })
    }
}
