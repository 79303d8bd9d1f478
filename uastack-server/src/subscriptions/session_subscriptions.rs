//! The per-session side of the publish machinery: the parked publish
//! request FIFO and the priority-ordered matching of credits to
//! subscriptions owing notifications.

use std::collections::VecDeque;
use std::time::Instant;

use hashbrown::HashMap;
use log::debug;
use tokio::sync::oneshot;
use uastack_core::ResponseMessage;
use uastack_types::{
    NotificationMessage, PublishRequest, PublishResponse, ResponseHeader, ServiceFault,
    StatusCode,
};

use crate::{address_space::AddressSpace, authenticator::UserToken, config::SubscriptionLimits};

use super::subscription::{Subscription, TickReason};

/// A parked publish request: the credit, its response channel, and the
/// acknowledgement results computed on arrival.
pub struct PendingPublish {
    /// Completes the transport-level response.
    pub response: oneshot::Sender<ResponseMessage>,
    /// The original request.
    pub request: Box<PublishRequest>,
    /// Status per acknowledgement in the request.
    pub ack_results: Option<Vec<StatusCode>>,
    /// When the credit expires with `BadTimeout`.
    pub deadline: Instant,
}

impl PendingPublish {
    /// Complete the credit with a service fault.
    pub fn complete_with_fault(self, status: StatusCode) {
        let fault = ServiceFault::new(self.request.request_header.request_handle, status);
        let _ = self.response.send(fault.into());
    }
}

/// All subscriptions owned by one session, plus its publish queue.
pub struct SessionSubscriptions {
    session_id: u32,
    user_token: UserToken,
    subscriptions: HashMap<u32, Subscription>,
    publish_queue: VecDeque<PendingPublish>,
    limits: SubscriptionLimits,
}

impl SessionSubscriptions {
    pub(super) fn new(
        session_id: u32,
        user_token: UserToken,
        limits: SubscriptionLimits,
    ) -> SessionSubscriptions {
        SessionSubscriptions {
            session_id,
            user_token,
            subscriptions: HashMap::new(),
            publish_queue: VecDeque::new(),
            limits,
        }
    }

    pub(super) fn session_id(&self) -> u32 {
        self.session_id
    }

    pub(super) fn user_token(&self) -> &UserToken {
        &self.user_token
    }

    pub(super) fn set_user_token(&mut self, token: UserToken) {
        self.user_token = token;
    }

    /// The ids of the subscriptions owned here.
    pub fn subscription_ids(&self) -> Vec<u32> {
        self.subscriptions.keys().copied().collect()
    }

    /// Number of subscriptions owned here.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// True if the session owns no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Access a subscription.
    pub fn get(&self, subscription_id: u32) -> Option<&Subscription> {
        self.subscriptions.get(&subscription_id)
    }

    /// Access a subscription mutably.
    pub fn get_mut(&mut self, subscription_id: u32) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(&subscription_id)
    }

    pub(super) fn insert(&mut self, subscription: Subscription) {
        self.subscriptions.insert(subscription.id(), subscription);
    }

    pub(super) fn remove(&mut self, subscription_id: u32) -> Option<Subscription> {
        self.subscriptions.remove(&subscription_id)
    }

    /// Process the acknowledgements of an arriving publish request.
    pub(super) fn process_acknowledgements(
        &mut self,
        request: &PublishRequest,
    ) -> Option<Vec<StatusCode>> {
        request.subscription_acknowledgements.as_ref().map(|acks| {
            acks.iter()
                .map(|ack| match self.subscriptions.get_mut(&ack.subscription_id) {
                    Some(subscription) => subscription.acknowledge(ack.sequence_number),
                    None => StatusCode::BadSubscriptionIdInvalid,
                })
                .collect()
        })
    }

    /// Park a publish credit. The FIFO is bounded; overflowing completes
    /// the oldest credit with `BadTooManyPublishRequests`. The credit is
    /// always completed eventually, one way or another.
    pub(super) fn enqueue_publish(&mut self, publish: PendingPublish) {
        if self.subscriptions.is_empty() {
            publish.complete_with_fault(StatusCode::BadNoSubscription);
            return;
        }
        let cap = self.limits.max_publish_requests_per_session.max(1);
        if self.publish_queue.len() >= cap {
            if let Some(oldest) = self.publish_queue.pop_front() {
                debug!(
                    "Session {} publish queue overflow, failing the oldest request",
                    self.session_id
                );
                oldest.complete_with_fault(StatusCode::BadTooManyPublishRequests);
            }
        }
        self.publish_queue.push_back(publish);
    }

    /// True if a publish credit is parked.
    pub fn has_parked_publish(&self) -> bool {
        !self.publish_queue.is_empty()
    }

    /// Complete all parked credits, used when the session dies.
    pub(super) fn drain_publish_queue(&mut self, status: StatusCode) {
        for publish in self.publish_queue.drain(..) {
            publish.complete_with_fault(status);
        }
    }

    // Credits expire individually: timeout hints differ per request, so
    // the queue is not deadline ordered.
    fn expire_publish_requests(&mut self, now: Instant) {
        let mut remaining = VecDeque::with_capacity(self.publish_queue.len());
        for publish in self.publish_queue.drain(..) {
            if publish.deadline <= now {
                publish.complete_with_fault(StatusCode::BadTimeout);
            } else {
                remaining.push_back(publish);
            }
        }
        self.publish_queue = remaining;
    }

    // Subscription ids ordered for publish matching: higher priority
    // first, FIFO by id within one priority.
    fn priority_order(&self) -> Vec<u32> {
        let mut ids: Vec<(u8, u32)> = self
            .subscriptions
            .values()
            .map(|s| (s.priority(), s.id()))
            .collect();
        ids.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        ids.into_iter().map(|(_, id)| id).collect()
    }

    fn respond(
        &mut self,
        subscription_id: u32,
        message: NotificationMessage,
        more_notifications: bool,
    ) {
        let Some(publish) = self.publish_queue.pop_front() else {
            return;
        };
        let available_sequence_numbers = self
            .subscriptions
            .get(&subscription_id)
            .map(|s| s.available_sequence_numbers());
        let response = PublishResponse {
            response_header: ResponseHeader::new_good(&publish.request.request_header),
            subscription_id,
            available_sequence_numbers,
            more_notifications,
            notification_message: message,
            results: publish.ack_results,
            diagnostic_infos: None,
        };
        let _ = publish.response.send(response.into());
    }

    /// Drive every subscription once. `detached` sessions run their
    /// lifetime counters but hold no credits, so notifications pile up
    /// until the lifetime expires or the subscription is transferred.
    pub(super) fn tick(
        &mut self,
        address_space: &AddressSpace,
        now: Instant,
        reason: TickReason,
    ) {
        self.expire_publish_requests(now);

        for id in self.priority_order() {
            // Each subscription may consume several credits when it has
            // a backlog.
            let mut tick_reason = reason;
            loop {
                let publish_available = !self.publish_queue.is_empty();
                let Some(subscription) = self.subscriptions.get_mut(&id) else {
                    break;
                };
                if subscription.is_closed() {
                    if publish_available {
                        if let Some(status) = subscription.take_closing_status() {
                            let message = subscription.make_status_change(status);
                            self.respond(id, message, false);
                        }
                        self.subscriptions.remove(&id);
                    }
                    break;
                }
                let Some(message) = subscription.tick(address_space, now, tick_reason, publish_available)
                else {
                    break;
                };
                let more = self
                    .subscriptions
                    .get(&id)
                    .map(|s| s.has_pending_notifications())
                    .unwrap_or(false);
                self.respond(id, message, more);
                if self.publish_queue.is_empty() {
                    break;
                }
                // Further rounds for this subscription behave like fresh
                // publish arrivals.
                tick_reason = TickReason::ReceivedPublishRequest;
            }
        }
    }

    /// Remove closed subscriptions. When `force` is set even those still
    /// owing a final status change go, for sessions that can never
    /// receive another publish.
    pub(super) fn sweep_closed(&mut self, force: bool) -> Vec<u32> {
        let mut removed = Vec::new();
        self.subscriptions.retain(|id, s| {
            let drop_it = s.is_closed() && force;
            if drop_it {
                removed.push(*id);
            }
            !drop_it
        });
        removed
    }
}

