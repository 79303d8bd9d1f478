//! A single subscription: the publishing state machine, its monitored
//! items, and the retransmission queue backing Republish.

use std::collections::VecDeque;
use std::time::Instant;

use hashbrown::HashMap;
use log::{debug, info, trace};
use uastack_types::{
    DateTime, EventFieldList, MonitoredItemNotification, NotificationMessage, StatusCode,
};

use crate::{address_space::AddressSpace, config::SubscriptionLimits};

use super::monitored_item::{MonitoredItem, Notification};

/// The publishing state of a subscription, per the Publish service state
/// table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Terminal. A closing status change is the last message sent.
    Closed,
    /// Created but not yet ticked.
    Creating,
    /// Publishing normally.
    Normal,
    /// A message was due but no publish request was available.
    Late,
    /// Nothing to send, counting down to the next keep-alive.
    KeepAlive,
}

/// Why the subscription is being ticked.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickReason {
    /// A publish request arrived on the owning session.
    ReceivedPublishRequest,
    /// The publishing timer fired.
    TickTimerFired,
}

#[derive(Debug)]
struct StateParams {
    notifications_available: bool,
    more_notifications: bool,
    publishing_req_queued: bool,
    publishing_interval_elapsed: bool,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum UpdateStateAction {
    None,
    ReturnKeepAlive,
    ReturnNotifications,
}

/// Revised create/modify parameters after server limits are applied.
#[derive(Debug, Clone, Copy)]
pub struct RevisedSubscriptionParameters {
    /// Granted publishing interval in milliseconds.
    pub publishing_interval: f64,
    /// Granted lifetime count.
    pub lifetime_count: u32,
    /// Granted keep-alive count.
    pub max_keep_alive_count: u32,
}

/// Apply the server's limits to requested subscription parameters,
/// including the rule that the lifetime must be at least three times the
/// keep-alive count.
pub fn revise_subscription_parameters(
    requested_publishing_interval: f64,
    requested_lifetime_count: u32,
    requested_max_keep_alive_count: u32,
    limits: &SubscriptionLimits,
) -> RevisedSubscriptionParameters {
    let publishing_interval = if requested_publishing_interval.is_nan()
        || requested_publishing_interval < limits.min_publishing_interval_ms
    {
        limits.min_publishing_interval_ms
    } else {
        requested_publishing_interval
    };
    let max_keep_alive_count = if requested_max_keep_alive_count == 0 {
        limits.default_keep_alive_count
    } else {
        requested_max_keep_alive_count.min(limits.max_keep_alive_count)
    };
    let lifetime_count = if requested_lifetime_count == 0 {
        limits.default_lifetime_count
    } else {
        requested_lifetime_count.min(limits.max_lifetime_count)
    }
    .max(max_keep_alive_count.saturating_mul(3));
    RevisedSubscriptionParameters {
        publishing_interval,
        lifetime_count,
        max_keep_alive_count,
    }
}

/// A subscription and everything it owns.
#[derive(Debug)]
pub struct Subscription {
    id: u32,
    publishing_interval: f64,
    max_lifetime_count: u32,
    max_keep_alive_count: u32,
    priority: u8,
    publishing_enabled: bool,
    max_notifications_per_publish: usize,
    state: SubscriptionState,
    lifetime_counter: u32,
    keep_alive_counter: u32,
    first_message_sent: bool,
    resend_data: bool,
    durable_lifetime_hours: Option<u32>,
    monitored_items: HashMap<u32, MonitoredItem>,
    next_sequence_number: u32,
    last_timer_expired_time: Instant,
    pending_notifications: VecDeque<NotificationMessage>,
    retransmission_queue: VecDeque<NotificationMessage>,
    retransmission_cap: usize,
    /// Set when the subscription closed and the final status change has
    /// not been dispatched yet.
    closing_status: Option<StatusCode>,
}

// The retransmission queue must survive min(maxKeepAliveCount, 100)
// consecutive publish losses.
fn retransmission_cap(max_keep_alive_count: u32) -> usize {
    let burst = max_keep_alive_count.min(100) as usize + 1;
    burst.max(2 * max_keep_alive_count as usize).max(10)
}

impl Subscription {
    /// Create a subscription in the Creating state.
    pub fn new(
        id: u32,
        parameters: RevisedSubscriptionParameters,
        publishing_enabled: bool,
        max_notifications_per_publish: usize,
        priority: u8,
    ) -> Subscription {
        Subscription {
            id,
            publishing_interval: parameters.publishing_interval,
            max_lifetime_count: parameters.lifetime_count,
            max_keep_alive_count: parameters.max_keep_alive_count,
            priority,
            publishing_enabled,
            max_notifications_per_publish,
            state: SubscriptionState::Creating,
            lifetime_counter: parameters.lifetime_count,
            keep_alive_counter: parameters.max_keep_alive_count,
            first_message_sent: false,
            resend_data: false,
            durable_lifetime_hours: None,
            monitored_items: HashMap::new(),
            next_sequence_number: 1,
            last_timer_expired_time: Instant::now(),
            pending_notifications: VecDeque::new(),
            retransmission_queue: VecDeque::new(),
            retransmission_cap: retransmission_cap(parameters.max_keep_alive_count),
            closing_status: None,
        }
    }

    /// The subscription id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The relative priority against the session's other subscriptions.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// The granted publishing interval in milliseconds.
    pub fn publishing_interval(&self) -> f64 {
        self.publishing_interval
    }

    /// The granted lifetime count.
    pub fn lifetime_count(&self) -> u32 {
        self.max_lifetime_count
    }

    /// The granted keep-alive count.
    pub fn max_keep_alive_count(&self) -> u32 {
        self.max_keep_alive_count
    }

    /// The current state.
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// True once the subscription has closed.
    pub fn is_closed(&self) -> bool {
        self.state == SubscriptionState::Closed
    }

    /// The closing status change still owed to the client, if any.
    pub fn take_closing_status(&mut self) -> Option<StatusCode> {
        self.closing_status.take()
    }

    /// Whether publishing is enabled.
    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    /// Enable or disable publishing. Resets the lifetime counter.
    pub fn set_publishing_enabled(&mut self, enabled: bool) {
        self.publishing_enabled = enabled;
        self.reset_lifetime_counter();
    }

    /// Apply a modify request.
    pub fn modify(
        &mut self,
        parameters: RevisedSubscriptionParameters,
        max_notifications_per_publish: usize,
        priority: u8,
    ) {
        self.publishing_interval = parameters.publishing_interval;
        self.max_lifetime_count = parameters.lifetime_count;
        self.max_keep_alive_count = parameters.max_keep_alive_count;
        self.retransmission_cap = retransmission_cap(parameters.max_keep_alive_count);
        self.max_notifications_per_publish = max_notifications_per_publish;
        self.priority = priority;
        self.reset_lifetime_counter();
        self.reset_keep_alive_counter();
    }

    /// Make the subscription durable, extending its lifetime to the given
    /// number of hours. Only possible while no monitored items exist.
    pub fn set_durable(
        &mut self,
        lifetime_hours: u32,
        limits: &SubscriptionLimits,
    ) -> Result<u32, StatusCode> {
        if !self.monitored_items.is_empty() {
            return Err(StatusCode::BadInvalidState);
        }
        let revised = if lifetime_hours == 0 {
            limits.max_durable_lifetime_hours
        } else {
            lifetime_hours.clamp(1, limits.max_durable_lifetime_hours)
        };
        let interval_ms = self.publishing_interval.max(1.0);
        let count = ((revised as f64) * 3_600_000.0 / interval_ms).min(u32::MAX as f64) as u32;
        self.max_lifetime_count = count.max(self.max_keep_alive_count.saturating_mul(3));
        self.durable_lifetime_hours = Some(revised);
        self.reset_lifetime_counter();
        Ok(revised)
    }

    /// Request that every data-change item re-queue its current value on
    /// the next tick.
    pub fn set_resend_data(&mut self) {
        self.resend_data = true;
    }

    /// The monitored items, keyed by id.
    pub fn monitored_items(&self) -> &HashMap<u32, MonitoredItem> {
        &self.monitored_items
    }

    /// The monitored items, mutably.
    pub fn monitored_items_mut(&mut self) -> &mut HashMap<u32, MonitoredItem> {
        &mut self.monitored_items
    }

    /// Number of monitored items.
    pub fn monitored_item_count(&self) -> usize {
        self.monitored_items.len()
    }

    /// Add a monitored item.
    pub fn insert_monitored_item(&mut self, item: MonitoredItem) {
        self.reset_lifetime_counter();
        self.monitored_items.insert(item.id(), item);
    }

    /// Remove a monitored item and any trigger links to it.
    pub fn remove_monitored_item(&mut self, item_id: u32) -> Option<MonitoredItem> {
        self.reset_lifetime_counter();
        let removed = self.monitored_items.remove(&item_id);
        if removed.is_some() {
            for item in self.monitored_items.values_mut() {
                item.remove_trigger(item_id);
            }
        }
        removed
    }

    /// Server and client handles of all items, for GetMonitoredItems.
    pub fn get_handles(&self) -> (Vec<u32>, Vec<u32>) {
        let server_handles = self.monitored_items.values().map(|i| i.id()).collect();
        let client_handles = self
            .monitored_items
            .values()
            .map(|i| i.client_handle())
            .collect();
        (server_handles, client_handles)
    }

    /// True if assembled messages are waiting for publish credits.
    pub fn has_pending_notifications(&self) -> bool {
        !self.pending_notifications.is_empty()
    }

    /// Sequence numbers still held for Republish.
    pub fn available_sequence_numbers(&self) -> Vec<u32> {
        self.retransmission_queue
            .iter()
            .map(|m| m.sequence_number)
            .collect()
    }

    /// Remove an acknowledged message from the retransmission queue.
    pub fn acknowledge(&mut self, sequence_number: u32) -> StatusCode {
        let before = self.retransmission_queue.len();
        self.retransmission_queue
            .retain(|m| m.sequence_number != sequence_number);
        if self.retransmission_queue.len() < before {
            StatusCode::Good
        } else {
            StatusCode::BadSequenceNumberUnknown
        }
    }

    /// Look up a message for Republish. Evicted or never-sent sequence
    /// numbers yield `BadMessageNotAvailable`.
    pub fn republish(&mut self, sequence_number: u32) -> Result<NotificationMessage, StatusCode> {
        self.reset_lifetime_counter();
        self.retransmission_queue
            .iter()
            .find(|m| m.sequence_number == sequence_number)
            .cloned()
            .ok_or(StatusCode::BadMessageNotAvailable)
    }

    /// Reset the lifetime counter, called whenever the client shows signs
    /// of life on this subscription.
    pub fn reset_lifetime_counter(&mut self) {
        self.lifetime_counter = self.max_lifetime_count;
    }

    fn reset_keep_alive_counter(&mut self) {
        self.keep_alive_counter = self.max_keep_alive_count;
    }

    // Decrement the lifetime counter for one more publishing interval
    // without client activity.
    fn start_publishing_timer(&mut self) {
        self.lifetime_counter = self.lifetime_counter.saturating_sub(1);
    }

    fn next_sequence_number(&mut self) -> u32 {
        let n = self.next_sequence_number;
        self.next_sequence_number = if n == u32::MAX { 1 } else { n + 1 };
        n
    }

    // Collect notifications from monitored items into pending messages.
    // Reporting items contribute directly; Sampling items flush when a
    // reporting item that links them reports.
    fn collect_notifications(&mut self) {
        use uastack_types::MonitoringMode;

        let mut reported_items: Vec<u32> = Vec::new();
        let mut data_changes: Vec<MonitoredItemNotification> = Vec::new();
        let mut events: Vec<EventFieldList> = Vec::new();

        for (id, item) in self.monitored_items.iter_mut() {
            if item.monitoring_mode() == MonitoringMode::Reporting && item.has_notifications() {
                reported_items.push(*id);
                for notification in item.take_notifications() {
                    match notification {
                        Notification::DataChange(n) => data_changes.push(n),
                        Notification::Event(n) => events.push(n),
                    }
                }
            }
        }

        // Flush the queues of triggered sampling-mode items.
        let mut triggered: Vec<u32> = Vec::new();
        for id in &reported_items {
            if let Some(item) = self.monitored_items.get(id) {
                triggered.extend(item.triggered_items().iter().copied());
            }
        }
        triggered.sort_unstable();
        triggered.dedup();
        for id in triggered {
            // A dangling link is a silent no-op.
            let Some(item) = self.monitored_items.get_mut(&id) else {
                continue;
            };
            if item.monitoring_mode() != MonitoringMode::Sampling {
                continue;
            }
            for notification in item.take_notifications() {
                match notification {
                    Notification::DataChange(n) => data_changes.push(n),
                    Notification::Event(n) => events.push(n),
                }
            }
        }

        if data_changes.is_empty() && events.is_empty() {
            return;
        }

        // Package into one or more messages honoring the per-publish cap.
        let cap = if self.max_notifications_per_publish == 0 {
            usize::MAX
        } else {
            self.max_notifications_per_publish
        };
        while !data_changes.is_empty() || !events.is_empty() {
            let take_data = data_changes.len().min(cap);
            let message_data: Vec<_> = data_changes.drain(..take_data).collect();
            let remaining = cap - message_data.len();
            let take_events = events.len().min(remaining);
            let message_events: Vec<_> = events.drain(..take_events).collect();
            // Sequence numbers are assigned at dispatch.
            self.pending_notifications.push_back(NotificationMessage::data_change(
                0,
                DateTime::now(),
                message_data,
                message_events,
            ));
        }
    }

    /// Tick the subscription. Returns a message exactly when a parked
    /// publish credit should be consumed to carry it.
    pub fn tick(
        &mut self,
        address_space: &AddressSpace,
        now: Instant,
        reason: TickReason,
        publishing_req_queued: bool,
    ) -> Option<NotificationMessage> {
        if self.state == SubscriptionState::Closed {
            return None;
        }

        // A publish credit arriving is client activity on this
        // subscription's session.
        if reason == TickReason::ReceivedPublishRequest {
            self.reset_lifetime_counter();
        }

        let publishing_interval_elapsed = match reason {
            TickReason::ReceivedPublishRequest => false,
            TickReason::TickTimerFired => {
                if self.state == SubscriptionState::Creating {
                    true
                } else {
                    let elapsed_ms =
                        (now - self.last_timer_expired_time).as_secs_f64() * 1000.0;
                    if elapsed_ms >= self.publishing_interval {
                        self.last_timer_expired_time = now;
                        true
                    } else {
                        false
                    }
                }
            }
        };

        // Monitored items sample on every timer tick at their own cadence.
        if reason == TickReason::TickTimerFired {
            let resend = std::mem::take(&mut self.resend_data);
            for item in self.monitored_items.values_mut() {
                item.sample(address_space, now, resend);
            }
            if publishing_interval_elapsed {
                self.collect_notifications();
            }
        }

        let notifications_available = !self.pending_notifications.is_empty();
        let more_notifications = self.pending_notifications.len() > 1;

        if !(notifications_available || publishing_interval_elapsed || publishing_req_queued) {
            return None;
        }

        let action = self.update_state(
            reason,
            StateParams {
                notifications_available,
                more_notifications,
                publishing_req_queued,
                publishing_interval_elapsed,
            },
        );

        let message = match action {
            UpdateStateAction::None => None,
            UpdateStateAction::ReturnKeepAlive => {
                let sequence_number = self.next_sequence_number();
                trace!(
                    "Subscription {} keep-alive, sequence {}",
                    self.id,
                    sequence_number
                );
                Some(NotificationMessage::keep_alive(
                    sequence_number,
                    DateTime::now(),
                ))
            }
            UpdateStateAction::ReturnNotifications => {
                let mut message = self.pending_notifications.pop_front()?;
                message.sequence_number = self.next_sequence_number();
                message.publish_time = DateTime::now();
                debug!(
                    "Subscription {} notification, sequence {}",
                    self.id, message.sequence_number
                );
                // Dispatched messages are retained for Republish until
                // acknowledged or evicted.
                self.retransmission_queue.push_back(message.clone());
                while self.retransmission_queue.len() > self.retransmission_cap {
                    self.retransmission_queue.pop_front();
                }
                Some(message)
            }
        };

        if self.lifetime_counter == 0 && self.state != SubscriptionState::Closed {
            info!(
                "Subscription {} lifetime expired, closing with a status change",
                self.id
            );
            self.state = SubscriptionState::Closed;
            self.closing_status = Some(StatusCode::BadTimeout);
        }

        message
    }

    /// The final status change message for a closing subscription.
    pub fn make_status_change(&mut self, status: StatusCode) -> NotificationMessage {
        let sequence_number = self.next_sequence_number();
        NotificationMessage::status_change(sequence_number, DateTime::now(), status)
    }

    // The state engine, following the Publish service state table. The
    // caller has already queued publish requests and collected
    // notifications; this only decides what to do now.
    fn update_state(&mut self, reason: TickReason, p: StateParams) -> UpdateStateAction {
        match self.state {
            SubscriptionState::Closed => UpdateStateAction::None,
            SubscriptionState::Creating => {
                self.state = SubscriptionState::Normal;
                self.first_message_sent = false;
                UpdateStateAction::None
            }
            SubscriptionState::Normal => {
                if reason == TickReason::ReceivedPublishRequest {
                    if self.publishing_enabled && p.more_notifications {
                        self.reset_lifetime_counter();
                        self.first_message_sent = true;
                        return UpdateStateAction::ReturnNotifications;
                    }
                    return UpdateStateAction::None;
                }
                if !p.publishing_interval_elapsed {
                    return UpdateStateAction::None;
                }
                if p.publishing_req_queued && self.publishing_enabled && p.notifications_available
                {
                    self.reset_lifetime_counter();
                    self.start_publishing_timer();
                    self.first_message_sent = true;
                    UpdateStateAction::ReturnNotifications
                } else if !p.publishing_req_queued
                    && self.publishing_enabled
                    && p.notifications_available
                {
                    self.start_publishing_timer();
                    self.state = SubscriptionState::Late;
                    UpdateStateAction::None
                } else {
                    // Nothing to send: start the keep-alive countdown. The
                    // first keep-alive goes out a full keep-alive period
                    // after this, not immediately.
                    self.start_publishing_timer();
                    self.reset_keep_alive_counter();
                    self.state = SubscriptionState::KeepAlive;
                    UpdateStateAction::None
                }
            }
            SubscriptionState::Late => {
                if reason == TickReason::ReceivedPublishRequest {
                    if self.publishing_enabled
                        && (p.notifications_available || p.more_notifications)
                    {
                        self.reset_lifetime_counter();
                        self.state = SubscriptionState::Normal;
                        self.first_message_sent = true;
                        UpdateStateAction::ReturnNotifications
                    } else {
                        self.reset_lifetime_counter();
                        self.state = SubscriptionState::KeepAlive;
                        self.first_message_sent = true;
                        UpdateStateAction::ReturnKeepAlive
                    }
                } else if p.publishing_interval_elapsed {
                    self.start_publishing_timer();
                    UpdateStateAction::None
                } else {
                    UpdateStateAction::None
                }
            }
            SubscriptionState::KeepAlive => {
                if reason == TickReason::ReceivedPublishRequest {
                    return UpdateStateAction::None;
                }
                if !p.publishing_interval_elapsed {
                    return UpdateStateAction::None;
                }
                if self.publishing_enabled && p.notifications_available && p.publishing_req_queued
                {
                    self.first_message_sent = true;
                    self.state = SubscriptionState::Normal;
                    self.reset_lifetime_counter();
                    UpdateStateAction::ReturnNotifications
                } else if p.publishing_req_queued
                    && self.keep_alive_counter == 1
                    && !(self.publishing_enabled && p.notifications_available)
                {
                    self.start_publishing_timer();
                    self.reset_keep_alive_counter();
                    UpdateStateAction::ReturnKeepAlive
                } else if self.keep_alive_counter > 1
                    && !(self.publishing_enabled && p.notifications_available)
                {
                    self.start_publishing_timer();
                    self.keep_alive_counter -= 1;
                    UpdateStateAction::None
                } else {
                    self.start_publishing_timer();
                    self.state = SubscriptionState::Late;
                    UpdateStateAction::None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use uastack_types::StatusCode;

    use super::{
        revise_subscription_parameters, Subscription, SubscriptionState, TickReason,
    };
    use crate::address_space::AddressSpace;
    use crate::config::SubscriptionLimits;

    fn limits() -> SubscriptionLimits {
        SubscriptionLimits::default()
    }

    fn subscription(publishing_interval: f64, lifetime: u32, keep_alive: u32) -> Subscription {
        let revised =
            revise_subscription_parameters(publishing_interval, lifetime, keep_alive, &limits());
        Subscription::new(1, revised, true, 0, 0)
    }

    #[test]
    fn revision_enforces_lifetime_rule() {
        let revised = revise_subscription_parameters(50.0, 10, 10, &limits());
        assert_eq!(revised.publishing_interval, 100.0);
        assert_eq!(revised.max_keep_alive_count, 10);
        // Lifetime raised to 3x keep-alive.
        assert_eq!(revised.lifetime_count, 30);
    }

    #[test]
    fn keep_alive_liveness() {
        let space = AddressSpace::new();
        let mut sub = subscription(100.0, 60, 2);
        let t0 = Instant::now();

        // First tick moves Creating -> Normal; then, with nothing to
        // send, the keep-alive countdown begins.
        assert!(sub
            .tick(&space, t0, TickReason::TickTimerFired, true)
            .is_none());

        // One keep-alive per maxKeepAliveCount intervals, indefinitely,
        // with increasing sequence numbers.
        let mut sent = Vec::new();
        let mut at = t0;
        for tick in 1..=12 {
            at += Duration::from_millis(100);
            if let Some(m) = sub.tick(&space, at, TickReason::TickTimerFired, true) {
                assert!(m.is_keep_alive());
                sent.push((tick, m.sequence_number));
            }
        }
        // Keep-alives arrive every two intervals once the countdown has
        // run, the first one a full keep-alive period after creation.
        assert_eq!(sent, vec![(3, 1), (5, 2), (7, 3), (9, 4), (11, 5)]);
        assert_eq!(sub.state(), SubscriptionState::KeepAlive);
    }

    #[test]
    fn lifetime_expiry_closes_with_status_change() {
        let space = AddressSpace::new();
        let mut sub = subscription(100.0, 60, 10);
        let t0 = Instant::now();
        let mut at = t0;
        // No publish requests ever arrive; the lifetime counter runs out.
        let mut guard = 0;
        while !sub.is_closed() {
            at += Duration::from_millis(100);
            let _ = sub.tick(&space, at, TickReason::TickTimerFired, false);
            guard += 1;
            assert!(guard < 500, "subscription never closed");
        }
        assert_eq!(sub.take_closing_status(), Some(StatusCode::BadTimeout));
        // Terminal: no more messages.
        at += Duration::from_millis(100);
        assert!(sub
            .tick(&space, at, TickReason::TickTimerFired, true)
            .is_none());
    }

    #[test]
    fn republish_and_acknowledge() {
        let mut sub = subscription(100.0, 60, 10);
        // Simulate two dispatched messages in the retransmission queue.
        let m1 = uastack_types::NotificationMessage::keep_alive(1, uastack_types::DateTime::now());
        let mut m1 = m1;
        m1.notification_data = Some(vec![]);
        sub.retransmission_queue.push_back(m1.clone());
        let mut m2 = m1.clone();
        m2.sequence_number = 2;
        sub.retransmission_queue.push_back(m2);

        assert_eq!(sub.available_sequence_numbers(), vec![1, 2]);
        assert!(sub.republish(1).is_ok());
        assert_eq!(sub.acknowledge(1), StatusCode::Good);
        assert_eq!(sub.acknowledge(1), StatusCode::BadSequenceNumberUnknown);
        assert_eq!(
            sub.republish(1).unwrap_err(),
            StatusCode::BadMessageNotAvailable
        );
        assert_eq!(sub.available_sequence_numbers(), vec![2]);
    }

    #[test]
    fn triggered_items_flush_with_the_triggering_report() {
        use uastack_types::{
            encoding::DecodingOptions, DataChangeNotification, MonitoredItemCreateRequest,
            MonitoringMode, MonitoringParameters, ReadValueId, TimestampsToReturn, VariableId,
            Variant,
        };

        use crate::subscriptions::monitored_item::MonitoredItem;

        let mut space = AddressSpace::new();
        let mut sub = subscription(100.0, 60, 10);
        let sub_limits = limits();
        let options = DecodingOptions::default();

        let make_request = |node: VariableId, handle: u32, mode: MonitoringMode| {
            MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::value_of(node),
                monitoring_mode: mode,
                requested_parameters: MonitoringParameters {
                    client_handle: handle,
                    sampling_interval: 10.0,
                    filter: Default::default(),
                    queue_size: 10,
                    discard_oldest: true,
                },
            }
        };
        // The reporting item triggers the sampling one; the sampling item
        // never reports on its own.
        let reporting = MonitoredItem::new(
            1,
            &make_request(VariableId::Server_ServerStatus_State, 100, MonitoringMode::Reporting),
            TimestampsToReturn::Both,
            &sub_limits,
            &options,
            None,
        )
        .unwrap();
        let sampling = MonitoredItem::new(
            2,
            &make_request(
                VariableId::Server_ServiceLevel,
                200,
                MonitoringMode::Sampling,
            ),
            TimestampsToReturn::Both,
            &sub_limits,
            &options,
            None,
        )
        .unwrap();
        sub.insert_monitored_item(reporting);
        sub.insert_monitored_item(sampling);
        sub.monitored_items_mut()
            .get_mut(&1)
            .unwrap()
            .add_trigger(2);
        // A dangling link must be a silent no-op.
        sub.monitored_items_mut()
            .get_mut(&1)
            .unwrap()
            .add_trigger(999);

        let collect_handles = |m: &uastack_types::NotificationMessage| {
            let mut handles = Vec::new();
            for object in m.notification_data.as_deref().unwrap_or(&[]) {
                if let Ok(data) = object.decode_inner::<DataChangeNotification>(&options) {
                    handles.extend(
                        data.monitored_items
                            .unwrap_or_default()
                            .into_iter()
                            .map(|n| n.client_handle),
                    );
                }
            }
            handles.sort_unstable();
            handles
        };

        // Both items queue their initial value; the reporting item's
        // report flushes the triggered sampling item into the same
        // message.
        let t0 = Instant::now();
        let _ = sub.tick(&space, t0, TickReason::TickTimerFired, true);
        let mut at = t0;
        let mut handles = Vec::new();
        for _ in 0..4 {
            at += Duration::from_millis(100);
            if let Some(m) = sub.tick(&space, at, TickReason::TickTimerFired, true) {
                handles = collect_handles(&m);
                break;
            }
        }
        assert_eq!(handles, vec![100, 200]);

        // Only the sampling item changes: it does not report on its own,
        // so nothing but keep-alives can go out.
        space
            .set_variable_value(&VariableId::Server_ServiceLevel.into(), Variant::Byte(100))
            .unwrap();
        for _ in 0..6 {
            at += Duration::from_millis(100);
            if let Some(m) = sub.tick(&space, at, TickReason::TickTimerFired, true) {
                assert!(m.is_keep_alive());
            }
        }
    }

    #[test]
    fn durable_only_without_items() {
        let mut sub = subscription(100.0, 60, 10);
        let revised = sub.set_durable(0, &limits()).unwrap();
        assert_eq!(revised, limits().max_durable_lifetime_hours);
        assert!(sub.lifetime_count() > 1_000_000);
    }
}
