//! Monitored items: sampling, change detection, deadband filtering and
//! the bounded notification queue.

use std::collections::{BTreeSet, VecDeque};
use std::time::Instant;

use uastack_types::{
    encoding::DecodingOptions, DataChangeFilter, DataChangeTrigger, DataValue, DeadbandType,
    EventFieldList, EventFilter, ExtensionObject, MonitoredItemCreateRequest,
    MonitoredItemNotification, MonitoringMode, MonitoringParameters, ObjectId, ReadValueId,
    StatusCode, TimestampsToReturn, Variant,
};

use crate::{address_space::AddressSpace, config::SubscriptionLimits, events::Event};

/// The parsed monitoring filter of an item.
#[derive(Debug, Clone)]
pub enum FilterType {
    /// No filter: every sampled change is queued.
    None,
    /// A data change filter with trigger and deadband.
    DataChange(DataChangeFilter),
    /// An event filter with select and where clauses.
    Event(EventFilter),
}

impl FilterType {
    /// Parse the filter from its extension object.
    pub fn from_filter(
        filter: &ExtensionObject,
        options: &DecodingOptions,
    ) -> Result<FilterType, StatusCode> {
        if filter.is_empty() {
            return Ok(FilterType::None);
        }
        match filter.object_id() {
            Some(ObjectId::DataChangeFilter_Encoding_DefaultBinary) => {
                let filter = filter
                    .decode_inner::<DataChangeFilter>(options)
                    .map_err(|_| StatusCode::BadMonitoredItemFilterInvalid)?;
                if DeadbandType::try_from(filter.deadband_type).is_err() {
                    return Err(StatusCode::BadDeadbandFilterInvalid);
                }
                Ok(FilterType::DataChange(filter))
            }
            Some(ObjectId::EventFilter_Encoding_DefaultBinary) => filter
                .decode_inner::<EventFilter>(options)
                .map(FilterType::Event)
                .map_err(|_| StatusCode::BadMonitoredItemFilterInvalid),
            _ => Err(StatusCode::BadMonitoredItemFilterUnsupported),
        }
    }

    /// True for event filters.
    pub fn is_event(&self) -> bool {
        matches!(self, FilterType::Event(_))
    }
}

/// One queued notification.
#[derive(Debug, Clone)]
pub enum Notification {
    /// A changed data value.
    DataChange(MonitoredItemNotification),
    /// A projected event.
    Event(EventFieldList),
}

/// A subscription's interest in one node attribute or event source.
#[derive(Debug)]
pub struct MonitoredItem {
    id: u32,
    item_to_monitor: ReadValueId,
    monitoring_mode: MonitoringMode,
    client_handle: u32,
    sampling_interval: f64,
    queue_size: usize,
    discard_oldest: bool,
    timestamps_to_return: TimestampsToReturn,
    filter: FilterType,
    /// EURange bounds for percent deadband, resolved at creation.
    eu_range: Option<(f64, f64)>,
    queue: VecDeque<Notification>,
    last_value: Option<DataValue>,
    last_sample_time: Option<Instant>,
    /// Items whose queues flush when this item reports. Links are ids,
    /// never handles, so a removed item is a silent no-op.
    triggered_items: BTreeSet<u32>,
}

fn revise_sampling_interval(requested: f64, limits: &SubscriptionLimits) -> f64 {
    if requested == 0.0 {
        // Exception based, driven by the value's change notifier.
        0.0
    } else if requested < 0.0 {
        // Negative means "use the publishing interval"; the subscription
        // tick already runs at that cadence.
        limits.min_sampling_interval_ms
    } else {
        requested.clamp(
            limits.min_sampling_interval_ms,
            limits.max_sampling_interval_ms,
        )
    }
}

fn revise_queue_size(requested: u32, limits: &SubscriptionLimits) -> usize {
    if requested == 0 {
        1
    } else {
        (requested as usize).min(limits.max_queue_size)
    }
}

impl MonitoredItem {
    /// Validate and create an item from a create request.
    pub fn new(
        id: u32,
        request: &MonitoredItemCreateRequest,
        timestamps_to_return: TimestampsToReturn,
        limits: &SubscriptionLimits,
        options: &DecodingOptions,
        eu_range: Option<(f64, f64)>,
    ) -> Result<MonitoredItem, StatusCode> {
        let filter = FilterType::from_filter(&request.requested_parameters.filter, options)?;
        if let FilterType::DataChange(f) = &filter {
            if f.deadband_type == DeadbandType::Percent as u32 && eu_range.is_none() {
                return Err(StatusCode::BadFilterNotAllowed);
            }
        }
        Ok(MonitoredItem {
            id,
            item_to_monitor: request.item_to_monitor.clone(),
            monitoring_mode: request.monitoring_mode,
            client_handle: request.requested_parameters.client_handle,
            sampling_interval: revise_sampling_interval(
                request.requested_parameters.sampling_interval,
                limits,
            ),
            queue_size: revise_queue_size(request.requested_parameters.queue_size, limits),
            discard_oldest: request.requested_parameters.discard_oldest,
            timestamps_to_return,
            filter,
            eu_range,
            queue: VecDeque::new(),
            last_value: None,
            last_sample_time: None,
            triggered_items: BTreeSet::new(),
        })
    }

    /// Apply a modify request, trimming the queue if it shrank.
    pub fn modify(
        &mut self,
        parameters: &MonitoringParameters,
        timestamps_to_return: TimestampsToReturn,
        limits: &SubscriptionLimits,
        options: &DecodingOptions,
    ) -> Result<(), StatusCode> {
        let filter = FilterType::from_filter(&parameters.filter, options)?;
        if let FilterType::DataChange(f) = &filter {
            if f.deadband_type == DeadbandType::Percent as u32 && self.eu_range.is_none() {
                return Err(StatusCode::BadFilterNotAllowed);
            }
        }
        self.filter = filter;
        self.client_handle = parameters.client_handle;
        self.sampling_interval = revise_sampling_interval(parameters.sampling_interval, limits);
        self.queue_size = revise_queue_size(parameters.queue_size, limits);
        self.discard_oldest = parameters.discard_oldest;
        self.timestamps_to_return = timestamps_to_return;
        while self.queue.len() > self.queue_size {
            if self.discard_oldest {
                self.queue.pop_front();
            } else {
                self.queue.pop_back();
            }
        }
        Ok(())
    }

    /// The item's server-assigned id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The client-side handle.
    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    /// What the item monitors.
    pub fn item_to_monitor(&self) -> &ReadValueId {
        &self.item_to_monitor
    }

    /// The granted sampling interval in milliseconds.
    pub fn sampling_interval(&self) -> f64 {
        self.sampling_interval
    }

    /// The granted queue depth.
    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// The current monitoring mode.
    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.monitoring_mode
    }

    /// Change the monitoring mode. Disabling clears the queue.
    pub fn set_monitoring_mode(&mut self, mode: MonitoringMode) {
        if mode == MonitoringMode::Disabled {
            self.queue.clear();
        }
        self.monitoring_mode = mode;
    }

    /// Link another item to flush when this one reports.
    pub fn add_trigger(&mut self, item_id: u32) {
        self.triggered_items.insert(item_id);
    }

    /// Remove a trigger link. Returns false if the link did not exist.
    pub fn remove_trigger(&mut self, item_id: u32) -> bool {
        self.triggered_items.remove(&item_id)
    }

    /// The linked item ids.
    pub fn triggered_items(&self) -> &BTreeSet<u32> {
        &self.triggered_items
    }

    /// True if the item monitors events rather than data changes.
    pub fn is_event_item(&self) -> bool {
        self.filter.is_event()
    }

    /// Sample the monitored attribute if the sampling interval has
    /// elapsed. `force` re-queues the current value regardless of change
    /// detection, for ResendData and transfers with initial values.
    pub fn sample(&mut self, address_space: &AddressSpace, now: Instant, force: bool) {
        if self.monitoring_mode == MonitoringMode::Disabled || self.is_event_item() {
            return;
        }
        let due = match self.last_sample_time {
            // Interval 0 is exception based; poll every tick.
            None => true,
            Some(last) => {
                (now - last).as_secs_f64() * 1000.0 >= self.sampling_interval
            }
        };
        if !due && !force {
            return;
        }
        self.last_sample_time = Some(now);

        let mut value = address_space.read_attribute(
            &self.item_to_monitor.node_id,
            self.item_to_monitor.attribute_id,
        );
        value.keep_timestamps(
            matches!(
                self.timestamps_to_return,
                TimestampsToReturn::Source | TimestampsToReturn::Both
            ),
            matches!(
                self.timestamps_to_return,
                TimestampsToReturn::Server | TimestampsToReturn::Both
            ),
        );

        if force || self.is_changed(&value) {
            self.enqueue_data_change(value);
        }
    }

    /// Re-queue the current value unconditionally.
    pub fn resend_current_value(&mut self, address_space: &AddressSpace) {
        if !self.is_event_item() {
            self.sample(address_space, Instant::now(), true);
        }
    }

    // Change detection per the configured trigger and deadband. Status
    // changes always pass the deadband.
    fn is_changed(&mut self, new_value: &DataValue) -> bool {
        let Some(last) = &self.last_value else {
            self.last_value = Some(new_value.clone());
            return true;
        };

        let (trigger, deadband_type, deadband_value) = match &self.filter {
            FilterType::DataChange(f) => (f.trigger, f.deadband_type, f.deadband_value),
            _ => (DataChangeTrigger::StatusValue, 0, 0.0),
        };

        let status_changed = last.status() != new_value.status();
        let value_changed = match trigger {
            DataChangeTrigger::Status => false,
            DataChangeTrigger::StatusValue | DataChangeTrigger::StatusValueTimestamp => {
                self.value_passes_deadband(last, new_value, deadband_type, deadband_value)
            }
        };
        let timestamp_changed = trigger == DataChangeTrigger::StatusValueTimestamp
            && last.source_timestamp != new_value.source_timestamp;

        let changed = status_changed || value_changed || timestamp_changed;
        if changed {
            self.last_value = Some(new_value.clone());
        }
        changed
    }

    fn value_passes_deadband(
        &self,
        last: &DataValue,
        new_value: &DataValue,
        deadband_type: u32,
        deadband_value: f64,
    ) -> bool {
        if last.value == new_value.value {
            return false;
        }
        let threshold = match DeadbandType::try_from(deadband_type) {
            Ok(DeadbandType::Absolute) => deadband_value,
            Ok(DeadbandType::Percent) => match self.eu_range {
                Some((low, high)) => deadband_value / 100.0 * (high - low),
                None => return true,
            },
            _ => return true,
        };
        let (Some(a), Some(b)) = (
            last.value.as_ref().and_then(Variant::as_f64),
            new_value.value.as_ref().and_then(Variant::as_f64),
        ) else {
            // Non-numeric values cannot be deadband filtered.
            return true;
        };
        (a - b).abs() > threshold
    }

    fn enqueue(&mut self, notification: Notification) {
        if self.queue.len() < self.queue_size {
            self.queue.push_back(notification);
            return;
        }
        // Overflow. The surviving value at the boundary carries the
        // overflow info bit.
        if self.discard_oldest {
            self.queue.pop_front();
            self.queue.push_back(notification);
            if let Some(Notification::DataChange(n)) = self.queue.front_mut() {
                n.value.status = Some(n.value.status.unwrap_or(StatusCode::Good).with_overflow());
            }
        } else {
            self.queue.pop_back();
            self.queue.push_back(notification);
            if let Some(Notification::DataChange(n)) = self.queue.back_mut() {
                n.value.status = Some(n.value.status.unwrap_or(StatusCode::Good).with_overflow());
            }
        }
    }

    fn enqueue_data_change(&mut self, value: DataValue) {
        let notification = MonitoredItemNotification {
            client_handle: self.client_handle,
            value,
        };
        self.enqueue(Notification::DataChange(notification));
    }

    /// Offer an event to this item. Queued if the item monitors events,
    /// is not disabled, and the where clause passes.
    pub fn notify_event(&mut self, event: &Event) {
        if self.monitoring_mode == MonitoringMode::Disabled {
            return;
        }
        let FilterType::Event(filter) = &self.filter else {
            return;
        };
        if !event.passes_where_clause(&filter.where_clause) {
            return;
        }
        let event_fields = filter
            .select_clauses
            .as_ref()
            .map(|clauses| clauses.iter().map(|c| event.select(c)).collect());
        let notification = EventFieldList {
            client_handle: self.client_handle,
            event_fields,
        };
        self.enqueue(Notification::Event(notification));
    }

    /// True if notifications are waiting.
    pub fn has_notifications(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Number of queued notifications.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Drain all queued notifications, oldest first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use uastack_types::{
        encoding::DecodingOptions, DataChangeFilter, DataChangeTrigger, ExtensionObject,
        MonitoredItemCreateRequest, MonitoringMode, MonitoringParameters, ReadValueId,
        TimestampsToReturn, VariableId, Variant,
    };

    use super::{MonitoredItem, Notification};
    use crate::address_space::AddressSpace;
    use crate::config::SubscriptionLimits;

    fn limits() -> SubscriptionLimits {
        SubscriptionLimits {
            min_sampling_interval_ms: 10.0,
            ..Default::default()
        }
    }

    fn state_item(queue_size: u32, discard_oldest: bool, deadband: Option<f64>) -> MonitoredItem {
        let filter = match deadband {
            Some(deadband_value) => ExtensionObject::from_message(&DataChangeFilter {
                trigger: DataChangeTrigger::StatusValue,
                deadband_type: uastack_types::DeadbandType::Absolute as u32,
                deadband_value,
            }),
            None => ExtensionObject::null(),
        };
        let request = MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId::value_of(VariableId::Server_ServerStatus_State),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: 99,
                sampling_interval: 10.0,
                filter,
                queue_size,
                discard_oldest,
            },
        };
        MonitoredItem::new(
            1,
            &request,
            TimestampsToReturn::Both,
            &limits(),
            &DecodingOptions::default(),
            None,
        )
        .unwrap()
    }

    fn sample_value(item: &mut MonitoredItem, space: &mut AddressSpace, value: i32, at: Instant) {
        space
            .set_variable_value(&VariableId::Server_ServerStatus_State.into(), Variant::Int32(value))
            .unwrap();
        item.sample(space, at, false);
    }

    #[test]
    fn value_change_detection() {
        let mut space = AddressSpace::new();
        let mut item = state_item(10, true, None);
        let t0 = Instant::now();
        sample_value(&mut item, &mut space, 1, t0);
        // Initial value always queues.
        assert_eq!(item.queue_len(), 1);
        // Same value, new timestamp: StatusValue trigger suppresses it.
        item.sample(&space, t0 + Duration::from_millis(20), false);
        assert_eq!(item.queue_len(), 1);
        sample_value(&mut item, &mut space, 2, t0 + Duration::from_millis(40));
        assert_eq!(item.queue_len(), 2);
    }

    #[test]
    fn sampling_interval_is_honored() {
        let mut space = AddressSpace::new();
        let mut item = state_item(10, true, None);
        let t0 = Instant::now();
        sample_value(&mut item, &mut space, 1, t0);
        // Too soon, not sampled at all.
        sample_value(&mut item, &mut space, 2, t0 + Duration::from_millis(1));
        assert_eq!(item.queue_len(), 1);
        sample_value(&mut item, &mut space, 2, t0 + Duration::from_millis(15));
        assert_eq!(item.queue_len(), 2);
    }

    #[test]
    fn queue_overflow_discard_oldest() {
        let mut space = AddressSpace::new();
        let mut item = state_item(2, true, None);
        let t0 = Instant::now();
        for (i, value) in [1, 2, 3].iter().enumerate() {
            sample_value(
                &mut item,
                &mut space,
                *value,
                t0 + Duration::from_millis(20 * i as u64),
            );
        }
        assert_eq!(item.queue_len(), 2);
        let notifications = item.take_notifications();
        // Most recent two survive, the head carries the overflow bit.
        let values: Vec<_> = notifications
            .iter()
            .map(|n| match n {
                Notification::DataChange(n) => n.value.value.clone(),
                _ => panic!("expected data change"),
            })
            .collect();
        assert_eq!(values, vec![Some(Variant::Int32(2)), Some(Variant::Int32(3))]);
        match &notifications[0] {
            Notification::DataChange(n) => assert!(n.value.status().has_overflow()),
            _ => unreachable!(),
        }
        match &notifications[1] {
            Notification::DataChange(n) => assert!(!n.value.status().has_overflow()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn queue_overflow_discard_newest() {
        let mut space = AddressSpace::new();
        let mut item = state_item(2, false, None);
        let t0 = Instant::now();
        for (i, value) in [1, 2, 3].iter().enumerate() {
            sample_value(
                &mut item,
                &mut space,
                *value,
                t0 + Duration::from_millis(20 * i as u64),
            );
        }
        let notifications = item.take_notifications();
        // First value plus the latest, the survivor carries the bit.
        let values: Vec<_> = notifications
            .iter()
            .map(|n| match n {
                Notification::DataChange(n) => n.value.value.clone(),
                _ => panic!("expected data change"),
            })
            .collect();
        assert_eq!(values, vec![Some(Variant::Int32(1)), Some(Variant::Int32(3))]);
        match &notifications[1] {
            Notification::DataChange(n) => assert!(n.value.status().has_overflow()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn absolute_deadband_suppresses_small_deltas() {
        let mut space = AddressSpace::new();
        space
            .set_variable_value(
                &VariableId::Server_ServerStatus_State.into(),
                Variant::Double(1.0),
            )
            .unwrap();
        let request = MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId::value_of(VariableId::Server_ServerStatus_State),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: 1,
                sampling_interval: 10.0,
                filter: ExtensionObject::from_message(&DataChangeFilter {
                    trigger: DataChangeTrigger::StatusValue,
                    deadband_type: uastack_types::DeadbandType::Absolute as u32,
                    deadband_value: 0.5,
                }),
                queue_size: 10,
                discard_oldest: true,
            },
        };
        let mut item = MonitoredItem::new(
            1,
            &request,
            TimestampsToReturn::Both,
            &limits(),
            &DecodingOptions::default(),
            None,
        )
        .unwrap();

        let t0 = Instant::now();
        let mut at = t0;
        for value in [1.0, 1.2, 1.8, 2.5, 2.6] {
            space
                .set_variable_value(
                    &VariableId::Server_ServerStatus_State.into(),
                    Variant::Double(value),
                )
                .unwrap();
            item.sample(&space, at, false);
            at += Duration::from_millis(20);
        }

        let reported: Vec<_> = item
            .take_notifications()
            .into_iter()
            .map(|n| match n {
                Notification::DataChange(n) => n.value.value.unwrap(),
                _ => panic!("expected data change"),
            })
            .collect();
        assert_eq!(
            reported,
            vec![
                Variant::Double(1.0),
                Variant::Double(1.8),
                Variant::Double(2.5)
            ]
        );
    }
}
