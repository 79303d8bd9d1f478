//! Subscription service types: create/modify/delete, publishing mode,
//! Publish/Republish, transfer, and the notification payloads.

use crate::{
    date_time::DateTime, diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject,
    request_header::RequestHeader, response_header::ResponseHeader, status_code::StatusCode,
    ua_encodable, ua_message,
};

ua_encodable! {
    /// Request to create a subscription.
    pub struct CreateSubscriptionRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// Requested publishing interval in milliseconds.
        pub requested_publishing_interval: f64,
        /// Publishing intervals without a publish before the subscription
        /// expires.
        pub requested_lifetime_count: u32,
        /// Publishing intervals without notifications before a keep-alive
        /// is sent.
        pub requested_max_keep_alive_count: u32,
        /// Cap on notifications per message, 0 for no cap.
        pub max_notifications_per_publish: u32,
        /// Whether publishing starts enabled.
        pub publishing_enabled: bool,
        /// Relative priority against the session's other subscriptions.
        pub priority: u8,
    }
}
ua_message!(CreateSubscriptionRequest, CreateSubscriptionRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response carrying the revised subscription parameters.
    pub struct CreateSubscriptionResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// The server-global subscription id.
        pub subscription_id: u32,
        /// Granted publishing interval in milliseconds.
        pub revised_publishing_interval: f64,
        /// Granted lifetime count.
        pub revised_lifetime_count: u32,
        /// Granted keep-alive count.
        pub revised_max_keep_alive_count: u32,
    }
}
ua_message!(CreateSubscriptionResponse, CreateSubscriptionResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to modify a subscription's parameters.
    pub struct ModifySubscriptionRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The subscription to modify.
        pub subscription_id: u32,
        /// Requested publishing interval in milliseconds.
        pub requested_publishing_interval: f64,
        /// Requested lifetime count.
        pub requested_lifetime_count: u32,
        /// Requested keep-alive count.
        pub requested_max_keep_alive_count: u32,
        /// Cap on notifications per message, 0 for no cap.
        pub max_notifications_per_publish: u32,
        /// Relative priority against the session's other subscriptions.
        pub priority: u8,
    }
}
ua_message!(ModifySubscriptionRequest, ModifySubscriptionRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response carrying the revised parameters.
    pub struct ModifySubscriptionResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Granted publishing interval in milliseconds.
        pub revised_publishing_interval: f64,
        /// Granted lifetime count.
        pub revised_lifetime_count: u32,
        /// Granted keep-alive count.
        pub revised_max_keep_alive_count: u32,
    }
}
ua_message!(ModifySubscriptionResponse, ModifySubscriptionResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to enable or disable publishing on subscriptions.
    pub struct SetPublishingModeRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The new publishing enabled state.
        pub publishing_enabled: bool,
        /// The subscriptions to change.
        pub subscription_ids: Option<Vec<u32>>,
    }
}
ua_message!(SetPublishingModeRequest, SetPublishingModeRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to SetPublishingMode.
    pub struct SetPublishingModeResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Statuses in request order.
        pub results: Option<Vec<StatusCode>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(SetPublishingModeResponse, SetPublishingModeResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to delete subscriptions.
    pub struct DeleteSubscriptionsRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The subscriptions to delete.
        pub subscription_ids: Option<Vec<u32>>,
    }
}
ua_message!(DeleteSubscriptionsRequest, DeleteSubscriptionsRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to DeleteSubscriptions.
    pub struct DeleteSubscriptionsResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Statuses in request order.
        pub results: Option<Vec<StatusCode>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(DeleteSubscriptionsResponse, DeleteSubscriptionsResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Acknowledges receipt of one notification message.
    pub struct SubscriptionAcknowledgement {
        /// The subscription the message belonged to.
        pub subscription_id: u32,
        /// The acknowledged sequence number.
        pub sequence_number: u32,
    }
}

ua_encodable! {
    /// A credit authorizing the server to send one notification message.
    pub struct PublishRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// Messages received since the last publish.
        pub subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
    }
}
ua_message!(PublishRequest, PublishRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// A notification message pushed in response to a Publish credit.
    pub struct PublishResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// The subscription the message belongs to.
        pub subscription_id: u32,
        /// Sequence numbers still available for Republish.
        pub available_sequence_numbers: Option<Vec<u32>>,
        /// True if more notifications are already waiting.
        pub more_notifications: bool,
        /// The message itself.
        pub notification_message: NotificationMessage,
        /// Status per acknowledgement in the request.
        pub results: Option<Vec<StatusCode>>,
        /// Per-acknowledgement diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(PublishResponse, PublishResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to retransmit a notification message from the queue.
    pub struct RepublishRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The subscription that sent the message.
        pub subscription_id: u32,
        /// Sequence number of the message wanted.
        pub retransmit_sequence_number: u32,
    }
}
ua_message!(RepublishRequest, RepublishRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response carrying the retransmitted message.
    pub struct RepublishResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// The requested message.
        pub notification_message: NotificationMessage,
    }
}
ua_message!(RepublishResponse, RepublishResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Result of transferring one subscription.
    pub struct TransferResult {
        /// Operation status.
        pub status_code: StatusCode,
        /// Sequence numbers available for Republish after the transfer.
        pub available_sequence_numbers: Option<Vec<u32>>,
    }
}

ua_encodable! {
    /// Request to transfer subscriptions to this session.
    pub struct TransferSubscriptionsRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The subscriptions to take over.
        pub subscription_ids: Option<Vec<u32>>,
        /// If true, every data-change item re-queues its current value.
        pub send_initial_values: bool,
    }
}
ua_message!(TransferSubscriptionsRequest, TransferSubscriptionsRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to TransferSubscriptions.
    pub struct TransferSubscriptionsResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Results in request order.
        pub results: Option<Vec<TransferResult>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(TransferSubscriptionsResponse, TransferSubscriptionsResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// A batch of notifications with a per-subscription sequence number.
    pub struct NotificationMessage {
        /// Monotonic sequence number, starting at 1, skipping 0 on wrap.
        pub sequence_number: u32,
        /// When the message was assembled.
        pub publish_time: DateTime,
        /// DataChangeNotification, EventNotificationList or
        /// StatusChangeNotification payloads.
        pub notification_data: Option<Vec<ExtensionObject>>,
    }
}

impl NotificationMessage {
    /// An empty keep-alive message.
    pub fn keep_alive(sequence_number: u32, publish_time: DateTime) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: None,
        }
    }

    /// A message carrying data change notifications.
    pub fn data_change(
        sequence_number: u32,
        publish_time: DateTime,
        monitored_items: Vec<MonitoredItemNotification>,
        events: Vec<EventFieldList>,
    ) -> NotificationMessage {
        let mut notification_data = Vec::with_capacity(2);
        if !monitored_items.is_empty() {
            let data_change = DataChangeNotification {
                monitored_items: Some(monitored_items),
                diagnostic_infos: None,
            };
            notification_data.push(ExtensionObject::from_message(&data_change));
        }
        if !events.is_empty() {
            let events = EventNotificationList {
                events: Some(events),
            };
            notification_data.push(ExtensionObject::from_message(&events));
        }
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(notification_data),
        }
    }

    /// A message carrying a status change for the subscription itself.
    pub fn status_change(
        sequence_number: u32,
        publish_time: DateTime,
        status: StatusCode,
    ) -> NotificationMessage {
        let notification = StatusChangeNotification {
            status,
            diagnostic_info: DiagnosticInfo::null(),
        };
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(vec![ExtensionObject::from_message(&notification)]),
        }
    }

    /// True if this message carries no notifications.
    pub fn is_keep_alive(&self) -> bool {
        self.notification_data
            .as_ref()
            .map_or(true, |d| d.is_empty())
    }
}

ua_encodable! {
    /// A changed value of one monitored item.
    pub struct MonitoredItemNotification {
        /// The client-side handle of the item.
        pub client_handle: u32,
        /// The new value.
        pub value: crate::data_value::DataValue,
    }
}
ua_message!(MonitoredItemNotification, MonitoredItemNotification_Encoding_DefaultBinary);

ua_encodable! {
    /// The data-change payload of a notification message.
    pub struct DataChangeNotification {
        /// The changed values.
        pub monitored_items: Option<Vec<MonitoredItemNotification>>,
        /// Per-item diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(DataChangeNotification, DataChangeNotification_Encoding_DefaultBinary);

ua_encodable! {
    /// The fields of one event, projected by the select clauses.
    pub struct EventFieldList {
        /// The client-side handle of the monitored item.
        pub client_handle: u32,
        /// Field values in select-clause order.
        pub event_fields: Option<Vec<crate::variant::Variant>>,
    }
}
ua_message!(EventFieldList, EventFieldList_Encoding_DefaultBinary);

ua_encodable! {
    /// The event payload of a notification message.
    pub struct EventNotificationList {
        /// The events that fired.
        pub events: Option<Vec<EventFieldList>>,
    }
}
ua_message!(EventNotificationList, EventNotificationList_Encoding_DefaultBinary);

ua_encodable! {
    /// Signals a state change of the subscription itself.
    pub struct StatusChangeNotification {
        /// The new status, e.g. `BadTimeout` on lifetime expiry.
        pub status: StatusCode,
        /// Diagnostics for the change.
        pub diagnostic_info: DiagnosticInfo,
    }
}
ua_message!(StatusChangeNotification, StatusChangeNotification_Encoding_DefaultBinary);
