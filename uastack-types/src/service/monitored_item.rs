//! Monitored item service types and filters.

use crate::{
    diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject, node_id::NodeId,
    qualified_name::QualifiedName, request_header::RequestHeader,
    response_header::ResponseHeader, status_code::StatusCode, string::UAString, ua_encodable,
    ua_enum, ua_message, variant::Variant,
};

use super::{attributes::ReadValueId, support::TimestampsToReturn};

ua_enum! {
    /// Whether an item samples, reports, or does neither.
    pub enum MonitoringMode: i32 {
        Disabled = 0,
        Sampling = 1,
        #[default]
        Reporting = 2,
    }
}

ua_enum! {
    /// Which parts of a DataValue count as a change.
    pub enum DataChangeTrigger: i32 {
        Status = 0,
        #[default]
        StatusValue = 1,
        StatusValueTimestamp = 2,
    }
}

/// The deadband kinds carried in `DataChangeFilter::deadband_type`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum DeadbandType {
    /// No deadband, every value change passes.
    #[default]
    None = 0,
    /// Suppress deltas below an absolute threshold.
    Absolute = 1,
    /// Suppress deltas below a percentage of the EURange span.
    Percent = 2,
}

impl TryFrom<u32> for DeadbandType {
    type Error = ();
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DeadbandType::None),
            1 => Ok(DeadbandType::Absolute),
            2 => Ok(DeadbandType::Percent),
            _ => Err(()),
        }
    }
}

ua_enum! {
    /// Operators usable in event where clauses.
    pub enum FilterOperator: i32 {
        #[default]
        Equals = 0,
        IsNull = 1,
        GreaterThan = 2,
        LessThan = 3,
        GreaterThanOrEqual = 4,
        LessThanOrEqual = 5,
        Like = 6,
        Not = 7,
        Between = 8,
        InList = 9,
        And = 10,
        Or = 11,
        Cast = 12,
        InView = 13,
        OfType = 14,
        RelatedTo = 15,
        BitwiseAnd = 16,
        BitwiseOr = 17,
    }
}

ua_encodable! {
    /// Filter deciding which sampled values are queued.
    pub struct DataChangeFilter {
        /// Which DataValue fields count as a change.
        pub trigger: DataChangeTrigger,
        /// A `DeadbandType` value.
        pub deadband_type: u32,
        /// Absolute threshold, or percentage of EURange.
        pub deadband_value: f64,
    }
}
ua_message!(DataChangeFilter, DataChangeFilter_Encoding_DefaultBinary);

ua_encodable! {
    /// Selects one attribute reached by a browse path from a type.
    pub struct SimpleAttributeOperand {
        /// The type definition the browse path starts at.
        pub type_definition_id: NodeId,
        /// Browse names leading to the target node.
        pub browse_path: Option<Vec<QualifiedName>>,
        /// The attribute to project.
        pub attribute_id: u32,
        /// Sub-range of array values.
        pub index_range: UAString,
    }
}
ua_message!(SimpleAttributeOperand, SimpleAttributeOperand_Encoding_DefaultBinary);

ua_encodable! {
    /// A literal operand in a content filter.
    pub struct LiteralOperand {
        /// The literal value.
        pub value: Variant,
    }
}
ua_message!(LiteralOperand, LiteralOperand_Encoding_DefaultBinary);

ua_encodable! {
    /// One element of a content filter expression tree.
    pub struct ContentFilterElement {
        /// The operator to apply.
        pub filter_operator: FilterOperator,
        /// Operands, each a SimpleAttributeOperand, LiteralOperand or
        /// ElementOperand extension object.
        pub filter_operands: Option<Vec<ExtensionObject>>,
    }
}
ua_message!(ContentFilterElement, ContentFilterElement_Encoding_DefaultBinary);

ua_encodable! {
    /// A where-clause expression, elements in prefix order.
    pub struct ContentFilter {
        /// The elements, index 0 being the root.
        pub elements: Option<Vec<ContentFilterElement>>,
    }
}
ua_message!(ContentFilter, ContentFilter_Encoding_DefaultBinary);

ua_encodable! {
    /// Filter selecting and projecting events.
    pub struct EventFilter {
        /// Fields to project into each notification.
        pub select_clauses: Option<Vec<SimpleAttributeOperand>>,
        /// Predicate an event must pass to be reported.
        pub where_clause: ContentFilter,
    }
}
ua_message!(EventFilter, EventFilter_Encoding_DefaultBinary);

ua_encodable! {
    /// Requested monitoring parameters for one item.
    pub struct MonitoringParameters {
        /// Client-side handle reported back in notifications.
        pub client_handle: u32,
        /// Sampling interval in milliseconds. 0 is event driven, -1 uses
        /// the subscription's publishing interval.
        pub sampling_interval: f64,
        /// DataChangeFilter or EventFilter, empty for none.
        pub filter: ExtensionObject,
        /// Requested queue depth.
        pub queue_size: u32,
        /// On overflow, drop the oldest value rather than the newest.
        pub discard_oldest: bool,
    }
}

ua_encodable! {
    /// One item to create.
    pub struct MonitoredItemCreateRequest {
        /// The node attribute or event source to monitor.
        pub item_to_monitor: ReadValueId,
        /// The initial monitoring mode.
        pub monitoring_mode: MonitoringMode,
        /// Requested parameters.
        pub requested_parameters: MonitoringParameters,
    }
}

impl MonitoredItemCreateRequest {
    /// A reporting item on the given attribute with default parameters.
    pub fn new(
        item_to_monitor: ReadValueId,
        client_handle: u32,
        sampling_interval: f64,
        queue_size: u32,
    ) -> MonitoredItemCreateRequest {
        MonitoredItemCreateRequest {
            item_to_monitor,
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle,
                sampling_interval,
                filter: ExtensionObject::null(),
                queue_size,
                discard_oldest: true,
            },
        }
    }
}

ua_encodable! {
    /// Result of one item creation.
    pub struct MonitoredItemCreateResult {
        /// Operation status.
        pub status_code: StatusCode,
        /// Server-assigned item id.
        pub monitored_item_id: u32,
        /// Granted sampling interval.
        pub revised_sampling_interval: f64,
        /// Granted queue depth.
        pub revised_queue_size: u32,
        /// Filter details, empty unless the filter was adjusted.
        pub filter_result: ExtensionObject,
    }
}

ua_encodable! {
    /// Request to create monitored items on a subscription.
    pub struct CreateMonitoredItemsRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The owning subscription.
        pub subscription_id: u32,
        /// Which timestamps sampled values carry.
        pub timestamps_to_return: TimestampsToReturn,
        /// The items to create.
        pub items_to_create: Option<Vec<MonitoredItemCreateRequest>>,
    }
}
ua_message!(CreateMonitoredItemsRequest, CreateMonitoredItemsRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to CreateMonitoredItems.
    pub struct CreateMonitoredItemsResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Results in request order.
        pub results: Option<Vec<MonitoredItemCreateResult>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(CreateMonitoredItemsResponse, CreateMonitoredItemsResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// One item modification.
    pub struct MonitoredItemModifyRequest {
        /// The item to modify.
        pub monitored_item_id: u32,
        /// The new parameters.
        pub requested_parameters: MonitoringParameters,
    }
}

ua_encodable! {
    /// Result of one item modification.
    pub struct MonitoredItemModifyResult {
        /// Operation status.
        pub status_code: StatusCode,
        /// Granted sampling interval.
        pub revised_sampling_interval: f64,
        /// Granted queue depth.
        pub revised_queue_size: u32,
        /// Filter details, empty unless the filter was adjusted.
        pub filter_result: ExtensionObject,
    }
}

ua_encodable! {
    /// Request to modify monitored items.
    pub struct ModifyMonitoredItemsRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The owning subscription.
        pub subscription_id: u32,
        /// Which timestamps sampled values carry.
        pub timestamps_to_return: TimestampsToReturn,
        /// The modifications to apply.
        pub items_to_modify: Option<Vec<MonitoredItemModifyRequest>>,
    }
}
ua_message!(ModifyMonitoredItemsRequest, ModifyMonitoredItemsRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to ModifyMonitoredItems.
    pub struct ModifyMonitoredItemsResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Results in request order.
        pub results: Option<Vec<MonitoredItemModifyResult>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(ModifyMonitoredItemsResponse, ModifyMonitoredItemsResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to change the monitoring mode of items.
    pub struct SetMonitoringModeRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The owning subscription.
        pub subscription_id: u32,
        /// The new mode.
        pub monitoring_mode: MonitoringMode,
        /// The items to change.
        pub monitored_item_ids: Option<Vec<u32>>,
    }
}
ua_message!(SetMonitoringModeRequest, SetMonitoringModeRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to SetMonitoringMode.
    pub struct SetMonitoringModeResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Statuses in request order.
        pub results: Option<Vec<StatusCode>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(SetMonitoringModeResponse, SetMonitoringModeResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to link triggered items to a triggering item.
    pub struct SetTriggeringRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The owning subscription.
        pub subscription_id: u32,
        /// The item whose reports flush the linked items' queues.
        pub triggering_item_id: u32,
        /// Links to add.
        pub links_to_add: Option<Vec<u32>>,
        /// Links to remove.
        pub links_to_remove: Option<Vec<u32>>,
    }
}
ua_message!(SetTriggeringRequest, SetTriggeringRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to SetTriggering.
    pub struct SetTriggeringResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Status per added link.
        pub add_results: Option<Vec<StatusCode>>,
        /// Diagnostics per added link.
        pub add_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
        /// Status per removed link.
        pub remove_results: Option<Vec<StatusCode>>,
        /// Diagnostics per removed link.
        pub remove_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(SetTriggeringResponse, SetTriggeringResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to delete monitored items.
    pub struct DeleteMonitoredItemsRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The owning subscription.
        pub subscription_id: u32,
        /// The items to delete.
        pub monitored_item_ids: Option<Vec<u32>>,
    }
}
ua_message!(DeleteMonitoredItemsRequest, DeleteMonitoredItemsRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to DeleteMonitoredItems.
    pub struct DeleteMonitoredItemsResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Statuses in request order.
        pub results: Option<Vec<StatusCode>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(DeleteMonitoredItemsResponse, DeleteMonitoredItemsResponse_Encoding_DefaultBinary);
