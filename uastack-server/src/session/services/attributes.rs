//! Read, Write and the history dispatch.

use uastack_types::{
    HistoryReadRequest, HistoryReadResponse, HistoryReadResult, HistoryUpdateRequest,
    HistoryUpdateResponse, HistoryUpdateResult, ReadRequest, ReadResponse, ResponseHeader,
    StatusCode, TimestampsToReturn, WriteRequest, WriteResponse,
};

use crate::session::message_handler::{service_fault, take_service_items, Request, Response};

pub(crate) async fn read(request: Request<ReadRequest>) -> Response {
    if request.request.max_age < 0.0 {
        return service_fault!(request, StatusCode::BadMaxAgeInvalid);
    }
    if request.request.timestamps_to_return == TimestampsToReturn::Invalid {
        return service_fault!(request, StatusCode::BadTimestampsToReturnInvalid);
    }
    let nodes_to_read = match take_service_items(
        request.request.nodes_to_read.clone(),
        request.info.config.limits.max_operations_per_call,
    ) {
        Ok(items) => items,
        Err(status) => return service_fault!(request, status),
    };

    let (keep_source, keep_server) = match request.request.timestamps_to_return {
        TimestampsToReturn::Source => (true, false),
        TimestampsToReturn::Server => (false, true),
        TimestampsToReturn::Both => (true, true),
        _ => (false, false),
    };

    let address_space = request.address_space.read();
    let results = nodes_to_read
        .iter()
        .map(|operation| {
            // All values are served from the live node graph, so any
            // max_age the client will accept is satisfied.
            let mut value =
                address_space.read_attribute(&operation.node_id, operation.attribute_id);
            if !operation.index_range.is_empty() {
                return uastack_types::DataValue::new_status(StatusCode::BadIndexRangeInvalid);
            }
            value.keep_timestamps(keep_source, keep_server);
            value
        })
        .collect();

    Response {
        message: ReadResponse {
            response_header: ResponseHeader::new_good(&request.request.request_header),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}

pub(crate) async fn write(request: Request<WriteRequest>) -> Response {
    let nodes_to_write = match take_service_items(
        request.request.nodes_to_write.clone(),
        request.info.config.limits.max_operations_per_call,
    ) {
        Ok(items) => items,
        Err(status) => return service_fault!(request, status),
    };

    let mut address_space = request.address_space.write();
    let results = nodes_to_write
        .into_iter()
        .map(|operation| {
            if !operation.index_range.is_empty() {
                return StatusCode::BadIndexRangeInvalid;
            }
            address_space.write_attribute(
                &operation.node_id,
                operation.attribute_id,
                operation.value,
            )
        })
        .collect();

    Response {
        message: WriteResponse {
            response_header: ResponseHeader::new_good(&request.request.request_header),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}

// History storage is an external collaborator; the dispatch itself always
// answers, per operation, that the operation is unsupported.
pub(crate) async fn history_read(request: Request<HistoryReadRequest>) -> Response {
    let nodes_to_read = match take_service_items(
        request.request.nodes_to_read.clone(),
        request.info.config.limits.max_operations_per_call,
    ) {
        Ok(items) => items,
        Err(status) => return service_fault!(request, status),
    };
    let results = nodes_to_read
        .iter()
        .map(|_| HistoryReadResult {
            status_code: StatusCode::BadHistoryOperationUnsupported,
            ..Default::default()
        })
        .collect();
    Response {
        message: HistoryReadResponse {
            response_header: ResponseHeader::new_good(&request.request.request_header),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}

pub(crate) async fn history_update(request: Request<HistoryUpdateRequest>) -> Response {
    let details = match take_service_items(
        request.request.history_update_details.clone(),
        request.info.config.limits.max_operations_per_call,
    ) {
        Ok(items) => items,
        Err(status) => return service_fault!(request, status),
    };
    let results = details
        .iter()
        .map(|_| HistoryUpdateResult {
            status_code: StatusCode::BadHistoryOperationUnsupported,
            ..Default::default()
        })
        .collect();
    Response {
        message: HistoryUpdateResponse {
            response_header: ResponseHeader::new_good(&request.request.request_header),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}
