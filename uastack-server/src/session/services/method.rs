//! The Call service.

use uastack_types::{CallRequest, CallResponse, ResponseHeader};

use crate::{
    address_space::MethodContext,
    session::message_handler::{service_fault, take_service_items, Request, Response},
};

pub(crate) async fn call(request: Request<CallRequest>) -> Response {
    let methods_to_call = match take_service_items(
        request.request.methods_to_call.clone(),
        request.info.config.limits.max_operations_per_call,
    ) {
        Ok(items) => items,
        Err(status) => return service_fault!(request, status),
    };

    // Methods may mutate server state, so calls are serialized.
    let mut address_space = request.address_space.write();
    let results = methods_to_call
        .into_iter()
        .map(|operation| {
            let context = MethodContext {
                session_id: request.session_id,
                object_id: operation.object_id,
                method_id: operation.method_id,
            };
            address_space.call_method(
                &context,
                operation.input_arguments.as_deref().unwrap_or(&[]),
            )
        })
        .collect();

    Response {
        message: CallResponse {
            response_header: ResponseHeader::new_good(&request.request.request_header),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}
