//! Browse, BrowseNext, TranslateBrowsePathsToNodeIds, RegisterNodes and
//! UnregisterNodes.

use uastack_types::{
    BrowseNextRequest, BrowseNextResponse, BrowsePath, BrowsePathResult, BrowsePathTarget,
    BrowseRequest, BrowseResponse, BrowseResult, ByteString, ExpandedNodeId, NodeId,
    ReferenceDescription, RegisterNodesRequest, RegisterNodesResponse, ResponseHeader, StatusCode,
    TranslateBrowsePathsToNodeIdsRequest, TranslateBrowsePathsToNodeIdsResponse,
    UnregisterNodesRequest, UnregisterNodesResponse,
};

use crate::{
    address_space::AddressSpace,
    session::instance::BrowseContinuationPoint,
    session::message_handler::{service_fault, take_service_items, Request, Response},
};

// Split browse results into the first page and a stored continuation
// point for the rest.
fn page_references(
    request: &Request<impl Sized>,
    mut references: Vec<ReferenceDescription>,
    max_references: usize,
) -> (Vec<ReferenceDescription>, ByteString, StatusCode) {
    if max_references == 0 || references.len() <= max_references {
        return (references, ByteString::null(), StatusCode::Good);
    }
    let remaining = references.split_off(max_references);
    let point = BrowseContinuationPoint {
        remaining,
        max_references,
    };
    let mut session = request.session.write();
    match session.store_continuation_point(
        point,
        request.info.config.limits.max_browse_continuation_points,
    ) {
        Some(id) => (references, id, StatusCode::Good),
        // Out of continuation point slots; the operation fails rather
        // than silently truncating.
        None => (Vec::new(), ByteString::null(), StatusCode::BadNoContinuationPoints),
    }
}

pub(crate) async fn browse(request: Request<BrowseRequest>) -> Response {
    if !request.request.view.view_id.is_null() {
        return service_fault!(request, StatusCode::BadNodeNotInView);
    }
    let nodes_to_browse = match take_service_items(
        request.request.nodes_to_browse.clone(),
        request.info.config.limits.max_operations_per_call,
    ) {
        Ok(items) => items,
        Err(status) => return service_fault!(request, status),
    };

    let server_max = request.info.config.limits.max_references_per_node;
    let requested_max = request.request.requested_max_references_per_node as usize;
    let max_references = if requested_max == 0 {
        server_max
    } else {
        requested_max.min(server_max)
    };

    let results = {
        let address_space = request.address_space.read();
        nodes_to_browse
            .iter()
            .map(|description| match address_space.browse_node(description) {
                Ok(references) => {
                    let (references, continuation_point, status_code) =
                        page_references(&request, references, max_references);
                    BrowseResult {
                        status_code,
                        continuation_point,
                        references: Some(references),
                    }
                }
                Err(status_code) => BrowseResult {
                    status_code,
                    continuation_point: ByteString::null(),
                    references: None,
                },
            })
            .collect()
    };

    Response {
        message: BrowseResponse {
            response_header: ResponseHeader::new_good(&request.request.request_header),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}

pub(crate) async fn browse_next(request: Request<BrowseNextRequest>) -> Response {
    let continuation_points = match take_service_items(
        request.request.continuation_points.clone(),
        request.info.config.limits.max_operations_per_call,
    ) {
        Ok(items) => items,
        Err(status) => return service_fault!(request, status),
    };

    let results = continuation_points
        .iter()
        .map(|id| {
            let point = request.session.write().take_continuation_point(id);
            let Some(point) = point else {
                return BrowseResult {
                    status_code: StatusCode::BadContinuationPointInvalid,
                    continuation_point: ByteString::null(),
                    references: None,
                };
            };
            if request.request.release_continuation_points {
                return BrowseResult {
                    status_code: StatusCode::Good,
                    continuation_point: ByteString::null(),
                    references: None,
                };
            }
            let (references, continuation_point, status_code) =
                page_references(&request, point.remaining, point.max_references);
            BrowseResult {
                status_code,
                continuation_point,
                references: Some(references),
            }
        })
        .collect();

    Response {
        message: BrowseNextResponse {
            response_header: ResponseHeader::new_good(&request.request.request_header),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}

fn translate_one(address_space: &AddressSpace, path: &BrowsePath) -> BrowsePathResult {
    if address_space.find(&path.starting_node).is_none() {
        return BrowsePathResult {
            status_code: StatusCode::BadNodeIdUnknown,
            targets: None,
        };
    }
    let Some(elements) = &path.relative_path.elements else {
        return BrowsePathResult {
            status_code: StatusCode::BadNothingToDo,
            targets: None,
        };
    };
    if elements.is_empty() {
        return BrowsePathResult {
            status_code: StatusCode::BadNothingToDo,
            targets: None,
        };
    }

    let mut frontier: Vec<NodeId> = vec![path.starting_node.clone()];
    for element in elements {
        let mut next = Vec::new();
        for node in &frontier {
            next.extend(address_space.follow_path_element(node, element));
        }
        next.dedup();
        frontier = next;
        if frontier.is_empty() {
            return BrowsePathResult {
                status_code: StatusCode::BadNoMatch,
                targets: None,
            };
        }
    }

    BrowsePathResult {
        status_code: StatusCode::Good,
        targets: Some(
            frontier
                .into_iter()
                .map(|node| BrowsePathTarget {
                    target_id: ExpandedNodeId::new(node),
                    // The whole path was consumed.
                    remaining_path_index: u32::MAX,
                })
                .collect(),
        ),
    }
}

pub(crate) async fn translate_browse_paths(
    request: Request<TranslateBrowsePathsToNodeIdsRequest>,
) -> Response {
    let browse_paths = match take_service_items(
        request.request.browse_paths.clone(),
        request.info.config.limits.max_operations_per_call,
    ) {
        Ok(items) => items,
        Err(status) => return service_fault!(request, status),
    };

    let address_space = request.address_space.read();
    let results = browse_paths
        .iter()
        .map(|path| translate_one(&address_space, path))
        .collect();

    Response {
        message: TranslateBrowsePathsToNodeIdsResponse {
            response_header: ResponseHeader::new_good(&request.request.request_header),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}

// Registered node ids map to themselves: the arena lookup is already as
// fast as a handle.
pub(crate) async fn register_nodes(request: Request<RegisterNodesRequest>) -> Response {
    let nodes_to_register = match take_service_items(
        request.request.nodes_to_register.clone(),
        request.info.config.limits.max_operations_per_call,
    ) {
        Ok(items) => items,
        Err(status) => return service_fault!(request, status),
    };
    Response {
        message: RegisterNodesResponse {
            response_header: ResponseHeader::new_good(&request.request.request_header),
            registered_node_ids: Some(nodes_to_register),
        }
        .into(),
        request_id: request.request_id,
    }
}

pub(crate) async fn unregister_nodes(request: Request<UnregisterNodesRequest>) -> Response {
    if let Err(status) = take_service_items(
        request.request.nodes_to_unregister.clone(),
        request.info.config.limits.max_operations_per_call,
    ) {
        return service_fault!(request, status);
    }
    Response {
        message: UnregisterNodesResponse {
            response_header: ResponseHeader::new_good(&request.request.request_header),
        }
        .into(),
        request_id: request.request_id,
    }
}
