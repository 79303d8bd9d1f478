//! Browse, BrowseNext, TranslateBrowsePathsToNodeIds, RegisterNodes and
//! UnregisterNodes service types.

use crate::{
    byte_string::ByteString, date_time::DateTime, diagnostic_info::DiagnosticInfo,
    expanded_node_id::ExpandedNodeId, localized_text::LocalizedText, node_id::NodeId,
    qualified_name::QualifiedName, request_header::RequestHeader,
    response_header::ResponseHeader, status_code::StatusCode, ua_encodable, ua_enum, ua_message,
};

use super::support::NodeClass;

ua_enum! {
    /// The direction to follow references in.
    pub enum BrowseDirection: i32 {
        #[default]
        Forward = 0,
        Inverse = 1,
        Both = 2,
        Invalid = 3,
    }
}

bitflags::bitflags! {
    /// Which `ReferenceDescription` fields a Browse should fill in.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct BrowseResultMask: u32 {
        #[allow(missing_docs)]
        const REFERENCE_TYPE = 1;
        #[allow(missing_docs)]
        const IS_FORWARD = 2;
        #[allow(missing_docs)]
        const NODE_CLASS = 4;
        #[allow(missing_docs)]
        const BROWSE_NAME = 8;
        #[allow(missing_docs)]
        const DISPLAY_NAME = 16;
        #[allow(missing_docs)]
        const TYPE_DEFINITION = 32;
    }
}

ua_encodable! {
    /// The view to browse in. The null view is the whole address space.
    pub struct ViewDescription {
        /// Node id of the view node, null for no view.
        pub view_id: NodeId,
        /// Server timestamp of the view version wanted.
        pub timestamp: DateTime,
        /// Specific view version, 0 for the current one.
        pub view_version: u32,
    }
}

ua_encodable! {
    /// One node to browse and the filters to apply.
    pub struct BrowseDescription {
        /// The node whose references to return.
        pub node_id: NodeId,
        /// The direction to follow.
        pub browse_direction: BrowseDirection,
        /// Only references of this type, null for all.
        pub reference_type_id: NodeId,
        /// Whether subtypes of the reference type match too.
        pub include_subtypes: bool,
        /// Bit mask of `NodeClass` values to include, 0 for all.
        pub node_class_mask: u32,
        /// Bit mask of `BrowseResultMask` fields to fill in.
        pub result_mask: u32,
    }
}

ua_encodable! {
    /// A reference returned by Browse.
    pub struct ReferenceDescription {
        /// Type of the reference.
        pub reference_type_id: NodeId,
        /// True if the reference is followed in its natural direction.
        pub is_forward: bool,
        /// The node on the far end.
        pub node_id: ExpandedNodeId,
        /// Browse name of the target.
        pub browse_name: QualifiedName,
        /// Display name of the target.
        pub display_name: LocalizedText,
        /// Class of the target.
        pub node_class: NodeClass,
        /// Type definition of the target, for objects and variables.
        pub type_definition: ExpandedNodeId,
    }
}

ua_encodable! {
    /// Result for one browse description.
    pub struct BrowseResult {
        /// Operation status.
        pub status_code: StatusCode,
        /// Opaque token to pass to BrowseNext, null when done.
        pub continuation_point: ByteString,
        /// The matching references.
        pub references: Option<Vec<ReferenceDescription>>,
    }
}

ua_encodable! {
    /// Request to browse references of a set of nodes.
    pub struct BrowseRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// View to browse in.
        pub view: ViewDescription,
        /// Per-node cap on returned references, 0 for no cap.
        pub requested_max_references_per_node: u32,
        /// The nodes to browse.
        pub nodes_to_browse: Option<Vec<BrowseDescription>>,
    }
}
ua_message!(BrowseRequest, BrowseRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to Browse.
    pub struct BrowseResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Results in request order.
        pub results: Option<Vec<BrowseResult>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(BrowseResponse, BrowseResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to continue or release earlier Browse operations.
    pub struct BrowseNextRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// If true, release the continuation points without browsing.
        pub release_continuation_points: bool,
        /// Continuation points from earlier results.
        pub continuation_points: Option<Vec<ByteString>>,
    }
}
ua_message!(BrowseNextRequest, BrowseNextRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to BrowseNext.
    pub struct BrowseNextResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Results in request order.
        pub results: Option<Vec<BrowseResult>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(BrowseNextResponse, BrowseNextResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// One step along a browse path.
    pub struct RelativePathElement {
        /// The reference type to follow, null for any hierarchical.
        pub reference_type_id: NodeId,
        /// Follow the reference against its natural direction.
        pub is_inverse: bool,
        /// Whether subtypes of the reference type match too.
        pub include_subtypes: bool,
        /// Browse name of the target, may be null for the final element.
        pub target_name: QualifiedName,
    }
}

ua_encodable! {
    /// A sequence of browse path steps.
    pub struct RelativePath {
        /// The steps, applied in order.
        pub elements: Option<Vec<RelativePathElement>>,
    }
}

ua_encodable! {
    /// A starting node and a relative path from it.
    pub struct BrowsePath {
        /// Where the path starts.
        pub starting_node: NodeId,
        /// The path to follow.
        pub relative_path: RelativePath,
    }
}

ua_encodable! {
    /// One node a browse path resolved to.
    pub struct BrowsePathTarget {
        /// The target node.
        pub target_id: ExpandedNodeId,
        /// Index of the first unprocessed path element, `u32::MAX` when
        /// the whole path was consumed.
        pub remaining_path_index: u32,
    }
}

ua_encodable! {
    /// Result for one browse path.
    pub struct BrowsePathResult {
        /// Operation status.
        pub status_code: StatusCode,
        /// All nodes the path resolved to.
        pub targets: Option<Vec<BrowsePathTarget>>,
    }
}

ua_encodable! {
    /// Request to resolve browse paths to node ids.
    pub struct TranslateBrowsePathsToNodeIdsRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The paths to resolve.
        pub browse_paths: Option<Vec<BrowsePath>>,
    }
}
ua_message!(
    TranslateBrowsePathsToNodeIdsRequest,
    TranslateBrowsePathsToNodeIdsRequest_Encoding_DefaultBinary
);

ua_encodable! {
    /// Response to TranslateBrowsePathsToNodeIds.
    pub struct TranslateBrowsePathsToNodeIdsResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// Results in request order.
        pub results: Option<Vec<BrowsePathResult>>,
        /// Per-operation diagnostics.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message!(
    TranslateBrowsePathsToNodeIdsResponse,
    TranslateBrowsePathsToNodeIdsResponse_Encoding_DefaultBinary
);

ua_encodable! {
    /// Request to register nodes for optimized repeated access.
    pub struct RegisterNodesRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The nodes to register.
        pub nodes_to_register: Option<Vec<NodeId>>,
    }
}
ua_message!(RegisterNodesRequest, RegisterNodesRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response carrying the server-optimized node ids.
    pub struct RegisterNodesResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
        /// The ids to use for later access, in request order.
        pub registered_node_ids: Option<Vec<NodeId>>,
    }
}
ua_message!(RegisterNodesResponse, RegisterNodesResponse_Encoding_DefaultBinary);

ua_encodable! {
    /// Request to unregister previously registered nodes.
    pub struct UnregisterNodesRequest {
        /// Common request parameters.
        pub request_header: RequestHeader,
        /// The nodes to unregister.
        pub nodes_to_unregister: Option<Vec<NodeId>>,
    }
}
ua_message!(UnregisterNodesRequest, UnregisterNodesRequest_Encoding_DefaultBinary);

ua_encodable! {
    /// Response to UnregisterNodes.
    pub struct UnregisterNodesResponse {
        /// Common response parameters.
        pub response_header: ResponseHeader,
    }
}
ua_message!(UnregisterNodesResponse, UnregisterNodesResponse_Encoding_DefaultBinary);
