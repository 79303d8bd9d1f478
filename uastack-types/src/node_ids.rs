//! Well-known numeric node ids in namespace 0. Only the subsets the stack
//! itself dispatches on or exposes are listed.

use crate::node_id::NodeId;

macro_rules! well_known_ids {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $($variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        #[repr(u32)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                $variant = $value,
            )+
        }

        impl TryFrom<u32> for $name {
            type Error = ();
            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok($name::$variant), )+
                    _ => Err(()),
                }
            }
        }

        impl From<$name> for NodeId {
            fn from(value: $name) -> Self {
                NodeId::new(0, value as u32)
            }
        }

        impl From<$name> for crate::expanded_node_id::ExpandedNodeId {
            fn from(value: $name) -> Self {
                crate::expanded_node_id::ExpandedNodeId::new(NodeId::from(value))
            }
        }
    };
}

well_known_ids! {
    /// Objects, including the binary encoding ids of every service message
    /// and extension object payload the stack understands.
    pub enum ObjectId {
        RootFolder = 84,
        ObjectsFolder = 85,
        TypesFolder = 86,
        ViewsFolder = 87,
        Server = 2253,
        Server_ServerCapabilities = 2268,
        Server_ServerDiagnostics = 2274,
        ServiceFault_Encoding_DefaultBinary = 397,
        FindServersRequest_Encoding_DefaultBinary = 422,
        FindServersResponse_Encoding_DefaultBinary = 425,
        GetEndpointsRequest_Encoding_DefaultBinary = 428,
        GetEndpointsResponse_Encoding_DefaultBinary = 431,
        OpenSecureChannelRequest_Encoding_DefaultBinary = 446,
        OpenSecureChannelResponse_Encoding_DefaultBinary = 449,
        CloseSecureChannelRequest_Encoding_DefaultBinary = 452,
        CloseSecureChannelResponse_Encoding_DefaultBinary = 455,
        CreateSessionRequest_Encoding_DefaultBinary = 461,
        CreateSessionResponse_Encoding_DefaultBinary = 464,
        ActivateSessionRequest_Encoding_DefaultBinary = 467,
        ActivateSessionResponse_Encoding_DefaultBinary = 470,
        CloseSessionRequest_Encoding_DefaultBinary = 473,
        CloseSessionResponse_Encoding_DefaultBinary = 476,
        CancelRequest_Encoding_DefaultBinary = 479,
        CancelResponse_Encoding_DefaultBinary = 482,
        BrowseRequest_Encoding_DefaultBinary = 527,
        BrowseResponse_Encoding_DefaultBinary = 530,
        BrowseNextRequest_Encoding_DefaultBinary = 533,
        BrowseNextResponse_Encoding_DefaultBinary = 536,
        TranslateBrowsePathsToNodeIdsRequest_Encoding_DefaultBinary = 554,
        TranslateBrowsePathsToNodeIdsResponse_Encoding_DefaultBinary = 557,
        RegisterNodesRequest_Encoding_DefaultBinary = 560,
        RegisterNodesResponse_Encoding_DefaultBinary = 563,
        UnregisterNodesRequest_Encoding_DefaultBinary = 566,
        UnregisterNodesResponse_Encoding_DefaultBinary = 569,
        ReadRequest_Encoding_DefaultBinary = 631,
        ReadResponse_Encoding_DefaultBinary = 634,
        HistoryReadRequest_Encoding_DefaultBinary = 664,
        HistoryReadResponse_Encoding_DefaultBinary = 667,
        WriteRequest_Encoding_DefaultBinary = 673,
        WriteResponse_Encoding_DefaultBinary = 676,
        HistoryUpdateRequest_Encoding_DefaultBinary = 700,
        HistoryUpdateResponse_Encoding_DefaultBinary = 703,
        CallRequest_Encoding_DefaultBinary = 712,
        CallResponse_Encoding_DefaultBinary = 715,
        CreateMonitoredItemsRequest_Encoding_DefaultBinary = 751,
        CreateMonitoredItemsResponse_Encoding_DefaultBinary = 754,
        ModifyMonitoredItemsRequest_Encoding_DefaultBinary = 763,
        ModifyMonitoredItemsResponse_Encoding_DefaultBinary = 766,
        SetMonitoringModeRequest_Encoding_DefaultBinary = 769,
        SetMonitoringModeResponse_Encoding_DefaultBinary = 772,
        SetTriggeringRequest_Encoding_DefaultBinary = 775,
        SetTriggeringResponse_Encoding_DefaultBinary = 778,
        DeleteMonitoredItemsRequest_Encoding_DefaultBinary = 781,
        DeleteMonitoredItemsResponse_Encoding_DefaultBinary = 784,
        CreateSubscriptionRequest_Encoding_DefaultBinary = 787,
        CreateSubscriptionResponse_Encoding_DefaultBinary = 790,
        ModifySubscriptionRequest_Encoding_DefaultBinary = 793,
        ModifySubscriptionResponse_Encoding_DefaultBinary = 796,
        SetPublishingModeRequest_Encoding_DefaultBinary = 799,
        SetPublishingModeResponse_Encoding_DefaultBinary = 802,
        PublishRequest_Encoding_DefaultBinary = 826,
        PublishResponse_Encoding_DefaultBinary = 829,
        RepublishRequest_Encoding_DefaultBinary = 832,
        RepublishResponse_Encoding_DefaultBinary = 835,
        TransferSubscriptionsRequest_Encoding_DefaultBinary = 841,
        TransferSubscriptionsResponse_Encoding_DefaultBinary = 844,
        DeleteSubscriptionsRequest_Encoding_DefaultBinary = 847,
        DeleteSubscriptionsResponse_Encoding_DefaultBinary = 850,
        Argument_Encoding_DefaultBinary = 298,
        ApplicationDescription_Encoding_DefaultBinary = 310,
        AnonymousIdentityToken_Encoding_DefaultBinary = 321,
        UserNameIdentityToken_Encoding_DefaultBinary = 324,
        BuildInfo_Encoding_DefaultBinary = 340,
        SignatureData_Encoding_DefaultBinary = 458,
        ChannelSecurityToken_Encoding_DefaultBinary = 443,
        ContentFilterElement_Encoding_DefaultBinary = 585,
        ContentFilter_Encoding_DefaultBinary = 588,
        ElementOperand_Encoding_DefaultBinary = 594,
        LiteralOperand_Encoding_DefaultBinary = 597,
        AttributeOperand_Encoding_DefaultBinary = 600,
        SimpleAttributeOperand_Encoding_DefaultBinary = 603,
        DataChangeFilter_Encoding_DefaultBinary = 724,
        EventFilter_Encoding_DefaultBinary = 727,
        MonitoredItemNotification_Encoding_DefaultBinary = 808,
        DataChangeNotification_Encoding_DefaultBinary = 811,
        StatusChangeNotification_Encoding_DefaultBinary = 820,
        ServerStatusDataType_Encoding_DefaultBinary = 864,
        Range_Encoding_DefaultBinary = 886,
        EventNotificationList_Encoding_DefaultBinary = 916,
        EventFieldList_Encoding_DefaultBinary = 919,
    }
}

well_known_ids! {
    /// Variables the engine exposes under the Server object.
    pub enum VariableId {
        Server_ServerArray = 2254,
        Server_NamespaceArray = 2255,
        Server_ServerStatus = 2256,
        Server_ServerStatus_StartTime = 2257,
        Server_ServerStatus_CurrentTime = 2258,
        Server_ServerStatus_State = 2259,
        Server_ServerStatus_BuildInfo = 2260,
        Server_ServerStatus_SecondsTillShutdown = 2992,
        Server_ServerStatus_ShutdownReason = 2993,
        Server_ServiceLevel = 2267,
        Server_ServerDiagnostics_EnabledFlag = 2294,
        Server_GetMonitoredItems_InputArguments = 11493,
        Server_GetMonitoredItems_OutputArguments = 11494,
        Server_SetSubscriptionDurable_InputArguments = 12747,
        Server_SetSubscriptionDurable_OutputArguments = 12748,
        Server_ResendData_InputArguments = 12872,
        Server_RequestServerStateChange_InputArguments = 12884,
    }
}

well_known_ids! {
    /// Methods the engine binds on the Server object.
    pub enum MethodId {
        Server_GetMonitoredItems = 11492,
        Server_SetSubscriptionDurable = 12746,
        Server_ResendData = 12871,
        Server_RequestServerStateChange = 12883,
    }
}

well_known_ids! {
    /// The reference type hierarchy the engine's browse paths traverse.
    pub enum ReferenceTypeId {
        References = 31,
        NonHierarchicalReferences = 32,
        HierarchicalReferences = 33,
        HasChild = 34,
        Organizes = 35,
        HasEventSource = 36,
        HasModellingRule = 37,
        HasEncoding = 38,
        HasDescription = 39,
        HasTypeDefinition = 40,
        GeneratesEvent = 41,
        Aggregates = 44,
        HasSubtype = 45,
        HasProperty = 46,
        HasComponent = 47,
        HasNotifier = 48,
        HasOrderedComponent = 49,
    }
}

well_known_ids! {
    /// Data types, also the scalar type tags used by Variant.
    pub enum DataTypeId {
        Boolean = 1,
        SByte = 2,
        Byte = 3,
        Int16 = 4,
        UInt16 = 5,
        Int32 = 6,
        UInt32 = 7,
        Int64 = 8,
        UInt64 = 9,
        Float = 10,
        Double = 11,
        String = 12,
        DateTime = 13,
        Guid = 14,
        ByteString = 15,
        XmlElement = 16,
        NodeId = 17,
        ExpandedNodeId = 18,
        StatusCode = 19,
        QualifiedName = 20,
        LocalizedText = 21,
        Structure = 22,
        DataValue = 23,
        BaseDataType = 24,
        DiagnosticInfo = 25,
        Number = 26,
        Integer = 27,
        UInteger = 28,
        Enumeration = 29,
        Duration = 290,
        UtcTime = 294,
        Argument = 296,
        Range = 884,
        ServerState = 852,
        ServerStatusDataType = 862,
        BuildInfo = 338,
    }
}

well_known_ids! {
    /// Object types the core namespace instantiates.
    pub enum ObjectTypeId {
        BaseObjectType = 58,
        FolderType = 61,
        ServerType = 2004,
        ServerCapabilitiesType = 2013,
        ServerDiagnosticsType = 2020,
        BaseEventType = 2041,
    }
}

well_known_ids! {
    /// Variable types the core namespace instantiates.
    pub enum VariableTypeId {
        BaseVariableType = 62,
        BaseDataVariableType = 63,
        PropertyType = 68,
        ServerStatusType = 2138,
    }
}

#[cfg(test)]
mod tests {
    use super::{ObjectId, ReferenceTypeId};
    use crate::node_id::NodeId;

    #[test]
    fn conversions() {
        let id: NodeId = ObjectId::Server.into();
        assert_eq!(id, NodeId::new(0, 2253u32));
        assert_eq!(id.as_object_id().unwrap(), ObjectId::Server);
        assert_eq!(ReferenceTypeId::try_from(35u32).unwrap(), ReferenceTypeId::Organizes);
        assert!(ObjectId::try_from(1u32).is_err());
    }
}
