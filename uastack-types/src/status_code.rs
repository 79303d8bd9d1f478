//! OPC UA status codes. Only the subset of the standard table that the
//! stack itself raises or inspects is named here; unknown codes survive
//! decoding untouched.

use std::fmt;
use std::io::{Read, Write};

use crate::encoding::{
    read_u32, write_u32, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};

/// A 32-bit status code. The top two bits hold the severity, the middle
/// sixteen the code itself, the low ten the info bits used by DataValues.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(u32);

macro_rules! status_codes {
    ($($name:ident = $value:literal),+ $(,)?) => {
        impl StatusCode {
            $(
                #[allow(missing_docs)]
                pub const $name: StatusCode = StatusCode($value);
            )+

            /// The symbolic name of this code, or `None` if the code is not
            /// one this stack knows by name. Info bits are ignored.
            pub fn known_name(&self) -> Option<&'static str> {
                match self.0 & 0xFFFF_0000 {
                    $( $value => Some(stringify!($name)), )+
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    Good = 0x0000_0000,
    Uncertain = 0x4000_0000,
    Bad = 0x8000_0000,
    GoodSubscriptionTransferred = 0x002D_0000,
    GoodCompletesAsynchronously = 0x002E_0000,
    GoodOverload = 0x002F_0000,
    GoodClipped = 0x0030_0000,
    UncertainInitialValue = 0x4092_0000,
    BadUnexpectedError = 0x8001_0000,
    BadInternalError = 0x8002_0000,
    BadOutOfMemory = 0x8003_0000,
    BadResourceUnavailable = 0x8004_0000,
    BadCommunicationError = 0x8005_0000,
    BadEncodingError = 0x8006_0000,
    BadDecodingError = 0x8007_0000,
    BadEncodingLimitsExceeded = 0x8008_0000,
    BadUnknownResponse = 0x8009_0000,
    BadTimeout = 0x800A_0000,
    BadServiceUnsupported = 0x800B_0000,
    BadShutdown = 0x800C_0000,
    BadServerNotConnected = 0x800D_0000,
    BadServerHalted = 0x800E_0000,
    BadNothingToDo = 0x800F_0000,
    BadTooManyOperations = 0x8010_0000,
    BadDataTypeIdUnknown = 0x8011_0000,
    BadCertificateInvalid = 0x8012_0000,
    BadSecurityChecksFailed = 0x8013_0000,
    BadUserAccessDenied = 0x801F_0000,
    BadIdentityTokenInvalid = 0x8020_0000,
    BadIdentityTokenRejected = 0x8021_0000,
    BadSecureChannelIdInvalid = 0x8022_0000,
    BadInvalidTimestamp = 0x8023_0000,
    BadNonceInvalid = 0x8024_0000,
    BadSessionIdInvalid = 0x8025_0000,
    BadSessionClosed = 0x8026_0000,
    BadSessionNotActivated = 0x8027_0000,
    BadSubscriptionIdInvalid = 0x8028_0000,
    BadRequestHeaderInvalid = 0x802A_0000,
    BadTimestampsToReturnInvalid = 0x802B_0000,
    BadRequestCancelledByClient = 0x802C_0000,
    BadNoCommunication = 0x8031_0000,
    BadWaitingForInitialData = 0x8032_0000,
    BadNodeIdInvalid = 0x8033_0000,
    BadNodeIdUnknown = 0x8034_0000,
    BadAttributeIdInvalid = 0x8035_0000,
    BadIndexRangeInvalid = 0x8036_0000,
    BadIndexRangeNoData = 0x8037_0000,
    BadDataEncodingInvalid = 0x8038_0000,
    BadDataEncodingUnsupported = 0x8039_0000,
    BadNotReadable = 0x803A_0000,
    BadNotWritable = 0x803B_0000,
    BadOutOfRange = 0x803C_0000,
    BadNotSupported = 0x803D_0000,
    BadNotFound = 0x803E_0000,
    BadObjectDeleted = 0x803F_0000,
    BadNotImplemented = 0x8040_0000,
    BadMonitoringModeInvalid = 0x8041_0000,
    BadMonitoredItemIdInvalid = 0x8042_0000,
    BadMonitoredItemFilterInvalid = 0x8043_0000,
    BadMonitoredItemFilterUnsupported = 0x8044_0000,
    BadFilterNotAllowed = 0x8045_0000,
    BadStructureMissing = 0x8046_0000,
    BadEventFilterInvalid = 0x8047_0000,
    BadContentFilterInvalid = 0x8048_0000,
    BadFilterOperandInvalid = 0x8049_0000,
    BadContinuationPointInvalid = 0x804A_0000,
    BadNoContinuationPoints = 0x804B_0000,
    BadReferenceTypeIdInvalid = 0x804C_0000,
    BadBrowseDirectionInvalid = 0x804D_0000,
    BadNodeNotInView = 0x804E_0000,
    BadServerUriInvalid = 0x804F_0000,
    BadSecurityModeRejected = 0x8054_0000,
    BadSecurityPolicyRejected = 0x8055_0000,
    BadTooManySessions = 0x8056_0000,
    BadUserSignatureInvalid = 0x8057_0000,
    BadApplicationSignatureInvalid = 0x8058_0000,
    BadRequestCancelledByRequest = 0x805B_0000,
    BadParentNodeIdInvalid = 0x805C_0000,
    BadNoMatch = 0x806F_0000,
    BadMaxAgeInvalid = 0x8070_0000,
    BadHistoryOperationInvalid = 0x8071_0000,
    BadHistoryOperationUnsupported = 0x8072_0000,
    BadWriteNotSupported = 0x8073_0000,
    BadTypeMismatch = 0x8074_0000,
    BadMethodInvalid = 0x8075_0000,
    BadArgumentsMissing = 0x8076_0000,
    BadTooManySubscriptions = 0x8077_0000,
    BadTooManyPublishRequests = 0x8078_0000,
    BadNoSubscription = 0x8079_0000,
    BadSequenceNumberUnknown = 0x807A_0000,
    BadMessageNotAvailable = 0x807B_0000,
    BadInsufficientClientProfile = 0x807C_0000,
    BadTcpServerTooBusy = 0x807D_0000,
    BadTcpMessageTypeInvalid = 0x807E_0000,
    BadTcpSecureChannelUnknown = 0x807F_0000,
    BadTcpMessageTooLarge = 0x8080_0000,
    BadTcpNotEnoughResources = 0x8081_0000,
    BadTcpInternalError = 0x8082_0000,
    BadTcpEndpointUrlInvalid = 0x8083_0000,
    BadRequestInterrupted = 0x8084_0000,
    BadRequestTimeout = 0x8085_0000,
    BadSecureChannelClosed = 0x8086_0000,
    BadSecureChannelTokenUnknown = 0x8087_0000,
    BadSequenceNumberInvalid = 0x8088_0000,
    BadConfigurationError = 0x8089_0000,
    BadNotConnected = 0x808A_0000,
    BadDeadbandFilterInvalid = 0x808E_0000,
    BadNoData = 0x809B_0000,
    BadInvalidArgument = 0x80AB_0000,
    BadConnectionRejected = 0x80AC_0000,
    BadDisconnect = 0x80AD_0000,
    BadConnectionClosed = 0x80AE_0000,
    BadInvalidState = 0x80AF_0000,
    BadRequestTooLarge = 0x80B8_0000,
    BadResponseTooLarge = 0x80B9_0000,
    BadProtocolVersionUnsupported = 0x80BE_0000,
    BadStateNotActive = 0x80BF_0000,
    BadFilterOperatorInvalid = 0x80C1_0000,
    BadTooManyMonitoredItems = 0x80DB_0000,
    BadTooManyArguments = 0x80E5_0000,
    BadSecurityModeInsufficient = 0x80E6_0000,
}

impl StatusCode {
    const SEVERITY_MASK: u32 = 0xC000_0000;
    const INFO_MASK: u32 = 0x0000_03FF;

    /// Info type bit indicating the info bits describe a DataValue.
    pub const INFO_TYPE_DATA_VALUE: u32 = 0x0000_0400;
    /// Overflow info bit, set on a queued value that survived an overflow.
    pub const OVERFLOW: u32 = 0x0000_0080;

    /// Build a status code from its raw value, preserving unknown bits.
    pub fn from_u32(value: u32) -> Self {
        StatusCode(value)
    }

    /// The raw 32-bit value.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// True if the severity is Good.
    pub fn is_good(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == 0
    }

    /// True if the severity is Bad.
    pub fn is_bad(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == 0x8000_0000
    }

    /// True if the severity is Uncertain.
    pub fn is_uncertain(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == 0x4000_0000
    }

    /// This code with the DataValue overflow info bit set.
    pub fn with_overflow(self) -> Self {
        StatusCode(self.0 | Self::INFO_TYPE_DATA_VALUE | Self::OVERFLOW)
    }

    /// True if the DataValue overflow info bit is set.
    pub fn has_overflow(&self) -> bool {
        self.0 & Self::INFO_TYPE_DATA_VALUE != 0 && self.0 & Self::OVERFLOW != 0
    }

    /// The symbolic name, or a hex rendering for unknown codes.
    pub fn name(&self) -> String {
        match self.known_name() {
            Some(name) => name.to_string(),
            None => format!("StatusCode({:#010X})", self.0),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_name() {
            Some(name) if self.0 & Self::INFO_MASK == 0 => write!(f, "{}", name),
            Some(name) => write!(f, "{} (+{:#06X})", name, self.0 & (Self::INFO_MASK | Self::INFO_TYPE_DATA_VALUE)),
            None => write!(f, "{:#010X}", self.0),
        }
    }
}

impl BinaryEncodable for StatusCode {
    fn byte_len(&self) -> usize {
        4
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.0)
    }
}

impl BinaryDecodable for StatusCode {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(StatusCode(read_u32(stream)?))
    }
}

#[cfg(test)]
mod tests {
    use super::StatusCode;

    #[test]
    fn severity() {
        assert!(StatusCode::Good.is_good());
        assert!(!StatusCode::Good.is_bad());
        assert!(StatusCode::BadTimeout.is_bad());
        assert!(StatusCode::UncertainInitialValue.is_uncertain());
        assert!(StatusCode::GoodSubscriptionTransferred.is_good());
    }

    #[test]
    fn overflow_bits() {
        let code = StatusCode::Good.with_overflow();
        assert!(code.is_good());
        assert!(code.has_overflow());
        assert!(!StatusCode::Good.has_overflow());
        assert_eq!(code.bits(), 0x0000_0480);
    }

    #[test]
    fn names() {
        assert_eq!(StatusCode::BadTimeout.name(), "BadTimeout");
        assert_eq!(StatusCode::from_u32(0x8001_0000).name(), "BadUnexpectedError");
        assert!(StatusCode::from_u32(0xDEAD_0000).known_name().is_none());
    }
}
