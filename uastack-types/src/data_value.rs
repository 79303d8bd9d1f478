//! Implementation of `DataValue`, a Variant plus status and timestamps.

use std::io::{Read, Write};

use crate::{
    date_time::DateTime,
    encoding::{
        read_u8, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
    },
    status_code::StatusCode,
    variant::Variant,
};

const HAS_VALUE: u8 = 0x1;
const HAS_STATUS: u8 = 0x2;
const HAS_SOURCE_TIMESTAMP: u8 = 0x4;
const HAS_SERVER_TIMESTAMP: u8 = 0x8;
const HAS_SOURCE_PICOSECONDS: u8 = 0x10;
const HAS_SERVER_PICOSECONDS: u8 = 0x20;

/// A value with quality and provenance. A value with a non-good status may
/// carry no Variant at all.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value itself, absent when the source produced none.
    pub value: Option<Variant>,
    /// Quality of the value. Absent means Good.
    pub status: Option<StatusCode>,
    /// When the source produced the value.
    pub source_timestamp: Option<DateTime>,
    /// Sub-tick picosecond resolution for the source timestamp.
    pub source_picoseconds: Option<i16>,
    /// When the server observed the value.
    pub server_timestamp: Option<DateTime>,
    /// Sub-tick picosecond resolution for the server timestamp.
    pub server_picoseconds: Option<i16>,
}

impl BinaryEncodable for DataValue {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if let Some(ref value) = self.value {
            size += value.byte_len();
        }
        if self.status.is_some() {
            size += 4;
        }
        if self.source_timestamp.is_some() {
            size += 8;
            if self.source_picoseconds.is_some() {
                size += 2;
            }
        }
        if self.server_timestamp.is_some() {
            size += 8;
            if self.server_picoseconds.is_some() {
                size += 2;
            }
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, self.encoding_mask())?;
        if let Some(ref value) = self.value {
            value.encode(stream)?;
        }
        if let Some(ref status) = self.status {
            status.encode(stream)?;
        }
        // Picoseconds are only written when the corresponding timestamp is.
        if let Some(ref source_timestamp) = self.source_timestamp {
            source_timestamp.encode(stream)?;
            if let Some(ref source_picoseconds) = self.source_picoseconds {
                source_picoseconds.encode(stream)?;
            }
        }
        if let Some(ref server_timestamp) = self.server_timestamp {
            server_timestamp.encode(stream)?;
            if let Some(ref server_picoseconds) = self.server_picoseconds {
                server_picoseconds.encode(stream)?;
            }
        }
        Ok(())
    }
}

impl BinaryDecodable for DataValue {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let mask = read_u8(stream)?;
        let value = if mask & HAS_VALUE != 0 {
            Some(Variant::decode(stream, options)?)
        } else {
            None
        };
        let status = if mask & HAS_STATUS != 0 {
            Some(StatusCode::decode(stream, options)?)
        } else {
            None
        };
        let source_timestamp = if mask & HAS_SOURCE_TIMESTAMP != 0 {
            Some(DateTime::decode(stream, options)?)
        } else {
            None
        };
        let source_picoseconds = if mask & HAS_SOURCE_PICOSECONDS != 0 {
            Some(i16::decode(stream, options)?)
        } else {
            None
        };
        let server_timestamp = if mask & HAS_SERVER_TIMESTAMP != 0 {
            Some(DateTime::decode(stream, options)?)
        } else {
            None
        };
        let server_picoseconds = if mask & HAS_SERVER_PICOSECONDS != 0 {
            Some(i16::decode(stream, options)?)
        } else {
            None
        };
        Ok(DataValue {
            value,
            status,
            source_timestamp,
            source_picoseconds,
            server_timestamp,
            server_picoseconds,
        })
    }
}

impl From<Variant> for DataValue {
    fn from(value: Variant) -> Self {
        DataValue {
            value: Some(value),
            ..Default::default()
        }
    }
}

impl DataValue {
    /// A good value observed now, with both timestamps set.
    pub fn new_now(value: impl Into<Variant>) -> DataValue {
        let now = DateTime::now();
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
            ..Default::default()
        }
    }

    /// A value-less DataValue carrying only a status code.
    pub fn new_status(status: StatusCode) -> DataValue {
        DataValue {
            status: Some(status),
            ..Default::default()
        }
    }

    /// The effective status, Good when absent.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// True if the effective status has Good severity.
    pub fn is_good(&self) -> bool {
        self.status().is_good()
    }

    /// Strip timestamps not requested by the client.
    pub fn keep_timestamps(&mut self, source: bool, server: bool) {
        if !source {
            self.source_timestamp = None;
            self.source_picoseconds = None;
        }
        if !server {
            self.server_timestamp = None;
            self.server_picoseconds = None;
        }
    }

    fn encoding_mask(&self) -> u8 {
        let mut mask = 0u8;
        if self.value.is_some() {
            mask |= HAS_VALUE;
        }
        if self.status.is_some() {
            mask |= HAS_STATUS;
        }
        if self.source_timestamp.is_some() {
            mask |= HAS_SOURCE_TIMESTAMP;
            if self.source_picoseconds.is_some() {
                mask |= HAS_SOURCE_PICOSECONDS;
            }
        }
        if self.server_timestamp.is_some() {
            mask |= HAS_SERVER_TIMESTAMP;
            if self.server_picoseconds.is_some() {
                mask |= HAS_SERVER_PICOSECONDS;
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::DataValue;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};
    use crate::status_code::StatusCode;
    use crate::variant::Variant;

    #[test]
    fn round_trip() {
        let values = [
            DataValue::default(),
            DataValue::new_now(Variant::Double(1.5)),
            DataValue::new_status(StatusCode::BadNodeIdUnknown),
            DataValue {
                value: Some(Variant::Int32(5)),
                source_timestamp: Some(crate::date_time::DateTime::now()),
                source_picoseconds: Some(120),
                ..Default::default()
            },
        ];
        for v in &values {
            let bytes = v.encode_to_vec();
            assert_eq!(bytes.len(), v.byte_len());
            let mut s = std::io::Cursor::new(bytes);
            assert_eq!(
                &DataValue::decode(&mut s, &DecodingOptions::default()).unwrap(),
                v
            );
        }
    }

    #[test]
    fn bad_status_with_no_value() {
        let v = DataValue::new_status(StatusCode::BadNotReadable);
        assert!(v.value.is_none());
        assert!(!v.is_good());
    }
}
