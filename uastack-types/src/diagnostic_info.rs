//! Implementation of `DiagnosticInfo`.

use std::io::{Read, Write};

use crate::{
    encoding::{
        read_i32, read_u8, write_i32, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions,
        EncodingResult,
    },
    status_code::StatusCode,
    string::UAString,
};

const HAS_SYMBOLIC_ID: u8 = 0x01;
const HAS_NAMESPACE: u8 = 0x02;
const HAS_LOCALIZED_TEXT: u8 = 0x04;
const HAS_LOCALE: u8 = 0x08;
const HAS_ADDITIONAL_INFO: u8 = 0x10;
const HAS_INNER_STATUS_CODE: u8 = 0x20;
const HAS_INNER_DIAGNOSTIC_INFO: u8 = 0x40;

/// Vendor-specific diagnostics for an operation result. The string fields
/// index into the response header's string table.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct DiagnosticInfo {
    /// Index of the symbolic error id in the string table.
    pub symbolic_id: Option<i32>,
    /// Index of the namespace URI the symbolic id belongs to.
    pub namespace_uri: Option<i32>,
    /// Index of the locale of the localized text.
    pub locale: Option<i32>,
    /// Index of the human readable error text.
    pub localized_text: Option<i32>,
    /// Free-form additional information.
    pub additional_info: UAString,
    /// Status code of the nested operation that failed.
    pub inner_status_code: Option<StatusCode>,
    /// Diagnostics of the nested operation.
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl BinaryEncodable for DiagnosticInfo {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        size += self.symbolic_id.map_or(0, |_| 4);
        size += self.namespace_uri.map_or(0, |_| 4);
        size += self.locale.map_or(0, |_| 4);
        size += self.localized_text.map_or(0, |_| 4);
        if !self.additional_info.is_null() {
            size += self.additional_info.byte_len();
        }
        size += self.inner_status_code.map_or(0, |_| 4);
        if let Some(ref inner) = self.inner_diagnostic_info {
            size += inner.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, self.encoding_mask())?;
        if let Some(v) = self.symbolic_id {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.namespace_uri {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.locale {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.localized_text {
            write_i32(stream, v)?;
        }
        if !self.additional_info.is_null() {
            self.additional_info.encode(stream)?;
        }
        if let Some(v) = self.inner_status_code {
            v.encode(stream)?;
        }
        if let Some(ref inner) = self.inner_diagnostic_info {
            inner.encode(stream)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for DiagnosticInfo {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let mask = read_u8(stream)?;
        let mut info = DiagnosticInfo::default();
        if mask & HAS_SYMBOLIC_ID != 0 {
            info.symbolic_id = Some(read_i32(stream)?);
        }
        if mask & HAS_NAMESPACE != 0 {
            info.namespace_uri = Some(read_i32(stream)?);
        }
        if mask & HAS_LOCALE != 0 {
            info.locale = Some(read_i32(stream)?);
        }
        if mask & HAS_LOCALIZED_TEXT != 0 {
            info.localized_text = Some(read_i32(stream)?);
        }
        if mask & HAS_ADDITIONAL_INFO != 0 {
            info.additional_info = UAString::decode(stream, options)?;
        }
        if mask & HAS_INNER_STATUS_CODE != 0 {
            info.inner_status_code = Some(StatusCode::decode(stream, options)?);
        }
        if mask & HAS_INNER_DIAGNOSTIC_INFO != 0 {
            let _lock = options.depth_lock()?;
            info.inner_diagnostic_info = Some(Box::new(DiagnosticInfo::decode(stream, options)?));
        }
        Ok(info)
    }
}

impl DiagnosticInfo {
    /// A null diagnostic info, encoding to a single zero byte.
    pub fn null() -> DiagnosticInfo {
        DiagnosticInfo::default()
    }

    fn encoding_mask(&self) -> u8 {
        let mut mask = 0u8;
        if self.symbolic_id.is_some() {
            mask |= HAS_SYMBOLIC_ID;
        }
        if self.namespace_uri.is_some() {
            mask |= HAS_NAMESPACE;
        }
        if self.locale.is_some() {
            mask |= HAS_LOCALE;
        }
        if self.localized_text.is_some() {
            mask |= HAS_LOCALIZED_TEXT;
        }
        if !self.additional_info.is_null() {
            mask |= HAS_ADDITIONAL_INFO;
        }
        if self.inner_status_code.is_some() {
            mask |= HAS_INNER_STATUS_CODE;
        }
        if self.inner_diagnostic_info.is_some() {
            mask |= HAS_INNER_DIAGNOSTIC_INFO;
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::DiagnosticInfo;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};
    use crate::status_code::StatusCode;

    #[test]
    fn nested_round_trip() {
        let info = DiagnosticInfo {
            symbolic_id: Some(3),
            additional_info: "inner failure".into(),
            inner_status_code: Some(StatusCode::BadInternalError),
            inner_diagnostic_info: Some(Box::new(DiagnosticInfo {
                localized_text: Some(1),
                ..Default::default()
            })),
            ..Default::default()
        };
        let bytes = info.encode_to_vec();
        assert_eq!(bytes.len(), info.byte_len());
        let mut s = std::io::Cursor::new(bytes);
        assert_eq!(
            DiagnosticInfo::decode(&mut s, &DecodingOptions::default()).unwrap(),
            info
        );
    }
}
