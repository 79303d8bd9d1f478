//! The `BinaryEncodable`/`BinaryDecodable` traits and helpers for reading and
//! writing scalar values and other primitives to OPC UA binary streams.

use std::{
    error::Error as StdError,
    fmt::{Debug, Display},
    io::{Cursor, Read, Result, Write},
    sync::atomic::{AtomicU64, Ordering},
};

use byteorder::{ByteOrder, LittleEndian};
use log::error;

use crate::{constants, status_code::StatusCode};

/// Result of an encoding or decoding operation.
pub type EncodingResult<T> = std::result::Result<T, Error>;

/// General stack error. Wraps a status code plus the dynamic error that
/// caused it, and optionally the request id/handle the error occurred in.
#[derive(Debug)]
pub struct Error {
    status: StatusCode,
    request_id: Option<u32>,
    request_handle: Option<u32>,
    context: Box<dyn StdError + Send + Sync>,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.context)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.context)
    }
}

impl Error {
    /// Create a new error with the given `status` code and `context` as a
    /// dynamic error source.
    pub fn new(status: StatusCode, context: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            status,
            request_id: None,
            request_handle: None,
            context: context.into(),
        }
    }

    /// Create a new error with status code `BadDecodingError`.
    pub fn decoding(context: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(StatusCode::BadDecodingError, context)
    }

    /// Create a new error with status code `BadEncodingError`.
    pub fn encoding(context: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(StatusCode::BadEncodingError, context)
    }

    /// Add request ID and request handle to this error.
    pub fn with_context(mut self, request_id: Option<u32>, request_handle: Option<u32>) -> Self {
        self.request_id = request_id;
        self.request_handle = request_handle;
        self
    }

    /// Add request ID to this error.
    pub fn with_request_id(mut self, id: u32) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Add request handle to this error.
    pub fn with_request_handle(mut self, handle: u32) -> Self {
        self.request_handle = Some(handle);
        self
    }

    /// Get the inner status code of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the request id and handle, if both are present.
    pub fn full_context(&self) -> Option<(u32, u32)> {
        match (self.request_id, self.request_handle) {
            (Some(id), Some(handle)) => Some((id, handle)),
            _ => None,
        }
    }
}

impl From<Error> for StatusCode {
    fn from(value: Error) -> Self {
        error!("{}", value);
        value.status()
    }
}

impl From<StatusCode> for Error {
    fn from(value: StatusCode) -> Self {
        Error::new(value, value.name())
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        std::io::Error::other(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::decoding(value)
    }
}

/// Holds a reference on the depth gauge. The drop impl ensures the depth is
/// decremented even on a panic unwind.
#[derive(Debug)]
pub struct DepthLock<'a> {
    gauge: &'a DepthGauge,
}

impl Drop for DepthLock<'_> {
    fn drop(&mut self) {
        self.gauge.current_depth.fetch_sub(1, Ordering::Release);
    }
}

impl<'a> DepthLock<'a> {
    /// Try to increment the depth, failing if the maximum is exceeded.
    /// The returned lock decrements the depth again when dropped.
    pub fn obtain(gauge: &'a DepthGauge) -> EncodingResult<DepthLock<'a>> {
        let current = gauge.current_depth.fetch_add(1, Ordering::Acquire);
        let lock = Self { gauge };
        if current >= gauge.max_depth {
            Err(Error::decoding(
                "Decoding aborted, maximum recursion depth reached",
            ))
        } else {
            Ok(lock)
        }
    }
}

/// Guards recursive structures (Variant, ExtensionObject, DiagnosticInfo)
/// against unbounded nesting during decoding.
#[derive(Debug)]
pub struct DepthGauge {
    max_depth: u64,
    current_depth: AtomicU64,
}

impl Clone for DepthGauge {
    fn clone(&self) -> Self {
        Self::new(self.max_depth)
    }
}

impl Default for DepthGauge {
    fn default() -> Self {
        Self::new(constants::MAX_DECODING_DEPTH)
    }
}

impl DepthGauge {
    /// Create a new depth gauge with the given maximum depth.
    pub fn new(max_depth: u64) -> Self {
        Self {
            max_depth,
            current_depth: AtomicU64::new(0),
        }
    }

    /// Get the max depth of the gauge.
    pub fn max_depth(&self) -> u64 {
        self.max_depth
    }
}

/// Restrictions on decoded data, negotiated per channel. All `max_*` values
/// use 0 to mean "no limit" except string/byte-string/array lengths, where
/// 0 really means 0.
#[derive(Clone, Debug)]
pub struct DecodingOptions {
    /// Maximum size of a message in bytes.
    pub max_message_size: usize,
    /// Maximum number of chunks in a message.
    pub max_chunk_count: usize,
    /// Maximum length in bytes (not chars) of a string.
    pub max_string_length: usize,
    /// Maximum length in bytes of a byte string.
    pub max_byte_string_length: usize,
    /// Maximum number of array elements.
    pub max_array_length: usize,
    /// Recursion guard for nested structures.
    pub decoding_depth_gauge: DepthGauge,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        DecodingOptions {
            max_message_size: constants::MAX_MESSAGE_SIZE,
            max_chunk_count: constants::MAX_CHUNK_COUNT,
            max_string_length: constants::MAX_STRING_LENGTH,
            max_byte_string_length: constants::MAX_BYTE_STRING_LENGTH,
            max_array_length: constants::MAX_ARRAY_LENGTH,
            decoding_depth_gauge: DepthGauge::default(),
        }
    }
}

impl DecodingOptions {
    /// Useful for decoding extension objects where the payload is not
    /// expected to contain a large value.
    pub fn minimal() -> Self {
        DecodingOptions {
            max_string_length: 8192,
            max_byte_string_length: 8192,
            max_array_length: 8192,
            ..Default::default()
        }
    }

    /// Get a lease on the decoding depth. Fails if max depth is exceeded.
    pub fn depth_lock(&self) -> EncodingResult<DepthLock<'_>> {
        DepthLock::obtain(&self.decoding_depth_gauge)
    }
}

/// OPC UA binary encoding interface. `byte_len` must return exactly the
/// number of bytes `encode` will write, so buffers can be sized up front.
pub trait BinaryEncodable {
    /// The exact byte length of this value as `encode` would write it.
    fn byte_len(&self) -> usize;

    /// Encode the value to the write stream.
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()>;

    /// Encode straight into a freshly allocated buffer. Reusing buffers is
    /// preferable, so this is reserved for tests and trivial code.
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::with_capacity(self.byte_len()));
        let _ = self.encode(&mut buffer);
        buffer.into_inner()
    }
}

/// OPC UA binary decoding interface. The decoding options contain the
/// restrictions negotiated on the channel; implementations must return
/// `BadDecodingError` as soon as a limit is exceeded.
pub trait BinaryDecodable: Sized {
    /// Decode an instance from the read stream.
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self>;
}

/// Converts an IO write error into an EncodingResult.
pub fn process_encode_io_result(result: Result<()>) -> EncodingResult<()> {
    result.map_err(Error::encoding)
}

/// Converts an IO read error into an EncodingResult.
pub fn process_decode_io_result<T>(result: Result<T>) -> EncodingResult<T>
where
    T: Debug,
{
    result.map_err(Error::decoding)
}

macro_rules! primitive_codec {
    ($t:ty, $size:expr, $write:ident, $read:ident, $wfn:ident, $rfn:ident) => {
        impl BinaryEncodable for $t {
            fn byte_len(&self) -> usize {
                $size
            }
            fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
                $wfn(stream, *self)
            }
        }
        impl BinaryDecodable for $t {
            fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<$t> {
                $rfn(stream)
            }
        }

        /// Write the value to the stream in little-endian order.
        pub fn $wfn<S: Write + ?Sized>(stream: &mut S, value: $t) -> EncodingResult<()> {
            let mut buf = [0u8; $size];
            LittleEndian::$write(&mut buf, value);
            process_encode_io_result(stream.write_all(&buf))
        }

        /// Read a value from the stream in little-endian order.
        pub fn $rfn<S: Read + ?Sized>(stream: &mut S) -> EncodingResult<$t> {
            let mut buf = [0u8; $size];
            process_decode_io_result(stream.read_exact(&mut buf))?;
            Ok(LittleEndian::$read(&buf))
        }
    };
}

primitive_codec!(i16, 2, write_i16, read_i16, write_i16, read_i16);
primitive_codec!(u16, 2, write_u16, read_u16, write_u16, read_u16);
primitive_codec!(i32, 4, write_i32, read_i32, write_i32, read_i32);
primitive_codec!(u32, 4, write_u32, read_u32, write_u32, read_u32);
primitive_codec!(i64, 8, write_i64, read_i64, write_i64, read_i64);
primitive_codec!(u64, 8, write_u64, read_u64, write_u64, read_u64);
primitive_codec!(f32, 4, write_f32, read_f32, write_f32, read_f32);
primitive_codec!(f64, 8, write_f64, read_f64, write_f64, read_f64);

impl BinaryEncodable for u8 {
    fn byte_len(&self) -> usize {
        1
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, *self)
    }
}

impl BinaryDecodable for u8 {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<u8> {
        read_u8(stream)
    }
}

impl BinaryEncodable for i8 {
    fn byte_len(&self) -> usize {
        1
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, *self as u8)
    }
}

impl BinaryDecodable for i8 {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<i8> {
        Ok(read_u8(stream)? as i8)
    }
}

impl BinaryEncodable for bool {
    fn byte_len(&self) -> usize {
        1
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, u8::from(*self))
    }
}

impl BinaryDecodable for bool {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<bool> {
        Ok(read_u8(stream)? == 1)
    }
}

/// Write a single unsigned byte to the stream.
pub fn write_u8<S: Write + ?Sized>(stream: &mut S, value: u8) -> EncodingResult<()> {
    process_encode_io_result(stream.write_all(&[value]))
}

/// Read a single unsigned byte from the stream.
pub fn read_u8<S: Read + ?Sized>(stream: &mut S) -> EncodingResult<u8> {
    let mut buf = [0u8];
    process_decode_io_result(stream.read_exact(&mut buf))?;
    Ok(buf[0])
}

// Arrays are length-prefixed by i32, -1 meaning a null array.
impl<T> BinaryEncodable for Option<Vec<T>>
where
    T: BinaryEncodable,
{
    fn byte_len(&self) -> usize {
        let mut size = 4;
        if let Some(ref values) = self {
            size += values.iter().map(|v| v.byte_len()).sum::<usize>();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        if let Some(ref values) = self {
            write_i32(stream, values.len() as i32)?;
            for value in values.iter() {
                value.encode(stream)?;
            }
        } else {
            write_i32(stream, -1)?;
        }
        Ok(())
    }
}

impl<T> BinaryDecodable for Option<Vec<T>>
where
    T: BinaryDecodable,
{
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        options: &DecodingOptions,
    ) -> EncodingResult<Option<Vec<T>>> {
        let len = read_i32(stream)?;
        if len == -1 {
            Ok(None)
        } else if len < -1 {
            Err(Error::decoding("Array length is negative"))
        } else if len as usize > options.max_array_length {
            Err(Error::decoding(format!(
                "Array length {} exceeds decoding limit {}",
                len, options.max_array_length
            )))
        } else {
            let mut values: Vec<T> = Vec::with_capacity(len as usize);
            for _ in 0..len {
                values.push(T::decode(stream, options)?);
            }
            Ok(Some(values))
        }
    }
}

impl<T> BinaryEncodable for Box<T>
where
    T: BinaryEncodable,
{
    fn byte_len(&self) -> usize {
        self.as_ref().byte_len()
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.as_ref().encode(stream)
    }
}

impl<T> BinaryDecodable for Box<T>
where
    T: BinaryDecodable,
{
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(Box::new(T::decode(stream, options)?))
    }
}

/// Implemented by every type with a registered binary encoding id, i.e.
/// service messages and extension object payloads.
pub trait MessageInfo {
    /// The object id of the type's DefaultBinary encoding node.
    fn object_id(&self) -> crate::node_ids::ObjectId;
}

#[cfg(test)]
mod tests {
    use super::{DecodingOptions, DepthGauge, DepthLock};
    use crate::constants;

    #[test]
    fn depth_gauge() {
        let dg = DepthGauge::default();
        assert_eq!(dg.max_depth(), constants::MAX_DECODING_DEPTH);

        {
            let mut held = Vec::new();
            for _ in 0..dg.max_depth() {
                held.push(DepthLock::obtain(&dg).unwrap());
            }
            assert!(DepthLock::obtain(&dg).is_err());
        }

        // Locks dropped, gauge usable again.
        assert!(DepthLock::obtain(&dg).is_ok());
    }

    #[test]
    fn array_limit() {
        use super::BinaryDecodable;
        let options = DecodingOptions {
            max_array_length: 2,
            ..Default::default()
        };
        // Length prefix of 3 exceeds the limit of 2.
        let data = [3u8, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0];
        let mut stream = std::io::Cursor::new(&data[..]);
        let res: super::EncodingResult<Option<Vec<u32>>> =
            BinaryDecodable::decode(&mut stream, &options);
        assert!(res.is_err());
    }
}
