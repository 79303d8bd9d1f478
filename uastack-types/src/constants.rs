//! Default limits used when nothing else has been negotiated.

/// Default maximum message size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;
/// Default maximum number of chunks per message.
pub const MAX_CHUNK_COUNT: usize = 64;
/// Default maximum length in bytes of a string.
pub const MAX_STRING_LENGTH: usize = 65535;
/// Default maximum length in bytes of a byte string.
pub const MAX_BYTE_STRING_LENGTH: usize = 65535;
/// Default maximum number of array elements.
pub const MAX_ARRAY_LENGTH: usize = 65535;
/// Maximum nesting depth of recursive structures during decoding.
pub const MAX_DECODING_DEPTH: u64 = 10;
