//! The connection protocol messages: HELLO, ACKNOWLEDGE and ERROR, plus the
//! shared transport message header.

use std::io::{Read, Write};

use log::error;
use uastack_types::{
    encoding::{
        process_decode_io_result, process_encode_io_result, read_u32, read_u8, write_u32, write_u8,
        BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error,
    },
    status_code::StatusCode,
    string::UAString,
};

/// Message type magic for a HELLO message.
pub const HELLO_MESSAGE: &[u8] = b"HEL";
/// Message type magic for an ACKNOWLEDGE message.
pub const ACKNOWLEDGE_MESSAGE: &[u8] = b"ACK";
/// Message type magic for an ERROR message.
pub const ERROR_MESSAGE: &[u8] = b"ERR";
/// Message type magic for a service message chunk.
pub const CHUNK_MESSAGE: &[u8] = b"MSG";
/// Message type magic for an OpenSecureChannel chunk.
pub const OPEN_SECURE_CHANNEL_MESSAGE: &[u8] = b"OPN";
/// Message type magic for a CloseSecureChannel chunk.
pub const CLOSE_SECURE_CHANNEL_MESSAGE: &[u8] = b"CLO";

/// An intermediate chunk of a multi-chunk message.
pub const CHUNK_INTERMEDIATE: u8 = b'C';
/// The final chunk of a message.
pub const CHUNK_FINAL: u8 = b'F';
/// A chunk aborting the message it belongs to.
pub const CHUNK_FINAL_ERROR: u8 = b'A';

/// Length of the fixed transport header: type, final flag, size.
pub const MESSAGE_HEADER_SIZE: usize = 3 + 1 + 4;
/// The smallest receive/send buffer size a peer may negotiate.
pub const MIN_CHUNK_SIZE: usize = 8196;
/// Cap on the endpoint url carried in a HELLO.
pub const MAX_ENDPOINT_URL_LENGTH: usize = 4096;

/// Kind of transport-level message, as tagged by the 3-byte magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Client hello.
    Hello,
    /// Server acknowledge.
    Acknowledge,
    /// Fatal error notification.
    Error,
    /// A secure-channel message chunk (MSG, OPN or CLO).
    Chunk,
    /// Not enough data to classify yet.
    Invalid,
}

/// The fixed header every transport message begins with.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    /// The message kind.
    pub message_type: MessageType,
    /// Total message length including this header.
    pub message_size: u32,
}

impl MessageHeader {
    /// Classify a message from the first bytes of a buffer without
    /// consuming it. Requires at least `MESSAGE_HEADER_SIZE` bytes.
    pub fn message_type(data: &[u8]) -> MessageType {
        if data.len() < 3 {
            return MessageType::Invalid;
        }
        match &data[0..3] {
            m if m == HELLO_MESSAGE => MessageType::Hello,
            m if m == ACKNOWLEDGE_MESSAGE => MessageType::Acknowledge,
            m if m == ERROR_MESSAGE => MessageType::Error,
            m if m == CHUNK_MESSAGE
                || m == OPEN_SECURE_CHANNEL_MESSAGE
                || m == CLOSE_SECURE_CHANNEL_MESSAGE =>
            {
                MessageType::Chunk
            }
            _ => MessageType::Invalid,
        }
    }

    /// Read the total message size from a raw header.
    pub fn message_size(data: &[u8]) -> Option<u32> {
        if data.len() < MESSAGE_HEADER_SIZE {
            return None;
        }
        Some(u32::from_le_bytes([data[4], data[5], data[6], data[7]]))
    }
}

fn write_header<S: Write + ?Sized>(
    stream: &mut S,
    magic: &[u8],
    message_size: usize,
) -> EncodingResult<()> {
    process_encode_io_result(stream.write_all(magic))?;
    write_u8(stream, CHUNK_FINAL)?;
    write_u32(stream, message_size as u32)
}

fn read_header<S: Read + ?Sized>(stream: &mut S, expected: &[u8]) -> EncodingResult<u32> {
    let mut magic = [0u8; 3];
    process_decode_io_result(stream.read_exact(&mut magic))?;
    if magic != *expected {
        return Err(Error::new(
            StatusCode::BadTcpMessageTypeInvalid,
            format!("Expected {:?} message, got {:?}", expected, magic),
        ));
    }
    let _reserved = read_u8(stream)?;
    read_u32(stream)
}

/// The first message a client sends, negotiating buffer and message limits.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    /// Protocol version the client speaks, currently 0.
    pub protocol_version: u32,
    /// Largest chunk the client can receive.
    pub receive_buffer_size: u32,
    /// Largest chunk the client will send.
    pub send_buffer_size: u32,
    /// Largest message the client accepts, 0 for no limit.
    pub max_message_size: u32,
    /// Most chunks per message the client accepts, 0 for no limit.
    pub max_chunk_count: u32,
    /// The endpoint the client wants to reach.
    pub endpoint_url: UAString,
}

impl BinaryEncodable for HelloMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + 20 + self.endpoint_url.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_header(stream, HELLO_MESSAGE, self.byte_len())?;
        write_u32(stream, self.protocol_version)?;
        write_u32(stream, self.receive_buffer_size)?;
        write_u32(stream, self.send_buffer_size)?;
        write_u32(stream, self.max_message_size)?;
        write_u32(stream, self.max_chunk_count)?;
        self.endpoint_url.encode(stream)
    }
}

impl BinaryDecodable for HelloMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let _size = read_header(stream, HELLO_MESSAGE)?;
        Ok(HelloMessage {
            protocol_version: read_u32(stream)?,
            receive_buffer_size: read_u32(stream)?,
            send_buffer_size: read_u32(stream)?,
            max_message_size: read_u32(stream)?,
            max_chunk_count: read_u32(stream)?,
            endpoint_url: UAString::decode(stream, options)?,
        })
    }
}

impl HelloMessage {
    /// Create a hello for the given endpoint with the caller's limits.
    pub fn new(
        endpoint_url: &str,
        receive_buffer_size: usize,
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> HelloMessage {
        HelloMessage {
            protocol_version: 0,
            receive_buffer_size: receive_buffer_size as u32,
            send_buffer_size: send_buffer_size as u32,
            max_message_size: max_message_size as u32,
            max_chunk_count: max_chunk_count as u32,
            endpoint_url: endpoint_url.into(),
        }
    }

    /// Buffer sizes below the protocol minimum are invalid.
    pub fn is_valid_buffer_sizes(&self) -> bool {
        self.receive_buffer_size as usize >= MIN_CHUNK_SIZE
            && self.send_buffer_size as usize >= MIN_CHUNK_SIZE
    }

    /// An over-long endpoint url is rejected before parsing.
    pub fn is_endpoint_url_valid(&self) -> bool {
        !self.endpoint_url.is_null()
            && self.endpoint_url.as_ref().len() <= MAX_ENDPOINT_URL_LENGTH
    }
}

/// The server's answer to a HELLO, carrying the revised limits.
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgeMessage {
    /// Protocol version the server speaks.
    pub protocol_version: u32,
    /// Largest chunk the server can receive.
    pub receive_buffer_size: u32,
    /// Largest chunk the server will send.
    pub send_buffer_size: u32,
    /// Largest message the server accepts, 0 for no limit.
    pub max_message_size: u32,
    /// Most chunks per message the server accepts, 0 for no limit.
    pub max_chunk_count: u32,
}

impl BinaryEncodable for AcknowledgeMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + 20
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_header(stream, ACKNOWLEDGE_MESSAGE, self.byte_len())?;
        write_u32(stream, self.protocol_version)?;
        write_u32(stream, self.receive_buffer_size)?;
        write_u32(stream, self.send_buffer_size)?;
        write_u32(stream, self.max_message_size)?;
        write_u32(stream, self.max_chunk_count)
    }
}

impl BinaryDecodable for AcknowledgeMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let _size = read_header(stream, ACKNOWLEDGE_MESSAGE)?;
        Ok(AcknowledgeMessage {
            protocol_version: read_u32(stream)?,
            receive_buffer_size: read_u32(stream)?,
            send_buffer_size: read_u32(stream)?,
            max_message_size: read_u32(stream)?,
            max_chunk_count: read_u32(stream)?,
        })
    }
}

impl AcknowledgeMessage {
    /// Create an acknowledge carrying the server's revised values.
    pub fn new(
        protocol_version: u32,
        receive_buffer_size: u32,
        send_buffer_size: u32,
        max_message_size: u32,
        max_chunk_count: u32,
    ) -> AcknowledgeMessage {
        AcknowledgeMessage {
            protocol_version,
            receive_buffer_size,
            send_buffer_size,
            max_message_size,
            max_chunk_count,
        }
    }
}

/// A fatal transport error, sent before closing the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    /// The raw status code of the error.
    pub error: StatusCode,
    /// Human readable reason.
    pub reason: UAString,
}

impl BinaryEncodable for ErrorMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + 4 + self.reason.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_header(stream, ERROR_MESSAGE, self.byte_len())?;
        self.error.encode(stream)?;
        self.reason.encode(stream)
    }
}

impl BinaryDecodable for ErrorMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let _size = read_header(stream, ERROR_MESSAGE)?;
        Ok(ErrorMessage {
            error: StatusCode::decode(stream, options)?,
            reason: UAString::decode(stream, options)?,
        })
    }
}

impl ErrorMessage {
    /// Create an error message from a status and reason.
    pub fn new(error: StatusCode, reason: &str) -> ErrorMessage {
        error!("Transport error {}: {}", error, reason);
        ErrorMessage {
            error,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uastack_types::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn hello_round_trip() {
        let hello = HelloMessage::new("opc.tcp://localhost:4840/", 65536, 65536, 0, 0);
        let bytes = hello.encode_to_vec();
        assert_eq!(bytes.len(), hello.byte_len());
        assert_eq!(&bytes[0..3], HELLO_MESSAGE);
        assert_eq!(MessageHeader::message_type(&bytes), MessageType::Hello);
        assert_eq!(
            MessageHeader::message_size(&bytes),
            Some(hello.byte_len() as u32)
        );
        let mut s = std::io::Cursor::new(bytes);
        assert_eq!(
            HelloMessage::decode(&mut s, &DecodingOptions::default()).unwrap(),
            hello
        );
    }

    #[test]
    fn hello_validation() {
        let mut hello = HelloMessage::new("opc.tcp://localhost:4840/", 65536, 65536, 0, 0);
        assert!(hello.is_valid_buffer_sizes());
        assert!(hello.is_endpoint_url_valid());
        hello.receive_buffer_size = 512;
        assert!(!hello.is_valid_buffer_sizes());
        hello.endpoint_url = UAString::null();
        assert!(!hello.is_endpoint_url_valid());
    }

    #[test]
    fn ack_and_error_round_trip() {
        let ack = AcknowledgeMessage::new(0, 8196, 8196, 1 << 20, 16);
        let mut s = std::io::Cursor::new(ack.encode_to_vec());
        assert_eq!(
            AcknowledgeMessage::decode(&mut s, &DecodingOptions::default()).unwrap(),
            ack
        );

        let err = ErrorMessage::new(StatusCode::BadTcpMessageTooLarge, "too large");
        let mut s = std::io::Cursor::new(err.encode_to_vec());
        assert_eq!(
            ErrorMessage::decode(&mut s, &DecodingOptions::default()).unwrap(),
            err
        );
    }
}
