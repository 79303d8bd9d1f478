//! A tokio codec framing the byte stream into transport messages.

use std::io::Cursor;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use uastack_types::{
    encoding::{BinaryDecodable, DecodingOptions},
    StatusCode,
};

use super::{
    message_chunk::MessageChunk,
    tcp_types::{
        AcknowledgeMessage, ErrorMessage, HelloMessage, MessageHeader, MessageType,
        MESSAGE_HEADER_SIZE,
    },
};

/// One framed transport message.
#[derive(Debug)]
pub enum Message {
    /// A client HELLO.
    Hello(HelloMessage),
    /// A server ACKNOWLEDGE.
    Acknowledge(AcknowledgeMessage),
    /// A fatal ERROR notification.
    Error(ErrorMessage),
    /// A secure-channel message chunk.
    Chunk(MessageChunk),
}

/// Decoder accumulating bytes until a whole transport message is
/// available. Oversized messages are rejected before buffering them.
pub struct TcpCodec {
    decoding_options: DecodingOptions,
    /// Bound on any incoming frame, the negotiated receive buffer size.
    max_chunk_size: usize,
}

impl TcpCodec {
    /// Create a codec with the given decoding limits. `max_chunk_size`
    /// bounds any single frame, 0 for no bound.
    pub fn new(decoding_options: DecodingOptions, max_chunk_size: usize) -> TcpCodec {
        TcpCodec {
            decoding_options,
            max_chunk_size,
        }
    }

    /// Replace the frame bound with the value negotiated during HEL/ACK.
    pub fn set_max_chunk_size(&mut self, max_chunk_size: usize) {
        self.max_chunk_size = max_chunk_size;
    }
}

impl Decoder for TcpCodec {
    type Item = Message;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, std::io::Error> {
        if buf.len() < MESSAGE_HEADER_SIZE {
            return Ok(None);
        }

        let message_type = MessageHeader::message_type(&buf[..]);
        if message_type == MessageType::Invalid {
            return Err(status_error(
                StatusCode::BadTcpMessageTypeInvalid,
                "Message type magic is not recognized",
            ));
        }

        // The incoming frame length is bounded by the receive buffer size;
        // a violation is fatal to the connection.
        let message_size = MessageHeader::message_size(&buf[..]).unwrap_or(0) as usize;
        if message_size < MESSAGE_HEADER_SIZE {
            return Err(status_error(
                StatusCode::BadTcpInternalError,
                "Message size is smaller than the message header",
            ));
        }
        if self.max_chunk_size > 0 && message_size > self.max_chunk_size {
            return Err(status_error(
                StatusCode::BadTcpMessageTooLarge,
                "Message exceeds the negotiated receive buffer size",
            ));
        }

        if buf.len() < message_size {
            buf.reserve(message_size - buf.len());
            return Ok(None);
        }

        let frame = buf.copy_to_bytes(message_size);
        let mut stream = Cursor::new(&frame[..]);
        let message = match message_type {
            MessageType::Hello => Message::Hello(
                HelloMessage::decode(&mut stream, &self.decoding_options).map_err(to_io)?,
            ),
            MessageType::Acknowledge => Message::Acknowledge(
                AcknowledgeMessage::decode(&mut stream, &self.decoding_options).map_err(to_io)?,
            ),
            MessageType::Error => Message::Error(
                ErrorMessage::decode(&mut stream, &self.decoding_options).map_err(to_io)?,
            ),
            MessageType::Chunk => Message::Chunk(
                MessageChunk::decode(&mut stream, &self.decoding_options).map_err(to_io)?,
            ),
            MessageType::Invalid => unreachable!(),
        };
        Ok(Some(message))
    }
}

fn to_io(err: uastack_types::Error) -> std::io::Error {
    err.into()
}

fn status_error(status: StatusCode, reason: &str) -> std::io::Error {
    uastack_types::Error::new(status, reason.to_string()).into()
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use tokio_util::codec::Decoder;
    use uastack_types::encoding::{BinaryEncodable, DecodingOptions};

    use super::{Message, TcpCodec};
    use crate::comms::tcp_types::HelloMessage;

    #[test]
    fn partial_then_full_frame() {
        let hello = HelloMessage::new("opc.tcp://localhost:4840/", 65536, 65536, 0, 0);
        let bytes = hello.encode_to_vec();

        let mut codec = TcpCodec::new(DecodingOptions::default(), 0);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&bytes[..6]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[6..]);
        match codec.decode(&mut buf).unwrap() {
            Some(Message::Hello(decoded)) => assert_eq!(decoded, hello),
            other => panic!("expected hello, got {:?}", other),
        }
    }

    #[test]
    fn oversize_frame_is_fatal() {
        let hello = HelloMessage::new("opc.tcp://localhost:4840/", 65536, 65536, 0, 0);
        let bytes = hello.encode_to_vec();

        let mut codec = TcpCodec::new(DecodingOptions::default(), 16);
        let mut buf = BytesMut::from(&bytes[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn garbage_magic_is_fatal() {
        let mut codec = TcpCodec::new(DecodingOptions::default(), 0);
        let mut buf = BytesMut::from(&b"XYZF\x10\x00\x00\x00ignored."[..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
