//! Chunk framing. A chunk carries a whole message or one slice of it,
//! and is held here in parsed form: fixed header fields, security and
//! sequence headers, and the body bytes. Signed and encrypted policies
//! must remove chunk security before this parse; on the None policy the
//! frames arrive in the clear.

use std::io::{Cursor, Read, Write};

use uastack_types::{
    encoding::{
        process_decode_io_result, process_encode_io_result, read_u32, read_u8, write_u32,
        write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error,
    },
    StatusCode,
};

use super::{
    secure_channel::SecureChannel,
    security_header::{SecurityHeader, SequenceHeader},
    tcp_types::{
        CHUNK_FINAL, CHUNK_FINAL_ERROR, CHUNK_INTERMEDIATE, CHUNK_MESSAGE,
        CLOSE_SECURE_CHANNEL_MESSAGE, OPEN_SECURE_CHANNEL_MESSAGE,
    },
};

/// Fixed part of a chunk: magic, finality flag, size and channel id.
pub const CHUNK_FIXED_HEADER_SIZE: usize = 3 + 1 + 4 + 4;

/// Which kind of conversation a chunk belongs to, from its 3-byte magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageChunkType {
    /// A service message chunk (MSG).
    Message,
    /// An OpenSecureChannel chunk (OPN), asymmetrically secured.
    OpenSecureChannel,
    /// A CloseSecureChannel chunk (CLO).
    CloseSecureChannel,
}

impl MessageChunkType {
    fn magic(self) -> &'static [u8] {
        match self {
            MessageChunkType::Message => CHUNK_MESSAGE,
            MessageChunkType::OpenSecureChannel => OPEN_SECURE_CHANNEL_MESSAGE,
            MessageChunkType::CloseSecureChannel => CLOSE_SECURE_CHANNEL_MESSAGE,
        }
    }

    fn from_magic(magic: &[u8]) -> EncodingResult<MessageChunkType> {
        match magic {
            m if m == CHUNK_MESSAGE => Ok(MessageChunkType::Message),
            m if m == OPEN_SECURE_CHANNEL_MESSAGE => Ok(MessageChunkType::OpenSecureChannel),
            m if m == CLOSE_SECURE_CHANNEL_MESSAGE => Ok(MessageChunkType::CloseSecureChannel),
            m => Err(Error::decoding(format!("Bad chunk magic {m:?}"))),
        }
    }

    /// `true` for OpenSecureChannel chunks.
    pub fn is_open_secure_channel(&self) -> bool {
        *self == MessageChunkType::OpenSecureChannel
    }
}

/// Where a chunk sits in its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFinality {
    /// More chunks of this message follow ('C').
    Intermediate,
    /// The message ends with this chunk ('F').
    Final,
    /// The sender gave up on the message; everything buffered for it is
    /// discarded ('A').
    Abort,
}

impl ChunkFinality {
    fn flag(self) -> u8 {
        match self {
            ChunkFinality::Intermediate => CHUNK_INTERMEDIATE,
            ChunkFinality::Final => CHUNK_FINAL,
            ChunkFinality::Abort => CHUNK_FINAL_ERROR,
        }
    }

    fn from_flag(flag: u8) -> EncodingResult<ChunkFinality> {
        match flag {
            CHUNK_INTERMEDIATE => Ok(ChunkFinality::Intermediate),
            CHUNK_FINAL => Ok(ChunkFinality::Final),
            CHUNK_FINAL_ERROR => Ok(ChunkFinality::Abort),
            flag => Err(Error::decoding(format!("Bad chunk finality flag {flag}"))),
        }
    }
}

/// One chunk, parsed. The body is the message slice it carries, without
/// any of the headers.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageChunk {
    /// The conversation kind.
    pub message_type: MessageChunkType,
    /// This chunk's position in its message.
    pub finality: ChunkFinality,
    /// The secure channel it belongs to.
    pub channel_id: u32,
    /// Asymmetric on OPN, symmetric otherwise.
    pub security_header: SecurityHeader,
    /// Sequence number and request id.
    pub sequence_header: SequenceHeader,
    /// The message bytes carried by this chunk.
    pub body: Vec<u8>,
}

impl MessageChunk {
    /// Assemble a chunk for a channel, deriving the headers from its
    /// current security state.
    pub fn new(
        message_type: MessageChunkType,
        finality: ChunkFinality,
        channel: &SecureChannel,
        sequence_number: u32,
        request_id: u32,
        body: Vec<u8>,
    ) -> MessageChunk {
        MessageChunk {
            message_type,
            finality,
            channel_id: channel.secure_channel_id(),
            security_header: channel.make_security_header(message_type),
            sequence_header: SequenceHeader {
                sequence_number,
                request_id,
            },
            body,
        }
    }

    /// Bytes of a chunk that are not body: fixed header, security and
    /// sequence headers, and the signature the channel's policy appends.
    pub fn overhead(channel: &SecureChannel, message_type: MessageChunkType) -> usize {
        CHUNK_FIXED_HEADER_SIZE
            + channel.make_security_header(message_type).byte_len()
            + SequenceHeader::default().byte_len()
            + channel.security_policy().symmetric_signature_size()
    }

    /// This chunk's sequence number.
    pub fn sequence_number(&self) -> u32 {
        self.sequence_header.sequence_number
    }

    /// The request this chunk belongs to.
    pub fn request_id(&self) -> u32 {
        self.sequence_header.request_id
    }
}

impl BinaryEncodable for MessageChunk {
    fn byte_len(&self) -> usize {
        CHUNK_FIXED_HEADER_SIZE
            + self.security_header.byte_len()
            + self.sequence_header.byte_len()
            + self.body.len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        process_encode_io_result(stream.write_all(self.message_type.magic()))?;
        write_u8(stream, self.finality.flag())?;
        write_u32(stream, self.byte_len() as u32)?;
        write_u32(stream, self.channel_id)?;
        self.security_header.encode(stream)?;
        self.sequence_header.encode(stream)?;
        process_encode_io_result(stream.write_all(&self.body))
    }
}

impl BinaryDecodable for MessageChunk {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        let mut magic = [0u8; 3];
        process_decode_io_result(stream.read_exact(&mut magic))?;
        let message_type = MessageChunkType::from_magic(&magic)?;
        let finality = ChunkFinality::from_flag(read_u8(stream)?)?;

        let declared_size = read_u32(stream)? as usize;
        if declared_size < CHUNK_FIXED_HEADER_SIZE {
            return Err(Error::decoding("Chunk is smaller than its fixed header"));
        }
        if options.max_message_size > 0 && declared_size > options.max_message_size {
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                format!(
                    "Chunk of {} bytes exceeds the negotiated maximum {}",
                    declared_size, options.max_message_size
                ),
            ));
        }
        let channel_id = read_u32(stream)?;

        // The rest of the declared size is headers plus body; take it in
        // one read so the body split needs no stream position tracking.
        let mut rest = vec![0u8; declared_size - CHUNK_FIXED_HEADER_SIZE];
        process_decode_io_result(stream.read_exact(&mut rest))?;
        let mut cursor = Cursor::new(rest.as_slice());
        let security_header = SecurityHeader::decode_for(message_type, &mut cursor, options)?;
        let sequence_header = SequenceHeader::decode(&mut cursor, options)?;
        let header_len = cursor.position() as usize;
        let body = rest.split_off(header_len);

        Ok(MessageChunk {
            message_type,
            finality,
            channel_id,
            security_header,
            sequence_header,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use uastack_types::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    use crate::comms::secure_channel::{Role, SecureChannel};
    use crate::comms::security_policy::SecurityPolicy;

    use super::{ChunkFinality, MessageChunk, MessageChunkType, CHUNK_FIXED_HEADER_SIZE};

    fn channel() -> SecureChannel {
        let mut channel = SecureChannel::new(Role::Server, DecodingOptions::default());
        channel.set_security_policy(SecurityPolicy::None);
        channel.create_token(3, 60_000, 60_000);
        channel
    }

    #[test]
    fn chunk_round_trip() {
        let channel = channel();
        let chunk = MessageChunk::new(
            MessageChunkType::Message,
            ChunkFinality::Final,
            &channel,
            5,
            17,
            vec![1, 2, 3, 4, 5],
        );
        let bytes = chunk.encode_to_vec();
        assert_eq!(bytes.len(), chunk.byte_len());
        assert_eq!(&bytes[0..4], b"MSGF");

        let mut stream = std::io::Cursor::new(bytes);
        let decoded = MessageChunk::decode(&mut stream, &DecodingOptions::default()).unwrap();
        assert_eq!(decoded, chunk);
        assert_eq!(decoded.sequence_number(), 5);
        assert_eq!(decoded.request_id(), 17);
        assert_eq!(decoded.channel_id, 3);
    }

    #[test]
    fn open_secure_channel_chunk_uses_asymmetric_header() {
        let channel = channel();
        let chunk = MessageChunk::new(
            MessageChunkType::OpenSecureChannel,
            ChunkFinality::Final,
            &channel,
            1,
            1,
            vec![0xAB; 16],
        );
        let bytes = chunk.encode_to_vec();
        assert_eq!(&bytes[0..3], b"OPN");
        let mut stream = std::io::Cursor::new(bytes);
        let decoded = MessageChunk::decode(&mut stream, &DecodingOptions::default()).unwrap();
        assert!(matches!(
            decoded.security_header,
            crate::comms::security_header::SecurityHeader::Asymmetric(_)
        ));
        assert_eq!(decoded.body, vec![0xAB; 16]);
    }

    #[test]
    fn bad_magic_and_flag_are_rejected() {
        let options = DecodingOptions::default();
        let mut bytes = vec![b'X', b'Y', b'Z', b'F'];
        bytes.extend_from_slice(&(CHUNK_FIXED_HEADER_SIZE as u32).to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let mut stream = std::io::Cursor::new(bytes.clone());
        assert!(MessageChunk::decode(&mut stream, &options).is_err());

        bytes[0..3].copy_from_slice(b"MSG");
        bytes[3] = b'Q';
        let mut stream = std::io::Cursor::new(bytes);
        assert!(MessageChunk::decode(&mut stream, &options).is_err());
    }

    #[test]
    fn overhead_matches_an_empty_chunk() {
        let channel = channel();
        for message_type in [
            MessageChunkType::Message,
            MessageChunkType::OpenSecureChannel,
        ] {
            let empty = MessageChunk::new(
                message_type,
                ChunkFinality::Final,
                &channel,
                1,
                1,
                Vec::new(),
            );
            assert_eq!(
                empty.byte_len(),
                MessageChunk::overhead(&channel, message_type)
            );
        }
    }
}
