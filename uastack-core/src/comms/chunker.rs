//! Splitting messages into chunks and putting them back together.
//!
//! A message is serialized once into a contiguous buffer — its encoding
//! node id followed by the body — and the buffer is sliced into chunk
//! bodies. Reassembly is the reverse: validate the series, concatenate
//! the bodies, decode. One buffer per message is the cost; in exchange
//! the chunk boundaries never interact with the codec.

use std::io::Cursor;

use log::trace;
use uastack_types::{
    encoding::{BinaryDecodable, BinaryEncodable, Error},
    NodeId, ObjectId, StatusCode,
};

use crate::{
    comms::{
        message_chunk::{ChunkFinality, MessageChunk},
        secure_channel::SecureChannel,
        security_policy::SecurityPolicy,
        tcp_types::MIN_CHUNK_SIZE,
    },
    Message,
};

/// The chunker turns messages into chunk series and chunk series back
/// into messages.
pub struct Chunker;

impl Chunker {
    /// Serialize a message and slice it into chunks.
    ///
    /// `max_chunk_size` bounds each chunk's total byte length, 0 for no
    /// bound; `max_message_size` bounds the serialized message, 0 for no
    /// bound. Chunks are numbered from `sequence_number` upwards.
    pub fn encode(
        sequence_number: u32,
        request_id: u32,
        max_message_size: usize,
        max_chunk_size: usize,
        channel: &SecureChannel,
        message: &impl Message,
    ) -> Result<Vec<MessageChunk>, Error> {
        if channel.security_policy() == SecurityPolicy::Unknown {
            return Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                "Channel has no security policy",
            ));
        }

        let handle = message.request_handle();
        let error_context =
            |e: Error| e.with_context(Some(request_id), (handle > 0).then_some(handle));

        // One pass serializes the whole message: the node id of its
        // binary encoding, then the body.
        let type_id = message.type_id();
        let mut payload = Vec::with_capacity(type_id.byte_len() + message.byte_len());
        type_id.encode(&mut payload)?;
        message.encode(&mut payload).map_err(error_context)?;

        if max_message_size > 0 && payload.len() > max_message_size {
            // The client reports an oversized request, the server an
            // oversized response.
            let status = if channel.is_client_role() {
                StatusCode::BadRequestTooLarge
            } else {
                StatusCode::BadResponseTooLarge
            };
            return Err(error_context(Error::new(
                status,
                format!(
                    "Message of {} bytes exceeds the limit of {}",
                    payload.len(),
                    max_message_size
                ),
            )));
        }

        let message_type = message.message_type();
        let body_capacity = if max_chunk_size == 0 {
            payload.len()
        } else {
            if max_chunk_size < MIN_CHUNK_SIZE {
                return Err(error_context(Error::new(
                    StatusCode::BadTcpInternalError,
                    format!(
                        "Negotiated chunk size {} is below the protocol minimum",
                        max_chunk_size
                    ),
                )));
            }
            max_chunk_size - MessageChunk::overhead(channel, message_type)
        };

        let chunk_count = payload.len().div_ceil(body_capacity).max(1);
        trace!(
            "Message of {} bytes encodes to {} chunk(s)",
            payload.len(),
            chunk_count
        );
        let chunks = payload
            .chunks(body_capacity)
            .enumerate()
            .map(|(i, body)| {
                let finality = if i + 1 == chunk_count {
                    ChunkFinality::Final
                } else {
                    ChunkFinality::Intermediate
                };
                MessageChunk::new(
                    message_type,
                    finality,
                    channel,
                    sequence_number + i as u32,
                    request_id,
                    body.to_vec(),
                )
            })
            .collect();
        Ok(chunks)
    }

    /// Check a complete chunk series: every chunk on this channel, one
    /// request id throughout, sequence numbers contiguous from at least
    /// `starting_sequence_number`, and the final flag only on the last
    /// chunk. Returns the series' last sequence number.
    pub fn validate_chunks(
        starting_sequence_number: u32,
        channel: &SecureChannel,
        chunks: &[MessageChunk],
    ) -> Result<u32, Error> {
        let Some(first) = chunks.first() else {
            return Err(Error::decoding("Chunk series is empty"));
        };
        if first.sequence_number() < starting_sequence_number {
            return Err(Error::new(
                StatusCode::BadSequenceNumberInvalid,
                format!(
                    "Series starts at sequence number {}, expected at least {}",
                    first.sequence_number(),
                    starting_sequence_number
                ),
            ));
        }
        let channel_id = channel.secure_channel_id();
        let request_id = first.request_id();

        for (i, chunk) in chunks.iter().enumerate() {
            if channel_id != 0 && chunk.channel_id != channel_id {
                return Err(Error::new(
                    StatusCode::BadSecureChannelIdInvalid,
                    format!(
                        "Chunk carries channel id {}, this channel is {}",
                        chunk.channel_id, channel_id
                    ),
                ));
            }
            // Within one request the chunks must be contiguous and in
            // order, and requests may not interleave chunks.
            let expected = first.sequence_number() + i as u32;
            if chunk.sequence_number() != expected {
                return Err(Error::new(
                    StatusCode::BadSequenceNumberInvalid,
                    format!(
                        "Chunk {} has sequence number {}, expected {}",
                        i,
                        chunk.sequence_number(),
                        expected
                    ),
                ));
            }
            if chunk.request_id() != request_id {
                return Err(Error::new(
                    StatusCode::BadSequenceNumberInvalid,
                    format!(
                        "Chunk {} belongs to request {}, the series started request {}",
                        i,
                        chunk.request_id(),
                        request_id
                    ),
                ));
            }
            let is_last = i + 1 == chunks.len();
            match chunk.finality {
                ChunkFinality::Final if is_last => {}
                ChunkFinality::Intermediate if !is_last => {}
                finality => {
                    return Err(Error::decoding(format!(
                        "Chunk {} of {} has finality {:?}",
                        i,
                        chunks.len(),
                        finality
                    )));
                }
            }
        }
        Ok(first.sequence_number() + chunks.len() as u32 - 1)
    }

    /// Reassemble a validated chunk series into a message.
    pub fn decode<T: Message>(
        chunks: &[MessageChunk],
        channel: &SecureChannel,
        expected_node_id: Option<NodeId>,
    ) -> Result<T, Error> {
        let mut payload = Vec::with_capacity(chunks.iter().map(|c| c.body.len()).sum());
        for chunk in chunks {
            payload.extend_from_slice(&chunk.body);
        }

        let options = channel.decoding_options();
        let mut stream = Cursor::new(payload.as_slice());
        let node_id = NodeId::decode(&mut stream, &options)?;
        let object_id = Self::expect_object_id(node_id, expected_node_id)?;
        T::decode_by_object_id(&mut stream, object_id, &options)
    }

    fn expect_object_id(
        node_id: NodeId,
        expected_node_id: Option<NodeId>,
    ) -> Result<ObjectId, Error> {
        if let Some(expected) = expected_node_id {
            if node_id != expected {
                return Err(Error::decoding(format!(
                    "Message is prefixed by {node_id}, expected {expected}"
                )));
            }
        }
        node_id
            .as_object_id()
            .map_err(|_| Error::decoding(format!("Message prefix {node_id} is not an object id")))
    }
}

#[cfg(test)]
mod tests {
    use uastack_types::encoding::{BinaryEncodable, DecodingOptions};
    use uastack_types::{
        CloseSecureChannelRequest, ReadRequest, ReadValueId, RequestHeader, StatusCode,
        VariableId,
    };

    use crate::comms::message_chunk::ChunkFinality;
    use crate::comms::secure_channel::{Role, SecureChannel};
    use crate::comms::security_policy::SecurityPolicy;
    use crate::RequestMessage;

    use super::Chunker;

    fn open_channel() -> SecureChannel {
        let mut channel = SecureChannel::new(Role::Server, DecodingOptions::default());
        channel.set_security_policy(SecurityPolicy::None);
        channel.create_token(1, 60_000, 60_000);
        channel
    }

    fn read_request(operations: usize) -> RequestMessage {
        ReadRequest {
            request_header: RequestHeader::dummy(),
            max_age: 0.0,
            timestamps_to_return: Default::default(),
            nodes_to_read: Some(
                (0..operations)
                    .map(|_| ReadValueId::value_of(VariableId::Server_ServerStatus_State))
                    .collect(),
            ),
        }
        .into()
    }

    #[test]
    fn single_chunk_round_trip() {
        let channel = open_channel();
        let request = read_request(1);
        let chunks = Chunker::encode(1, 8, 0, 0, &channel, &request).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].finality, ChunkFinality::Final);
        assert_eq!(chunks[0].request_id(), 8);

        assert_eq!(Chunker::validate_chunks(1, &channel, &chunks).unwrap(), 1);
        let decoded: RequestMessage = Chunker::decode(&chunks, &channel, None).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn multi_chunk_round_trip() {
        let channel = open_channel();
        let request = read_request(2000);
        assert!(request.byte_len() > 8196);

        let chunks = Chunker::encode(1, 9, 0, 8196, &channel, &request).unwrap();
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.byte_len() <= 8196);
            assert_eq!(chunk.sequence_number(), 1 + i as u32);
            assert_eq!(
                chunk.finality,
                if i + 1 == chunks.len() {
                    ChunkFinality::Final
                } else {
                    ChunkFinality::Intermediate
                }
            );
        }

        Chunker::validate_chunks(1, &channel, &chunks).unwrap();
        let decoded: RequestMessage = Chunker::decode(&chunks, &channel, None).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn oversize_message_is_rejected() {
        let channel = open_channel();
        let err = Chunker::encode(1, 8, 16, 0, &channel, &read_request(1)).unwrap_err();
        // Server role reports the response limit status.
        assert_eq!(err.status(), StatusCode::BadResponseTooLarge);
    }

    #[test]
    fn out_of_order_chunks_are_rejected() {
        let channel = open_channel();
        let mut chunks = Chunker::encode(1, 9, 0, 8196, &channel, &read_request(2000)).unwrap();
        chunks.swap(0, 1);
        let err = Chunker::validate_chunks(1, &channel, &chunks).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadSequenceNumberInvalid);
    }

    #[test]
    fn mixed_request_ids_are_rejected() {
        let channel = open_channel();
        let mut chunks = Chunker::encode(1, 9, 0, 8196, &channel, &read_request(2000)).unwrap();
        chunks[1].sequence_header.request_id = 10;
        let err = Chunker::validate_chunks(1, &channel, &chunks).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadSequenceNumberInvalid);
    }

    #[test]
    fn misplaced_final_flag_is_rejected() {
        let channel = open_channel();
        let mut chunks = Chunker::encode(1, 9, 0, 8196, &channel, &read_request(2000)).unwrap();
        chunks[0].finality = ChunkFinality::Final;
        let err = Chunker::validate_chunks(1, &channel, &chunks).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadDecodingError);
    }

    #[test]
    fn expired_sequence_number_is_rejected() {
        let channel = open_channel();
        let request: RequestMessage = CloseSecureChannelRequest {
            request_header: RequestHeader::dummy(),
        }
        .into();
        let chunks = Chunker::encode(5, 10, 0, 0, &channel, &request).unwrap();
        let err = Chunker::validate_chunks(100, &channel, &chunks).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadSequenceNumberInvalid);
    }
}
