//! The outgoing message buffer: messages are chunked lazily and chunk
//! bytes drained to the socket with backpressure.

use std::collections::VecDeque;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use uastack_types::{
    encoding::{BinaryEncodable, EncodingResult, Error},
    StatusCode,
};

use crate::{
    comms::{
        chunker::Chunker, message_chunk::MessageChunk, secure_channel::SecureChannel,
        sequence_number::SequenceNumberHandle, tcp_types::ErrorMessage,
    },
    Message, ResponseMessage,
};

/// Queues outgoing messages as chunks and drains their bytes to the
/// transport. One chunk at a time is finalized, so a slow peer does not
/// force the whole message into memory twice.
pub struct SendBuffer {
    /// Bound on a single outgoing chunk.
    pub send_buffer_size: usize,
    /// Bound on a whole outgoing message, 0 for no bound.
    pub max_message_size: usize,
    /// Bound on chunks per message, 0 for no bound.
    pub max_chunk_count: usize,
    sequence_numbers: SequenceNumberHandle,
    pending_chunks: VecDeque<MessageChunk>,
    buffer: Vec<u8>,
    read_pos: usize,
}

impl SendBuffer {
    /// Create a buffer with the server's initial limits.
    pub fn new(
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> SendBuffer {
        SendBuffer {
            send_buffer_size,
            max_message_size,
            max_chunk_count,
            sequence_numbers: SequenceNumberHandle::new(),
            pending_chunks: VecDeque::new(),
            buffer: Vec::with_capacity(send_buffer_size.min(65536)),
            read_pos: 0,
        }
    }

    /// Replace the limits with the values negotiated during HEL/ACK.
    pub fn revise(
        &mut self,
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) {
        self.send_buffer_size = send_buffer_size;
        self.max_message_size = max_message_size;
        self.max_chunk_count = max_chunk_count;
    }

    /// Chunk a message and queue it for sending. Returns the request id on
    /// success.
    pub fn write(
        &mut self,
        request_id: u32,
        message: ResponseMessage,
        channel: &SecureChannel,
    ) -> Result<u32, Error> {
        let chunks = Chunker::encode(
            self.sequence_numbers.current(),
            request_id,
            self.max_message_size,
            self.send_buffer_size,
            channel,
            &message,
        )?;
        if self.max_chunk_count > 0 && chunks.len() > self.max_chunk_count {
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                format!(
                    "Message encodes to {} chunks, exceeding the negotiated {}",
                    chunks.len(),
                    self.max_chunk_count
                ),
            )
            .with_context(Some(request_id), Some(message.request_handle())));
        }
        self.sequence_numbers.increment(chunks.len() as u32);
        self.pending_chunks.extend(chunks);
        Ok(request_id)
    }

    /// Queue a transport-level error message, bypassing chunking.
    pub fn write_error(&mut self, message: ErrorMessage) {
        // Error messages are tiny and final, append them directly.
        self.compact();
        let _ = message.encode(&mut self.buffer);
    }

    /// True if a queued chunk is ready to be finalized into bytes.
    pub fn should_encode_chunks(&self) -> bool {
        !self.pending_chunks.is_empty() && !self.can_read()
    }

    /// Apply security to the next queued chunk and stage its bytes.
    pub fn encode_next_chunk(&mut self, channel: &SecureChannel) -> EncodingResult<()> {
        if let Some(chunk) = self.pending_chunks.pop_front() {
            let data = channel.apply_security(&chunk)?;
            self.compact();
            self.buffer.extend_from_slice(&data);
        }
        Ok(())
    }

    /// True if staged bytes remain unsent.
    pub fn can_read(&self) -> bool {
        self.read_pos < self.buffer.len()
    }

    /// Write the staged bytes to the transport.
    pub async fn read_into_async<W: AsyncWrite + Unpin>(
        &mut self,
        write: &mut W,
    ) -> std::io::Result<()> {
        let data = &self.buffer[self.read_pos..];
        if !data.is_empty() {
            write.write_all(data).await?;
            self.read_pos = self.buffer.len();
        }
        Ok(())
    }

    fn compact(&mut self) {
        if self.read_pos > 0 {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use uastack_types::encoding::DecodingOptions;
    use uastack_types::{ResponseHeader, ServiceFault, StatusCode};

    use super::SendBuffer;
    use crate::comms::secure_channel::{Role, SecureChannel};
    use crate::comms::security_policy::SecurityPolicy;

    #[test]
    fn staged_write_cycle() {
        let mut channel = SecureChannel::new(Role::Server, DecodingOptions::default());
        channel.set_security_policy(SecurityPolicy::None);
        channel.create_token(1, 60_000, 60_000);

        let mut buffer = SendBuffer::new(8196, 0, 0);
        let fault = ServiceFault {
            response_header: ResponseHeader::new_service_result(
                77,
                StatusCode::BadServiceUnsupported,
            ),
        };
        buffer.write(9, fault.into(), &channel).unwrap();
        assert!(buffer.should_encode_chunks());
        assert!(!buffer.can_read());
        buffer.encode_next_chunk(&channel).unwrap();
        assert!(buffer.can_read());
    }
}
