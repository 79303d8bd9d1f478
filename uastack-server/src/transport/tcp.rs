//! Transport implementation for opc.tcp: the HELLO/ACKNOWLEDGE handshake
//! and the chunk-level poll loop.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::StreamExt;
use log::error;
use tokio::{
    io::{AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
};
use tokio_util::{codec::FramedRead, sync::CancellationToken};

use uastack_core::{
    comms::{
        buffer::SendBuffer,
        chunker::Chunker,
        message_chunk::{ChunkFinality, MessageChunk},
        secure_channel::SecureChannel,
        tcp_codec::{Message, TcpCodec},
        tcp_types::{AcknowledgeMessage, ErrorMessage},
    },
    RequestMessage, ResponseMessage,
};
use uastack_types::{
    encoding::{BinaryDecodable, BinaryEncodable, Error},
    ResponseHeader, ServiceFault, StatusCode,
};

use crate::info::ServerInfo;

/// Framing limits handed to a fresh connection before negotiation.
#[derive(Debug, Clone)]
pub(crate) struct TransportConfig {
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
    pub max_message_size: usize,
    pub max_chunk_count: usize,
    pub hello_timeout: Duration,
}

/// A fully reassembled request.
#[derive(Debug)]
pub(crate) struct Request {
    pub message: RequestMessage,
    pub request_id: u32,
}

/// Result of polling the transport once.
pub(crate) enum TransportPollResult {
    OutgoingMessageSent,
    IncomingChunk,
    IncomingMessage(Request),
    Error(StatusCode),
    /// An error scoped to one request; the channel survives.
    RecoverableError(StatusCode, u32, u32),
    Closed,
}

fn min_zero_infinite(server: u32, client: u32) -> u32 {
    if client == 0 {
        server
    } else if server == 0 {
        client
    } else {
        client.min(server)
    }
}

/// Performs the HELLO/ACKNOWLEDGE exchange, yielding a transport with the
/// negotiated limits.
pub(crate) struct TcpConnector {
    read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
    write: WriteHalf<TcpStream>,
    deadline: Instant,
    config: TransportConfig,
}

impl TcpConnector {
    pub fn new(stream: TcpStream, config: TransportConfig, info: &ServerInfo) -> TcpConnector {
        let (read, write) = tokio::io::split(stream);
        let codec = TcpCodec::new(info.config.decoding_options(), config.receive_buffer_size);
        TcpConnector {
            read: FramedRead::new(read, codec),
            write,
            deadline: Instant::now() + config.hello_timeout,
            config,
        }
    }

    /// Run the handshake. An error is reported to the peer with an ERR
    /// message before the connection drops.
    pub async fn connect(
        mut self,
        info: Arc<ServerInfo>,
        token: CancellationToken,
    ) -> Result<TcpTransport, StatusCode> {
        let err = tokio::select! {
            _ = tokio::time::sleep_until(self.deadline.into()) => {
                ErrorMessage::new(StatusCode::BadTimeout, "Timeout waiting for HELLO")
            }
            _ = token.cancelled() => {
                ErrorMessage::new(StatusCode::BadServerHalted, "Server closed")
            }
            r = self.hello_ack(&info) => {
                match r {
                    Ok(buffer) => {
                        return Ok(TcpTransport::new(self.read, self.write, buffer));
                    }
                    Err(e) => e,
                }
            }
        };

        // The channel may already be gone; a failed error send is fine.
        let mut buf = Vec::with_capacity(err.byte_len());
        if err.encode(&mut buf).is_ok() {
            let _ = self.write.write_all(&buf).await;
        }
        Err(err.error)
    }

    async fn hello_ack(&mut self, info: &ServerInfo) -> Result<SendBuffer, ErrorMessage> {
        let hello = match self.read.next().await {
            Some(Ok(Message::Hello(hello))) => Ok(hello),
            Some(Ok(other)) => Err(ErrorMessage::new(
                StatusCode::BadCommunicationError,
                &format!("Expected a hello message, got {:?} instead", other),
            )),
            Some(Err(e)) => Err(ErrorMessage::new(
                StatusCode::BadCommunicationError,
                &format!("Communication error while waiting for hello: {}", e),
            )),
            None => Err(ErrorMessage::new(
                StatusCode::BadCommunicationError,
                "Stream closed",
            )),
        }?;

        if !hello.is_endpoint_url_valid()
            || !info.is_endpoint_url_valid(hello.endpoint_url.as_ref())
        {
            return Err(ErrorMessage::new(
                StatusCode::BadTcpEndpointUrlInvalid,
                "HELLO endpoint url is invalid",
            ));
        }
        if !hello.is_valid_buffer_sizes() {
            return Err(ErrorMessage::new(
                StatusCode::BadCommunicationError,
                "HELLO buffer sizes are invalid",
            ));
        }
        let server_protocol_version = 0;
        if hello.protocol_version > server_protocol_version {
            return Err(ErrorMessage::new(
                StatusCode::BadProtocolVersionUnsupported,
                "Client protocol version is unsupported",
            ));
        }

        // The server picks min(client, server) for every limit; the
        // revised values are the channel's effective limits.
        let acknowledge = AcknowledgeMessage::new(
            server_protocol_version,
            (self.config.receive_buffer_size as u32).min(hello.send_buffer_size),
            (self.config.send_buffer_size as u32).min(hello.receive_buffer_size),
            min_zero_infinite(self.config.max_message_size as u32, hello.max_message_size),
            min_zero_infinite(self.config.max_chunk_count as u32, hello.max_chunk_count),
        );

        let mut buffer = SendBuffer::new(
            self.config.send_buffer_size,
            self.config.max_message_size,
            self.config.max_chunk_count,
        );
        buffer.revise(
            acknowledge.send_buffer_size as usize,
            acknowledge.max_message_size as usize,
            acknowledge.max_chunk_count as usize,
        );
        self.read
            .decoder_mut()
            .set_max_chunk_size(acknowledge.receive_buffer_size as usize);

        let mut buf = Vec::with_capacity(acknowledge.byte_len());
        acknowledge
            .encode(&mut buf)
            .map_err(|e| ErrorMessage::new(e.into(), "Failed to encode the acknowledge"))?;
        self.write.write_all(&buf).await.map_err(|e| {
            ErrorMessage::new(
                StatusCode::BadCommunicationError,
                &format!("Failed to send the acknowledge: {e}"),
            )
        })?;

        Ok(buffer)
    }
}

/// The post-handshake transport: chunk assembly in, chunked responses out.
pub(crate) struct TcpTransport {
    read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
    write: WriteHalf<TcpStream>,
    send_buffer: SendBuffer,
    closing: bool,
    pending_chunks: Vec<MessageChunk>,
    last_received_sequence_number: u32,
}

impl TcpTransport {
    fn new(
        read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
        write: WriteHalf<TcpStream>,
        send_buffer: SendBuffer,
    ) -> TcpTransport {
        TcpTransport {
            read,
            write,
            send_buffer,
            closing: false,
            pending_chunks: Vec::new(),
            last_received_sequence_number: 0,
        }
    }

    /// Close once the queued messages have drained.
    pub fn set_closing(&mut self) {
        self.closing = true;
    }

    /// True once a close has been requested.
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Queue a transport-level error for sending.
    pub fn enqueue_error(&mut self, message: ErrorMessage) {
        self.send_buffer.write_error(message);
    }

    /// Queue a response. Encoding failures fall back to a service fault
    /// when enough context survives, otherwise they kill the channel.
    pub fn enqueue_message_for_send(
        &mut self,
        channel: &mut SecureChannel,
        message: ResponseMessage,
        request_id: u32,
    ) -> Result<(), StatusCode> {
        match self.send_buffer.write(request_id, message, channel) {
            Ok(_) => Ok(()),
            Err(e) => {
                log::warn!("Failed to encode an outgoing message: {e}");
                if let Some((request_id, request_handle)) = e.full_context() {
                    self.send_buffer.write(
                        request_id,
                        ServiceFault {
                            response_header: ResponseHeader::new_service_result(
                                request_handle,
                                e.into(),
                            ),
                        }
                        .into(),
                        channel,
                    )?;
                    Ok(())
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Drive the transport one step: stage and send queued bytes while
    /// listening for incoming frames.
    pub async fn poll(&mut self, channel: &mut SecureChannel) -> TransportPollResult {
        if self.send_buffer.should_encode_chunks() {
            if let Err(e) = self.send_buffer.encode_next_chunk(channel) {
                return TransportPollResult::Error(e.into());
            }
        }

        if self.send_buffer.can_read() {
            tokio::select! {
                r = self.send_buffer.read_into_async(&mut self.write) => {
                    match r {
                        Ok(()) => TransportPollResult::OutgoingMessageSent,
                        Err(e) => {
                            error!("Failed to write to the stream: {}", e);
                            TransportPollResult::Closed
                        }
                    }
                }
                incoming = self.read.next() => {
                    self.handle_incoming_message(incoming, channel)
                }
            }
        } else {
            if self.is_closing() {
                return TransportPollResult::Closed;
            }
            let incoming = self.read.next().await;
            self.handle_incoming_message(incoming, channel)
        }
    }

    fn handle_incoming_message(
        &mut self,
        incoming: Option<Result<Message, std::io::Error>>,
        channel: &mut SecureChannel,
    ) -> TransportPollResult {
        let Some(incoming) = incoming else {
            return TransportPollResult::Closed;
        };
        match incoming {
            Ok(message) => match self.process_message(message, channel) {
                Ok(None) => TransportPollResult::IncomingChunk,
                Ok(Some(request)) => {
                    self.pending_chunks.clear();
                    TransportPollResult::IncomingMessage(request)
                }
                Err(e) => {
                    self.pending_chunks.clear();
                    if let Some((request_id, request_handle)) = e.full_context() {
                        TransportPollResult::RecoverableError(
                            e.status(),
                            request_id,
                            request_handle,
                        )
                    } else {
                        TransportPollResult::Error(e.status())
                    }
                }
            },
            Err(e) => {
                error!("Error reading from stream: {:?}", e);
                TransportPollResult::Error(StatusCode::BadConnectionClosed)
            }
        }
    }

    fn process_message(
        &mut self,
        message: Message,
        channel: &mut SecureChannel,
    ) -> Result<Option<Request>, Error> {
        match message {
            Message::Chunk(chunk) => {
                if chunk.finality == ChunkFinality::Abort {
                    // Discard everything buffered for the request and
                    // surface the error the client encoded in the abort.
                    let options = channel.decoding_options();
                    let mut body = std::io::Cursor::new(chunk.body.as_slice());
                    if let (Ok(status), Ok(reason)) = (
                        StatusCode::decode(&mut body, &options),
                        uastack_types::UAString::decode(&mut body, &options),
                    ) {
                        log::warn!("Client aborted a request: {} ({})", status, reason);
                    }
                    self.pending_chunks.clear();
                    return Ok(None);
                }

                channel.verify_chunk(&chunk)?;

                if self.send_buffer.max_chunk_count > 0
                    && self.pending_chunks.len() == self.send_buffer.max_chunk_count
                {
                    return Err(Error::new(
                        StatusCode::BadTcpMessageTooLarge,
                        format!(
                            "Message exceeds the negotiated chunk count of {}",
                            self.send_buffer.max_chunk_count
                        ),
                    ));
                }
                let finality = chunk.finality;
                self.pending_chunks.push(chunk);
                if finality == ChunkFinality::Intermediate {
                    return Ok(None);
                }

                // Per-chunk limits were enforced by the codec; the whole
                // message is checked once assembled.
                if self.send_buffer.max_message_size > 0 {
                    let total: usize = self.pending_chunks.iter().map(|c| c.body.len()).sum();
                    if total > self.send_buffer.max_message_size {
                        return Err(Error::new(
                            StatusCode::BadTcpMessageTooLarge,
                            format!(
                                "Assembled message of {} bytes exceeds the negotiated {}",
                                total, self.send_buffer.max_message_size
                            ),
                        ));
                    }
                }

                let request_id = self.pending_chunks[0].request_id();
                self.last_received_sequence_number = Chunker::validate_chunks(
                    self.last_received_sequence_number + 1,
                    channel,
                    &self.pending_chunks,
                )?;

                let message = Chunker::decode(&self.pending_chunks, channel, None)
                    .map_err(|e| e.with_request_id(request_id))?;
                Ok(Some(Request {
                    request_id,
                    message,
                }))
            }
            unexpected => Err(Error::new(
                StatusCode::BadUnexpectedError,
                format!("Received unexpected message: {:?}", unexpected),
            )),
        }
    }
}
