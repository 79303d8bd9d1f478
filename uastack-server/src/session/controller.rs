//! The per-connection driver: owns the secure channel and transport,
//! demuxes channel-level services from session services, and keeps
//! responses flowing in handler-completion order.

use std::{pin::Pin, sync::Arc};

use futures::{
    future::Future,
    stream::{FuturesUnordered, StreamExt},
};
use log::{debug, error, info};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use uastack_core::{
    comms::{
        secure_channel::{Role, SecureChannel},
        security_policy::SecurityPolicy,
        tcp_types::ErrorMessage,
    },
    RequestMessage, ResponseMessage,
};
use uastack_types::{
    ByteString, MessageSecurityMode, OpenSecureChannelRequest, OpenSecureChannelResponse,
    ResponseHeader, SecurityTokenRequestType, ServiceFault, StatusCode,
};

use crate::{
    address_space::AddressSpace,
    diagnostics::ServerDiagnostics,
    info::ServerInfo,
    session::{
        manager::SessionManager,
        message_handler::{HandleMessageResult, MessageHandler, Response},
    },
    subscriptions::SubscriptionCache,
    transport::{Request, TcpTransport, TransportPollResult},
};

type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Drives one client connection from after the HEL/ACK handshake until
/// the transport dies.
pub(crate) struct SessionController {
    transport: TcpTransport,
    channel: SecureChannel,
    info: Arc<ServerInfo>,
    session_manager: Arc<RwLock<SessionManager>>,
    message_handler: MessageHandler,
    token: CancellationToken,
    pending: FuturesUnordered<ResponseFuture>,
    /// Client certificate seen on this channel; null on the None policy.
    client_certificate: ByteString,
}

impl SessionController {
    pub fn new(
        transport: TcpTransport,
        info: Arc<ServerInfo>,
        session_manager: Arc<RwLock<SessionManager>>,
        address_space: Arc<RwLock<AddressSpace>>,
        subscriptions: Arc<SubscriptionCache>,
        token: CancellationToken,
    ) -> SessionController {
        let channel = SecureChannel::new(Role::Server, info.config.decoding_options());
        let message_handler = MessageHandler::new(info.clone(), address_space, subscriptions);
        SessionController {
            transport,
            channel,
            info,
            session_manager,
            message_handler,
            token,
            pending: FuturesUnordered::new(),
            client_certificate: ByteString::null(),
        }
    }

    /// Run until the connection closes.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    self.transport.enqueue_error(ErrorMessage::new(
                        StatusCode::BadServerHalted,
                        "Server shutting down",
                    ));
                    self.transport.set_closing();
                }
                Some(response) = self.pending.next(), if !self.pending.is_empty() => {
                    if let Err(e) = self.transport.enqueue_message_for_send(
                        &mut self.channel,
                        response.message,
                        response.request_id,
                    ) {
                        error!("Fatal error sending a response: {}", e);
                        break;
                    }
                }
                poll = self.transport.poll(&mut self.channel) => {
                    match poll {
                        TransportPollResult::OutgoingMessageSent
                        | TransportPollResult::IncomingChunk => {}
                        TransportPollResult::IncomingMessage(request) => {
                            self.handle_request(request);
                        }
                        TransportPollResult::RecoverableError(status, request_id, request_handle) => {
                            debug!("Recoverable error {} on request {}", status, request_id);
                            let fault = ServiceFault {
                                response_header: ResponseHeader::new_service_result(
                                    request_handle,
                                    status,
                                ),
                            };
                            let _ = self.transport.enqueue_message_for_send(
                                &mut self.channel,
                                fault.into(),
                                request_id,
                            );
                        }
                        TransportPollResult::Error(status) => {
                            ServerDiagnostics::increment(
                                &self.info.diagnostics.rejected_requests_count,
                            );
                            if status == StatusCode::BadSecurityChecksFailed
                                || status == StatusCode::BadSecureChannelTokenUnknown
                            {
                                ServerDiagnostics::increment(
                                    &self.info.diagnostics.security_rejected_requests_count,
                                );
                            }
                            error!("Fatal transport error: {}", status);
                            self.transport
                                .enqueue_error(ErrorMessage::new(status, "Fatal channel error"));
                            self.transport.set_closing();
                        }
                        TransportPollResult::Closed => break,
                    }
                }
            }
        }

        // Sessions bound to this channel survive as ChannelLost until
        // their own timeout fires.
        let channel_id = self.channel.secure_channel_id();
        self.session_manager.write().on_channel_closed(channel_id);
        info!("Connection on channel {} closed", channel_id);
    }

    fn handle_request(&mut self, request: Request) {
        let request_id = request.request_id;
        match request.message {
            RequestMessage::OpenSecureChannel(open) => {
                let response = self.open_secure_channel(&open);
                let message = match response {
                    Ok(response) => ResponseMessage::from(response),
                    Err(status) => {
                        ServiceFault::new(open.request_header.request_handle, status).into()
                    }
                };
                let _ = self
                    .transport
                    .enqueue_message_for_send(&mut self.channel, message, request_id);
            }
            RequestMessage::CloseSecureChannel(_) => {
                // No response; queued messages drain, then the socket
                // closes.
                debug!("Closing secure channel {}", self.channel.secure_channel_id());
                self.transport.set_closing();
            }
            message => {
                if !self.channel.is_open() {
                    self.fatal(StatusCode::BadSecureChannelIdInvalid);
                    return;
                }
                if self.channel.token_has_expired() {
                    self.fatal(StatusCode::BadSecureChannelTokenUnknown);
                    return;
                }
                self.handle_service(message, request_id);
            }
        }
    }

    fn fatal(&mut self, status: StatusCode) {
        ServerDiagnostics::increment(&self.info.diagnostics.security_rejected_requests_count);
        self.transport
            .enqueue_error(ErrorMessage::new(status, "Channel is not usable"));
        self.transport.set_closing();
    }

    fn open_secure_channel(
        &mut self,
        request: &OpenSecureChannelRequest,
    ) -> Result<OpenSecureChannelResponse, StatusCode> {
        if request.security_mode != MessageSecurityMode::None {
            // Signed and encrypted modes live behind the SecurityPolicy
            // seam and are not available on this build.
            return Err(StatusCode::BadSecurityModeRejected);
        }
        match request.request_type {
            SecurityTokenRequestType::Issue => {
                if self.channel.is_open() {
                    return Err(StatusCode::BadInvalidState);
                }
                self.channel.set_security_policy(SecurityPolicy::None);
                self.channel.set_security_mode(MessageSecurityMode::None);
            }
            SecurityTokenRequestType::Renew => {
                if !self.channel.is_open() {
                    return Err(StatusCode::BadSecureChannelIdInvalid);
                }
            }
        }

        let channel_id = if self.channel.is_open() {
            self.channel.secure_channel_id()
        } else {
            // Channel ids are unique across the whole server process.
            self.info.id_handles.secure_channel_id.next()
        };
        self.channel.set_remote_nonce(request.client_nonce.clone());
        self.channel.create_random_nonce();
        let security_token = self.channel.create_token(
            channel_id,
            request.requested_lifetime,
            self.info.config.limits.max_token_lifetime_ms,
        );
        info!(
            "Secure channel {} token {} issued, lifetime {} ms",
            channel_id, security_token.token_id, security_token.revised_lifetime
        );

        Ok(OpenSecureChannelResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            server_protocol_version: 0,
            security_token,
            server_nonce: self.channel.local_nonce().clone(),
        })
    }

    fn handle_service(&mut self, message: RequestMessage, request_id: u32) {
        let request_handle = message.request_header().request_handle;
        let channel_id = self.channel.secure_channel_id();

        // Discovery services need no session at all.
        let message = match message {
            RequestMessage::GetEndpoints(request) => {
                self.respond(Response {
                    message: uastack_types::GetEndpointsResponse {
                        response_header: ResponseHeader::new_good(&request.request_header),
                        endpoints: Some(self.info.endpoint_descriptions()),
                    }
                    .into(),
                    request_id,
                });
                return;
            }
            RequestMessage::FindServers(request) => {
                self.respond(Response {
                    message: uastack_types::FindServersResponse {
                        response_header: ResponseHeader::new_good(&request.request_header),
                        servers: Some(vec![self.info.application_description()]),
                    }
                    .into(),
                    request_id,
                });
                return;
            }
            // Session management services talk to the manager directly.
            RequestMessage::CreateSession(request) => {
                let result = self.session_manager.write().create_session(
                    channel_id,
                    &request,
                    self.message_handler.subscriptions(),
                );
                self.respond(
                    Response::from_result(result, request_handle, request_id),
                );
                return;
            }
            RequestMessage::ActivateSession(request) => {
                let result = self.session_manager.write().activate_session(
                    channel_id,
                    &self.client_certificate,
                    &request,
                    self.message_handler.subscriptions(),
                );
                self.respond(
                    Response::from_result(result, request_handle, request_id),
                );
                return;
            }
            RequestMessage::CloseSession(request) => {
                let result = self.session_manager.write().close_session(
                    channel_id,
                    &request,
                    self.message_handler.subscriptions(),
                );
                self.respond(
                    Response::from_result(result, request_handle, request_id),
                );
                return;
            }
            message => message,
        };

        // Everything else needs an activated session found by its
        // authentication token.
        let token = &message.request_header().authentication_token;
        let session = self.session_manager.read().find_by_token(token);
        let Some(session) = session else {
            ServerDiagnostics::increment(&self.info.diagnostics.rejected_requests_count);
            self.respond(Response {
                message: ServiceFault::new(request_handle, StatusCode::BadSessionIdInvalid).into(),
                request_id,
            });
            return;
        };
        let session_id = {
            let mut locked = session.write();
            if !locked.is_activated() {
                drop(locked);
                self.respond(Response {
                    message: ServiceFault::new(request_handle, StatusCode::BadSessionNotActivated)
                        .into(),
                    request_id,
                });
                return;
            }
            // Every valid request resets the session's watchdog.
            locked.notify_activity();
            locked.session_id_numeric()
        };

        match self
            .message_handler
            .handle_message(message, session, session_id, request_id)
        {
            HandleMessageResult::SyncMessage(response) => self.respond(response),
            HandleMessageResult::AsyncMessage(handle) => {
                self.pending.push(Box::pin(async move {
                    match handle.await {
                        Ok(response) => response,
                        Err(e) => {
                            // A panicking handler is isolated to its
                            // request.
                            error!("Service handler failed: {}", e);
                            Response {
                                message: ServiceFault::new(
                                    request_handle,
                                    StatusCode::BadInternalError,
                                )
                                .into(),
                                request_id,
                            }
                        }
                    }
                }));
            }
            HandleMessageResult::PublishResponse(pending) => {
                self.pending.push(Box::pin(pending.recv()));
            }
        }
    }

    fn respond(&mut self, response: Response) {
        let _ = self.transport.enqueue_message_for_send(
            &mut self.channel,
            response.message,
            response.request_id,
        );
    }
}
