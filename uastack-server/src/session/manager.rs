//! Manages all sessions on the server: creation with admission control,
//! token lookup, activation, close, and the timeout watchdog sweep.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use hashbrown::HashMap;
use log::{error, info, warn};
use parking_lot::RwLock;
use rand::RngCore;
use uastack_types::{
    ActivateSessionRequest, ActivateSessionResponse, ByteString, CloseSessionRequest,
    CloseSessionResponse, CreateSessionRequest, CreateSessionResponse, NodeId, ResponseHeader,
    SignatureData, StatusCode,
};

use crate::{
    authenticator::{Authenticator, IdentityToken},
    info::ServerInfo,
    subscriptions::SubscriptionCache,
};

use super::instance::{CloseReason, Session, SessionState};

/// The floor on any granted session timeout.
const MIN_SESSION_TIMEOUT_MS: u64 = 10_000;

/// Manages all sessions on the server.
pub struct SessionManager {
    sessions: HashMap<NodeId, Arc<RwLock<Session>>>,
    info: Arc<ServerInfo>,
}

impl SessionManager {
    /// Create an empty session table.
    pub fn new(info: Arc<ServerInfo>) -> SessionManager {
        SessionManager {
            sessions: HashMap::new(),
            info,
        }
    }

    /// Get a session by its authentication token.
    pub fn find_by_token(&self, authentication_token: &NodeId) -> Option<Arc<RwLock<Session>>> {
        self.sessions
            .values()
            .find(|s| s.read().authentication_token() == authentication_token)
            .cloned()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no sessions exist.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // Find a session to evict when the table is full: the oldest
    // inactive one, else the oldest that never activated.
    fn eviction_candidate(&self) -> Option<NodeId> {
        let mut inactive: Option<(Instant, NodeId)> = None;
        let mut never_activated: Option<(Instant, NodeId)> = None;
        for session in self.sessions.values() {
            let session = session.read();
            let key = (session.deadline(), session.session_id().clone());
            match session.state() {
                SessionState::ChannelLost | SessionState::Closed | SessionState::Disposed => {
                    if inactive.as_ref().map_or(true, |(d, _)| key.0 < *d) {
                        inactive = Some(key);
                    }
                }
                SessionState::New => {
                    if never_activated.as_ref().map_or(true, |(d, _)| key.0 < *d) {
                        never_activated = Some(key);
                    }
                }
                SessionState::Active => {}
            }
        }
        inactive.or(never_activated).map(|(_, id)| id)
    }

    /// Create a session. When the table is full the oldest inactive
    /// session is evicted first; with none available the request fails
    /// with `BadTooManySessions`.
    pub fn create_session(
        &mut self,
        secure_channel_id: u32,
        request: &CreateSessionRequest,
        subscriptions: &SubscriptionCache,
    ) -> Result<CreateSessionResponse, StatusCode> {
        if request.endpoint_url.is_null() {
            error!("CreateSession with a null endpoint url");
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        }
        if !self.info.is_endpoint_url_valid(request.endpoint_url.as_ref()) {
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        }

        if self.sessions.len() >= self.info.config.limits.max_sessions {
            match self.eviction_candidate() {
                Some(id) => {
                    warn!("Session table full, evicting inactive session {}", id);
                    let numeric = self
                        .sessions
                        .get(&id)
                        .map(|s| s.read().session_id_numeric());
                    self.remove_session(&id, CloseReason::Forcing, subscriptions);
                    if let Some(numeric) = numeric {
                        subscriptions.on_session_closed(numeric, false, &self.info.diagnostics);
                    }
                }
                None => {
                    crate::diagnostics::ServerDiagnostics::increment(
                        &self.info.diagnostics.rejected_session_count,
                    );
                    return Err(StatusCode::BadTooManySessions);
                }
            }
        }

        let session_timeout_ms = (request.requested_session_timeout as u64).clamp(
            MIN_SESSION_TIMEOUT_MS,
            self.info.config.limits.max_session_timeout_ms,
        );

        // The authentication token is an opaque random byte string; the
        // session id is a numeric id in the server's namespace.
        let mut token_bytes = vec![0u8; 16];
        rand::thread_rng().fill_bytes(&mut token_bytes);
        let authentication_token = NodeId::new(0, ByteString::from(token_bytes));
        let session_id_numeric = self.info.id_handles.session_id.next();
        let session_id = NodeId::new(1, session_id_numeric);

        let server_nonce = {
            let mut nonce = vec![0u8; 32];
            rand::thread_rng().fill_bytes(&mut nonce);
            ByteString::from(nonce)
        };

        let session = Session::create(
            session_id.clone(),
            session_id_numeric,
            authentication_token.clone(),
            Duration::from_millis(session_timeout_ms),
            secure_channel_id,
            request.endpoint_url.clone(),
            request.session_name.clone(),
            request.client_description.clone(),
            request.client_certificate.clone(),
            server_nonce.clone(),
        );
        info!("Created session {} for {}", session_id, request.session_name);
        self.sessions
            .insert(session_id.clone(), Arc::new(RwLock::new(session)));
        self.info.diagnostics.on_create_session();

        Ok(CreateSessionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            session_id,
            authentication_token,
            revised_session_timeout: session_timeout_ms as f64,
            server_nonce,
            server_certificate: ByteString::null(),
            server_endpoints: Some(self.info.endpoint_descriptions()),
            server_software_certificates: None,
            server_signature: SignatureData::null(),
            max_request_message_size: self.info.config.transport.max_message_size as u32,
        })
    }

    /// Activate a session: validate the identity token and bind the
    /// session to the calling channel.
    pub fn activate_session(
        &mut self,
        secure_channel_id: u32,
        channel_client_certificate: &ByteString,
        request: &ActivateSessionRequest,
        subscriptions: &SubscriptionCache,
    ) -> Result<ActivateSessionResponse, StatusCode> {
        let Some(session_lock) =
            self.find_by_token(&request.request_header.authentication_token)
        else {
            return Err(StatusCode::BadSessionIdInvalid);
        };

        let identity = IdentityToken::new(
            &request.user_identity_token,
            &self.info.config.decoding_options(),
        );
        let user_token = Authenticator::new(&self.info.config).authenticate(&identity)?;

        let mut session = session_lock.write();
        if session.state() == SessionState::Closed || session.state() == SessionState::Disposed {
            return Err(StatusCode::BadSessionClosed);
        }
        if session.deadline() < Instant::now() {
            return Err(StatusCode::BadSessionIdInvalid);
        }

        if session.secure_channel_id() != secure_channel_id {
            if !session.is_activated() {
                // A session that never activated is pinned to the channel
                // that created it.
                error!(
                    "ActivateSession on channel {} but the session was created on {}",
                    secure_channel_id,
                    session.secure_channel_id()
                );
                return Err(StatusCode::BadSecureChannelIdInvalid);
            }
            // Re-binding onto a new channel requires the same client
            // application identity.
            if session.client_certificate() != channel_client_certificate {
                crate::diagnostics::ServerDiagnostics::increment(
                    &self.info.diagnostics.security_rejected_requests_count,
                );
                return Err(StatusCode::BadApplicationSignatureInvalid);
            }
        }

        let server_nonce = {
            let mut nonce = vec![0u8; 32];
            rand::thread_rng().fill_bytes(&mut nonce);
            ByteString::from(nonce)
        };
        session.activate(
            secure_channel_id,
            server_nonce.clone(),
            user_token.clone(),
            request.locale_ids.clone(),
        );
        subscriptions.ensure_session(session.session_id_numeric(), &user_token);
        info!("Activated session {}", session.session_id());

        Ok(ActivateSessionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            server_nonce,
            results: None,
            diagnostic_infos: None,
        })
    }

    /// Close a session on the client's request.
    pub fn close_session(
        &mut self,
        secure_channel_id: u32,
        request: &CloseSessionRequest,
        subscriptions: &SubscriptionCache,
    ) -> Result<CloseSessionResponse, StatusCode> {
        let Some(session_lock) =
            self.find_by_token(&request.request_header.authentication_token)
        else {
            return Err(StatusCode::BadSessionIdInvalid);
        };
        let (session_id, session_id_numeric) = {
            let session = session_lock.read();
            if !session.is_activated() && session.secure_channel_id() != secure_channel_id {
                error!(
                    "CloseSession on channel {} rejected, inactive session belongs to channel {}",
                    secure_channel_id,
                    session.secure_channel_id()
                );
                return Err(StatusCode::BadSecureChannelIdInvalid);
            }
            (session.session_id().clone(), session.session_id_numeric())
        };

        info!("Closing session {}", session_id);
        self.remove_session(&session_id, CloseReason::CloseSession, subscriptions);
        subscriptions.on_session_closed(
            session_id_numeric,
            request.delete_subscriptions,
            &self.info.diagnostics,
        );

        Ok(CloseSessionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
        })
    }

    fn remove_session(
        &mut self,
        session_id: &NodeId,
        reason: CloseReason,
        _subscriptions: &SubscriptionCache,
    ) {
        if let Some(session) = self.sessions.remove(session_id) {
            let mut session = session.write();
            session.close(reason);
            session.dispose();
            self.info.diagnostics.on_destroy_session();
        }
    }

    /// Sweep for expired sessions. Returns the next deadline to check at
    /// and the sessions that expired. Expired sessions keep their
    /// subscriptions: those live on in the orphanage until they expire
    /// individually.
    pub fn check_session_expiry(&self) -> (Instant, Vec<NodeId>) {
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut next_deadline =
            now + Duration::from_millis(self.info.config.limits.max_session_timeout_ms);
        for (id, session) in &self.sessions {
            let deadline = session.read().deadline();
            if deadline < now {
                expired.push(id.clone());
            } else if deadline < next_deadline {
                next_deadline = deadline;
            }
        }
        (next_deadline, expired)
    }

    /// Expire one session found by the watchdog.
    pub fn expire_session(&mut self, session_id: &NodeId, subscriptions: &SubscriptionCache) {
        let Some(session_lock) = self.sessions.get(session_id) else {
            return;
        };
        let session_id_numeric = session_lock.read().session_id_numeric();
        info!(
            "Session {} timed out; its subscriptions remain until they expire individually",
            session_id
        );
        crate::diagnostics::ServerDiagnostics::increment(
            &self.info.diagnostics.session_timeout_count,
        );
        self.remove_session(session_id, CloseReason::Timeout, subscriptions);
        subscriptions.on_session_closed(session_id_numeric, false, &self.info.diagnostics);
    }

    /// A transport died. Sessions bound to its channel drop to
    /// ChannelLost and survive until their timeout.
    pub fn on_channel_closed(&mut self, secure_channel_id: u32) {
        for session in self.sessions.values() {
            let mut session = session.write();
            if session.secure_channel_id() == secure_channel_id {
                session.on_channel_lost();
            }
        }
    }
}
