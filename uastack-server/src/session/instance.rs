//! A single session: identity, lifecycle state and per-session resources
//! such as browse continuation points.

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use uastack_types::{
    ApplicationDescription, ByteString, NodeId, ReferenceDescription, UAString,
};

use crate::authenticator::UserToken;

/// The lifecycle state of a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not yet activated.
    New,
    /// Activated and usable.
    Active,
    /// The owning channel died; the session survives until its timeout
    /// expires or a client re-binds it via ActivateSession.
    ChannelLost,
    /// Closed, resources released.
    Closed,
    /// Terminal, only kept for diagnostics.
    Disposed,
}

/// Why a session was closed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The session timed out without activity.
    Timeout,
    /// The server is shutting down or force-closing.
    Terminated,
    /// The client sent CloseSession.
    CloseSession,
    /// The session was evicted to admit a new one.
    Forcing,
}

/// An unfinished browse, continued via BrowseNext.
pub struct BrowseContinuationPoint {
    /// References not yet returned.
    pub remaining: Vec<ReferenceDescription>,
    /// The per-response cap that applied to the original browse.
    pub max_references: usize,
}

/// One session and everything scoped to it.
pub struct Session {
    session_id: NodeId,
    session_id_numeric: u32,
    authentication_token: NodeId,
    session_timeout: Duration,
    state: SessionState,
    last_activity: Instant,
    secure_channel_id: u32,
    endpoint_url: UAString,
    session_name: UAString,
    client_description: ApplicationDescription,
    client_certificate: ByteString,
    session_nonce: ByteString,
    user_token: Option<UserToken>,
    locale_ids: Option<Vec<UAString>>,
    continuation_points: HashMap<ByteString, BrowseContinuationPoint>,
}

impl Session {
    /// Create a session in the New state.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        session_id: NodeId,
        session_id_numeric: u32,
        authentication_token: NodeId,
        session_timeout: Duration,
        secure_channel_id: u32,
        endpoint_url: UAString,
        session_name: UAString,
        client_description: ApplicationDescription,
        client_certificate: ByteString,
        session_nonce: ByteString,
    ) -> Session {
        Session {
            session_id,
            session_id_numeric,
            authentication_token,
            session_timeout,
            state: SessionState::New,
            last_activity: Instant::now(),
            secure_channel_id,
            endpoint_url,
            session_name,
            client_description,
            client_certificate,
            session_nonce,
            user_token: None,
            locale_ids: None,
            continuation_points: HashMap::new(),
        }
    }

    /// The public session id.
    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    /// The numeric form of the session id.
    pub fn session_id_numeric(&self) -> u32 {
        self.session_id_numeric
    }

    /// The secret authentication token.
    pub fn authentication_token(&self) -> &NodeId {
        &self.authentication_token
    }

    /// The session's name as supplied by the client.
    pub fn session_name(&self) -> &UAString {
        &self.session_name
    }

    /// The endpoint url the session was created against.
    pub fn endpoint_url(&self) -> &UAString {
        &self.endpoint_url
    }

    /// The client's application description.
    pub fn client_description(&self) -> &ApplicationDescription {
        &self.client_description
    }

    /// The client certificate presented at creation, null without
    /// security.
    pub fn client_certificate(&self) -> &ByteString {
        &self.client_certificate
    }

    /// The nonce issued to the client for its next proof.
    pub fn session_nonce(&self) -> &ByteString {
        &self.session_nonce
    }

    /// Replace the session nonce.
    pub fn set_session_nonce(&mut self, nonce: ByteString) {
        self.session_nonce = nonce;
    }

    /// The channel the session is bound to.
    pub fn secure_channel_id(&self) -> u32 {
        self.secure_channel_id
    }

    /// The session's lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The validated user, present once activated.
    pub fn user_token(&self) -> Option<&UserToken> {
        self.user_token.as_ref()
    }

    /// The client's preferred locales.
    pub fn locale_ids(&self) -> Option<&Vec<UAString>> {
        self.locale_ids.as_ref()
    }

    /// True once ActivateSession succeeded at least once.
    pub fn is_activated(&self) -> bool {
        matches!(self.state, SessionState::Active | SessionState::ChannelLost)
    }

    /// Activate the session, binding user identity and channel.
    pub fn activate(
        &mut self,
        secure_channel_id: u32,
        server_nonce: ByteString,
        user_token: UserToken,
        locale_ids: Option<Vec<UAString>>,
    ) {
        self.state = SessionState::Active;
        self.secure_channel_id = secure_channel_id;
        self.session_nonce = server_nonce;
        self.user_token = Some(user_token);
        self.locale_ids = locale_ids;
        self.notify_activity();
    }

    /// Record a valid service request, resetting the timeout watchdog.
    pub fn notify_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    /// The instant the watchdog fires if no further activity arrives.
    pub fn deadline(&self) -> Instant {
        self.last_activity + self.session_timeout
    }

    /// The revised session timeout.
    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// The owning transport died. The session is not closed until the
    /// timeout expires without a re-bind.
    pub fn on_channel_lost(&mut self) {
        if self.state == SessionState::Active {
            self.state = SessionState::ChannelLost;
        }
    }

    /// Close the session. Continuation points die with it.
    pub fn close(&mut self, _reason: CloseReason) {
        self.state = SessionState::Closed;
        self.continuation_points.clear();
    }

    /// Move a closed session to its terminal state.
    pub fn dispose(&mut self) {
        self.state = SessionState::Disposed;
    }

    /// Store a continuation point, enforcing the per-session cap. Returns
    /// the id, or None when the cap is reached.
    pub fn store_continuation_point(
        &mut self,
        point: BrowseContinuationPoint,
        max_continuation_points: usize,
    ) -> Option<ByteString> {
        if self.continuation_points.len() >= max_continuation_points {
            return None;
        }
        use rand::RngCore;
        let mut id = vec![0u8; 16];
        rand::thread_rng().fill_bytes(&mut id);
        let id = ByteString::from(id);
        self.continuation_points.insert(id.clone(), point);
        Some(id)
    }

    /// Take a continuation point by id.
    pub fn take_continuation_point(&mut self, id: &ByteString) -> Option<BrowseContinuationPoint> {
        self.continuation_points.remove(id)
    }
}
