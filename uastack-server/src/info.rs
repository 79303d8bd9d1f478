//! Shared server state: configuration, identity counters and diagnostics.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use arc_swap::ArcSwap;
use uastack_types::{
    ApplicationDescription, ApplicationType, BuildInfo, DateTime, EndpointDescription,
    MessageSecurityMode, ServerState, UAString, UserTokenPolicy,
};

use crate::{config::ServerConfig, diagnostics::ServerDiagnostics};

/// A monotonic id counter. Seeded from a random base at startup so ids
/// never collide with ones a lingering client remembers from a previous
/// run.
#[derive(Debug)]
pub struct IdHandle(AtomicU32);

impl IdHandle {
    /// Create a counter starting at a random base.
    pub fn random() -> IdHandle {
        use rand::Rng;
        IdHandle(AtomicU32::new(rand::thread_rng().gen_range(1..0x0FFF_FFFF)))
    }

    /// Take the next id.
    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// All engine-scoped id counters, one object per server instance.
#[derive(Debug)]
pub struct IdHandles {
    /// Secure channel ids.
    pub secure_channel_id: IdHandle,
    /// Session numeric ids.
    pub session_id: IdHandle,
    /// Subscription ids. Server-global so subscriptions can move between
    /// sessions.
    pub subscription_id: IdHandle,
    /// Monitored item ids.
    pub monitored_item_id: IdHandle,
}

impl Default for IdHandles {
    fn default() -> Self {
        IdHandles {
            secure_channel_id: IdHandle::random(),
            session_id: IdHandle::random(),
            subscription_id: IdHandle::random(),
            monitored_item_id: IdHandle::random(),
        }
    }
}

/// Immutable-ish server state shared by every connection.
pub struct ServerInfo {
    /// The configuration the server was built from.
    pub config: ServerConfig,
    /// When the server started.
    pub start_time: DateTime,
    /// Current server state, swapped atomically.
    pub state: ArcSwap<ServerState>,
    /// Id counters.
    pub id_handles: IdHandles,
    /// Diagnostics counters.
    pub diagnostics: Arc<ServerDiagnostics>,
}

impl ServerInfo {
    /// Build shared state from a configuration.
    pub fn new(config: ServerConfig) -> ServerInfo {
        ServerInfo {
            config,
            start_time: DateTime::now(),
            state: ArcSwap::from_pointee(ServerState::Running),
            id_handles: IdHandles::default(),
            diagnostics: Arc::new(ServerDiagnostics::default()),
        }
    }

    /// The server's current state.
    pub fn state(&self) -> ServerState {
        **self.state.load()
    }

    /// Change the server state.
    pub fn set_state(&self, state: ServerState) {
        self.state.store(Arc::new(state));
    }

    /// The application description presented in endpoints and sessions.
    pub fn application_description(&self) -> ApplicationDescription {
        ApplicationDescription {
            application_uri: self.config.application_uri.as_str().into(),
            product_uri: self.config.product_uri.as_str().into(),
            application_name: self.config.application_name.as_str().into(),
            application_type: ApplicationType::Server,
            gateway_server_uri: UAString::null(),
            discovery_profile_uri: UAString::null(),
            discovery_urls: Some(vec![self.config.endpoint.url().into()]),
        }
    }

    /// The endpoints this server exposes for a requested url.
    pub fn endpoint_descriptions(&self) -> Vec<EndpointDescription> {
        let mut user_identity_tokens = Vec::new();
        if self.config.allow_anonymous {
            user_identity_tokens.push(UserTokenPolicy::anonymous());
        }
        if !self.config.users.is_empty() {
            user_identity_tokens.push(UserTokenPolicy::username());
        }
        vec![EndpointDescription {
            endpoint_url: self.config.endpoint.url().into(),
            server: self.application_description(),
            server_certificate: Default::default(),
            security_mode: MessageSecurityMode::None,
            security_policy_uri: uastack_core::comms::security_policy::SECURITY_POLICY_NONE_URI
                .into(),
            user_identity_tokens: Some(user_identity_tokens),
            transport_profile_uri:
                "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary".into(),
            security_level: 0,
        }]
    }

    /// True if `endpoint_url` names this server's endpoint, ignoring the
    /// host portion since clients may use any name that resolves here.
    pub fn is_endpoint_url_valid(&self, endpoint_url: &str) -> bool {
        let Some(rest) = endpoint_url.strip_prefix("opc.tcp://") else {
            return false;
        };
        let path = rest.find('/').map(|i| &rest[i..]).unwrap_or("/");
        path == self.config.endpoint.path
    }

    /// Build information exposed through ServerStatus.
    pub fn build_info(&self) -> BuildInfo {
        BuildInfo {
            product_uri: self.config.product_uri.as_str().into(),
            manufacturer_name: "uastack".into(),
            product_name: self.config.application_name.as_str().into(),
            software_version: env!("CARGO_PKG_VERSION").into(),
            build_number: env!("CARGO_PKG_VERSION").into(),
            build_date: self.start_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ServerInfo;
    use crate::config::ServerConfig;

    #[test]
    fn endpoint_url_matching() {
        let info = ServerInfo::new(ServerConfig::new("s", "urn:s"));
        assert!(info.is_endpoint_url_valid("opc.tcp://localhost:4840/"));
        assert!(info.is_endpoint_url_valid("opc.tcp://10.0.0.5:4840"));
        assert!(!info.is_endpoint_url_valid("http://localhost:4840/"));
        assert!(!info.is_endpoint_url_valid("opc.tcp://localhost:4840/other"));
    }

    #[test]
    fn id_handles_are_monotonic() {
        let info = ServerInfo::new(ServerConfig::new("s", "urn:s"));
        let a = info.id_handles.subscription_id.next();
        let b = info.id_handles.subscription_id.next();
        assert_eq!(b, a + 1);
    }
}
