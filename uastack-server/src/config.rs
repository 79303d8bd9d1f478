//! Server configuration, loadable from a YAML file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uastack_types::encoding::DecodingOptions;

fn default_port() -> u16 {
    4840
}

fn default_path() -> String {
    "/".to_string()
}

/// The TCP endpoint the server listens on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Host name or address to bind.
    pub host: String,
    /// Port to bind, 4840 by default.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path component of the endpoint url.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            host: "localhost".to_string(),
            port: default_port(),
            path: default_path(),
        }
    }
}

impl EndpointConfig {
    /// The endpoint url in `opc.tcp://host:port/path` form.
    pub fn url(&self) -> String {
        format!("opc.tcp://{}:{}{}", self.host, self.port, self.path)
    }
}

/// Limits on transport framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportLimits {
    /// Largest chunk accepted from a client.
    pub receive_buffer_size: usize,
    /// Largest chunk sent to a client.
    pub send_buffer_size: usize,
    /// Largest whole message, 0 for no limit.
    pub max_message_size: usize,
    /// Most chunks per message, 0 for no limit.
    pub max_chunk_count: usize,
    /// How long a fresh connection may take to send its HELLO, in ms.
    pub hello_timeout_ms: u64,
}

impl Default for TransportLimits {
    fn default() -> Self {
        TransportLimits {
            receive_buffer_size: 65536,
            send_buffer_size: 65536,
            max_message_size: uastack_types::constants::MAX_MESSAGE_SIZE,
            max_chunk_count: uastack_types::constants::MAX_CHUNK_COUNT,
            hello_timeout_ms: 5_000,
        }
    }
}

/// Limits on subscriptions and monitored items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionLimits {
    /// Most subscriptions alive on the whole server.
    pub max_subscriptions: usize,
    /// Most subscriptions per session.
    pub max_subscriptions_per_session: usize,
    /// Most monitored items on one subscription, 0 for no limit.
    pub max_monitored_items_per_subscription: usize,
    /// Most parked publish requests per session.
    pub max_publish_requests_per_session: usize,
    /// Smallest publishing interval the server grants, in ms.
    pub min_publishing_interval_ms: f64,
    /// Smallest sampling interval the server grants, in ms.
    pub min_sampling_interval_ms: f64,
    /// Largest sampling interval the server grants, in ms.
    pub max_sampling_interval_ms: f64,
    /// Largest monitored item queue the server grants.
    pub max_queue_size: usize,
    /// Default lifetime count when a client requests 0.
    pub default_lifetime_count: u32,
    /// Default keep-alive count when a client requests 0.
    pub default_keep_alive_count: u32,
    /// Largest keep-alive count the server grants.
    pub max_keep_alive_count: u32,
    /// Largest lifetime count the server grants.
    pub max_lifetime_count: u32,
    /// Cap on notifications in one publish response, 0 for no cap.
    pub max_notifications_per_publish: usize,
    /// Upper bound on a durable subscription lifetime, in hours.
    pub max_durable_lifetime_hours: u32,
}

impl Default for SubscriptionLimits {
    fn default() -> Self {
        SubscriptionLimits {
            max_subscriptions: 100,
            max_subscriptions_per_session: 10,
            max_monitored_items_per_subscription: 1000,
            max_publish_requests_per_session: 8,
            min_publishing_interval_ms: 100.0,
            min_sampling_interval_ms: 10.0,
            max_sampling_interval_ms: 3_600_000.0,
            max_queue_size: 1000,
            default_lifetime_count: 300,
            default_keep_alive_count: 10,
            max_keep_alive_count: 30_000,
            max_lifetime_count: 90_000,
            max_notifications_per_publish: 0,
            max_durable_lifetime_hours: 2400,
        }
    }
}

/// Operational limits on service calls and sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerLimits {
    /// Most concurrent sessions.
    pub max_sessions: usize,
    /// Largest session timeout the server grants, in ms.
    pub max_session_timeout_ms: u64,
    /// Most browse continuation points per session.
    pub max_browse_continuation_points: usize,
    /// Most references returned per node in one browse.
    pub max_references_per_node: usize,
    /// Most operations in one service call, 0 for no limit.
    pub max_operations_per_call: usize,
    /// How long a parked publish request waits before completing with a
    /// timeout, in ms, when the client supplied no hint.
    pub publish_timeout_default_ms: u64,
    /// Largest secure channel token lifetime the server grants, in ms.
    pub max_token_lifetime_ms: u32,
}

impl Default for ServerLimits {
    fn default() -> Self {
        ServerLimits {
            max_sessions: 100,
            max_session_timeout_ms: 3_600_000,
            max_browse_continuation_points: 10,
            max_references_per_node: 1000,
            max_operations_per_call: 10_000,
            publish_timeout_default_ms: 30_000,
            max_token_lifetime_ms: 3_600_000,
        }
    }
}

/// A user allowed to activate sessions with a user name token.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerUser {
    /// The user name.
    pub user: String,
    /// The password, stored in the clear; real deployments hook an
    /// external authenticator instead.
    pub password: String,
}

/// The whole server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Application name presented to clients.
    pub application_name: String,
    /// Application instance URI.
    pub application_uri: String,
    /// Product URI.
    pub product_uri: String,
    /// The endpoint to listen on.
    pub endpoint: EndpointConfig,
    /// Transport limits.
    pub transport: TransportLimits,
    /// Session and service limits.
    pub limits: ServerLimits,
    /// Subscription limits.
    pub subscriptions: SubscriptionLimits,
    /// Whether anonymous activation is allowed.
    pub allow_anonymous: bool,
    /// Users accepted for user name activation.
    pub users: Vec<ServerUser>,
}

impl ServerConfig {
    /// A configuration suitable for tests and samples: localhost, default
    /// port, anonymous access.
    pub fn new(application_name: &str, application_uri: &str) -> ServerConfig {
        ServerConfig {
            application_name: application_name.to_string(),
            application_uri: application_uri.to_string(),
            product_uri: application_uri.to_string(),
            allow_anonymous: true,
            ..Default::default()
        }
    }

    /// Load the configuration from a YAML file.
    pub fn load(path: &Path) -> Result<ServerConfig, String> {
        let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    }

    /// Save the configuration to a YAML file.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = serde_yaml::to_string(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())
    }

    /// Decoding limits derived from the transport configuration.
    pub fn decoding_options(&self) -> DecodingOptions {
        DecodingOptions {
            max_message_size: self.transport.max_message_size,
            max_chunk_count: self.transport.max_chunk_count,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ServerConfig;

    #[test]
    fn yaml_round_trip() {
        let config = ServerConfig::new("test-server", "urn:test-server");
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: ServerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.application_name, "test-server");
        assert_eq!(parsed.endpoint.url(), "opc.tcp://localhost:4840/");
        assert!(parsed.allow_anonymous);
    }
}
