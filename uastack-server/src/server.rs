//! The server front-end: wiring of the engines, the standard method
//! bindings, the listener and the periodic drivers.

use std::{sync::Arc, time::Duration};

use log::{error, info};
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use uastack_types::{
    Array, ExtensionObject, LocalizedText, ServerState, ServerStatusDataType, StatusCode,
    UAString, VariableId, Variant, VariantScalarTypeId,
};

use crate::{
    address_space::{AddressSpace, MethodContext},
    config::ServerConfig,
    info::ServerInfo,
    session::{controller::SessionController, manager::SessionManager},
    subscriptions::SubscriptionCache,
    transport::{TcpConnector, TransportConfig},
};

/// How often the publish driver ticks the subscription engine.
const SUBSCRIPTION_TICK_MS: u64 = 10;
/// How often the server status variables are refreshed.
const STATUS_REFRESH_MS: u64 = 1_000;

/// An OPC UA server instance.
pub struct Server {
    info: Arc<ServerInfo>,
    address_space: Arc<RwLock<AddressSpace>>,
    subscriptions: Arc<SubscriptionCache>,
    session_manager: Arc<RwLock<SessionManager>>,
    token: CancellationToken,
}

impl Server {
    /// Build a server from its configuration. The address space holds the
    /// core namespace; callers add their own nodes before `run`.
    pub fn new(config: ServerConfig) -> Server {
        let subscriptions = Arc::new(SubscriptionCache::new(config.subscriptions.clone()));
        let info = Arc::new(ServerInfo::new(config));
        let address_space = Arc::new(RwLock::new(AddressSpace::new()));
        let session_manager = Arc::new(RwLock::new(SessionManager::new(info.clone())));

        let server = Server {
            info,
            address_space,
            subscriptions,
            session_manager,
            token: CancellationToken::new(),
        };
        server.populate_server_state();
        server.bind_standard_methods();
        server
    }

    /// The shared server state.
    pub fn info(&self) -> &Arc<ServerInfo> {
        &self.info
    }

    /// The address space, for adding application nodes.
    pub fn address_space(&self) -> Arc<RwLock<AddressSpace>> {
        self.address_space.clone()
    }

    /// The subscription engine.
    pub fn subscriptions(&self) -> Arc<SubscriptionCache> {
        self.subscriptions.clone()
    }

    /// The session manager.
    pub fn session_manager(&self) -> Arc<RwLock<SessionManager>> {
        self.session_manager.clone()
    }

    /// A token cancelling the server when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn server_status(&self) -> ServerStatusDataType {
        ServerStatusDataType {
            start_time: self.info.start_time,
            current_time: uastack_types::DateTime::now(),
            state: self.info.state(),
            build_info: self.info.build_info(),
            seconds_till_shutdown: 0,
            shutdown_reason: LocalizedText::null(),
        }
    }

    // Fill the Server object's variables with this instance's values.
    fn populate_server_state(&self) {
        let mut space = self.address_space.write();
        let status = self.server_status();
        let _ = space.set_variable_value(
            &VariableId::Server_ServerStatus.into(),
            Variant::ExtensionObject(ExtensionObject::from_message(&status)),
        );
        let _ = space.set_variable_value(
            &VariableId::Server_ServerStatus_StartTime.into(),
            Variant::from(self.info.start_time),
        );
        let _ = space.set_variable_value(
            &VariableId::Server_ServerStatus_BuildInfo.into(),
            Variant::ExtensionObject(ExtensionObject::from_message(&self.info.build_info())),
        );
        let _ = space.set_variable_value(
            &VariableId::Server_ServerStatus_State.into(),
            Variant::Int32(self.info.state() as i32),
        );
        let namespaces: Vec<Variant> = space
            .namespaces()
            .iter()
            .map(|n| Variant::String(UAString::from(n.as_str())))
            .collect();
        let _ = space.set_variable_value(
            &VariableId::Server_NamespaceArray.into(),
            Variant::from(Array::new(VariantScalarTypeId::String, namespaces)),
        );
        let _ = space.set_variable_value(
            &VariableId::Server_ServerArray.into(),
            Variant::from(Array::new(
                VariantScalarTypeId::String,
                vec![Variant::String(UAString::from(
                    self.info.config.application_uri.as_str(),
                ))],
            )),
        );
    }

    // Bind the standard Server object methods to the live engines.
    fn bind_standard_methods(&self) {
        use uastack_types::{MethodId, ObjectId};

        let mut space = self.address_space.write();

        let subscriptions = self.subscriptions.clone();
        space.register_method(
            ObjectId::Server,
            MethodId::Server_GetMonitoredItems,
            Box::new(move |_: &MethodContext, args: &[Variant]| {
                let Some(Variant::UInt32(subscription_id)) = args.first() else {
                    return Err(StatusCode::BadInvalidArgument);
                };
                let (server_handles, client_handles) =
                    subscriptions.get_monitored_items(*subscription_id)?;
                let to_array = |handles: Vec<u32>| {
                    Variant::from(Array::new(
                        VariantScalarTypeId::UInt32,
                        handles.into_iter().map(Variant::UInt32).collect(),
                    ))
                };
                Ok(vec![to_array(server_handles), to_array(client_handles)])
            }),
        );

        let subscriptions = self.subscriptions.clone();
        space.register_method(
            ObjectId::Server,
            MethodId::Server_SetSubscriptionDurable,
            Box::new(move |_: &MethodContext, args: &[Variant]| {
                let (Some(Variant::UInt32(subscription_id)), Some(Variant::UInt32(hours))) =
                    (args.first(), args.get(1))
                else {
                    return Err(StatusCode::BadInvalidArgument);
                };
                let revised =
                    subscriptions.set_subscription_durable(*subscription_id, *hours)?;
                Ok(vec![Variant::UInt32(revised)])
            }),
        );

        let subscriptions = self.subscriptions.clone();
        space.register_method(
            ObjectId::Server,
            MethodId::Server_ResendData,
            Box::new(move |_: &MethodContext, args: &[Variant]| {
                let Some(Variant::UInt32(subscription_id)) = args.first() else {
                    return Err(StatusCode::BadInvalidArgument);
                };
                subscriptions.resend_data(*subscription_id)?;
                Ok(Vec::new())
            }),
        );

        let info = self.info.clone();
        space.register_method(
            ObjectId::Server,
            MethodId::Server_RequestServerStateChange,
            Box::new(move |_: &MethodContext, args: &[Variant]| {
                let Some(Variant::Int32(state)) = args.first() else {
                    return Err(StatusCode::BadInvalidArgument);
                };
                // Only the transitions the engine can actually honor.
                match ServerState::try_from(*state) {
                    Ok(state @ (ServerState::Running | ServerState::Shutdown)) => {
                        info.set_state(state);
                        Ok(Vec::new())
                    }
                    Ok(_) => Err(StatusCode::BadNotSupported),
                    Err(_) => Err(StatusCode::BadInvalidArgument),
                }
            }),
        );
    }

    /// Write a variable's value and let exception-driven monitored items
    /// observe it on the next tick.
    pub fn set_variable_value(
        &self,
        node_id: &uastack_types::NodeId,
        value: impl Into<Variant>,
    ) -> Result<(), StatusCode> {
        self.address_space.write().set_variable_value(node_id, value)
    }

    /// Raise an event on a source node, delivering it to every event
    /// monitored item listening there.
    pub fn raise_event(&self, source: &uastack_types::NodeId, event: &crate::events::Event) {
        self.subscriptions.notify_event(source, event);
    }

    /// Run the server until cancelled.
    pub async fn run(self) -> Result<(), StatusCode> {
        let endpoint = &self.info.config.endpoint;
        let addr = format!("{}:{}", endpoint.host, endpoint.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            error!("Cannot bind {}: {}", addr, e);
            StatusCode::BadResourceUnavailable
        })?;
        info!("Listening on {}", endpoint.url());

        let transport_config = TransportConfig {
            send_buffer_size: self.info.config.transport.send_buffer_size,
            receive_buffer_size: self.info.config.transport.receive_buffer_size,
            max_message_size: self.info.config.transport.max_message_size,
            max_chunk_count: self.info.config.transport.max_chunk_count,
            hello_timeout: Duration::from_millis(self.info.config.transport.hello_timeout_ms),
        };

        // The publish driver: the logical per-subscription timers all
        // derive from this tick.
        {
            let subscriptions = self.subscriptions.clone();
            let address_space = self.address_space.clone();
            let diagnostics = self.info.diagnostics.clone();
            let token = self.token.clone();
            tokio::task::spawn(async move {
                let mut tick =
                    tokio::time::interval(Duration::from_millis(SUBSCRIPTION_TICK_MS));
                tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tick.tick() => {
                            let space = address_space.read();
                            subscriptions.periodic_tick(&space, &diagnostics);
                        }
                    }
                }
            });
        }

        // The session watchdog.
        {
            let session_manager = self.session_manager.clone();
            let subscriptions = self.subscriptions.clone();
            let token = self.token.clone();
            tokio::task::spawn(async move {
                loop {
                    let (next_deadline, expired) =
                        session_manager.read().check_session_expiry();
                    if !expired.is_empty() {
                        let mut manager = session_manager.write();
                        for id in &expired {
                            manager.expire_session(id, &subscriptions);
                        }
                    }
                    let sleep_until = next_deadline
                        .min(std::time::Instant::now() + Duration::from_secs(1));
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep_until(sleep_until.into()) => {}
                    }
                }
            });
        }

        // The status refresher.
        {
            let token = self.token.clone();
            let refresher = ServerStatusRefresher {
                info: self.info.clone(),
                address_space: self.address_space.clone(),
            };
            tokio::task::spawn(async move {
                let mut tick = tokio::time::interval(Duration::from_millis(STATUS_REFRESH_MS));
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tick.tick() => refresher.refresh(),
                    }
                }
            });
        }

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    info!("Server stopping");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Accept failed: {}", e);
                            continue;
                        }
                    };
                    info!("Accepted connection from {}", peer);
                    let connector =
                        TcpConnector::new(stream, transport_config.clone(), &self.info);
                    let info = self.info.clone();
                    let session_manager = self.session_manager.clone();
                    let address_space = self.address_space.clone();
                    let subscriptions = self.subscriptions.clone();
                    let token = self.token.clone();
                    tokio::task::spawn(async move {
                        match connector.connect(info.clone(), token.clone()).await {
                            Ok(transport) => {
                                SessionController::new(
                                    transport,
                                    info,
                                    session_manager,
                                    address_space,
                                    subscriptions,
                                    token,
                                )
                                .run()
                                .await;
                            }
                            Err(status) => {
                                error!("Connection from {} failed handshake: {}", peer, status);
                            }
                        }
                    });
                }
            }
        }
        Ok(())
    }
}

// refresh_server_status needs to run from a task that does not own the
// server, so the pieces it touches are split out.
struct ServerStatusRefresher {
    info: Arc<ServerInfo>,
    address_space: Arc<RwLock<AddressSpace>>,
}

impl ServerStatusRefresher {
    fn refresh(&self) {
        let status = ServerStatusDataType {
            start_time: self.info.start_time,
            current_time: uastack_types::DateTime::now(),
            state: self.info.state(),
            build_info: self.info.build_info(),
            seconds_till_shutdown: 0,
            shutdown_reason: LocalizedText::null(),
        };
        let mut space = self.address_space.write();
        let _ = space.set_variable_value(
            &VariableId::Server_ServerStatus.into(),
            Variant::ExtensionObject(ExtensionObject::from_message(&status)),
        );
        let _ = space.set_variable_value(
            &VariableId::Server_ServerStatus_State.into(),
            Variant::Int32(self.info.state() as i32),
        );
    }
}
