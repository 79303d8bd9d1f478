//! The server side of the opc.tcp transport.

mod tcp;

pub(crate) use tcp::{Request, TcpConnector, TcpTransport, TransportConfig, TransportPollResult};
