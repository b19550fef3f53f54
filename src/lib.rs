//! Kameo-based client WebSocket connection engine.
//!
//! [`WebSocketActor`] drives one RFC 6455 connection: the HTTP upgrade, frame decoding over an
//! arbitrarily segmented byte stream, fragment assembly, and the close handshake with a bounded
//! force-close.

pub mod core;
pub mod testing;
pub mod tls;
pub mod transport;
pub mod ws;

pub use crate::core::{
    WebSocketError, WebSocketResult, WsConnectionConfig, WsConnectionStats, WsEndpoint, WsFrame,
    WsLifecycle, WsNotification,
};
pub use crate::transport::{TcpTransport, WsTransport};
pub use crate::ws::{
    CloseConnection, Connect, GetConnectionStats, GetLifecycle, ProtocolFrameHandler, SendFrame,
    SetEndpoint, WebSocketActor, WebSocketActorArgs, WsFrameHandler, WsFrameReaction, WsParent,
};
