use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Sink, Stream};

use crate::core::{WebSocketBufferConfig, WebSocketError, WsEndpoint, WsTlsConfig};

pub mod tcp;

pub use tcp::TcpTransport;

pub type WsTransportConnectFuture<R, W> =
    Pin<Box<dyn Future<Output = Result<(R, W), WebSocketError>> + Send>>;

/// Byte-stream boundary underneath the websocket protocol.
///
/// The reader yields raw chunks exactly as the socket delivers them; segmentation carries no
/// meaning. Stream end or a read error means the transport is gone. Dropping both halves closes
/// the connection.
pub trait WsTransport: Clone + Send + Sync + 'static {
    type Reader: Stream<Item = Result<Bytes, WebSocketError>> + Send + Unpin + 'static;
    type Writer: Sink<Bytes, Error = WebSocketError> + Send + Sync + Unpin + 'static;

    /// Resolve, connect and (for `wss`) negotiate TLS.
    fn connect(
        &self,
        endpoint: WsEndpoint,
        buffers: WebSocketBufferConfig,
        tls: WsTlsConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer>;
}
