use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::{Sink, Stream};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tracing::debug;

use crate::core::{WebSocketBufferConfig, WebSocketError, WsEndpoint, WsTlsConfig};
use crate::tls::default_connector;
use crate::transport::{WsTransport, WsTransportConnectFuture};

trait AsyncIo: AsyncRead + AsyncWrite + Send + Sync + Unpin {}

impl<T> AsyncIo for T where T: AsyncRead + AsyncWrite + Send + Sync + Unpin {}

type BoxedIo = Box<dyn AsyncIo>;
type FramedWriteHalf = FramedWrite<WriteHalf<BoxedIo>, BytesCodec>;

fn map_io_error(context: &'static str, err: impl ToString) -> WebSocketError {
    WebSocketError::TransportError {
        context,
        error: err.to_string(),
    }
}

/// Plain TCP or rustls-over-TCP transport, chosen by the endpoint scheme.
#[derive(Clone, Default)]
pub struct TcpTransport {
    connector: Option<TlsConnector>,
}

impl TcpTransport {
    pub fn with_connector(connector: TlsConnector) -> Self {
        Self {
            connector: Some(connector),
        }
    }

    pub fn rustls(config: Arc<rustls::ClientConfig>) -> Self {
        Self::with_connector(TlsConnector::from(config))
    }
}

pub struct TcpReader {
    inner: FramedRead<ReadHalf<BoxedIo>, BytesCodec>,
}

impl Stream for TcpReader {
    type Item = Result<Bytes, WebSocketError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(BytesMut::freeze(chunk)))),
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(map_io_error("read", err)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub struct TcpWriter {
    inner: FramedWriteHalf,
}

impl Sink<Bytes> for TcpWriter {
    type Error = WebSocketError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // BytesCodec encodes both Bytes and BytesMut; pin the Bytes impl.
        <FramedWriteHalf as Sink<Bytes>>::poll_ready(Pin::new(&mut self.inner), cx)
            .map_err(|e| map_io_error("write", e))
    }

    fn start_send(mut self: Pin<&mut Self>, item: Bytes) -> Result<(), Self::Error> {
        <FramedWriteHalf as Sink<Bytes>>::start_send(Pin::new(&mut self.inner), item)
            .map_err(|e| map_io_error("write", e))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        <FramedWriteHalf as Sink<Bytes>>::poll_flush(Pin::new(&mut self.inner), cx)
            .map_err(|e| map_io_error("write", e))
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        <FramedWriteHalf as Sink<Bytes>>::poll_close(Pin::new(&mut self.inner), cx)
            .map_err(|e| map_io_error("write", e))
    }
}

async fn open_tcp(endpoint: &WsEndpoint) -> Result<TcpStream, WebSocketError> {
    let addrs: Vec<_> = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|err| WebSocketError::Dns {
            host: endpoint.host.clone(),
            error: err.to_string(),
        })?
        .collect();
    if addrs.is_empty() {
        return Err(WebSocketError::Dns {
            host: endpoint.host.clone(),
            error: "no addresses resolved".to_string(),
        });
    }

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                if let Err(err) = stream.set_nodelay(true) {
                    debug!(%addr, error = %err, "failed to set TCP_NODELAY");
                }
                return Ok(stream);
            }
            Err(err) => {
                debug!(%addr, error = %err, "tcp connect attempt failed");
                last_error = Some(err);
            }
        }
    }
    let error = last_error.map(|e| e.to_string()).unwrap_or_default();
    Err(WebSocketError::ConnectionFailed(format!(
        "{}:{}: {error}",
        endpoint.host, endpoint.port
    )))
}

impl WsTransport for TcpTransport {
    type Reader = TcpReader;
    type Writer = TcpWriter;

    fn connect(
        &self,
        endpoint: WsEndpoint,
        buffers: WebSocketBufferConfig,
        tls: WsTlsConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer> {
        let connector = self.connector.clone();
        Box::pin(async move {
            let tcp = open_tcp(&endpoint).await?;

            let io: BoxedIo = if endpoint.scheme.is_tls() {
                let connector = connector.unwrap_or_else(|| default_connector(tls));
                let server_name = ServerName::try_from(endpoint.host.clone())
                    .map_err(|err| WebSocketError::Tls(format!("{}: {err}", endpoint.host)))?;
                let stream = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|err| WebSocketError::Tls(err.to_string()))?;
                Box::new(stream)
            } else {
                Box::new(tcp)
            };

            let (read, write) = tokio::io::split(io);
            Ok((
                TcpReader {
                    inner: FramedRead::with_capacity(
                        read,
                        BytesCodec::new(),
                        buffers.read_buffer_bytes,
                    ),
                },
                TcpWriter {
                    inner: FramedWrite::new(write, BytesCodec::new()),
                },
            ))
        })
    }
}
