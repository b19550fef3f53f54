//! Reusable test utilities for exercising the websocket actor without a real socket.
//!
//! [`MockTransport`] hands the actor in-memory byte channels. Each `connect` produces a fresh
//! [`MockConnection`] that tests pick up from the paired [`MockServer`] and drive at the byte
//! level: read the upgrade request, answer it, push arbitrary (even malformed) frame bytes, stall
//! or fail the client's writes, and drop the socket.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::Sink;
use tokio::sync::{Mutex, mpsc};

use crate::core::codec::{decode_frame, encode_raw};
use crate::core::handshake::compute_accept_key;
use crate::core::{
    FrameKind, WebSocketBufferConfig, WebSocketError, WsEndpoint, WsFrame, WsTlsConfig,
};
use crate::transport::{WsTransport, WsTransportConnectFuture};

const WRITES_OK: u8 = 0;
const WRITES_STALLED: u8 = 1;
const WRITES_FAILING: u8 = 2;

/// A transport that uses in-memory channels so tests can emulate server behavior.
///
/// Create it with [`MockTransport::channel_pair`] to obtain both:
/// - the transport for `WebSocketActor`
/// - a [`MockServer`] handle that accepts the connections the actor opens.
#[derive(Clone)]
pub struct MockTransport {
    accept_tx: mpsc::UnboundedSender<MockConnection>,
    refusals: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// Build a transport + server control pair.
    pub fn channel_pair() -> (Self, MockServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let refusals = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                accept_tx,
                refusals: Arc::clone(&refusals),
            },
            MockServer {
                accept_rx,
                refusals,
            },
        )
    }
}

impl WsTransport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn connect(
        &self,
        endpoint: WsEndpoint,
        _buffers: WebSocketBufferConfig,
        _tls: WsTlsConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer> {
        let accept_tx = self.accept_tx.clone();
        let refusals = Arc::clone(&self.refusals);
        Box::pin(async move {
            if let Some(reason) = refusals.lock().await.pop() {
                return Err(WebSocketError::ConnectionFailed(reason));
            }

            let (sent_tx, sent_rx) = mpsc::unbounded_channel::<Bytes>();
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Bytes>();
            let write_mode = Arc::new(AtomicU8::new(WRITES_OK));
            accept_tx
                .send(MockConnection {
                    endpoint,
                    outbound_rx: sent_rx,
                    outbound: BytesMut::new(),
                    inbound_tx: Some(inbound_tx),
                    write_mode: Arc::clone(&write_mode),
                })
                .map_err(|_| {
                    WebSocketError::ConnectionFailed("mock server dropped".to_string())
                })?;
            Ok((
                MockReader { rx: inbound_rx },
                MockWriter {
                    sent_tx,
                    write_mode,
                },
            ))
        })
    }
}

/// Server-side test handle paired with [`MockTransport`].
pub struct MockServer {
    accept_rx: mpsc::UnboundedReceiver<MockConnection>,
    refusals: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Wait for the actor to open its next connection.
    pub async fn accept(&mut self) -> Option<MockConnection> {
        self.accept_rx.recv().await
    }

    /// Make the next `connect` fail with [`WebSocketError::ConnectionFailed`].
    pub async fn refuse_next(&self, reason: impl Into<String>) {
        self.refusals.lock().await.push(reason.into());
    }
}

/// Error surface for operations on [`MockConnection`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MockServerError {
    /// The inbound socket side was intentionally dropped.
    SocketDropped,
    /// The actor side is no longer receiving inbound bytes.
    ChannelClosed,
}

impl std::fmt::Display for MockServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MockServerError::SocketDropped => f.write_str("mock socket already dropped"),
            MockServerError::ChannelClosed => f.write_str("mock actor channel is closed"),
        }
    }
}

impl std::error::Error for MockServerError {}

/// A frame written by the client, as seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFrame {
    pub fin: bool,
    pub masked: bool,
    pub frame: WsFrame,
}

/// One accepted connection, seen from the server end.
pub struct MockConnection {
    endpoint: WsEndpoint,
    outbound_rx: mpsc::UnboundedReceiver<Bytes>,
    outbound: BytesMut,
    inbound_tx: Option<mpsc::UnboundedSender<Bytes>>,
    write_mode: Arc<AtomicU8>,
}

impl MockConnection {
    pub fn endpoint(&self) -> &WsEndpoint {
        &self.endpoint
    }

    /// Receive the next chunk the actor wrote, bypassing any buffered partial data.
    pub async fn recv_bytes(&mut self) -> Option<Bytes> {
        if !self.outbound.is_empty() {
            return Some(self.outbound.split().freeze());
        }
        self.outbound_rx.recv().await
    }

    async fn fill(&mut self) -> bool {
        match self.outbound_rx.recv().await {
            Some(chunk) => {
                self.outbound.extend_from_slice(&chunk);
                true
            }
            None => false,
        }
    }

    /// Read the full upgrade request head.
    pub async fn read_request(&mut self) -> Option<String> {
        loop {
            if let Some(end) = self
                .outbound
                .windows(4)
                .position(|window| window == b"\r\n\r\n")
            {
                let head = self.outbound.split_to(end + 4);
                return Some(String::from_utf8_lossy(&head).into_owned());
            }
            if !self.fill().await {
                return None;
            }
        }
    }

    /// Read the upgrade request and return its `Sec-WebSocket-Key`.
    pub async fn read_handshake_key(&mut self) -> Option<String> {
        let request = self.read_request().await?;
        request.lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("sec-websocket-key")
                .then(|| value.trim().to_string())
        })
    }

    /// The 101 response a conforming server would send for `key`.
    pub fn upgrade_response(key: &str) -> String {
        format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            compute_accept_key(key)
        )
    }

    /// Read the upgrade request and answer it with a valid 101 response.
    pub async fn accept_handshake(&mut self) -> Result<(), MockServerError> {
        let key = self
            .read_handshake_key()
            .await
            .ok_or(MockServerError::ChannelClosed)?;
        self.send_raw(Self::upgrade_response(&key))
    }

    /// Push raw bytes to the actor exactly as given.
    pub fn send_raw(&self, bytes: impl Into<Bytes>) -> Result<(), MockServerError> {
        let Some(tx) = self.inbound_tx.as_ref() else {
            return Err(MockServerError::SocketDropped);
        };
        tx.send(bytes.into())
            .map_err(|_| MockServerError::ChannelClosed)
    }

    /// Push one unmasked server frame.
    pub fn send_frame(&self, fin: bool, opcode: u8, payload: &[u8]) -> Result<(), MockServerError> {
        self.send_raw(encode_raw(fin, opcode, payload, None))
    }

    /// Push a complete logical frame.
    pub fn send(&self, frame: &WsFrame) -> Result<(), MockServerError> {
        self.send_frame(true, frame.kind().opcode(), &frame.payload())
    }

    /// Decode the next frame the actor wrote. `None` once the actor dropped its writer.
    pub async fn recv_frame(&mut self) -> Option<ClientFrame> {
        loop {
            if self.outbound.len() >= 2 {
                let masked = self.outbound[1] & 0x80 != 0;
                if let Ok(raw) = decode_frame(&mut self.outbound, usize::MAX) {
                    let frame = FrameKind::from_opcode(raw.opcode)?
                        .parse(raw.payload)
                        .ok()?;
                    return Some(ClientFrame {
                        fin: raw.fin,
                        masked,
                        frame,
                    });
                }
            }
            if !self.fill().await {
                return None;
            }
        }
    }

    pub async fn recv_frame_timeout(&mut self, timeout: Duration) -> Option<ClientFrame> {
        tokio::time::timeout(timeout, self.recv_frame())
            .await
            .unwrap_or_default()
    }

    /// Wait until the actor releases its write half.
    pub async fn wait_closed_by_client(&mut self) {
        while self.outbound_rx.recv().await.is_some() {}
    }

    /// Stop accepting client writes without failing them, like a peer that no longer reads.
    pub fn stall_writes(&self) {
        self.write_mode.store(WRITES_STALLED, Ordering::SeqCst);
    }

    /// Fail every client write from now on.
    pub fn fail_writes(&self) {
        self.write_mode.store(WRITES_FAILING, Ordering::SeqCst);
    }

    /// Simulate server-side socket drop by closing the inbound channel.
    pub fn drop_socket(&mut self) {
        self.inbound_tx = None;
    }
}

/// Reader side for [`MockTransport`].
pub struct MockReader {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl futures_util::Stream for MockReader {
    type Item = Result<Bytes, WebSocketError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.rx).poll_recv(cx) {
            Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Writer side for [`MockTransport`].
pub struct MockWriter {
    sent_tx: mpsc::UnboundedSender<Bytes>,
    write_mode: Arc<AtomicU8>,
}

impl Sink<Bytes> for MockWriter {
    type Error = WebSocketError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.write_mode.load(Ordering::SeqCst) {
            // Never woken: the write stays pending until the writer is torn down.
            WRITES_STALLED => Poll::Pending,
            WRITES_FAILING => Poll::Ready(Err(WebSocketError::TransportError {
                context: "mock_transport_write",
                error: "injected write failure".to_string(),
            })),
            _ => Poll::Ready(Ok(())),
        }
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> Result<(), Self::Error> {
        self.get_mut()
            .sent_tx
            .send(item)
            .map_err(|_| WebSocketError::TransportError {
                context: "mock_transport_write",
                error: "mock outbound channel closed".to_string(),
            })
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
