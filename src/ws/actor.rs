//! Client websocket connection actor.
//!
//! One actor owns one connection. Transport reads run in a spawned task that forwards raw chunks
//! into the mailbox; the actor does all protocol work (handshake validation, frame decoding,
//! fragment assembly, close handshake) one event at a time. Writes are told to a dedicated
//! [`WsWriterActor`] that owns the write half, so the actor never waits on the socket and the
//! force-close timer fires even when the peer stops reading.
//!
//! Every live transport is tagged with a generation. Reads, write failures, transport-closed
//! events and the force-close timer carry the generation they were started for; anything that
//! arrives for an older generation is ignored.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage, WeakActorRef};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatch::{
    ProtocolFrameHandler, WsFrameHandler, WsFrameReaction, WsParent, resolve_frame,
};
use super::writer::{WriteFailureHook, WriterShutdown, WriterWrite, WsWriterActor};
use crate::core::codec::encode_client_frame;
use crate::core::handshake::{build_request, parse_response, validate_response};
use crate::core::{
    ChallengeKey, FragmentAssembler, FrameError, HandshakeFailureAction, HandshakeRejection,
    MAX_CONTROL_PAYLOAD_BYTES, ReceiveBuffer, WebSocketError, WebSocketResult,
    WsConnectionConfig, WsConnectionStats, WsEndpoint, WsFrame, WsHealthMonitor, WsLifecycle,
    WsNotification,
};
use crate::transport::{TcpTransport, WsTransport};

/// How long a dropped writer may spend flushing and closing before it is killed.
const WRITER_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Arguments passed when constructing a websocket actor instance.
pub struct WebSocketActorArgs<P, H = ProtocolFrameHandler, T = TcpTransport>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    pub endpoint: WsEndpoint,
    pub parent: P,
    pub handler: H,
    pub transport: T,
    pub config: WsConnectionConfig,
}

impl<P: WsParent> WebSocketActorArgs<P> {
    /// Defaults: TCP/TLS transport, protocol frame handler, default config.
    pub fn new(uri: &str, parent: P) -> WebSocketResult<Self> {
        Ok(Self {
            endpoint: WsEndpoint::parse(uri)?,
            parent,
            handler: ProtocolFrameHandler,
            transport: TcpTransport::default(),
            config: WsConnectionConfig::default(),
        })
    }
}

impl<P, H, T> WebSocketActorArgs<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    pub fn with_handler<H2: WsFrameHandler>(self, handler: H2) -> WebSocketActorArgs<P, H2, T> {
        WebSocketActorArgs {
            endpoint: self.endpoint,
            parent: self.parent,
            handler,
            transport: self.transport,
            config: self.config,
        }
    }

    pub fn with_transport<T2: WsTransport>(self, transport: T2) -> WebSocketActorArgs<P, H, T2> {
        WebSocketActorArgs {
            endpoint: self.endpoint,
            parent: self.parent,
            handler: self.handler,
            transport,
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: WsConnectionConfig) -> Self {
        self.config = config;
        self
    }
}

/// Upgrade in flight. The challenge key lives exactly as long as this state.
struct Handshake {
    key: ChallengeKey,
    response: BytesMut,
    rejected: bool,
}

enum Phase {
    Closed,
    Connecting,
    Handshaking(Handshake),
    Open,
    Closing,
}

impl Phase {
    fn lifecycle(&self) -> WsLifecycle {
        match self {
            Phase::Closed => WsLifecycle::Closed,
            Phase::Connecting => WsLifecycle::Connecting,
            Phase::Handshaking(_) => WsLifecycle::Handshaking,
            Phase::Open => WsLifecycle::Open,
            Phase::Closing => WsLifecycle::Closing,
        }
    }
}

/// Everything tied to one transport. Replaced wholesale when the transport goes away.
struct Session<W>
where
    W: futures_util::Sink<Bytes, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    phase: Phase,
    writer: Option<ActorRef<WsWriterActor<W>>>,
    reader_task: Option<JoinHandle<()>>,
    force_close_task: Option<JoinHandle<()>>,
    receive: ReceiveBuffer,
    fragments: FragmentAssembler,
    initiated_close: bool,
    close_sent: bool,
}

impl<W> Session<W>
where
    W: futures_util::Sink<Bytes, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    fn new(config: &WsConnectionConfig) -> Self {
        Self {
            phase: Phase::Closed,
            writer: None,
            reader_task: None,
            force_close_task: None,
            receive: ReceiveBuffer::new(config.buffers.max_frame_bytes),
            fragments: FragmentAssembler::new(config.buffers.max_message_bytes),
            initiated_close: false,
            close_sent: false,
        }
    }

    /// Stop the session's tasks. The writer gets a short grace period to close the sink (TLS
    /// close_notify) in the background and is killed after it, even mid-write.
    fn shutdown(mut self) {
        if let Some(handle) = self.reader_task.take() {
            handle.abort();
        }
        if let Some(handle) = self.force_close_task.take() {
            handle.abort();
        }
        if let Some(writer) = self.writer.take() {
            tokio::spawn(async move {
                match tokio::time::timeout(WRITER_SHUTDOWN_GRACE, writer.ask(WriterShutdown))
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => debug!(error = %err, "websocket writer close failed"),
                    Err(_) => debug!("websocket writer did not close in time"),
                }
                writer.kill();
            });
        }
    }
}

pub struct WebSocketActor<P, H = ProtocolFrameHandler, T = TcpTransport>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    endpoint: WsEndpoint,
    parent: P,
    handler: H,
    transport: T,
    config: WsConnectionConfig,
    actor_ref: ActorRef<Self>,
    health: WsHealthMonitor,
    generation: u64,
    session: Session<T::Writer>,
}

impl<P, H, T> Actor for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Args = WebSocketActorArgs<P, H, T>;
    type Error = WebSocketError;

    fn name() -> &'static str {
        "WebSocketActor"
    }

    async fn on_start(args: Self::Args, ctx: ActorRef<Self>) -> WebSocketResult<Self> {
        let WebSocketActorArgs {
            endpoint,
            parent,
            handler,
            transport,
            config,
        } = args;

        let session = Session::new(&config);
        Ok(Self {
            endpoint,
            parent,
            handler,
            transport,
            config,
            actor_ref: ctx,
            health: WsHealthMonitor::new(),
            generation: 0,
            session,
        })
    }

    async fn on_stop(
        &mut self,
        _ctx: WeakActorRef<Self>,
        _reason: kameo::error::ActorStopReason,
    ) -> WebSocketResult<()> {
        let session = std::mem::replace(&mut self.session, Session::new(&self.config));
        session.shutdown();
        Ok(())
    }

    fn on_panic(
        &mut self,
        _actor_ref: kameo::actor::WeakActorRef<Self>,
        err: kameo::prelude::PanicError,
    ) -> impl std::future::Future<
        Output = Result<std::ops::ControlFlow<kameo::prelude::ActorStopReason>, Self::Error>,
    > + Send {
        async move {
            tracing::error!(error = ?err, "WebSocketActor panicked");
            Ok(std::ops::ControlFlow::Break(
                kameo::prelude::ActorStopReason::Panicked(err),
            ))
        }
    }
}

/// Open the transport and queue the upgrade request on the writer. The outcome of the handshake
/// itself is reported through the parent.
#[derive(Debug, Clone, Copy)]
pub struct Connect;

/// Replace the endpoint used by the next [`Connect`]. Only accepted while closed.
#[derive(Debug, Clone)]
pub struct SetEndpoint {
    pub uri: String,
}

/// Mask and write a frame. Dropped with a log line when the lifecycle does not allow it.
#[derive(Debug, Clone)]
pub struct SendFrame(pub WsFrame);

/// Start the close handshake with a normal-closure frame.
#[derive(Debug, Clone, Copy)]
pub struct CloseConnection;

#[derive(Debug, Clone, Copy)]
pub struct GetLifecycle;

#[derive(Debug, Clone, Copy)]
pub struct GetConnectionStats;

/// Raw chunk read from the transport.
#[derive(Debug)]
pub struct TransportData {
    pub generation: u64,
    pub bytes: Bytes,
}

/// The transport's read side ended, either cleanly or with an error.
#[derive(Debug)]
pub struct TransportClosed {
    pub generation: u64,
    pub reason: Option<String>,
}

/// The writer could not put bytes on the wire. The transport is unusable from here on.
#[derive(Debug)]
pub struct WriteFailed {
    pub generation: u64,
    pub reason: String,
}

/// Close timeout elapsed without the transport going away.
#[derive(Debug, Clone, Copy)]
pub struct ForceClose {
    pub generation: u64,
}

impl<P, H, T> KameoMessage<Connect> for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        _msg: Connect,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.handle_connect().await
    }
}

impl<P, H, T> KameoMessage<SetEndpoint> for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        msg: SetEndpoint,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let lifecycle = self.lifecycle();
        if lifecycle != WsLifecycle::Closed {
            return Err(WebSocketError::InvalidState(format!(
                "endpoint can only be changed while closed (currently {})",
                lifecycle.as_str()
            )));
        }
        self.endpoint = WsEndpoint::parse(&msg.uri)?;
        info!(connection = %self.endpoint, "websocket endpoint updated");
        Ok(())
    }
}

impl<P, H, T> KameoMessage<SendFrame> for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: SendFrame,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.send_frame(msg.0);
    }
}

impl<P, H, T> KameoMessage<CloseConnection> for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        _msg: CloseConnection,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        match self.session.phase {
            Phase::Open | Phase::Closing => {
                self.session.initiated_close = true;
                self.send_frame(WsFrame::default_close());
            }
            // No close frame can be sent before the upgrade completes.
            Phase::Handshaking(_) => {
                info!(connection = %self.endpoint, "closing websocket during handshake");
                self.reset();
                self.parent.notify(WsNotification::Closed);
            }
            Phase::Closed | Phase::Connecting => {
                debug!(connection = %self.endpoint, "close requested with no open connection");
            }
        }
    }
}

impl<P, H, T> KameoMessage<GetLifecycle> for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Reply = WebSocketResult<WsLifecycle>;

    async fn handle(
        &mut self,
        _msg: GetLifecycle,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.lifecycle())
    }
}

impl<P, H, T> KameoMessage<GetConnectionStats> for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Reply = WebSocketResult<WsConnectionStats>;

    async fn handle(
        &mut self,
        _msg: GetConnectionStats,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.health.get_stats())
    }
}

impl<P, H, T> KameoMessage<TransportData> for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: TransportData,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if !self.is_current(msg.generation) {
            debug!(
                connection = %self.endpoint,
                generation = msg.generation,
                "dropping bytes from a stale transport"
            );
            return;
        }
        self.health.record_inbound_bytes(msg.bytes.len());
        match self.session.phase {
            Phase::Handshaking(_) => self.on_handshake_bytes(&msg.bytes),
            Phase::Open | Phase::Closing => self.on_frame_bytes(&msg.bytes),
            Phase::Closed | Phase::Connecting => {
                debug!(connection = %self.endpoint, "bytes received outside a session");
            }
        }
    }
}

impl<P, H, T> KameoMessage<TransportClosed> for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: TransportClosed,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if !self.is_current(msg.generation) {
            debug!(
                connection = %self.endpoint,
                generation = msg.generation,
                "ignoring close of a stale transport"
            );
            return;
        }
        match msg.reason.as_deref() {
            Some(reason) => {
                warn!(connection = %self.endpoint, reason = %reason, "websocket transport failed");
                self.health.record_failure(reason);
            }
            None => {
                info!(
                    connection = %self.endpoint,
                    lifecycle = self.lifecycle().as_str(),
                    initiated_close = self.session.initiated_close,
                    "websocket transport closed"
                );
            }
        }
        self.reset();
        self.parent.notify(WsNotification::Closed);
    }
}

impl<P, H, T> KameoMessage<WriteFailed> for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: WriteFailed,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if !self.is_current(msg.generation) {
            debug!(
                connection = %self.endpoint,
                generation = msg.generation,
                "ignoring write failure of a stale transport"
            );
            return;
        }
        warn!(
            connection = %self.endpoint,
            lifecycle = self.lifecycle().as_str(),
            reason = %msg.reason,
            "websocket transport write failed"
        );
        self.health.record_failure(&msg.reason);
        self.reset();
        self.parent.notify(WsNotification::Closed);
    }
}

impl<P, H, T> KameoMessage<ForceClose> for WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    type Reply = ();

    async fn handle(
        &mut self,
        msg: ForceClose,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if !self.is_current(msg.generation) {
            debug!(
                connection = %self.endpoint,
                generation = msg.generation,
                "stale force-close ignored"
            );
            return;
        }
        warn!(
            connection = %self.endpoint,
            timeout_ms = self.config.close_timeout.as_millis() as u64,
            "close handshake did not complete; forcing transport closed"
        );
        self.reset();
    }
}

impl<P, H, T> WebSocketActor<P, H, T>
where
    P: WsParent,
    H: WsFrameHandler,
    T: WsTransport,
{
    fn lifecycle(&self) -> WsLifecycle {
        self.session.phase.lifecycle()
    }

    /// True when `generation` names the transport this actor currently holds.
    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && self.session.writer.is_some()
    }

    async fn handle_connect(&mut self) -> WebSocketResult<()> {
        let lifecycle = self.lifecycle();
        if lifecycle != WsLifecycle::Closed {
            return Err(WebSocketError::InvalidState(format!(
                "connect requires a closed connection (currently {})",
                lifecycle.as_str()
            )));
        }

        self.session.phase = Phase::Connecting;
        info!(connection = %self.endpoint, "websocket connecting");

        let connected = self
            .transport
            .connect(
                self.endpoint.clone(),
                self.config.buffers,
                self.config.tls,
            )
            .await;
        let (reader, writer) = match connected {
            Ok(halves) => halves,
            Err(err) => {
                warn!(connection = %self.endpoint, error = %err, "websocket connect failed");
                self.health.record_failure(&err.to_string());
                self.session.phase = Phase::Closed;
                return Err(err);
            }
        };

        let writer = WsWriterActor::spawn(
            WsWriterActor::new(writer).with_failure_hook(self.write_failure_hook()),
        );
        self.session.writer = Some(writer.clone());

        let key = ChallengeKey::generate();
        let request = build_request(&self.endpoint, &key, &self.config.user_agent);
        if let Err(err) = writer.tell(WriterWrite { bytes: request }).try_send() {
            let err = WebSocketError::ActorError(err.to_string());
            warn!(connection = %self.endpoint, error = %err, "failed to queue upgrade request");
            self.health.record_failure(&err.to_string());
            self.reset();
            return Err(err);
        }

        self.session.reader_task = Some(self.spawn_reader(reader));
        self.session.phase = Phase::Handshaking(Handshake {
            key,
            response: BytesMut::new(),
            rejected: false,
        });
        debug!(connection = %self.endpoint, generation = self.generation, "upgrade request queued");
        Ok(())
    }

    /// Routes the writer's first sink error back into this actor, tagged with the current
    /// generation.
    fn write_failure_hook(&self) -> WriteFailureHook {
        let actor_ref = self.actor_ref.downgrade();
        let generation = self.generation;
        Box::new(move |err| {
            let Some(actor_ref) = actor_ref.upgrade() else {
                return;
            };
            let failed = WriteFailed {
                generation,
                reason: err.to_string(),
            };
            tokio::spawn(async move {
                let _ = actor_ref.tell(failed).send().await;
            });
        })
    }

    fn spawn_reader(&self, mut reader: T::Reader) -> JoinHandle<()> {
        let actor_ref = self.actor_ref.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            while let Some(chunk) = reader.next().await {
                match chunk {
                    Ok(bytes) => {
                        if actor_ref
                            .tell(TransportData { generation, bytes })
                            .send()
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(err) => {
                        let _ = actor_ref
                            .tell(TransportClosed {
                                generation,
                                reason: Some(err.to_string()),
                            })
                            .send()
                            .await;
                        return;
                    }
                }
            }
            let _ = actor_ref
                .tell(TransportClosed {
                    generation,
                    reason: None,
                })
                .send()
                .await;
        })
    }

    fn on_handshake_bytes(&mut self, bytes: &[u8]) {
        let Phase::Handshaking(handshake) = &mut self.session.phase else {
            return;
        };
        if handshake.rejected {
            debug!(
                connection = %self.endpoint,
                bytes = bytes.len(),
                "discarding bytes after rejected handshake"
            );
            return;
        }

        handshake.response.extend_from_slice(bytes);
        let outcome = match parse_response(&handshake.response) {
            Ok(None) => return,
            Ok(Some((response, consumed))) => {
                validate_response(&response, &handshake.key).map(|()| consumed)
            }
            Err(failure) => Err(HandshakeRejection {
                failures: vec![failure],
            }),
        };

        match outcome {
            Ok(consumed) => {
                let trailing = handshake.response.split_off(consumed).freeze();
                self.session.phase = Phase::Open;
                self.health.reset();
                info!(connection = %self.endpoint, "websocket open");
                self.parent.notify(WsNotification::Open);
                if !trailing.is_empty() {
                    self.on_frame_bytes(&trailing);
                }
            }
            Err(rejection) => {
                handshake.rejected = true;
                handshake.response = BytesMut::new();
                let reasons = rejection.to_string();
                warn!(
                    connection = %self.endpoint,
                    reasons = %reasons,
                    action = ?self.config.handshake_failure,
                    "websocket handshake rejected"
                );
                self.health.record_handshake_rejection(&reasons);
                if self.config.handshake_failure == HandshakeFailureAction::Close {
                    self.reset();
                }
            }
        }
    }

    fn on_frame_bytes(&mut self, bytes: &[u8]) {
        self.session.receive.extend(bytes);
        loop {
            let raw = match self.session.receive.next_frame() {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(err) => {
                    self.fail(err);
                    break;
                }
            };
            self.health.record_frame_received();
            match resolve_frame(raw, &mut self.session.fragments) {
                Ok(Some(frame)) => self.deliver(frame),
                Ok(None) => {}
                Err(err) => {
                    self.fail(err);
                    break;
                }
            }
            if self.session.writer.is_none() {
                break;
            }
        }
    }

    fn deliver(&mut self, frame: WsFrame) {
        self.parent.notify(WsNotification::Frame(frame.clone()));
        if let WsFrameReaction::Reply(reply) = self.handler.on_frame(&frame) {
            self.send_frame(reply);
        }
    }

    /// Fatal frame-stream error: send a close carrying the failure and arm the force-close timer.
    fn fail(&mut self, err: FrameError) {
        let reason = err.to_string();
        warn!(connection = %self.endpoint, reason = %reason, "failing websocket connection");
        self.health.record_failure(&reason);
        self.session.receive.clear();
        self.session.fragments.clear();

        if self.session.close_sent {
            debug!(connection = %self.endpoint, "close already sent; awaiting teardown");
            return;
        }
        self.session.initiated_close = true;
        self.send_frame(WsFrame::close(err.close_code(), reason));
    }

    fn send_frame(&mut self, frame: WsFrame) {
        let frame = frame.clamp_close_reason();
        if frame.kind().is_control() && frame.payload_len() > MAX_CONTROL_PAYLOAD_BYTES {
            warn!(
                connection = %self.endpoint,
                kind = ?frame.kind(),
                payload_len = frame.payload_len(),
                "dropping oversized control frame"
            );
            return;
        }
        let allowed = match self.session.phase {
            Phase::Open => true,
            Phase::Closing => frame.is_close(),
            _ => false,
        };
        let Some(writer) = self.session.writer.as_ref().filter(|_| allowed) else {
            debug!(
                connection = %self.endpoint,
                lifecycle = self.lifecycle().as_str(),
                kind = ?frame.kind(),
                "dropping frame not sendable in current state"
            );
            return;
        };
        if frame.is_close() && self.session.close_sent {
            debug!(connection = %self.endpoint, "close frame already sent; dropping duplicate");
            return;
        }

        let bytes = encode_client_frame(&frame);
        let wire_len = bytes.len();
        // Never wait on the writer's mailbox.
        match writer.tell(WriterWrite { bytes }).try_send() {
            Ok(()) => self.health.record_sent(wire_len),
            Err(err) => {
                let msg = err.to_string();
                warn!(connection = %self.endpoint, error = %msg, "websocket writer send failed");
                self.health.record_failure(&msg);
            }
        }

        // A close that never reached the wire still ends the session within the close timeout.
        if frame.is_close() {
            self.session.close_sent = true;
            self.session.phase = Phase::Closing;
            self.arm_force_close();
        }
    }

    fn arm_force_close(&mut self) {
        if self.session.force_close_task.is_some() {
            return;
        }
        let actor_ref = self.actor_ref.clone();
        let generation = self.generation;
        let timeout: Duration = self.config.close_timeout;
        self.session.force_close_task = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = actor_ref.tell(ForceClose { generation }).send().await;
        }));
    }

    /// Drop the transport and return to a fresh closed session.
    fn reset(&mut self) {
        let session = std::mem::replace(&mut self.session, Session::new(&self.config));
        self.generation = self.generation.wrapping_add(1);
        session.shutdown();
    }
}
