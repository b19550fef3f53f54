use bytes::Bytes;
use futures_util::{Sink, SinkExt};
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage};
use tracing::debug;

use crate::core::{WebSocketError, WebSocketResult};

/// Invoked once with the error that broke the write half.
pub type WriteFailureHook = Box<dyn Fn(&WebSocketError) + Send + Sync>;

/// Writer actor that owns the transport writer and serializes writes.
///
/// Frames arrive already encoded and masked; this actor only moves bytes. Callers `tell` it
/// writes, so a sink that stops accepting bytes only ever blocks this actor. The first sink error
/// closes the writer and is handed to the failure hook.
pub struct WsWriterActor<W>
where
    W: Sink<Bytes, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    writer: W,
    closed: bool,
    on_failure: Option<WriteFailureHook>,
}

impl<W> WsWriterActor<W>
where
    W: Sink<Bytes, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            closed: false,
            on_failure: None,
        }
    }

    pub fn with_failure_hook(mut self, hook: WriteFailureHook) -> Self {
        self.on_failure = Some(hook);
        self
    }
}

impl<W> Actor for WsWriterActor<W>
where
    W: Sink<Bytes, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    type Args = Self;
    type Error = WebSocketError;

    async fn on_start(args: Self::Args, _ctx: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(args)
    }

    fn on_panic(
        &mut self,
        _actor_ref: kameo::actor::WeakActorRef<Self>,
        err: kameo::prelude::PanicError,
    ) -> impl std::future::Future<
        Output = Result<std::ops::ControlFlow<kameo::prelude::ActorStopReason>, Self::Error>,
    > + Send {
        async move {
            tracing::error!(error = ?err, "WsWriterActor panicked");
            Ok(std::ops::ControlFlow::Break(
                kameo::prelude::ActorStopReason::Panicked(err),
            ))
        }
    }
}

#[derive(Clone, Debug)]
pub struct WriterWrite {
    pub bytes: Bytes,
}

impl<W> KameoMessage<WriterWrite> for WsWriterActor<W>
where
    W: Sink<Bytes, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        msg: WriterWrite,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if self.closed {
            return Err(WebSocketError::InvalidState("writer stopped".to_string()));
        }
        debug!(target: "ws-writer", bytes = msg.bytes.len(), "writing to wire");
        if let Err(err) = self.writer.send(msg.bytes).await {
            self.closed = true;
            if let Some(hook) = self.on_failure.as_ref() {
                hook(&err);
            }
            return Err(err);
        }
        Ok(())
    }
}

/// Flush and close the write half. Later writes are rejected.
#[derive(Debug)]
pub struct WriterShutdown;

impl<W> KameoMessage<WriterShutdown> for WsWriterActor<W>
where
    W: Sink<Bytes, Error = WebSocketError> + Send + Sync + Unpin + 'static,
{
    type Reply = WebSocketResult<()>;

    async fn handle(
        &mut self,
        _msg: WriterShutdown,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.writer.close().await
    }
}
