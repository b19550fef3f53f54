use tokio::sync::mpsc;
use tracing::debug;

use crate::core::{FragmentAssembler, FrameError, FrameKind, RawFrame, WsFrame, WsNotification};

/// Receiver of connection notifications.
///
/// Called from inside the connection actor, so implementations must not block.
pub trait WsParent: Send + Sync + 'static {
    fn notify(&self, notification: WsNotification);
}

impl WsParent for mpsc::UnboundedSender<WsNotification> {
    fn notify(&self, notification: WsNotification) {
        if self.send(notification).is_err() {
            debug!("websocket parent dropped; notification discarded");
        }
    }
}

/// What the connection should do in response to a delivered frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrameReaction {
    None,
    Reply(WsFrame),
}

/// Application-level collaborator invoked after the parent has been notified of a frame.
pub trait WsFrameHandler: Send + 'static {
    fn on_frame(&mut self, frame: &WsFrame) -> WsFrameReaction;
}

/// Answers pings and echoes the peer's close frame.
///
/// A close echo after this side already sent its own close is dropped by the connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolFrameHandler;

impl WsFrameHandler for ProtocolFrameHandler {
    fn on_frame(&mut self, frame: &WsFrame) -> WsFrameReaction {
        match frame {
            WsFrame::Ping(payload) => WsFrameReaction::Reply(WsFrame::Pong(payload.clone())),
            WsFrame::Close(close) => WsFrameReaction::Reply(WsFrame::Close(close.clone())),
            _ => WsFrameReaction::None,
        }
    }
}

/// Turn a decoded wire frame into a deliverable frame.
///
/// Looks the opcode up in the frame-type registry, parses the payload, runs it through fragment
/// assembly and validates whatever comes out. `Ok(None)` means a fragment was absorbed.
pub fn resolve_frame(
    raw: RawFrame,
    fragments: &mut FragmentAssembler,
) -> Result<Option<WsFrame>, FrameError> {
    let kind = FrameKind::from_opcode(raw.opcode).ok_or(FrameError::UnknownOpcode(raw.opcode))?;
    let frame = kind.parse(raw.payload)?;
    let Some(frame) = fragments.resolve(frame, raw.fin)? else {
        return Ok(None);
    };
    frame.validate()?;
    Ok(Some(frame))
}
