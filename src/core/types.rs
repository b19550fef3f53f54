use std::time::Duration;

use thiserror::Error;

use super::frame::WsFrame;

/// Convenience result alias for websocket operations.
pub type WebSocketResult<T> = Result<T, WebSocketError>;

/// Canonical websocket error surface returned to callers of the connection actor.
#[derive(Debug, Error)]
pub enum WebSocketError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("DNS resolution failed for {host}: {error}")]
    Dns { host: String, error: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Transport error ({context}): {error}")]
    TransportError {
        context: &'static str,
        error: String,
    },

    #[error("Actor error: {0}")]
    ActorError(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Transport-independent buffer sizing parameters.
#[derive(Clone, Copy, Debug)]
pub struct WebSocketBufferConfig {
    /// Capacity used for each transport read.
    pub read_buffer_bytes: usize,
    /// Largest declared payload length accepted for a single frame.
    pub max_frame_bytes: usize,
    /// Largest payload a fragmented message may grow to once merged.
    pub max_message_bytes: usize,
}

impl Default for WebSocketBufferConfig {
    fn default() -> Self {
        Self {
            read_buffer_bytes: 64 << 10,
            max_frame_bytes: 16 * 1024 * 1024,
            max_message_bytes: 16 * 1024 * 1024,
        }
    }
}

/// TLS configuration for `wss` endpoints.
///
/// Safe-by-default: certificate validation is enabled unless explicitly disabled for development /
/// controlled environments.
#[derive(Clone, Copy, Debug)]
pub struct WsTlsConfig {
    pub validate_certs: bool,
}

impl Default for WsTlsConfig {
    fn default() -> Self {
        Self {
            validate_certs: true,
        }
    }
}

/// What the actor does once a handshake response fails validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandshakeFailureAction {
    /// Log every failed check and leave the connection untouched.
    ///
    /// The transport stays open in `Handshaking` and the parent is not notified; a caller that
    /// cares must observe the lifecycle or the stats and close the connection itself.
    #[default]
    LogOnly,
    /// Log, then tear the transport down as a force-close would (no `Closed` notification).
    Close,
}

/// Tunables for one connection actor.
#[derive(Clone, Debug)]
pub struct WsConnectionConfig {
    pub tls: WsTlsConfig,
    pub buffers: WebSocketBufferConfig,
    /// Delay between sending a close frame and forcibly closing the transport.
    pub close_timeout: Duration,
    pub user_agent: String,
    pub handshake_failure: HandshakeFailureAction,
}

pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_USER_AGENT: &str = concat!("ws-engine/", env!("CARGO_PKG_VERSION"));

impl Default for WsConnectionConfig {
    fn default() -> Self {
        Self {
            tls: WsTlsConfig::default(),
            buffers: WebSocketBufferConfig::default(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            handshake_failure: HandshakeFailureAction::default(),
        }
    }
}

/// Connection lifecycle as observed from outside the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsLifecycle {
    Closed,
    Connecting,
    Handshaking,
    Open,
    Closing,
}

impl WsLifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            WsLifecycle::Closed => "closed",
            WsLifecycle::Connecting => "connecting",
            WsLifecycle::Handshaking => "handshaking",
            WsLifecycle::Open => "open",
            WsLifecycle::Closing => "closing",
        }
    }
}

/// Notifications delivered to the parent, in this order across a connection's life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsNotification {
    Open,
    Frame(WsFrame),
    Closed,
}

/// Basic connection statistics snapshot.
#[derive(Clone, Debug, Default)]
pub struct WsConnectionStats {
    pub uptime: Duration,
    pub frames_received: u64,
    pub frames_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub failures: u64,
    pub handshake_rejections: u64,
    pub recent_failures: Vec<String>,
}
