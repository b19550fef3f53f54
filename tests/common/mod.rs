#![allow(dead_code)]

use std::time::Duration;

use kameo::Actor;
use kameo::prelude::ActorRef;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use ws_engine::testing::{MockConnection, MockServer, MockTransport};
use ws_engine::ws::{
    Connect, GetLifecycle, ProtocolFrameHandler, WebSocketActor, WebSocketActorArgs,
    WsConnectionConfig, WsEndpoint, WsLifecycle, WsNotification,
};

pub type Parent = mpsc::UnboundedSender<WsNotification>;
pub type TestWsActor = WebSocketActor<Parent, ProtocolFrameHandler, MockTransport>;
pub type TestWsActorRef = ActorRef<TestWsActor>;

pub const WAIT: Duration = Duration::from_secs(2);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub actor: TestWsActorRef,
    pub server: MockServer,
    pub notifications: mpsc::UnboundedReceiver<WsNotification>,
}

impl Harness {
    pub fn spawn() -> Self {
        Self::spawn_with(WsConnectionConfig::default())
    }

    pub fn spawn_with(config: WsConnectionConfig) -> Self {
        init_tracing();
        let (transport, server) = MockTransport::channel_pair();
        let (tx, notifications) = mpsc::unbounded_channel();
        let actor = WebSocketActor::spawn(WebSocketActorArgs {
            endpoint: WsEndpoint::parse("ws://mock.test/socket?v=1").expect("endpoint"),
            parent: tx,
            handler: ProtocolFrameHandler,
            transport,
            config,
        });
        Self {
            actor,
            server,
            notifications,
        }
    }

    /// Connect and hand back the server end, with the upgrade request still unread.
    pub async fn connect(&mut self) -> MockConnection {
        self.actor.ask(Connect).await.expect("connect");
        self.server.accept().await.expect("connection accepted")
    }

    /// Connect, complete the handshake and consume the `Open` notification.
    pub async fn open(&mut self) -> MockConnection {
        let mut conn = self.connect().await;
        conn.accept_handshake().await.expect("handshake");
        assert_eq!(self.next_notification().await, WsNotification::Open);
        conn
    }

    pub async fn next_notification(&mut self) -> WsNotification {
        tokio::time::timeout(WAIT, self.notifications.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("notification channel closed")
    }

    pub async fn lifecycle(&self) -> WsLifecycle {
        self.actor.ask(GetLifecycle).await.expect("lifecycle")
    }

    /// Assert nothing is queued for the parent right now.
    pub fn assert_no_notification(&mut self) {
        if let Ok(notification) = self.notifications.try_recv() {
            panic!("unexpected notification: {notification:?}");
        }
    }
}
