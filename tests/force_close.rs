mod common;

use std::time::Duration;

use common::{Harness, WAIT};
use tokio::time::Instant;
use ws_engine::ws::{
    CLOSE_PROTOCOL_ERROR, CloseConnection, DEFAULT_CLOSE_TIMEOUT, GetLifecycle,
    WsConnectionConfig, WsFrame, WsLifecycle, WsNotification,
};

#[tokio::test(start_paused = true)]
async fn unknown_opcode_is_force_closed_after_timeout() {
    let mut h = Harness::spawn();
    let mut conn = h.open().await;

    conn.send_frame(true, 0x3, b"").unwrap();
    let close = conn.recv_frame_timeout(WAIT).await.expect("close frame");
    assert_eq!(
        close.frame,
        WsFrame::close(CLOSE_PROTOCOL_ERROR, "Unknown opcode")
    );
    let sent_at = Instant::now();

    // The peer never answers; the client gives up on its own.
    conn.wait_closed_by_client().await;
    assert!(sent_at.elapsed() >= DEFAULT_CLOSE_TIMEOUT);
    assert_eq!(h.lifecycle().await, WsLifecycle::Closed);
    // A forced close is not a transport-closed event.
    h.assert_no_notification();
}

#[tokio::test(start_paused = true)]
async fn force_close_after_transport_closed_is_ignored() {
    let mut h = Harness::spawn();
    let mut conn = h.open().await;

    conn.send_frame(true, 0x3, b"").unwrap();
    assert!(conn.recv_frame_timeout(WAIT).await.is_some());
    conn.drop_socket();
    assert_eq!(h.next_notification().await, WsNotification::Closed);

    // A fresh connection must not be hit by the old timer.
    let _next = h.open().await;
    tokio::time::sleep(DEFAULT_CLOSE_TIMEOUT + Duration::from_secs(1)).await;

    assert_eq!(h.lifecycle().await, WsLifecycle::Open);
    h.assert_no_notification();
}

#[tokio::test(start_paused = true)]
async fn caller_close_is_bounded_by_timeout() {
    let mut h = Harness::spawn_with(WsConnectionConfig {
        close_timeout: Duration::from_secs(3),
        ..WsConnectionConfig::default()
    });
    let mut conn = h.open().await;

    h.actor.tell(CloseConnection).send().await.unwrap();
    assert!(conn.recv_frame_timeout(WAIT).await.expect("close").frame.is_close());
    let sent_at = Instant::now();

    conn.wait_closed_by_client().await;
    let waited = sent_at.elapsed();
    assert!(waited >= Duration::from_secs(3), "{waited:?}");
    assert!(waited < DEFAULT_CLOSE_TIMEOUT, "{waited:?}");
    assert_eq!(h.lifecycle().await, WsLifecycle::Closed);
}

#[tokio::test(start_paused = true)]
async fn clean_close_cancels_the_timer() {
    let mut h = Harness::spawn();
    let mut conn = h.open().await;

    h.actor.tell(CloseConnection).send().await.unwrap();
    assert!(conn.recv_frame_timeout(WAIT).await.is_some());
    conn.drop_socket();
    assert_eq!(h.next_notification().await, WsNotification::Closed);

    tokio::time::sleep(DEFAULT_CLOSE_TIMEOUT * 2).await;
    assert_eq!(h.lifecycle().await, WsLifecycle::Closed);
    h.assert_no_notification();
}

#[tokio::test(start_paused = true)]
async fn stalled_writer_does_not_block_the_force_close() {
    let mut h = Harness::spawn();
    let mut conn = h.open().await;

    // The peer stops reading: the close frame written on failure never completes.
    conn.stall_writes();
    conn.send_frame(true, 0x3, b"").unwrap();
    tokio::time::sleep(DEFAULT_CLOSE_TIMEOUT + Duration::from_secs(2)).await;

    let lifecycle = tokio::time::timeout(WAIT, h.actor.ask(GetLifecycle))
        .await
        .expect("actor stays responsive")
        .expect("lifecycle");
    assert_eq!(lifecycle, WsLifecycle::Closed);
    tokio::time::timeout(WAIT, conn.wait_closed_by_client())
        .await
        .expect("stalled writer released");
    h.assert_no_notification();

    let _next = h.open().await;
    assert_eq!(h.lifecycle().await, WsLifecycle::Open);
}
