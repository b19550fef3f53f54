use std::collections::VecDeque;
use std::time::Instant;

use super::types::WsConnectionStats;

const MAX_RECENT_FAILURES: usize = 32;
const MAX_FAILURE_TEXT_BYTES: usize = 256;

fn truncate_string(s: &str) -> String {
    if s.len() <= MAX_FAILURE_TEXT_BYTES {
        return s.to_string();
    }

    let mut end = MAX_FAILURE_TEXT_BYTES;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Per-actor traffic and failure counters, kept across reconnects.
#[derive(Debug)]
pub struct WsHealthMonitor {
    connection_started: Instant,
    frames_received: u64,
    frames_sent: u64,
    bytes_received: u64,
    bytes_sent: u64,
    failures: u64,
    handshake_rejections: u64,
    recent_failures: VecDeque<String>,
}

impl Default for WsHealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl WsHealthMonitor {
    pub fn new() -> Self {
        Self {
            connection_started: Instant::now(),
            frames_received: 0,
            frames_sent: 0,
            bytes_received: 0,
            bytes_sent: 0,
            failures: 0,
            handshake_rejections: 0,
            recent_failures: VecDeque::with_capacity(MAX_RECENT_FAILURES),
        }
    }

    /// Restart the uptime clock for a freshly opened connection.
    pub fn reset(&mut self) {
        self.connection_started = Instant::now();
    }

    pub fn record_inbound_bytes(&mut self, bytes: usize) {
        self.bytes_received = self.bytes_received.saturating_add(bytes as u64);
    }

    pub fn record_frame_received(&mut self) {
        self.frames_received = self.frames_received.saturating_add(1);
    }

    pub fn record_sent(&mut self, wire_bytes: usize) {
        self.frames_sent = self.frames_sent.saturating_add(1);
        self.bytes_sent = self.bytes_sent.saturating_add(wire_bytes as u64);
    }

    pub fn record_failure(&mut self, reason: &str) {
        self.failures = self.failures.saturating_add(1);
        if self.recent_failures.len() == MAX_RECENT_FAILURES {
            self.recent_failures.pop_front();
        }
        self.recent_failures.push_back(truncate_string(reason));
    }

    pub fn record_handshake_rejection(&mut self, reason: &str) {
        self.handshake_rejections = self.handshake_rejections.saturating_add(1);
        self.record_failure(reason);
    }

    pub fn get_stats(&self) -> WsConnectionStats {
        WsConnectionStats {
            uptime: self.connection_started.elapsed(),
            frames_received: self.frames_received,
            frames_sent: self.frames_sent,
            bytes_received: self.bytes_received,
            bytes_sent: self.bytes_sent,
            failures: self.failures,
            handshake_rejections: self.handshake_rejections,
            recent_failures: self.recent_failures.iter().cloned().collect(),
        }
    }
}
