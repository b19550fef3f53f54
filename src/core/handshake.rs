//! Client side of the HTTP upgrade handshake (RFC 6455 section 4).
//!
//! ```http
//! GET /chat HTTP/1.1
//! Host: server.example.com
//! Connection: Upgrade
//! Upgrade: websocket
//! Sec-WebSocket-Version: 13
//! Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
//! ```
//!
//! The response is accepted only when all four checks pass; each failed check is reported.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use thiserror::Error;
use url::{Host, Url};

use super::types::WebSocketError;

/// RFC 6455 GUID appended to the challenge key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

const MAX_RESPONSE_HEAD_BYTES: usize = 16 * 1024;
const MAX_RESPONSE_HEADERS: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WsScheme {
    Ws,
    Wss,
}

impl WsScheme {
    pub fn default_port(self) -> u16 {
        match self {
            WsScheme::Ws => 80,
            WsScheme::Wss => 443,
        }
    }

    pub fn is_tls(self) -> bool {
        matches!(self, WsScheme::Wss)
    }
}

/// Target of a connection: everything needed to open the transport and build the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WsEndpoint {
    pub scheme: WsScheme,
    /// Host for DNS / TLS server name (IPv6 literals without brackets).
    pub host: String,
    pub port: u16,
    /// Path plus query, never empty.
    pub resource: String,
    /// `host[:port]` as sent in `Host`; the port is omitted when it is the scheme default.
    pub authority: String,
}

impl WsEndpoint {
    pub fn parse(uri: &str) -> Result<Self, WebSocketError> {
        let url = Url::parse(uri).map_err(|err| WebSocketError::InvalidUrl(format!("{uri}: {err}")))?;
        let scheme = match url.scheme() {
            "ws" => WsScheme::Ws,
            "wss" => WsScheme::Wss,
            other => {
                return Err(WebSocketError::InvalidUrl(format!(
                    "{uri}: unsupported scheme {other}"
                )));
            }
        };

        let (host, host_str) = match url.host() {
            Some(Host::Domain(domain)) => (domain.to_string(), domain.to_string()),
            Some(Host::Ipv4(addr)) => (addr.to_string(), addr.to_string()),
            Some(Host::Ipv6(addr)) => (addr.to_string(), format!("[{addr}]")),
            None => return Err(WebSocketError::InvalidUrl(format!("{uri}: missing host"))),
        };

        let port = url.port().unwrap_or_else(|| scheme.default_port());
        let authority = if port == scheme.default_port() {
            host_str
        } else {
            format!("{host_str}:{port}")
        };

        let mut resource = url.path().to_string();
        if resource.is_empty() {
            resource.push('/');
        }
        if let Some(query) = url.query() {
            resource.push('?');
            resource.push_str(query);
        }

        Ok(Self {
            scheme,
            host,
            port,
            resource,
            authority,
        })
    }

    pub fn origin(&self) -> String {
        match self.scheme {
            WsScheme::Ws => format!("http://{}", self.authority),
            WsScheme::Wss => format!("https://{}", self.authority),
        }
    }
}

impl fmt::Display for WsEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme {
            WsScheme::Ws => "ws",
            WsScheme::Wss => "wss",
        };
        write!(f, "{scheme}://{}{}", self.authority, self.resource)
    }
}

/// 16-byte nonce sent as `Sec-WebSocket-Key`. Lives only for one handshake attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeKey {
    encoded: String,
}

impl ChallengeKey {
    pub fn generate() -> Self {
        Self::from_bytes(rand::random::<[u8; 16]>())
    }

    pub fn from_bytes(raw: [u8; 16]) -> Self {
        Self {
            encoded: STANDARD.encode(raw),
        }
    }

    /// The base64 form as it appears on the wire.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn expected_accept(&self) -> String {
        compute_accept_key(&self.encoded)
    }
}

/// `base64(SHA1(key ++ GUID))`.
#[must_use]
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Serialize the upgrade request for `endpoint`.
pub fn build_request(endpoint: &WsEndpoint, key: &ChallengeKey, user_agent: &str) -> Bytes {
    let request = format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: {}\r\n\
         Origin: {}\r\n\
         User-Agent: {}\r\n\
         \r\n",
        endpoint.resource,
        endpoint.authority,
        key.as_str(),
        endpoint.origin(),
        user_agent,
    );
    Bytes::from(request)
}

/// Status line and headers of the upgrade response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl UpgradeResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// One failed handshake check.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HandshakeFailure {
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("expected status 101, got {0}")]
    Status(u16),
    #[error("Connection header is {0:?}, expected \"upgrade\"")]
    ConnectionHeader(Option<String>),
    #[error("Upgrade header is {0:?}, expected \"websocket\"")]
    UpgradeHeader(Option<String>),
    #[error("Sec-WebSocket-Accept is {actual:?}, expected {expected:?}")]
    AcceptMismatch {
        expected: String,
        actual: Option<String>,
    },
}

/// Every reason a response was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("handshake rejected: {}", join_failures(.failures))]
pub struct HandshakeRejection {
    pub failures: Vec<HandshakeFailure>,
}

fn join_failures(failures: &[HandshakeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse the response head from the front of `buf`.
///
/// Returns `Ok(None)` until the terminating blank line has arrived; on success also returns the
/// number of bytes the head occupied, so trailing frame bytes can be handed on.
pub fn parse_response(buf: &[u8]) -> Result<Option<(UpgradeResponse, usize)>, HandshakeFailure> {
    let Some(end) = find_head_end(buf) else {
        if buf.len() > MAX_RESPONSE_HEAD_BYTES {
            return Err(HandshakeFailure::Malformed(format!(
                "response head exceeds {MAX_RESPONSE_HEAD_BYTES} bytes"
            )));
        }
        return Ok(None);
    };

    let head = std::str::from_utf8(&buf[..end])
        .map_err(|_| HandshakeFailure::Malformed("response head is not UTF-8".to_string()))?;
    let mut lines = head.split("\r\n");

    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(HandshakeFailure::Malformed(format!(
            "bad status line {status_line:?}"
        )));
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| HandshakeFailure::Malformed(format!("bad status line {status_line:?}")))?;

    let mut headers = Vec::new();
    for line in lines.filter(|line| !line.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HandshakeFailure::Malformed(format!("bad header line {line:?}")))?;
        if headers.len() == MAX_RESPONSE_HEADERS {
            return Err(HandshakeFailure::Malformed("too many headers".to_string()));
        }
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(Some((UpgradeResponse { status, headers }, end + 4)))
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

/// Run all four checks, collecting every failure.
pub fn validate_response(
    response: &UpgradeResponse,
    key: &ChallengeKey,
) -> Result<(), HandshakeRejection> {
    let mut failures = Vec::new();

    if response.status != 101 {
        failures.push(HandshakeFailure::Status(response.status));
    }

    let connection = response.header("connection");
    if !connection.is_some_and(|value| value.eq_ignore_ascii_case("upgrade")) {
        failures.push(HandshakeFailure::ConnectionHeader(
            connection.map(str::to_string),
        ));
    }

    let upgrade = response.header("upgrade");
    if !upgrade.is_some_and(|value| value.eq_ignore_ascii_case("websocket")) {
        failures.push(HandshakeFailure::UpgradeHeader(upgrade.map(str::to_string)));
    }

    let expected = key.expected_accept();
    let accept = response.header("sec-websocket-accept");
    if accept != Some(expected.as_str()) {
        failures.push(HandshakeFailure::AcceptMismatch {
            expected,
            actual: accept.map(str::to_string),
        });
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(HandshakeRejection { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_KEY: [u8; 16] = *b"the sample nonce";

    fn response(status: u16, headers: &[(&str, &str)]) -> UpgradeResponse {
        UpgradeResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn accept_key_matches_rfc_example() {
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
        let key = ChallengeKey::from_bytes(RFC_KEY);
        assert_eq!(key.as_str(), "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(key.expected_accept(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn default_ports_follow_the_scheme() {
        let ws = WsEndpoint::parse("ws://localhost/ws").unwrap();
        assert_eq!((ws.host.as_str(), ws.port), ("localhost", 80));
        assert_eq!(ws.resource, "/ws");
        assert_eq!(ws.authority, "localhost");

        let wss = WsEndpoint::parse("wss://host/path").unwrap();
        assert_eq!(wss.port, 443);
        assert!(wss.scheme.is_tls());
        assert_eq!(wss.origin(), "https://host");
    }

    #[test]
    fn explicit_port_query_and_ipv6_are_kept() {
        let ep = WsEndpoint::parse("ws://localhost:4000/ws?room=1").unwrap();
        assert_eq!(ep.port, 4000);
        assert_eq!(ep.authority, "localhost:4000");
        assert_eq!(ep.resource, "/ws?room=1");
        assert_eq!(ep.origin(), "http://localhost:4000");

        let v6 = WsEndpoint::parse("ws://[::1]:9001").unwrap();
        assert_eq!(v6.host, "::1");
        assert_eq!(v6.authority, "[::1]:9001");
        assert_eq!(v6.resource, "/");
    }

    #[test]
    fn non_websocket_schemes_are_rejected() {
        assert!(matches!(
            WsEndpoint::parse("http://example.com"),
            Err(WebSocketError::InvalidUrl(_))
        ));
        assert!(WsEndpoint::parse("not a url").is_err());
    }

    #[test]
    fn request_carries_every_upgrade_header() {
        let ep = WsEndpoint::parse("ws://example.com:8080/chat").unwrap();
        let key = ChallengeKey::from_bytes(RFC_KEY);
        let request = build_request(&ep, &key, "ua/1");
        let text = std::str::from_utf8(&request).unwrap();
        assert!(text.starts_with("GET /chat HTTP/1.1\r\n"));
        for line in [
            "Host: example.com:8080\r\n",
            "Connection: Upgrade\r\n",
            "Upgrade: websocket\r\n",
            "Sec-WebSocket-Version: 13\r\n",
            "Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n",
            "Origin: http://example.com:8080\r\n",
            "User-Agent: ua/1\r\n",
        ] {
            assert!(text.contains(line), "missing {line:?}");
        }
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn response_head_is_parsed_with_trailing_bytes_left_over() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n\x81\x00";
        let (resp, consumed) = parse_response(raw).unwrap().unwrap();
        assert_eq!(resp.status, 101);
        assert_eq!(resp.header("UPGRADE"), Some("websocket"));
        assert_eq!(&raw[consumed..], b"\x81\x00");
    }

    #[test]
    fn partial_response_waits_for_more_bytes() {
        assert_eq!(parse_response(b"HTTP/1.1 101 Switching"), Ok(None));
        assert!(matches!(
            parse_response(b"SMTP ready\r\n\r\n"),
            Err(HandshakeFailure::Malformed(_))
        ));
    }

    #[test]
    fn valid_response_passes_case_insensitively() {
        let key = ChallengeKey::from_bytes(RFC_KEY);
        let resp = response(
            101,
            &[
                ("connection", "UPGRADE"),
                ("Upgrade", "WebSocket"),
                ("Sec-WebSocket-Accept", "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="),
            ],
        );
        assert!(validate_response(&resp, &key).is_ok());
    }

    #[test]
    fn every_failed_check_is_reported() {
        let key = ChallengeKey::from_bytes(RFC_KEY);
        let resp = response(200, &[("Connection", "keep-alive")]);
        let rejection = validate_response(&resp, &key).unwrap_err();
        assert_eq!(
            rejection.failures,
            vec![
                HandshakeFailure::Status(200),
                HandshakeFailure::ConnectionHeader(Some("keep-alive".to_string())),
                HandshakeFailure::UpgradeHeader(None),
                HandshakeFailure::AcceptMismatch {
                    expected: "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=".to_string(),
                    actual: None,
                },
            ]
        );
    }

    #[test]
    fn wrong_accept_alone_is_rejected() {
        let key = ChallengeKey::from_bytes(RFC_KEY);
        let resp = response(
            101,
            &[
                ("Connection", "Upgrade"),
                ("Upgrade", "websocket"),
                ("Sec-WebSocket-Accept", "bogus"),
            ],
        );
        let rejection = validate_response(&resp, &key).unwrap_err();
        assert_eq!(rejection.failures.len(), 1);
        assert!(matches!(
            rejection.failures[0],
            HandshakeFailure::AcceptMismatch { .. }
        ));
    }
}
