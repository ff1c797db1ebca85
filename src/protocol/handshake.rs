//! The HTTP-like upgrade exchange.
//!
//! [`Handshake`] models both directions: a client request (`GET <resource>`)
//! and a server response (`HTTP/1.1 <status> <message>`). Headers keep their
//! arrival order and are looked up case-insensitively; a header that appears
//! twice is folded into one value joined with `"; "`. Draft-specific trailing
//! bytes (the Hixie-76 key material) travel in `content`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::{BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::parse::Parse;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// ```
/// use wsdraft::protocol::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.trim().as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Validate the Origin header against a list of allowed origins.
///
/// An empty list accepts anything, including a missing origin.
///
/// # Errors
///
/// Returns `Error::OriginNotAllowed` when the list is non-empty and the
/// origin is missing or not on it.
pub fn validate_origin(origin: Option<&str>, allowed: &[String]) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }
    match origin {
        Some(o) if allowed.iter().any(|a| a == o) => Ok(()),
        Some(o) => Err(Error::OriginNotAllowed {
            origin: o.to_string(),
        }),
        None => Err(Error::OriginNotAllowed {
            origin: "(none)".to_string(),
        }),
    }
}

/// Reject header values that would break the line framing.
///
/// # Errors
///
/// Returns `Error::InvalidHeaderValue` if the value contains `\r` or `\n`.
pub fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHeaderValue {
            header: header_name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}

/// Plain HTTP reply used to turn away a connection that will never upgrade.
///
/// 404 is sent when no draft accepts the request or the application rejects
/// it; anything else is reported as 500.
pub fn error_response(status: u16) -> Bytes {
    let description = match status {
        404 => "404 WebSocket Upgrade Failure",
        _ => "500 Internal Server Error",
    };
    let body = format!("<html><head></head><body><h1>{description}</h1></body></html>");
    Bytes::from(format!(
        "HTTP/1.1 {description}\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    ))
}

/// First line of a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    /// `GET /chat HTTP/1.1`
    Request { method: String, resource: String },
    /// `HTTP/1.1 101 Switching Protocols`
    Response { status: u16, message: String },
}

/// A handshake request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    start: StartLine,
    headers: Vec<(String, String)>,
    content: Option<Vec<u8>>,
}

impl Handshake {
    /// A `GET` request for `resource`.
    pub fn request(resource: impl Into<String>) -> Self {
        Self {
            start: StartLine::Request {
                method: "GET".to_string(),
                resource: resource.into(),
            },
            headers: Vec::new(),
            content: None,
        }
    }

    pub fn response(status: u16, message: impl Into<String>) -> Self {
        Self {
            start: StartLine::Response {
                status,
                message: message.into(),
            },
            headers: Vec::new(),
            content: None,
        }
    }

    #[must_use]
    pub fn start_line(&self) -> &StartLine {
        &self.start
    }

    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(self.start, StartLine::Request { .. })
    }

    /// Resource descriptor of a request.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        match &self.start {
            StartLine::Request { resource, .. } => Some(resource),
            StartLine::Response { .. } => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self.start {
            StartLine::Response { status, .. } => Some(status),
            StartLine::Request { .. } => None,
        }
    }

    /// Replace the status message of a response. No effect on requests.
    pub fn set_status_message(&mut self, new_message: impl Into<String>) {
        if let StartLine::Response { message, .. } = &mut self.start {
            *message = new_message.into();
        }
    }

    #[must_use]
    pub fn status_message(&self) -> Option<&str> {
        match &self.start {
            StartLine::Response { message, .. } => Some(message),
            StartLine::Request { .. } => None,
        }
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Header value, or `""` when absent.
    #[must_use]
    pub fn header_or_empty(&self, name: &str) -> &str {
        self.header(name).unwrap_or("")
    }

    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Set a header, replacing any existing value in place.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Add a header, folding a repeated name into `"old; new"`.
    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(slot) => {
                slot.1.push_str("; ");
                slot.1.push_str(&value);
            }
            None => self.headers.push((name, value)),
        }
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Headers in arrival order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    pub fn set_content(&mut self, content: Option<Vec<u8>>) {
        self.content = content;
    }

    /// Parse a handshake from the front of `buf`.
    ///
    /// `role` is the role of the endpoint doing the parsing: a server reads
    /// requests, a client reads responses. The returned length counts the
    /// header block including its blank line; `content` is left empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHandshake` for a malformed start line, a
    /// non-numeric status or a header line without a colon.
    pub fn parse(buf: &[u8], role: Role) -> Result<Parse<(Self, usize)>> {
        let mut pos = 0;
        let Some(first) = read_line(buf, &mut pos)? else {
            return Ok(incomplete(buf));
        };

        let mut tokens = first.splitn(3, ' ');
        let (Some(a), Some(b), Some(c)) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(Error::InvalidHandshake(format!("malformed start line: {first}")));
        };

        let start = match role {
            Role::Server => {
                if !c.starts_with("HTTP/") {
                    return Err(Error::InvalidHandshake(format!("not an http request: {first}")));
                }
                StartLine::Request {
                    method: a.to_string(),
                    resource: b.to_string(),
                }
            }
            Role::Client => {
                let status = b
                    .parse()
                    .map_err(|_| Error::InvalidHandshake(format!("invalid status code: {b}")))?;
                StartLine::Response {
                    status,
                    message: c.to_string(),
                }
            }
        };

        let mut handshake = Handshake {
            start,
            headers: Vec::new(),
            content: None,
        };

        loop {
            let Some(line) = read_line(buf, &mut pos)? else {
                return Ok(incomplete(buf));
            };
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::InvalidHandshake(format!("not an http header: {line}")))?;
            handshake.append_header(name.trim(), value.trim());
        }

        Ok(Parse::Complete((handshake, pos)))
    }

    /// Serialize: start line, `Name: Value` lines, blank line, content.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeaderValue` if a header value contains CR or LF.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(128 + self.content.as_ref().map_or(0, Vec::len));
        match &self.start {
            StartLine::Request { method, resource } => {
                buf.put_slice(format!("{method} {resource} HTTP/1.1\r\n").as_bytes());
            }
            StartLine::Response { status, message } => {
                buf.put_slice(format!("HTTP/1.1 {status} {message}\r\n").as_bytes());
            }
        }
        for (name, value) in &self.headers {
            validate_header_value(name, value)?;
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        if let Some(content) = &self.content {
            buf.put_slice(content);
        }
        Ok(buf.freeze())
    }
}

fn incomplete<T>(buf: &[u8]) -> Parse<T> {
    Parse::Incomplete {
        hint: buf.len() + 128,
    }
}

/// Next CRLF terminated line starting at `*pos`, advancing past the CRLF.
fn read_line<'a>(buf: &'a [u8], pos: &mut usize) -> Result<Option<&'a str>> {
    let rest = &buf[*pos..];
    let Some(end) = rest.windows(2).position(|w| w == b"\r\n") else {
        return Ok(None);
    };
    let line = std::str::from_utf8(&rest[..end])
        .map_err(|_| Error::InvalidHandshake("handshake line is not valid text".into()))?;
    *pos += end + 2;
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &[u8] = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    fn parse_complete(buf: &[u8], role: Role) -> (Handshake, usize) {
        match Handshake::parse(buf, role).unwrap() {
            Parse::Complete(done) => done,
            Parse::Incomplete { .. } => panic!("unexpected incomplete handshake"),
        }
    }

    #[test]
    fn test_compute_accept_key_rfc_vector() {
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_parse_request() {
        let (handshake, used) = parse_complete(REQUEST, Role::Server);
        assert_eq!(used, REQUEST.len());
        assert!(handshake.is_request());
        assert_eq!(handshake.resource(), Some("/chat"));
        assert_eq!(handshake.header("host"), Some("server.example.com"));
        assert_eq!(handshake.header("SEC-WEBSOCKET-VERSION"), Some("13"));
        assert_eq!(handshake.header("Origin"), None);
    }

    #[test]
    fn test_parse_response() {
        let data = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n";
        let (handshake, _) = parse_complete(data, Role::Client);
        assert_eq!(handshake.status(), Some(101));
        assert_eq!(handshake.status_message(), Some("Switching Protocols"));
        assert_eq!(handshake.header("upgrade"), Some("websocket"));
    }

    #[test]
    fn test_parse_incomplete_at_every_split() {
        for split in 0..REQUEST.len() {
            match Handshake::parse(&REQUEST[..split], Role::Server).unwrap() {
                Parse::Incomplete { hint } => assert!(hint > split),
                Parse::Complete(_) => panic!("complete at split {split}"),
            }
        }
    }

    #[test]
    fn test_parse_leaves_trailing_bytes() {
        let mut data = REQUEST.to_vec();
        data.extend_from_slice(b"\x81\x00");
        let (_, used) = parse_complete(&data, Role::Server);
        assert_eq!(&data[used..], b"\x81\x00");
    }

    #[test]
    fn test_repeated_headers_are_joined() {
        let data = b"GET / HTTP/1.1\r\nX-Thing: a\r\nx-thing:  b\r\n\r\n";
        let (handshake, _) = parse_complete(data, Role::Server);
        assert_eq!(handshake.header("X-Thing"), Some("a; b"));
        assert_eq!(handshake.headers().count(), 1);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            Handshake::parse(b"GARBAGE\r\n\r\n", Role::Server),
            Err(Error::InvalidHandshake(_))
        ));
        assert!(matches!(
            Handshake::parse(b"GET / HTTP/1.1\r\nno colon here\r\n\r\n", Role::Server),
            Err(Error::InvalidHandshake(_))
        ));
        assert!(matches!(
            Handshake::parse(b"HTTP/1.1 abc Nope\r\n\r\n", Role::Client),
            Err(Error::InvalidHandshake(_))
        ));
    }

    #[test]
    fn test_serialize_with_content() {
        let mut handshake = Handshake::request("/demo");
        handshake.set_header("Host", "example.com");
        handshake.set_header("host", "example.org");
        handshake.set_content(Some(b"^n:ds[4U".to_vec()));
        let bytes = handshake.to_bytes().unwrap();
        assert_eq!(
            &bytes[..],
            &b"GET /demo HTTP/1.1\r\nHost: example.org\r\n\r\n^n:ds[4U"[..]
        );
    }

    #[test]
    fn test_serialize_response_round_trip() {
        let mut response = Handshake::response(101, "Switching Protocols");
        response.set_header("Upgrade", "websocket");
        response.set_header("Sec-WebSocket-Accept", compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="));
        let bytes = response.to_bytes().unwrap();
        let (parsed, used) = parse_complete(&bytes, Role::Client);
        assert_eq!(used, bytes.len());
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_serialize_rejects_header_injection() {
        let mut handshake = Handshake::response(101, "Switching Protocols");
        handshake.set_header("X-Evil", "a\r\nSet-Cookie: x");
        assert!(matches!(
            handshake.to_bytes(),
            Err(Error::InvalidHeaderValue { .. })
        ));
    }

    #[test]
    fn test_validate_origin() {
        let allowed = vec!["https://example.com".to_string()];
        assert!(validate_origin(Some("https://example.com"), &allowed).is_ok());
        assert!(validate_origin(Some("https://evil.com"), &allowed).is_err());
        assert!(validate_origin(None, &allowed).is_err());
        assert!(validate_origin(None, &[]).is_ok());
    }

    #[test]
    fn test_error_response() {
        let bytes = error_response(404);
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 WebSocket Upgrade Failure\r\n"));
        let body = text.split("\r\n\r\n").nth(1).unwrap();
        assert!(text.contains(&format!("Content-Length: {}", body.len())));
        assert!(error_response(500).starts_with(b"HTTP/1.1 500 Internal Server Error"));
    }
}
