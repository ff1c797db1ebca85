use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::connection::{Listener, ReadyState, Role};
use crate::draft::{CloseHandshakeType, Draft, HandshakeState, match_flash_policy};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::assembler::MessageAssembler;
use crate::protocol::handshake::{Handshake, error_response, validate_origin};
use crate::protocol::parse::Parse;
use crate::protocol::{Frame, OpCode};

/// The `(code, reason, remote)` triple recorded when a close begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: CloseCode,
    pub reason: String,
    /// The peer chose the code.
    pub remote: bool,
}

/// Outcome of one pass over the buffered handshake bytes.
enum Step {
    /// Need more bytes.
    Wait,
    /// Handshake done; the first `n` bytes belonged to it.
    Opened(usize),
    /// The connection is being torn down.
    Failed,
}

/// A sans-IO WebSocket connection.
///
/// The connection never touches a socket. Bytes read from the transport are
/// handed to [`feed`](Self::feed); bytes to write are taken from the
/// outbound queue ([`pop_outbound`](Self::pop_outbound) or
/// [`front_outbound`](Self::front_outbound) plus
/// [`advance_outbound`](Self::advance_outbound) for partial writes). Events
/// go to the [`Listener`] `L`.
///
/// All methods take `&mut self`; a connection is driven by one task at a time.
///
/// # Example
///
/// ```
/// use wsdraft::{Config, Connection, Draft, Handshake, ReadyState};
///
/// let mut server = Connection::server(Config::server(), ());
/// let mut client = Connection::client(Config::client(), &Draft::rfc6455(), ());
///
/// let mut request = Handshake::request("/chat");
/// request.set_header("Host", "example.com");
/// client.start_handshake(request).unwrap();
///
/// while let Some(bytes) = client.pop_outbound() {
///     server.feed(&bytes);
/// }
/// while let Some(bytes) = server.pop_outbound() {
///     client.feed(&bytes);
/// }
/// assert_eq!(client.ready_state(), ReadyState::Open);
/// assert_eq!(server.ready_state(), ReadyState::Open);
/// ```
pub struct Connection<L> {
    role: Role,
    config: Config,
    state: ReadyState,
    /// Bound draft. A client has one from the start, a server once negotiation succeeds.
    draft: Option<Draft>,
    /// Server draft that answered `Matching` and is waiting for more bytes.
    candidate: Option<Draft>,
    handshake_buf: BytesMut,
    /// Client: the request sent. Server: the request accepted.
    request: Option<Handshake>,
    assembler: MessageAssembler,
    /// An outgoing message streamed through `send_fragment` is still open.
    sending_fragmented: bool,
    outbound: VecDeque<Bytes>,
    flush_and_close: bool,
    /// A close frame is on its way to the peer.
    close_queued: bool,
    opened: bool,
    close_info: Option<CloseInfo>,
    listener: L,
}

impl<L: Listener> Connection<L> {
    /// A server connection that negotiates one of `config.drafts`.
    pub fn server(config: Config, listener: L) -> Self {
        Self::new(Role::Server, config, None, listener)
    }

    /// A client connection speaking `draft`.
    ///
    /// `draft` is a template; the connection works on its own instance.
    pub fn client(config: Config, draft: &Draft, listener: L) -> Self {
        let draft = draft.instantiate(Role::Client, &config);
        Self::new(Role::Client, config, Some(draft), listener)
    }

    fn new(role: Role, config: Config, draft: Option<Draft>, listener: L) -> Self {
        Self {
            role,
            assembler: MessageAssembler::new(config.limits),
            handshake_buf: BytesMut::with_capacity(config.read_buffer_size),
            config,
            state: ReadyState::NotYetConnected,
            draft,
            candidate: None,
            request: None,
            sending_fragmented: false,
            outbound: VecDeque::new(),
            flush_and_close: false,
            close_queued: false,
            opened: false,
            close_info: None,
            listener,
        }
    }

    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.state
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The negotiated draft, if any.
    #[must_use]
    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    /// `true` once a close has begun; no further application data is accepted.
    #[must_use]
    pub fn is_flush_and_close(&self) -> bool {
        self.flush_and_close
    }

    #[must_use]
    pub fn close_info(&self) -> Option<&CloseInfo> {
        self.close_info.as_ref()
    }

    #[must_use]
    pub fn handshake_request(&self) -> Option<&Handshake> {
        self.request.as_ref()
    }

    /// Resource the client asked for.
    #[must_use]
    pub fn resource_descriptor(&self) -> Option<&str> {
        self.request.as_ref().and_then(Handshake::resource)
    }

    /// Subprotocol agreed during the handshake.
    #[must_use]
    pub fn protocol(&self) -> Option<&str> {
        self.draft.as_ref().and_then(Draft::protocol)
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    // ---- outbound queue ----

    /// Bytes are waiting to be written.
    #[must_use]
    pub fn has_buffered_data(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Number of queued chunks.
    #[must_use]
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    #[must_use]
    pub fn front_outbound(&self) -> Option<&Bytes> {
        self.outbound.front()
    }

    /// Mark `n` bytes of the front chunk as written.
    pub fn advance_outbound(&mut self, n: usize) {
        if let Some(front) = self.outbound.front_mut() {
            if n >= front.len() {
                self.outbound.pop_front();
            } else {
                front.advance(n);
            }
        }
    }

    pub fn pop_outbound(&mut self) -> Option<Bytes> {
        self.outbound.pop_front()
    }

    /// A close has begun and the queue is drained: close the transport now.
    ///
    /// Servers close the transport themselves. An opened client that sent a
    /// close frame waits for the server to do it and learns about it through
    /// [`eot`](Self::eot). Without a close frame on the wire nobody would
    /// answer, so such a client closes too.
    #[must_use]
    pub fn should_close_transport(&self) -> bool {
        self.flush_and_close
            && self.outbound.is_empty()
            && self.state != ReadyState::Closed
            && (self.role == Role::Server || !self.opened || !self.close_queued)
    }

    fn queue(&mut self, bytes: Bytes) {
        trace!(len = bytes.len(), queued = self.outbound.len(), "queueing outbound bytes");
        self.outbound.push_back(bytes);
        self.listener.on_write_demand();
    }

    // ---- handshake ----

    /// Queue the client upgrade request.
    ///
    /// The bound draft adds the headers it needs before the listener sees
    /// the request.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` on a server or after the handshake started
    /// - any error the listener returns from `on_handshake_sent`
    /// - `Error::InvalidHeaderValue` for header values containing CR or LF
    pub fn start_handshake(&mut self, mut request: Handshake) -> Result<()> {
        if self.role != Role::Client || self.state != ReadyState::NotYetConnected {
            return Err(Error::ProtocolViolation("handshake already started".into()));
        }
        let draft = self.draft.as_mut().ok_or(Error::NotConnected)?;
        draft.post_process_request_as_client(&mut request);
        self.listener.on_handshake_sent(&request)?;
        let bytes = request.to_bytes()?;

        debug!(draft = %draft, resource = request.resource().unwrap_or("/"), "sending handshake");
        self.request = Some(request);
        self.state = ReadyState::Connecting;
        self.queue(bytes);
        Ok(())
    }

    /// Process bytes read from the transport.
    ///
    /// Before the handshake completes the bytes are buffered until a draft
    /// decides; whatever follows the handshake is decoded as frames right
    /// away. Protocol errors close the connection and are reported to the
    /// listener, never returned.
    pub fn feed(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        match self.state {
            ReadyState::NotYetConnected | ReadyState::Connecting => {
                if self.flush_and_close {
                    trace!(len = data.len(), "ignoring bytes after a failed handshake");
                    return;
                }
                self.handshake_buf.extend_from_slice(data);
                self.read_handshake();
            }
            ReadyState::Open | ReadyState::Closing => self.decode_frames(data),
            ReadyState::Closed => trace!(len = data.len(), "ignoring bytes on a closed connection"),
        }
    }

    fn read_handshake(&mut self) {
        let buf = std::mem::take(&mut self.handshake_buf);
        let step = match self.role {
            Role::Server => self.negotiate_as_server(&buf),
            Role::Client => self.negotiate_as_client(&buf),
        };
        match step {
            Step::Wait => {
                if let Err(e) = self.config.limits.check_handshake_size(buf.len()) {
                    self.fail_handshake(e);
                } else {
                    self.handshake_buf = buf;
                }
            }
            Step::Opened(used) => {
                if used < buf.len() {
                    self.decode_frames(&buf[used..]);
                }
            }
            Step::Failed => {}
        }
    }

    fn negotiate_as_server(&mut self, buf: &[u8]) -> Step {
        if self.config.flash_policy && self.candidate.is_none() {
            match match_flash_policy(buf) {
                HandshakeState::Matching => return Step::Wait,
                HandshakeState::Matched => {
                    debug!("answering flash policy request");
                    let policy = self.listener.flash_policy();
                    self.queue(Bytes::from(policy));
                    self.close_inner(CloseCode::FlashPolicy, String::new(), true);
                    return Step::Failed;
                }
                HandshakeState::NotMatched => {}
            }
        }

        if let Some(mut draft) = self.candidate.take() {
            return match draft.parse_handshake(buf) {
                Ok(Parse::Incomplete { .. }) => {
                    self.candidate = Some(draft);
                    Step::Wait
                }
                Ok(Parse::Complete((request, used))) => match draft.accept_as_server(&request) {
                    HandshakeState::Matched => self.accept_as_server(draft, request, used),
                    HandshakeState::Matching => {
                        self.candidate = Some(draft);
                        Step::Wait
                    }
                    HandshakeState::NotMatched => {
                        self.fail_handshake(Error::InvalidHandshake("the handshake did finally not match".into()));
                        Step::Failed
                    }
                },
                Err(e) => {
                    self.fail_handshake(e);
                    Step::Failed
                }
            };
        }

        let mut matched = None;
        for template in &self.config.drafts {
            let mut draft = template.instantiate(Role::Server, &self.config);
            match draft.parse_handshake(buf) {
                Ok(Parse::Complete((request, used))) => match draft.accept_as_server(&request) {
                    HandshakeState::Matched => {
                        matched = Some((draft, request, used));
                        break;
                    }
                    HandshakeState::Matching => {
                        trace!(draft = %draft, "draft needs more bytes");
                        self.candidate = Some(draft);
                        return Step::Wait;
                    }
                    HandshakeState::NotMatched => trace!(draft = %draft, "draft refused request"),
                },
                // Every draft shares the header parser: nobody can decide yet.
                Ok(Parse::Incomplete { .. }) => return Step::Wait,
                Err(e) => trace!(draft = %draft, error = %e, "draft cannot parse request"),
            }
        }

        match matched {
            Some((draft, request, used)) => self.accept_as_server(draft, request, used),
            None => {
                self.fail_handshake(Error::InvalidHandshake("no draft matches".into()));
                Step::Failed
            }
        }
    }

    fn accept_as_server(&mut self, mut draft: Draft, request: Handshake, used: usize) -> Step {
        match self.build_response(&mut draft, &request) {
            Ok(bytes) => {
                debug!(draft = %draft, resource = request.resource().unwrap_or("/"), "handshake accepted");
                self.queue(bytes);
                self.draft = Some(draft);
                self.open(&request);
                self.request = Some(request);
                Step::Opened(used)
            }
            Err(e) => {
                self.fail_handshake(e);
                Step::Failed
            }
        }
    }

    fn build_response(&mut self, draft: &mut Draft, request: &Handshake) -> Result<Bytes> {
        if let Some(allowed) = &self.config.allowed_origins {
            validate_origin(request.header("Origin"), allowed)?;
        }
        let mut response = Handshake::response(101, "Switching Protocols");
        self.listener.on_handshake_received_as_server(request, &mut response)?;
        draft.post_process_response_as_server(request, &mut response)?;
        response.to_bytes()
    }

    /// Refuse a handshake. Servers answer with a plain HTTP error first.
    fn fail_handshake(&mut self, error: Error) {
        let refused = matches!(
            error,
            Error::Rejected { .. }
                | Error::OriginNotAllowed { .. }
                | Error::InvalidHandshake(_)
                | Error::HandshakeTooLarge { .. }
        );
        let (status, code) = if refused {
            (404, error.close_code())
        } else {
            self.listener.on_error(&error);
            (500, CloseCode::NeverConnected)
        };
        warn!(status, error = %error, role = %self.role, "handshake failed");
        if self.role == Role::Server {
            self.queue(error_response(status));
        }
        self.flush_and_close(code, error.to_string(), false);
    }

    fn negotiate_as_client(&mut self, buf: &[u8]) -> Step {
        let (Some(draft), Some(request)) = (self.draft.as_mut(), self.request.as_ref()) else {
            return Step::Wait;
        };
        let (response, used) = match draft.parse_handshake(buf) {
            Ok(Parse::Complete(done)) => done,
            Ok(Parse::Incomplete { .. }) => return Step::Wait,
            Err(e) => {
                self.close_inner(e.close_code(), e.to_string(), false);
                return Step::Failed;
            }
        };

        match draft.accept_as_client(request, &response) {
            HandshakeState::Matched => {}
            HandshakeState::Matching => return Step::Wait,
            HandshakeState::NotMatched => {
                let reason = format!("draft {draft} refuses handshake");
                debug!(status = ?response.status(), "{reason}");
                self.close_inner(CloseCode::ProtocolError, reason, false);
                return Step::Failed;
            }
        }

        if let Err(e) = self.listener.on_handshake_received_as_client(request, &response) {
            let code = match e {
                Error::Rejected { code, .. } => code,
                _ => {
                    self.listener.on_error(&e);
                    CloseCode::NeverConnected
                }
            };
            self.flush_and_close(code, e.to_string(), false);
            return Step::Failed;
        }

        debug!(protocol = ?draft.protocol(), "handshake accepted by client");
        self.open(&response);
        Step::Opened(used)
    }

    fn open(&mut self, handshake: &Handshake) {
        self.state = ReadyState::Open;
        self.opened = true;
        self.handshake_buf = BytesMut::new();
        if let Err(e) = self.listener.on_open(handshake) {
            self.listener.on_error(&e);
        }
    }

    // ---- frames ----

    fn decode_frames(&mut self, data: &[u8]) {
        let Some(draft) = self.draft.as_mut() else {
            return;
        };
        let mut frames = Vec::new();
        let decoded = draft.decode(data, &mut frames);

        for frame in frames {
            if self.state == ReadyState::Closed {
                return;
            }
            if let Err(e) = self.process_frame(frame) {
                self.fail(e);
                return;
            }
        }
        if let Err(e) = decoded {
            self.fail(e);
        }
    }

    fn fail(&mut self, error: Error) {
        warn!(error = %error, role = %self.role, "closing on protocol error");
        self.listener.on_error(&error);
        self.assembler.reset();
        self.close_inner(error.close_code(), error.to_string(), false);
    }

    fn process_frame(&mut self, frame: Frame) -> Result<()> {
        trace!(opcode = %frame.opcode, fin = frame.fin, len = frame.payload().len(), state = %self.state, "frame received");
        match frame.opcode {
            OpCode::Close => {
                let close = CloseFrame::from_payload(frame.payload())?;
                if self.state == ReadyState::Closing {
                    self.close_connection_with(close.code, &close.reason, true);
                } else if self.close_handshake_type() == Some(CloseHandshakeType::TwoWay) {
                    self.close_inner(close.code, close.reason, true);
                } else {
                    self.flush_and_close(close.code, close.reason, true);
                    self.state = ReadyState::Closing;
                }
            }
            _ if self.state != ReadyState::Open => {
                trace!(opcode = %frame.opcode, "dropping frame while closing");
            }
            OpCode::Ping => {
                let pong = self.listener.on_ping(frame.payload());
                if let Err(e) = self.send_control(OpCode::Pong, pong) {
                    self.listener.on_error(&e);
                }
            }
            OpCode::Pong => self.listener.on_pong(frame.payload()),
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                if !frame.fin || frame.opcode == OpCode::Continuation {
                    self.listener.on_fragment(&frame);
                }
                if let Some(assembled) = self.assembler.push(&frame)? {
                    let message = assembled.into_message()?;
                    if let Err(e) = self.listener.on_message(message) {
                        self.listener.on_error(&e);
                    }
                }
            }
        }
        Ok(())
    }

    // ---- sending ----

    /// Send a text message, fragmented by `config.fragment_size`.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` unless the connection is open
    /// - `Error::MessageTooLarge` over `limits.max_message_size`
    /// - `Error::NotSendable` while a [`send_fragment`](Self::send_fragment) stream is open
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.send_data(OpCode::Text, Bytes::copy_from_slice(text.as_bytes()), true)
    }

    /// Send a binary message.
    ///
    /// # Errors
    ///
    /// As [`send_text`](Self::send_text), plus `Error::NotSendable` on Hixie drafts.
    pub fn send_binary(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.send_data(OpCode::Binary, data.into(), true)
    }

    /// Send any [`Message`]. `Message::Close` starts the close handshake.
    ///
    /// # Errors
    ///
    /// See the specific `send_*` methods.
    pub fn send(&mut self, message: Message) -> Result<()> {
        match message {
            Message::Text(text) => self.send_data(OpCode::Text, Bytes::from(text.into_bytes()), true),
            Message::Binary(data) => self.send_data(OpCode::Binary, Bytes::from(data), true),
            Message::Ping(data) => self.send_ping(data),
            Message::Pong(data) => self.send_pong(data),
            Message::Close(frame) => {
                let frame = frame.unwrap_or_else(|| CloseFrame::new(CloseCode::Normal, ""));
                self.close(frame.code, &frame.reason);
                Ok(())
            }
        }
    }

    /// Send one piece of a message the application streams itself.
    ///
    /// The first call opens the message with `opcode`; later calls continue
    /// it whatever `opcode` they pass, until one with `fin` set ends it.
    ///
    /// # Errors
    ///
    /// - `Error::NotSendable` unless `opcode` is text or binary
    /// - `Error::NotConnected` unless the connection is open
    pub fn send_fragment(&mut self, opcode: OpCode, data: impl Into<Bytes>, fin: bool) -> Result<()> {
        if !matches!(opcode, OpCode::Text | OpCode::Binary) {
            return Err(Error::NotSendable("fragments other than text or binary"));
        }
        let opcode = if self.sending_fragmented {
            OpCode::Continuation
        } else {
            opcode
        };
        self.send_data(opcode, data.into(), fin)?;
        self.sending_fragmented = !fin;
        Ok(())
    }

    /// Send a ping, typically on behalf of a liveness timer.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` unless the connection is open
    /// - `Error::ControlFrameTooLarge` over 125 bytes
    /// - `Error::NotSendable` on Hixie drafts
    pub fn send_ping(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        self.send_control(OpCode::Ping, payload)
    }

    /// Send an unsolicited pong.
    ///
    /// # Errors
    ///
    /// As [`send_ping`](Self::send_ping).
    pub fn send_pong(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        self.send_control(OpCode::Pong, payload)
    }

    fn send_control(&mut self, opcode: OpCode, payload: impl Into<Bytes>) -> Result<()> {
        if !self.state.can_send() {
            return Err(Error::NotConnected);
        }
        let draft = self.draft.as_mut().ok_or(Error::NotConnected)?;
        let bytes = draft.encode_frame(Frame::new(true, opcode, payload))?;
        self.queue(bytes);
        Ok(())
    }

    fn send_data(&mut self, opcode: OpCode, payload: Bytes, fin: bool) -> Result<()> {
        if !self.state.can_send() {
            return Err(Error::NotConnected);
        }
        if self.sending_fragmented && opcode != OpCode::Continuation {
            return Err(Error::NotSendable("a new message inside a fragmented one"));
        }
        self.config.limits.check_message_size(payload.len())?;
        let draft = self.draft.as_mut().ok_or(Error::NotConnected)?;

        let frames = draft.encode_frames(opcode, payload, fin)?;
        let encoded = frames
            .into_iter()
            .map(|frame| draft.encode_frame(frame))
            .collect::<Result<Vec<_>>>()?;
        trace!(opcode = %opcode, frames = encoded.len(), "sending message");
        for bytes in encoded {
            self.queue(bytes);
        }
        Ok(())
    }

    // ---- closing ----

    /// Start closing the connection.
    ///
    /// Only the first call has an effect. While open, drafts with a close
    /// handshake queue a close frame; the transport should be closed once
    /// [`should_close_transport`](Self::should_close_transport) says so.
    /// `CloseCode::Abnormal` skips the close frame.
    pub fn close(&mut self, code: CloseCode, reason: &str) {
        self.close_inner(code, reason.to_string(), false);
    }

    fn close_inner(&mut self, code: CloseCode, reason: String, remote: bool) {
        if matches!(self.state, ReadyState::Closing | ReadyState::Closed) {
            return;
        }
        if self.state == ReadyState::Open {
            if code == CloseCode::Abnormal {
                self.state = ReadyState::Closing;
                self.flush_and_close(code, reason, false);
                return;
            }
            if self.close_handshake_type() != Some(CloseHandshakeType::None) {
                if !remote {
                    self.listener.on_close_initiated(code, &reason);
                }
                match self.encode_close(code, &reason) {
                    Ok(bytes) => {
                        self.queue(bytes);
                        self.close_queued = true;
                    }
                    Err(e) => {
                        self.listener.on_error(&e);
                        self.flush_and_close(CloseCode::Abnormal, "generated frame is invalid", false);
                    }
                }
            }
            self.flush_and_close(code, reason, remote);
        } else if code == CloseCode::FlashPolicy {
            self.flush_and_close(CloseCode::FlashPolicy, reason, true);
        } else {
            self.flush_and_close(CloseCode::NeverConnected, reason, false);
        }
        self.state = ReadyState::Closing;
    }

    fn encode_close(&mut self, code: CloseCode, reason: &str) -> Result<Bytes> {
        let payload = CloseFrame::new(code, reason).to_payload()?;
        let draft = self.draft.as_mut().ok_or(Error::NotConnected)?;
        draft.encode_frame(Frame::new(true, OpCode::Close, payload))
    }

    /// Record the close triple and stop accepting application data.
    fn flush_and_close(&mut self, code: CloseCode, reason: impl Into<String>, remote: bool) {
        if self.flush_and_close {
            return;
        }
        let reason = reason.into();
        debug!(code = %code, reason = %reason, remote, "flush and close");
        self.flush_and_close = true;
        self.listener.on_write_demand();
        self.listener.on_closing(code, &reason, remote);
        self.close_info = Some(CloseInfo { code, reason, remote });
        self.handshake_buf = BytesMut::new();
        self.candidate = None;
    }

    /// Finish closing with the recorded close triple, or as [`eot`](Self::eot)
    /// would if none was recorded. Called once the transport is gone.
    pub fn close_connection(&mut self) {
        match self.close_info.clone() {
            Some(info) => self.close_connection_with(info.code, &info.reason, info.remote),
            None => self.eot(),
        }
    }

    /// Finish closing with an explicit code. No effect once closed.
    pub fn close_connection_with(&mut self, code: CloseCode, reason: &str, remote: bool) {
        if self.state == ReadyState::Closed {
            return;
        }
        debug!(code = %code, reason, remote, role = %self.role, "connection closed");
        self.listener.on_close(code, reason, remote);
        if let Some(draft) = self.draft.as_mut() {
            draft.reset();
        }
        self.assembler.reset();
        self.state = ReadyState::Closed;
        self.outbound.clear();
    }

    /// The transport reached end of stream.
    pub fn eot(&mut self) {
        if self.state == ReadyState::NotYetConnected || self.draft.is_none() {
            self.close_connection_with(CloseCode::NeverConnected, "", true);
            return;
        }
        if let Some(info) = self.close_info.clone() {
            self.close_connection_with(info.code, &info.reason, info.remote);
            return;
        }
        let code = match self.close_handshake_type() {
            Some(CloseHandshakeType::None) => CloseCode::Normal,
            Some(CloseHandshakeType::OneWay) if self.role == Role::Client => CloseCode::Normal,
            _ => CloseCode::Abnormal,
        };
        self.close_connection_with(code, "", true);
    }

    fn close_handshake_type(&self) -> Option<CloseHandshakeType> {
        self.draft.as_ref().map(Draft::close_handshake_type)
    }
}

impl<L> std::fmt::Debug for Connection<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("draft", &self.draft.as_ref().map(Draft::kind))
            .field("outbound", &self.outbound.len())
            .field("flush_and_close", &self.flush_and_close)
            .field("close_info", &self.close_info)
            .finish_non_exhaustive()
    }
}
