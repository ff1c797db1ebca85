//! HyBi-10 and RFC 6455: binary framing with a SHA-1 handshake proof.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

use super::{HandshakeState, basic_accept};
use crate::config::{Config, Limits};
use crate::connection::{MessageFragmenter, Role};
use crate::error::{Error, Result};
use crate::extensions::{Extension, ExtensionOffer, RsvBits};
use crate::protocol::handshake::{Handshake, compute_accept_key};
use crate::protocol::mask::{MaskGenerator, fill_random};
use crate::protocol::parse::Parse;
use crate::protocol::{Frame, FrameValidator, OpCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HybiVersion {
    /// `Sec-WebSocket-Version` 7 or 8.
    Hybi10,
    /// `Sec-WebSocket-Version` 13.
    Rfc6455,
}

impl HybiVersion {
    /// Version number a client announces.
    #[must_use]
    pub const fn announced(self) -> u8 {
        match self {
            HybiVersion::Hybi10 => 8,
            HybiVersion::Rfc6455 => 13,
        }
    }

    #[must_use]
    pub const fn accepts(self, version: u8) -> bool {
        match self {
            HybiVersion::Hybi10 => matches!(version, 7 | 8),
            HybiVersion::Rfc6455 => version == 13,
        }
    }
}

/// State of a HyBi family draft.
#[derive(Debug, Clone)]
pub struct Hybi {
    version: HybiVersion,
    role: Role,
    /// Subprotocols this endpoint speaks, in preference order.
    protocols: Vec<String>,
    /// Extensions this endpoint is willing to negotiate.
    extensions: Vec<Extension>,
    protocol: Option<String>,
    active: Vec<Extension>,
    /// Accepted offer echoed back by a server.
    extension_reply: Option<ExtensionOffer>,
    fragment_size: usize,
    validator: FrameValidator,
    masks: MaskGenerator,
    pending: BytesMut,
}

impl Hybi {
    #[must_use]
    pub fn new(version: HybiVersion) -> Self {
        Self {
            version,
            role: Role::Server,
            protocols: Vec::new(),
            extensions: Vec::new(),
            protocol: None,
            active: Vec::new(),
            extension_reply: None,
            fragment_size: 16 * 1024,
            validator: FrameValidator::new(Role::Server, Limits::default()),
            masks: MaskGenerator::new(),
            pending: BytesMut::new(),
        }
    }

    #[must_use]
    pub fn with_protocols(mut self, protocols: Vec<String>) -> Self {
        self.protocols = protocols;
        self
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<Extension>) -> Self {
        self.extensions = extensions;
        self
    }

    #[must_use]
    pub fn version(&self) -> HybiVersion {
        self.version
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn instantiate(&self, role: Role, config: &Config) -> Self {
        Self {
            version: self.version,
            role,
            protocols: self.protocols.clone(),
            extensions: self.extensions.clone(),
            protocol: None,
            active: Vec::new(),
            extension_reply: None,
            fragment_size: config.fragment_size,
            validator: FrameValidator::new(role, config.limits)
                .with_accept_unmasked(config.accept_unmasked_frames),
            masks: MaskGenerator::new(),
            pending: BytesMut::with_capacity(config.read_buffer_size),
        }
    }

    #[must_use]
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    #[must_use]
    pub fn active_extensions(&self) -> &[Extension] {
        &self.active
    }

    pub(crate) fn accept_as_server(&mut self, request: &Handshake) -> HandshakeState {
        let version = request
            .header("Sec-WebSocket-Version")
            .and_then(|v| v.trim().parse::<u8>().ok());
        match version {
            Some(v) if self.version.accepts(v) => {}
            _ => {
                trace!(?version, draft = ?self.version, "version not accepted");
                return HandshakeState::NotMatched;
            }
        }
        if !basic_accept(request) || request.header_or_empty("Sec-WebSocket-Key").is_empty() {
            return HandshakeState::NotMatched;
        }

        if let Some(header) = request.header("Sec-WebSocket-Extensions") {
            let offers = ExtensionOffer::parse_header(header).unwrap_or_default();
            if let Some((ext, offer)) = Extension::select(&self.extensions, &offers) {
                debug!(extension = %ext.name, "extension accepted");
                self.active = vec![ext.clone()];
                self.extension_reply = Some(offer);
            }
        }

        if let Some(header) = request.header("Sec-WebSocket-Protocol") {
            let offered: Vec<&str> = header.split(',').map(str::trim).collect();
            if !self.protocols.is_empty() {
                match self.protocols.iter().find(|p| offered.contains(&p.as_str())) {
                    Some(p) => self.protocol = Some(p.clone()),
                    None => {
                        debug!(offered = header, "no common subprotocol");
                        return HandshakeState::NotMatched;
                    }
                }
            }
        }

        self.claim_rsv();
        HandshakeState::Matched
    }

    pub(crate) fn accept_as_client(&mut self, request: &Handshake, response: &Handshake) -> HandshakeState {
        if response.status() != Some(101) || !basic_accept(response) {
            return HandshakeState::NotMatched;
        }
        let expected = compute_accept_key(request.header_or_empty("Sec-WebSocket-Key"));
        if response.header("Sec-WebSocket-Accept").map(str::trim) != Some(expected.as_str()) {
            debug!("Sec-WebSocket-Accept mismatch");
            return HandshakeState::NotMatched;
        }

        if let Some(header) = response.header("Sec-WebSocket-Extensions") {
            let accepted = match ExtensionOffer::parse_header(header) {
                Ok(accepted) => accepted,
                Err(_) => return HandshakeState::NotMatched,
            };
            match Extension::resolve(&self.extensions, &accepted) {
                Some(resolved) => self.active = resolved.into_iter().cloned().collect(),
                None => {
                    debug!(extensions = header, "server picked an extension never offered");
                    return HandshakeState::NotMatched;
                }
            }
        }

        if let Some(protocol) = response.header("Sec-WebSocket-Protocol").map(str::trim) {
            if !self.protocols.iter().any(|p| p == protocol) {
                return HandshakeState::NotMatched;
            }
            self.protocol = Some(protocol.to_string());
        }

        self.claim_rsv();
        HandshakeState::Matched
    }

    pub(crate) fn post_process_request_as_client(&mut self, request: &mut Handshake) {
        let mut nonce = [0u8; 16];
        fill_random(&mut nonce);

        request.set_header("Upgrade", "websocket");
        request.set_header("Connection", "Upgrade");
        request.set_header("Sec-WebSocket-Key", BASE64.encode(nonce));
        request.set_header("Sec-WebSocket-Version", self.version.announced().to_string());
        if !self.extensions.is_empty() {
            let names: Vec<&str> = self.extensions.iter().map(|e| e.name.as_str()).collect();
            request.set_header("Sec-WebSocket-Extensions", names.join(", "));
        }
        if !self.protocols.is_empty() {
            request.set_header("Sec-WebSocket-Protocol", self.protocols.join(", "));
        }
    }

    pub(crate) fn post_process_response_as_server(
        &mut self,
        request: &Handshake,
        response: &mut Handshake,
    ) -> Result<()> {
        let key = request
            .header("Sec-WebSocket-Key")
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Key".into()))?;

        response.set_status_message("Switching Protocols");
        response.set_header("Upgrade", "websocket");
        response.set_header("Connection", "Upgrade");
        response.set_header("Sec-WebSocket-Accept", compute_accept_key(key));
        if let Some(offer) = &self.extension_reply {
            response.set_header("Sec-WebSocket-Extensions", offer.to_string());
        }
        if let Some(protocol) = &self.protocol {
            response.set_header("Sec-WebSocket-Protocol", protocol.clone());
        }
        Ok(())
    }

    pub(crate) fn encode_frames(&mut self, opcode: OpCode, payload: Bytes, fin: bool) -> Vec<Frame> {
        MessageFragmenter::new(payload, opcode, self.fragment_size)
            .with_final(fin)
            .collect()
    }

    pub(crate) fn encode_frame(&mut self, frame: Frame) -> Result<Bytes> {
        if frame.opcode.is_control() {
            frame.validate()?;
        }
        let frame = if self.role.must_mask() {
            frame.with_mask(Some(self.masks.next_mask()))
        } else {
            frame.with_mask(None)
        };
        Ok(frame.to_bytes())
    }

    pub(crate) fn decode(&mut self, data: &[u8], out: &mut Vec<Frame>) -> Result<()> {
        self.pending.extend_from_slice(data);
        loop {
            match Frame::parse_checked(&self.pending, &self.validator) {
                Ok(Parse::Complete((frame, used))) => {
                    trace!(opcode = %frame.opcode, len = frame.payload().len(), "frame decoded");
                    self.pending.advance(used);
                    out.push(frame);
                }
                Ok(Parse::Incomplete { hint }) => {
                    if hint > self.pending.len() {
                        self.pending.reserve(hint - self.pending.len());
                    }
                    return Ok(());
                }
                Err(err) => {
                    self.pending.clear();
                    return Err(err);
                }
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn has_buffered_data(&self) -> bool {
        !self.pending.is_empty()
    }

    fn claim_rsv(&mut self) {
        let rsv: RsvBits = Extension::claimed_rsv(&self.active);
        self.validator = self.validator.clone().with_allowed_rsv(rsv);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(version: HybiVersion, role: Role) -> Hybi {
        Hybi::new(version).instantiate(role, &Config::default())
    }

    fn rfc_request() -> Handshake {
        let mut request = Handshake::request("/chat");
        request.set_header("Host", "server.example.com");
        request.set_header("Upgrade", "websocket");
        request.set_header("Connection", "Upgrade");
        request.set_header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==");
        request.set_header("Sec-WebSocket-Version", "13");
        request
    }

    #[test]
    fn test_server_accepts_rfc_request() {
        let request = rfc_request();
        let mut draft = instance(HybiVersion::Rfc6455, Role::Server);
        assert_eq!(draft.accept_as_server(&request), HandshakeState::Matched);

        let mut response = Handshake::response(101, "");
        draft.post_process_response_as_server(&request, &mut response).unwrap();
        assert_eq!(response.status_message(), Some("Switching Protocols"));
        assert_eq!(
            response.header("Sec-WebSocket-Accept"),
            Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")
        );
    }

    #[test]
    fn test_version_selects_variant() {
        let request = rfc_request();
        assert_eq!(
            instance(HybiVersion::Hybi10, Role::Server).accept_as_server(&request),
            HandshakeState::NotMatched
        );

        let mut old = rfc_request();
        old.set_header("Sec-WebSocket-Version", "8");
        assert_eq!(
            instance(HybiVersion::Hybi10, Role::Server).accept_as_server(&old),
            HandshakeState::Matched
        );
        old.set_header("Sec-WebSocket-Version", "7");
        assert_eq!(
            instance(HybiVersion::Hybi10, Role::Server).accept_as_server(&old),
            HandshakeState::Matched
        );
        assert_eq!(
            instance(HybiVersion::Rfc6455, Role::Server).accept_as_server(&old),
            HandshakeState::NotMatched
        );
    }

    #[test]
    fn test_missing_key_or_upgrade() {
        let mut request = rfc_request();
        request.remove_header("Sec-WebSocket-Key");
        assert_eq!(
            instance(HybiVersion::Rfc6455, Role::Server).accept_as_server(&request),
            HandshakeState::NotMatched
        );

        let mut request = rfc_request();
        request.set_header("Upgrade", "h2c");
        assert_eq!(
            instance(HybiVersion::Rfc6455, Role::Server).accept_as_server(&request),
            HandshakeState::NotMatched
        );
    }

    #[test]
    fn test_subprotocol_negotiation() {
        let template = Hybi::new(HybiVersion::Rfc6455).with_protocols(vec!["chat".into(), "superchat".into()]);
        let config = Config::default();

        let mut request = rfc_request();
        request.set_header("Sec-WebSocket-Protocol", "superchat, chat");
        let mut draft = template.instantiate(Role::Server, &config);
        assert_eq!(draft.accept_as_server(&request), HandshakeState::Matched);
        assert_eq!(draft.protocol(), Some("chat"));

        request.set_header("Sec-WebSocket-Protocol", "mqtt");
        let mut draft = template.instantiate(Role::Server, &config);
        assert_eq!(draft.accept_as_server(&request), HandshakeState::NotMatched);

        request.remove_header("Sec-WebSocket-Protocol");
        let mut draft = template.instantiate(Role::Server, &config);
        assert_eq!(draft.accept_as_server(&request), HandshakeState::Matched);
        assert_eq!(draft.protocol(), None);
    }

    #[test]
    fn test_extension_claims_rsv1() {
        let template = Hybi::new(HybiVersion::Rfc6455)
            .with_extensions(vec![Extension::new("permessage-deflate", RsvBits::RSV1)]);
        let mut request = rfc_request();
        request.set_header("Sec-WebSocket-Extensions", "permessage-deflate; client_max_window_bits");

        let mut draft = template.instantiate(Role::Server, &Config::default());
        assert_eq!(draft.accept_as_server(&request), HandshakeState::Matched);
        let mut response = Handshake::response(101, "");
        draft.post_process_response_as_server(&request, &mut response).unwrap();
        assert_eq!(
            response.header("Sec-WebSocket-Extensions"),
            Some("permessage-deflate; client_max_window_bits")
        );

        // Masked text frame with RSV1 set.
        let frame = [0xC1, 0x81, 0, 0, 0, 0, b'x'];
        let mut out = Vec::new();
        draft.decode(&frame, &mut out).unwrap();
        assert!(out[0].rsv1);

        let mut plain = Hybi::new(HybiVersion::Rfc6455).instantiate(Role::Server, &Config::default());
        assert_eq!(plain.decode(&frame, &mut Vec::new()), Err(Error::ReservedBitsSet));
    }

    #[test]
    fn test_client_round_trip_with_server() {
        let config = Config::default();
        let mut client = instance(HybiVersion::Rfc6455, Role::Client);
        let mut request = Handshake::request("/");
        request.set_header("Host", "localhost");
        client.post_process_request_as_client(&mut request);
        assert_eq!(request.header("Sec-WebSocket-Version"), Some("13"));

        let mut server = Hybi::new(HybiVersion::Rfc6455).instantiate(Role::Server, &config);
        assert_eq!(server.accept_as_server(&request), HandshakeState::Matched);
        let mut response = Handshake::response(101, "");
        server.post_process_response_as_server(&request, &mut response).unwrap();

        assert_eq!(client.accept_as_client(&request, &response), HandshakeState::Matched);

        response.set_header("Sec-WebSocket-Accept", "bogus");
        assert_eq!(client.accept_as_client(&request, &response), HandshakeState::NotMatched);
    }

    #[test]
    fn test_client_rejects_unknown_protocol() {
        let mut client = instance(HybiVersion::Rfc6455, Role::Client);
        let mut request = Handshake::request("/");
        client.post_process_request_as_client(&mut request);

        let mut response = Handshake::response(101, "Switching Protocols");
        response.set_header("Upgrade", "websocket");
        response.set_header("Connection", "Upgrade");
        response.set_header(
            "Sec-WebSocket-Accept",
            compute_accept_key(request.header_or_empty("Sec-WebSocket-Key")),
        );
        response.set_header("Sec-WebSocket-Protocol", "chat");
        assert_eq!(client.accept_as_client(&request, &response), HandshakeState::NotMatched);
    }

    #[test]
    fn test_client_frames_are_masked() {
        let mut client = instance(HybiVersion::Rfc6455, Role::Client);
        let bytes = client.encode_frame(Frame::text(&b"hi"[..])).unwrap();
        assert_eq!(bytes[1] & 0x80, 0x80);
        assert_eq!(bytes.len(), 2 + 4 + 2);

        let mut server = instance(HybiVersion::Rfc6455, Role::Server);
        let bytes = server.encode_frame(Frame::text(&b"hi"[..])).unwrap();
        assert_eq!(&bytes[..], &[0x81, 0x02, b'h', b'i']);

        let mut out = Vec::new();
        server.decode(&client.encode_frame(Frame::binary(vec![1, 2, 3])).unwrap(), &mut out).unwrap();
        assert_eq!(out[0].payload(), &[1, 2, 3]);
    }

    #[test]
    fn test_decode_across_reads() {
        let mut client = instance(HybiVersion::Rfc6455, Role::Client);
        let mut wire = vec![0x01, 0x03, b'a', b'b', b'c', 0x80, 0x02, b'd', b'e'];
        wire.extend_from_slice(&[0x89, 0x00]);

        let mut out = Vec::new();
        for chunk in wire.chunks(3) {
            client.decode(chunk, &mut out).unwrap();
        }
        assert_eq!(out.len(), 3);
        assert!(!out[0].fin);
        assert_eq!(out[1].opcode, OpCode::Continuation);
        assert_eq!(out[2].opcode, OpCode::Ping);
        assert!(!client.has_buffered_data());
    }

    #[test]
    fn test_decode_error_discards_buffer() {
        let mut server = instance(HybiVersion::Rfc6455, Role::Server);
        let mut out = Vec::new();
        assert_eq!(
            server.decode(&[0x81, 0x02, b'h', b'i'], &mut out),
            Err(Error::UnmaskedClientFrame)
        );
        assert!(!server.has_buffered_data());
    }

    #[test]
    fn test_encode_frames_fragments() {
        let config = Config::default().with_fragment_size(4);
        let mut draft = Hybi::new(HybiVersion::Rfc6455).instantiate(Role::Server, &config);
        let frames = draft.encode_frames(OpCode::Binary, Bytes::from_static(b"0123456789"), true);
        assert_eq!(frames.len(), 3);
        assert!(frames[2].fin);

        let frames = draft.encode_frames(OpCode::Text, Bytes::from_static(b"ab"), false);
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].fin);
    }

    #[test]
    fn test_oversized_control_frame_refused_on_send() {
        let mut draft = instance(HybiVersion::Rfc6455, Role::Server);
        assert_eq!(
            draft.encode_frame(Frame::ping(vec![0; 126])),
            Err(Error::ControlFrameTooLarge(126))
        );
    }
}
