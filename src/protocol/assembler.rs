//! Reassembly of fragmented messages.
//!
//! One assembler exists per connection and it is the only place that knows
//! whether a fragmented message is open.

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::utf8::Utf8Validator;
use crate::protocol::{Frame, OpCode};

/// Reassembles fragmented WebSocket messages.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    /// Opcode of the open message, `None` between messages.
    opcode: Option<OpCode>,
    utf8_validator: Utf8Validator,
    limits: Limits,
}

impl MessageAssembler {
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            utf8_validator: Utf8Validator::new(),
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    ///
    /// Returns the message once its final fragment arrives. Control frames
    /// are ignored and leave the open message untouched.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a continuation with nothing open, or
    ///   a new data frame while a message is still open
    /// - `Error::InvalidUtf8` as soon as text stops being valid UTF-8
    /// - size and fragment-count limit errors
    ///
    /// After an error the assembler is reset.
    pub fn push(&mut self, frame: &Frame) -> Result<Option<AssembledMessage>> {
        if frame.opcode.is_control() {
            return Ok(None);
        }
        let result = self.push_data(frame);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn push_data(&mut self, frame: &Frame) -> Result<Option<AssembledMessage>> {
        if frame.opcode == OpCode::Continuation {
            if self.opcode.is_none() {
                return Err(Error::ProtocolViolation(
                    "Unexpected continuation frame".into(),
                ));
            }
        } else {
            if let Some(open) = self.opcode {
                return Err(Error::ProtocolViolation(format!(
                    "Expected continuation frame, got {} while {} is open",
                    frame.opcode, open
                )));
            }
            self.opcode = Some(frame.opcode);
        }

        self.limits.check_fragment_count(self.fragment_count + 1)?;
        let new_size = self.buffer.len() + frame.payload().len();
        self.limits.check_message_size(new_size)?;

        if self.opcode == Some(OpCode::Text) {
            self.utf8_validator.validate(frame.payload(), frame.fin)?;
        }

        self.buffer.extend_from_slice(frame.payload());
        self.fragment_count += 1;

        if !frame.fin {
            return Ok(None);
        }

        let opcode = self.opcode.take().unwrap_or(OpCode::Binary);
        let payload = self.buffer.split().to_vec();
        self.fragment_count = 0;
        self.utf8_validator.reset();
        Ok(Some(AssembledMessage { opcode, payload }))
    }

    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fragment_count = 0;
        self.opcode = None;
        self.utf8_validator.reset();
    }
}

/// A fully assembled data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledMessage {
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl AssembledMessage {
    /// Convert into an application message.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` for a text payload that is not UTF-8.
    pub fn into_message(self) -> Result<Message> {
        match self.opcode {
            OpCode::Text => String::from_utf8(self.payload)
                .map(Message::Text)
                .map_err(|_| Error::InvalidUtf8),
            _ => Ok(Message::Binary(self.payload)),
        }
    }
}
