//! Splitting outgoing messages into frames.

use bytes::Bytes;

use crate::protocol::{Frame, OpCode};

/// Iterator that produces frames from a message payload.
///
/// The first frame carries the message opcode, later ones
/// `OpCode::Continuation`. Chunks share the payload buffer.
pub struct MessageFragmenter {
    payload: Bytes,
    opcode: OpCode,
    fragment_size: usize,
    offset: usize,
    is_first: bool,
    /// FIN of the last produced frame. False when the caller streams a
    /// message in several calls.
    last_fin: bool,
}

impl MessageFragmenter {
    #[inline]
    #[must_use]
    pub fn new(payload: Bytes, opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            payload,
            opcode,
            fragment_size: fragment_size.max(1),
            offset: 0,
            is_first: true,
            last_fin: true,
        }
    }

    /// Leave the final frame open for more fragments.
    #[must_use]
    pub fn with_final(mut self, fin: bool) -> Self {
        self.last_fin = fin;
        self
    }

    #[inline]
    #[must_use]
    pub fn needs_fragmentation(&self) -> bool {
        self.payload.len() > self.fragment_size
    }
}

impl Iterator for MessageFragmenter {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.payload.len() {
            if self.is_first {
                self.is_first = false;
                return Some(Frame::new(self.last_fin, self.opcode, Bytes::new()));
            }
            return None;
        }

        let chunk_size = (self.payload.len() - self.offset).min(self.fragment_size);
        let end = self.offset + chunk_size;
        let fin = end >= self.payload.len() && self.last_fin;
        let chunk = self.payload.slice(self.offset..end);
        self.offset = end;

        let opcode = if self.is_first {
            self.is_first = false;
            self.opcode
        } else {
            OpCode::Continuation
        };

        Some(Frame::new(fin, opcode, chunk))
    }
}
