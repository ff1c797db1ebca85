//! Policy checks applied to incoming frame headers.
//!
//! - Masking direction (clients mask, servers do not)
//! - RSV bits, unless claimed by a negotiated extension
//! - Frame size limit

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::extensions::RsvBits;
use crate::protocol::frame::FrameHeader;

/// Validator for incoming frames, owned by the draft that decodes them.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    /// Role of the endpoint doing the decoding.
    role: Role,
    limits: Limits,
    accept_unmasked_frames: bool,
    allowed_rsv: RsvBits,
}

impl FrameValidator {
    pub fn new(role: Role, limits: Limits) -> Self {
        Self {
            role,
            limits,
            accept_unmasked_frames: false,
            allowed_rsv: RsvBits::NONE,
        }
    }

    /// Let a server accept unmasked frames from clients.
    #[must_use]
    pub fn with_accept_unmasked(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// RSV bits a negotiated extension has claimed.
    #[must_use]
    pub fn with_allowed_rsv(mut self, rsv: RsvBits) -> Self {
        self.allowed_rsv = rsv;
        self
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Validate a parsed header.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedClientFrame` - server received an unmasked frame
    /// - `Error::MaskedServerFrame` - client received a masked frame
    /// - `Error::ReservedBitsSet` - RSV bit not claimed by any extension
    /// - `Error::FrameTooLarge` - payload exceeds the frame limit
    pub fn validate_header(&self, header: &FrameHeader) -> Result<()> {
        self.validate_masking(header.mask.is_some())?;
        self.validate_rsv_bits(header.rsv1, header.rsv2, header.rsv3)?;
        self.limits.check_frame_size(header.payload_len)
    }

    fn validate_masking(&self, masked: bool) -> Result<()> {
        match self.role {
            Role::Server if !masked && !self.accept_unmasked_frames => {
                Err(Error::UnmaskedClientFrame)
            }
            Role::Client if masked => Err(Error::MaskedServerFrame),
            _ => Ok(()),
        }
    }

    fn validate_rsv_bits(&self, rsv1: bool, rsv2: bool, rsv3: bool) -> Result<()> {
        let allowed = self.allowed_rsv;
        if (rsv1 && !allowed.rsv1) || (rsv2 && !allowed.rsv2) || (rsv3 && !allowed.rsv3) {
            return Err(Error::ReservedBitsSet);
        }
        Ok(())
    }
}
