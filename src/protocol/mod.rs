//! Wire-level building blocks shared by the drafts.

pub mod assembler;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod parse;
pub mod utf8;
pub mod validation;

pub use assembler::{AssembledMessage, MessageAssembler};
pub use frame::{Frame, FrameHeader};
pub use handshake::{Handshake, WS_GUID, compute_accept_key};
pub use mask::{MaskGenerator, apply_mask, apply_mask_fast};
pub use opcode::OpCode;
pub use parse::Parse;
pub use utf8::{Utf8Validator, validate_utf8};
pub use validation::FrameValidator;
