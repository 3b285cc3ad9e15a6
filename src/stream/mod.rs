//! Stream Module
//!
//! Reassembles newline-delimited JSON frames carrying base64 payload
//! chunks, as produced by the speech synthesis backend.

mod frame;
mod reassembler;

pub use frame::{FrameKind, StreamFrame, SUCCESS_CODE};
pub use reassembler::{reassemble, ReassemblerState, StreamReassembler};
