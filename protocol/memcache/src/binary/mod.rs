//! Binary protocol header and message framing.
//!
//! ```text
//!   Byte/     0       |       1       |       2       |       3       |
//!      /              |               |               |               |
//!     |0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|
//!     +---------------+---------------+---------------+---------------+
//!    0| Magic         | Opcode        | Key length                    |
//!     +---------------+---------------+---------------+---------------+
//!    4| Extras length | Data type     | Status / vbucket              |
//!     +---------------+---------------+---------------+---------------+
//!    8| Total body length                                             |
//!     +---------------+---------------+---------------+---------------+
//!   12| Opaque                                                        |
//!     +---------------+---------------+---------------+---------------+
//!   16| CAS                                                           |
//!     |                                                               |
//!     +---------------+---------------+---------------+---------------+
//!   24| Extras, then key, then value                                  |
//!     +---------------+---------------+---------------+---------------+
//! ```
//!
//! All multi-byte fields are big-endian.

mod header;
mod message;

pub use header::{HEADER_LEN, Header};
pub use message::Message;

/// Magic byte for requests.
pub const REQUEST_MAGIC: u8 = 0x80;

/// Magic byte for responses.
pub const RESPONSE_MAGIC: u8 = 0x81;

/// Response status codes.
pub mod status {
    pub const NO_ERROR: u16 = 0x0000;
    pub const KEY_NOT_FOUND: u16 = 0x0001;
    pub const KEY_EXISTS: u16 = 0x0002;
    pub const VALUE_TOO_LARGE: u16 = 0x0003;
    pub const INVALID_ARGUMENTS: u16 = 0x0004;
    pub const ITEM_NOT_STORED: u16 = 0x0005;
    pub const UNKNOWN_COMMAND: u16 = 0x0081;
}

/// Well-known opcodes.
///
/// Messages store the opcode as a raw byte; this enum exists for building
/// requests and for readable logging. Unknown opcodes are valid on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Get = 0x00,
    Set = 0x01,
    Add = 0x02,
    Replace = 0x03,
    Delete = 0x04,
    Increment = 0x05,
    Decrement = 0x06,
    Quit = 0x07,
    Flush = 0x08,
    GetQ = 0x09,
    Noop = 0x0a,
    Version = 0x0b,
    GetK = 0x0c,
    GetKQ = 0x0d,
    Append = 0x0e,
    Prepend = 0x0f,
    Stat = 0x10,
    SetQ = 0x11,
    DeleteQ = 0x14,
    Touch = 0x1c,
    Gat = 0x1d,
}

impl Opcode {
    /// Map a raw opcode byte to a known opcode.
    pub fn from_u8(value: u8) -> Option<Self> {
        let opcode = match value {
            0x00 => Opcode::Get,
            0x01 => Opcode::Set,
            0x02 => Opcode::Add,
            0x03 => Opcode::Replace,
            0x04 => Opcode::Delete,
            0x05 => Opcode::Increment,
            0x06 => Opcode::Decrement,
            0x07 => Opcode::Quit,
            0x08 => Opcode::Flush,
            0x09 => Opcode::GetQ,
            0x0a => Opcode::Noop,
            0x0b => Opcode::Version,
            0x0c => Opcode::GetK,
            0x0d => Opcode::GetKQ,
            0x0e => Opcode::Append,
            0x0f => Opcode::Prepend,
            0x10 => Opcode::Stat,
            0x11 => Opcode::SetQ,
            0x14 => Opcode::DeleteQ,
            0x1c => Opcode::Touch,
            0x1d => Opcode::Gat,
            _ => return None,
        };
        Some(opcode)
    }
}

/// Errors from parsing a message out of a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The buffer does not yet hold a complete header or body.
    #[error("incomplete message: need {needed} more bytes")]
    Incomplete { needed: usize },
}

/// Errors from encoding a message whose sections overflow their length fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("key length {0} exceeds {max}", max = u16::MAX)]
    KeyTooLong(usize),
    #[error("extras length {0} exceeds {max}", max = u8::MAX)]
    ExtrasTooLong(usize),
    #[error("body length {0} exceeds {max}", max = u32::MAX)]
    BodyTooLong(usize),
}
