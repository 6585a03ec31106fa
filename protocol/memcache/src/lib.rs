//! Memcache binary protocol framing.
//!
//! The binary protocol frames every request and response the same way: a
//! fixed 24-byte header followed by extras, key and value. This crate only
//! deals with that framing. Opcodes and status codes are carried through as
//! raw values so that a proxy can relay any command without understanding it.
//!
//! # Example
//!
//! ```
//! use protocol_memcache::binary::{Message, Opcode};
//!
//! let request = Message::request(Opcode::Get).with_key(&b"foo"[..]);
//! let bytes = request.to_bytes().unwrap();
//!
//! let (parsed, consumed) = Message::parse(&bytes).unwrap();
//! assert_eq!(consumed, bytes.len());
//! assert_eq!(&parsed.key[..], b"foo");
//! ```

pub mod binary;
