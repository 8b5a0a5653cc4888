#![forbid(unsafe_code)]

//! Platform-independent key model and input decoder for vtio.
//!
//! This crate knows nothing about file descriptors or line disciplines.
//! It defines the packed [`Key`] value, the [`ByteSource`] seam through
//! which raw terminal bytes arrive, and the decoder state machine that
//! turns a prefix of the byte stream into exactly one keypress.
//!
//! The companion `vtio-tty` crate supplies the Unix [`ByteSource`]
//! implementation and the terminal session lifecycle.

pub mod decoder;
pub mod key;

pub use decoder::{ByteSource, ReadMode, read_key};
pub use key::{Key, Mods};
