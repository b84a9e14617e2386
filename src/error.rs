//! Error taxonomy shared by every decoding stage.
//!
//! Everything except [`TagfileError::UnknownClass`] is fatal: construction of
//! a [`Tagfile`](crate::Tagfile) either yields a fully usable object table or
//! returns the first error encountered.  Unknown classes are reported by the
//! registry lookup and swallowed (logged) by the decode loop unless
//! `DecodeOptions::strict_classes` is set.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagfileError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Unsupported version: {0:?}")]
    UnsupportedVersion(String),
    /// A fixup is recorded at `offset` (relative to its section) but its
    /// target is zero.
    #[error("Invalid fixup at section offset {offset:#x}")]
    InvalidFixup { offset: u32 },
    #[error("Unsupported quantization: {0}")]
    UnsupportedQuantization(String),
    #[error("Unknown class: {0:?}")]
    UnknownClass(String),
    #[error("No object decoded at address {address:#x}")]
    NotFound { address: u32 },
    #[error("Object at {address:#x} is a {found}, not a {expected}")]
    WrongType {
        address:  u32,
        expected: &'static str,
        found:    &'static str,
    },
    #[error("Array of {count} elements exceeds limit of {limit}")]
    ArrayTooLarge { count: u32, limit: u32 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TagfileError>;
