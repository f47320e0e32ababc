//! Crate-wide error type.
//!
//! Diagnostics below `EmitError` severity are reported through [`log`] as
//! they occur and do not interrupt compilation; only the tiers that cannot
//! be recovered from locally surface as an `Err` here.
use std::fmt;

/// Errors that abort a [`crate::compile`] or [`crate::disassemble`] call.
///
/// The decoder and emitter log-and-continue through everything that can be
/// locally recovered from (see `error::log` helpers below); this type only
/// carries what cannot.
#[derive(Debug)]
pub enum Error {
    /// The byte slice is not a well-formed AMDIL token stream (truncated
    /// header, instruction that reads past the end of the buffer, ...).
    MalformedStream(&'static str),
    /// A structured control-flow instruction (`ELSE`, `ENDIF`, `ENDLOOP`,
    /// `BREAK`, `CONTINUE`) appeared without its enclosing `IF`/`WHILE`.
    UnbalancedControlFlow(&'static str),
    /// A resource usage the emitter has no static lowering for.
    UnsupportedResource(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedStream(msg) => write!(f, "malformed AMDIL stream: {}", msg),
            Error::UnbalancedControlFlow(msg) => write!(f, "unbalanced control flow: {}", msg),
            Error::UnsupportedResource(msg) => write!(f, "unsupported resource: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
