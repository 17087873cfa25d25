//! Crate-wide error type.

use crate::engine::{Kind, RawHandle};
use crate::resource::Resource;
use thiserror::Error;

/// Errors raised by the identity layer. None of them are retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A null handle was supplied where a live one was required.
    #[error("invalid handle: null {0} handle")]
    InvalidHandle(Resource),

    /// The wrapper's handle was already released.
    #[error("use after release: {0} handle already released")]
    UseAfterRelease(Resource),

    /// A literal's owning context handle could not be mapped to a `Context`.
    #[error("literal node refers to unresolved context {0}")]
    UnresolvedContext(RawHandle),

    /// The engine reported a discriminant tag the dispatcher does not know.
    #[error("unknown node kind tag {0:#04x}")]
    UnknownNodeKind(u8),

    /// A required argument was missing or empty.
    #[error("missing argument `{0}`")]
    ArgumentNull(&'static str),

    /// An argument violated an arity or ownership constraint.
    #[error("invalid argument `{name}`: {reason}")]
    ArgumentInvalid {
        name: &'static str,
        reason: &'static str,
    },

    /// The engine returned a node of a kind the typed API cannot represent here.
    #[error("expected {expected} node, engine returned {found:?}")]
    KindMismatch { expected: &'static str, found: Kind },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
