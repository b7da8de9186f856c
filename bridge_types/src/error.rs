use derive_more::{Display, Error};

/// The error currency shared across every crate in the workspace.
///
/// Mirrors spec.md §7's error kinds: each variant is a distinct failure
/// mode a caller might want to branch on (reconnect vs. surface to the
/// user vs. log and swallow). Variants are constructed explicitly
/// (`BridgeError::Network(...)`) rather than via `From`, since several
/// variants share the same `String` payload type and a blanket `From<String>`
/// would be ambiguous.
#[derive(Debug, Error, Display)]
pub enum BridgeError {
    #[display(fmt = "configuration error: {_0}")]
    Config(#[error(not(source))] String),

    #[display(fmt = "authentication error: {_0}")]
    Auth(#[error(not(source))] String),

    #[display(fmt = "network error: {_0}")]
    Network(#[error(not(source))] String),

    #[display(fmt = "protocol error: {_0}")]
    Protocol(#[error(not(source))] String),

    #[display(fmt = "command rejected: {_0}")]
    CommandRejected(#[error(not(source))] String),

    #[display(fmt = "permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),

    #[display(fmt = "rate limited")]
    RateLimited,

    #[display(fmt = "timed out waiting for a reply")]
    Timeout,

    #[display(fmt = "internal error: {_0}")]
    Internal(#[error(not(source))] String),
}

pub type Result<T> = core::result::Result<T, BridgeError>;
