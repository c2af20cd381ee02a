use thiserror::Error;

/// Failures reported by a [`Host`](crate::Host) while building or attaching nodes.
///
/// These never reach callers of the loader. A node whose injection fails is
/// treated exactly like a node whose load failed: it finishes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("document has no <head> element")]
    MissingHead,
    #[error("failed to create <{tag}>: {reason}")]
    CreateElement { tag: String, reason: String },
    #[error("failed to set attribute `{name}`: {reason}")]
    SetAttribute { name: String, reason: String },
    #[error("failed to append node: {0}")]
    Append(String),
    #[error("unknown node handle")]
    UnknownNode,
    #[error("host unavailable: {0}")]
    Unavailable(String),
}
