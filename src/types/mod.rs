//! Core value types for the flow tracker.
//!
//! Everything here is a plain value: identifiers handed to us by the
//! instrumentation host, logical endpoints, and the catalog wrappers that
//! attach a provenance index to an endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a guest process's virtual memory context.
///
/// Opaque to the tracker; supplied by the instrumentation host at event time
/// and used only as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AddressSpaceId(
    /// Raw identifier value (e.g. a page-table base).
    pub u64,
);

impl fmt::Display for AddressSpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A process-scoped small integer denoting an open file or socket.
///
/// Handles are reused after close and are only unique within one address
/// space, so every lookup is keyed by ([`AddressSpaceId`], [`Handle`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(
    /// Raw descriptor number.
    pub u32,
);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Taint label attached to a byte of guest memory.
///
/// The label value is the catalog index of the source that produced the byte.
pub type Label = u32;

/// A stable logical endpoint: a file path or a network peer.
///
/// Equality is structural; two targets are the same endpoint iff they are the
/// same variant with field-wise equal contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// A file identified by its path.
    File {
        /// Absolute or guest-relative path.
        path: String,
    },
    /// A network peer identified by address and port.
    Network {
        /// Textual IPv4 or IPv6 address.
        address: String,
        /// TCP/UDP port number.
        port: u16,
    },
}

impl Target {
    /// Builds a file target.
    pub fn file(path: impl Into<String>) -> Self {
        Target::File { path: path.into() }
    }

    /// Builds a network target.
    pub fn network(address: impl Into<String>, port: u16) -> Self {
        Target::Network {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::File { path } => write!(f, "file:{path}"),
            Target::Network { address, port } => write!(f, "net:{address}:{port}"),
        }
    }
}

/// A configured flow origin: a target plus its catalog index.
///
/// The index doubles as the taint label applied to bytes read from this
/// endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// The endpoint being watched.
    pub target: Target,
    /// Zero-based position in the source catalog, assigned at load.
    pub index: usize,
}

/// A configured flow destination: a target plus its catalog index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sink {
    /// The endpoint being watched.
    pub target: Target,
    /// Zero-based position in the sink catalog, assigned at load.
    pub index: usize,
}

/// Latest known metadata for the process behind an address space.
///
/// Refreshed on every in-kernel block-execute signal; consumed only by
/// file-handle resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Guest process identifier.
    pub pid: u32,
    /// Process image name, as reported by introspection.
    pub name: String,
}
