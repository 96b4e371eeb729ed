//! Transient handle → stable endpoint resolution.
//!
//! Handles are small integers scoped to one address space and reused after
//! close, so two strategies apply:
//!
//! - **Network**: learned eagerly from connect-return events and kept in a
//!   last-writer-wins table. Entries are never invalidated on close (close is
//!   not observed); a stale entry persists until the handle is reconnected.
//!   Accepted imprecision.
//! - **File**: resolved lazily per lookup through guest introspection, using
//!   the latest process record known for the address space. Nothing is
//!   cached.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use tracing::debug;

use crate::host::GuestInspector;
use crate::types::{AddressSpaceId, Handle, ProcessRecord, Target};

/// Linux address family tags, as they appear in guest `sockaddr` bytes.
const AF_INET: u16 = 2;
const AF_INET6: u16 = 10;

/// Why a handle could not be resolved to an endpoint.
///
/// These are expected, high-frequency conditions; callers drop the event and
/// move on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No resolver entry and introspection could not name the handle.
    #[error("unknown handle {handle} in address space {asid}")]
    UnknownHandle {
        /// Address space the lookup ran in.
        asid: AddressSpaceId,
        /// The unresolved handle.
        handle: Handle,
    },
    /// No process record has been observed for the address space yet.
    #[error("no process record for address space {asid}")]
    UnknownAddressSpace {
        /// The unknown address space.
        asid: AddressSpaceId,
    },
}

/// Per-address-space handle tables plus process records.
#[derive(Debug, Default)]
pub struct HandleResolver {
    network: HashMap<(AddressSpaceId, Handle), Target>,
    processes: HashMap<AddressSpaceId, ProcessRecord>,
}

impl HandleResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connect-return, overwriting any previous binding for the
    /// (address space, handle) key.
    ///
    /// Returns the decoded target, or `None` when the `sockaddr` bytes use an
    /// unsupported address family (the event is ignored, no entry is made).
    pub fn record_connect(
        &mut self,
        asid: AddressSpaceId,
        handle: Handle,
        sockaddr: &[u8],
    ) -> Option<Target> {
        let target = decode_sockaddr(sockaddr)?;
        self.network.insert((asid, handle), target.clone());
        Some(target)
    }

    /// Looks up the network endpoint last connected on this handle.
    pub fn network_target(&self, asid: AddressSpaceId, handle: Handle) -> Option<Target> {
        self.network.get(&(asid, handle)).cloned()
    }

    /// Resolves a file handle to its path via introspection.
    ///
    /// Uses the latest process record seen for `asid`; fails with an
    /// "unknown" condition when the record is missing or introspection
    /// cannot name the handle. Results are not cached.
    pub fn file_target(
        &self,
        guest: &dyn GuestInspector,
        asid: AddressSpaceId,
        handle: Handle,
    ) -> Result<Target, ResolveError> {
        let process = self
            .processes
            .get(&asid)
            .ok_or(ResolveError::UnknownAddressSpace { asid })?;
        let path = guest
            .handle_path(process, handle)
            .ok_or(ResolveError::UnknownHandle { asid, handle })?;
        Ok(Target::file(path))
    }

    /// Resolves a handle for a generic read/write event.
    ///
    /// The network table is consulted first; file introspection is the
    /// fallback, since plain read/write fires for both kinds of handle.
    pub fn any_target(
        &self,
        guest: &dyn GuestInspector,
        asid: AddressSpaceId,
        handle: Handle,
    ) -> Result<Target, ResolveError> {
        if let Some(target) = self.network_target(asid, handle) {
            return Ok(target);
        }
        self.file_target(guest, asid, handle)
    }

    /// Refreshes the process record for an address space.
    pub fn update_process(&mut self, asid: AddressSpaceId, record: ProcessRecord) {
        self.processes.insert(asid, record);
    }

    /// Latest process record for an address space, if any.
    pub fn process(&self, asid: AddressSpaceId) -> Option<&ProcessRecord> {
        self.processes.get(&asid)
    }
}

/// Decodes raw guest `sockaddr` bytes into a network target.
///
/// Layout follows `sockaddr_in`/`sockaddr_in6`: family as a host-order u16 at
/// offset 0, port in network byte order at offset 2, then the address (offset
/// 4 for IPv4, offset 8 for IPv6). Anything but the two IP families is
/// rejected.
pub fn decode_sockaddr(bytes: &[u8]) -> Option<Target> {
    if bytes.len() < 4 {
        debug!(len = bytes.len(), "sockaddr too short, ignoring");
        return None;
    }
    let family = u16::from_le_bytes([bytes[0], bytes[1]]);
    let port = u16::from_be_bytes([bytes[2], bytes[3]]);

    match family {
        AF_INET => {
            if bytes.len() < 8 {
                debug!(len = bytes.len(), "sockaddr_in too short, ignoring");
                return None;
            }
            let addr = Ipv4Addr::new(bytes[4], bytes[5], bytes[6], bytes[7]);
            Some(Target::network(addr.to_string(), port))
        }
        AF_INET6 => {
            if bytes.len() < 24 {
                debug!(len = bytes.len(), "sockaddr_in6 too short, ignoring");
                return None;
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&bytes[8..24]);
            let addr = Ipv6Addr::from(octets);
            Some(Target::network(addr.to_string(), port))
        }
        other => {
            debug!(family = other, "unsupported sockaddr family, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::replay::ReplayInspector;

    fn sockaddr_v4(a: u8, b: u8, c: u8, d: u8, port: u16) -> Vec<u8> {
        let mut bytes = AF_INET.to_le_bytes().to_vec();
        bytes.extend_from_slice(&port.to_be_bytes());
        bytes.extend_from_slice(&[a, b, c, d]);
        bytes.extend_from_slice(&[0; 8]); // sin_zero padding
        bytes
    }

    #[test]
    fn test_decode_ipv4_sockaddr() {
        let target = decode_sockaddr(&sockaddr_v4(1, 2, 3, 4, 80)).expect("decodes");
        assert_eq!(target, Target::network("1.2.3.4", 80));
    }

    #[test]
    fn test_decode_ipv6_sockaddr() {
        let mut bytes = AF_INET6.to_le_bytes().to_vec();
        bytes.extend_from_slice(&443u16.to_be_bytes());
        bytes.extend_from_slice(&[0; 4]); // flowinfo
        let mut octets = [0u8; 16];
        octets[15] = 1; // ::1
        bytes.extend_from_slice(&octets);

        let target = decode_sockaddr(&bytes).expect("decodes");
        assert_eq!(target, Target::network("::1", 443));
    }

    #[test]
    fn test_unsupported_family_rejected() {
        // AF_UNIX
        assert_eq!(decode_sockaddr(&[1, 0, 0, 0, 0, 0, 0, 0]), None);
        assert_eq!(decode_sockaddr(&[]), None);
    }

    #[test]
    fn test_connect_entries_are_last_writer_wins() {
        let mut resolver = HandleResolver::new();
        let asid = AddressSpaceId(1);
        let fd = Handle(7);

        resolver
            .record_connect(asid, fd, &sockaddr_v4(1, 2, 3, 4, 80))
            .expect("first connect");
        resolver
            .record_connect(asid, fd, &sockaddr_v4(9, 9, 9, 9, 9))
            .expect("reconnect");

        assert_eq!(
            resolver.network_target(asid, fd),
            Some(Target::network("9.9.9.9", 9))
        );
    }

    #[test]
    fn test_rejected_family_leaves_no_entry() {
        let mut resolver = HandleResolver::new();
        let asid = AddressSpaceId(1);
        assert!(resolver
            .record_connect(asid, Handle(3), &[1, 0, 0, 0, 0, 0, 0, 0])
            .is_none());
        assert_eq!(resolver.network_target(asid, Handle(3)), None);
    }

    #[test]
    fn test_handles_scoped_per_address_space() {
        let mut resolver = HandleResolver::new();
        resolver
            .record_connect(AddressSpaceId(1), Handle(3), &sockaddr_v4(1, 2, 3, 4, 80))
            .expect("connect");

        // Same handle number, different address space: no entry.
        assert_eq!(resolver.network_target(AddressSpaceId(2), Handle(3)), None);
    }

    #[test]
    fn test_file_resolution_requires_process_record() {
        let guest = ReplayInspector::new();
        let resolver = HandleResolver::new();
        let asid = AddressSpaceId(5);

        assert_eq!(
            resolver.file_target(&guest, asid, Handle(3)),
            Err(ResolveError::UnknownAddressSpace { asid })
        );
    }

    #[test]
    fn test_file_resolution_via_introspection() {
        let mut guest = ReplayInspector::new();
        guest.bind_handle_path(42, Handle(3), "/var/log/auth.log");

        let mut resolver = HandleResolver::new();
        let asid = AddressSpaceId(5);
        resolver.update_process(
            asid,
            ProcessRecord {
                pid: 42,
                name: "sshd".to_owned(),
            },
        );

        assert_eq!(
            resolver.file_target(&guest, asid, Handle(3)),
            Ok(Target::file("/var/log/auth.log"))
        );
        assert_eq!(
            resolver.file_target(&guest, asid, Handle(9)),
            Err(ResolveError::UnknownHandle {
                asid,
                handle: Handle(9)
            })
        );
    }

    #[test]
    fn test_any_target_prefers_network_entry() {
        let mut guest = ReplayInspector::new();
        guest.bind_handle_path(42, Handle(3), "/tmp/f");

        let mut resolver = HandleResolver::new();
        let asid = AddressSpaceId(5);
        resolver.update_process(
            asid,
            ProcessRecord {
                pid: 42,
                name: "p".to_owned(),
            },
        );
        resolver
            .record_connect(asid, Handle(3), &sockaddr_v4(1, 2, 3, 4, 80))
            .expect("connect");

        assert_eq!(
            resolver.any_target(&guest, asid, Handle(3)),
            Ok(Target::network("1.2.3.4", 80))
        );
        // Falls back to the file strategy when no network entry exists.
        assert_eq!(
            resolver.any_target(&guest, asid, Handle(4)),
            Err(ResolveError::UnknownHandle {
                asid,
                handle: Handle(4)
            })
        );
    }
}
