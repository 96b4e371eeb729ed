//! Recorded event streams for the replay driver.
//!
//! A trace is JSON Lines: one event per line, in delivery order. Most events
//! map one-to-one onto tracker callbacks; the remaining few (`process`,
//! `bind_path`, `unmapped`) script the replayed host state that a live
//! instrumentation run would produce on its own.
//!
//! ```text
//! {"event":"block_translate","instr":100}
//! {"event":"connect","asid":1,"handle":3,"sockaddr":[2,0,0,80,1,2,3,4]}
//! {"event":"recv","asid":1,"handle":3,"buf":4096,"len":16}
//! ```

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::replay::{InMemoryTaint, ReplayInspector};
use crate::tracker::Tracker;
use crate::types::{AddressSpaceId, Handle};

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Block-translate boundary with the instruction counter at that point.
    BlockTranslate {
        /// Guest instructions executed so far.
        instr: u64,
    },
    /// Block-execute boundary.
    BlockExecute {
        /// Current address space.
        asid: AddressSpaceId,
        /// Whether the guest was in kernel mode at this boundary.
        #[serde(default)]
        in_kernel: bool,
    },
    /// `connect` system-call return.
    Connect {
        /// Calling address space.
        asid: AddressSpaceId,
        /// Socket handle.
        handle: Handle,
        /// Raw guest `sockaddr` bytes.
        sockaddr: Vec<u8>,
    },
    /// `read` return.
    Read {
        /// Calling address space.
        asid: AddressSpaceId,
        /// File or socket handle.
        handle: Handle,
        /// Destination buffer virtual address.
        buf: u64,
        /// Bytes transferred.
        len: u64,
    },
    /// `pread` return.
    #[serde(rename = "pread")]
    PRead {
        /// Calling address space.
        asid: AddressSpaceId,
        /// File handle.
        handle: Handle,
        /// Destination buffer virtual address.
        buf: u64,
        /// Bytes transferred.
        len: u64,
        /// File offset of the positioned read.
        offset: u64,
    },
    /// `write` return.
    Write {
        /// Calling address space.
        asid: AddressSpaceId,
        /// File or socket handle.
        handle: Handle,
        /// Origin buffer virtual address.
        buf: u64,
        /// Bytes transferred.
        len: u64,
    },
    /// `pwrite` return.
    #[serde(rename = "pwrite")]
    PWrite {
        /// Calling address space.
        asid: AddressSpaceId,
        /// File handle.
        handle: Handle,
        /// Origin buffer virtual address.
        buf: u64,
        /// Bytes transferred.
        len: u64,
        /// File offset of the positioned write.
        offset: u64,
    },
    /// Socket `recv` return.
    Recv {
        /// Calling address space.
        asid: AddressSpaceId,
        /// Socket handle.
        handle: Handle,
        /// Destination buffer virtual address.
        buf: u64,
        /// Bytes transferred.
        len: u64,
    },
    /// Socket `send` return.
    Send {
        /// Calling address space.
        asid: AddressSpaceId,
        /// Socket handle.
        handle: Handle,
        /// Origin buffer virtual address.
        buf: u64,
        /// Bytes transferred.
        len: u64,
    },
    /// Host scripting: install process metadata for an address space.
    Process {
        /// Address space the record belongs to.
        asid: AddressSpaceId,
        /// Guest process id.
        pid: u32,
        /// Process image name.
        name: String,
    },
    /// Host scripting: bind a handle to a path within a process.
    BindPath {
        /// Owning process id.
        pid: u32,
        /// The handle being bound.
        handle: Handle,
        /// Path introspection will report.
        path: String,
    },
    /// Host scripting: mark one virtual address as untranslatable.
    Unmapped {
        /// The unmapped virtual address.
        vaddr: u64,
    },
}

/// Trace ingestion failures. Unlike guest-side conditions these are real
/// errors: a malformed trace means the replay is meaningless.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Underlying reader failed.
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),
    /// A line was not a valid event.
    #[error("invalid event on line {line}: {source}")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// The JSON error.
        source: serde_json::Error,
    },
}

/// Reads a JSONL event stream. Blank lines are skipped.
pub fn read_events(reader: impl BufRead) -> Result<Vec<TraceEvent>, TraceError> {
    let mut events = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line).map_err(|source| TraceError::Malformed {
            line: i.saturating_add(1),
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Feeds recorded events into a tracker backed by the replay collaborators.
///
/// Scripting events mutate the replayed host; everything else dispatches to
/// the matching tracker callback, in order, exactly as a live host would.
pub fn apply(tracker: &mut Tracker<ReplayInspector, InMemoryTaint>, events: &[TraceEvent]) {
    for event in events {
        match event {
            TraceEvent::BlockTranslate { instr } => {
                tracker.guest_mut().set_instruction_count(*instr);
                tracker.on_block_translate(*instr);
            }
            TraceEvent::BlockExecute { asid, in_kernel } => {
                tracker.guest_mut().set_in_kernel(*in_kernel);
                tracker.on_block_execute(*asid);
            }
            TraceEvent::Connect {
                asid,
                handle,
                sockaddr,
            } => tracker.on_connect_return(*asid, *handle, sockaddr),
            TraceEvent::Read {
                asid,
                handle,
                buf,
                len,
            } => tracker.on_read_return(*asid, *handle, *buf, *len),
            TraceEvent::PRead {
                asid,
                handle,
                buf,
                len,
                offset,
            } => tracker.on_pread_return(*asid, *handle, *buf, *len, *offset),
            TraceEvent::Write {
                asid,
                handle,
                buf,
                len,
            } => tracker.on_write_return(*asid, *handle, *buf, *len),
            TraceEvent::PWrite {
                asid,
                handle,
                buf,
                len,
                offset,
            } => tracker.on_pwrite_return(*asid, *handle, *buf, *len, *offset),
            TraceEvent::Recv {
                asid,
                handle,
                buf,
                len,
            } => tracker.on_recv_return(*asid, *handle, *buf, *len),
            TraceEvent::Send {
                asid,
                handle,
                buf,
                len,
            } => tracker.on_send_return(*asid, *handle, *buf, *len),
            TraceEvent::Process { asid, pid, name } => {
                tracker.guest_mut().set_process(
                    *asid,
                    crate::types::ProcessRecord {
                        pid: *pid,
                        name: name.clone(),
                    },
                );
            }
            TraceEvent::BindPath { pid, handle, path } => {
                tracker
                    .guest_mut()
                    .bind_handle_path(*pid, *handle, path.clone());
            }
            TraceEvent::Unmapped { vaddr } => tracker.guest_mut().poke_unmapped(*vaddr),
        }
    }
}
