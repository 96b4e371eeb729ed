//! End-to-end flow scenarios driven through the replay collaborators.

use taintflow::host::replay::{InMemoryTaint, ReplayInspector};
use taintflow::trace::{self, TraceEvent};
use taintflow::tracker::{TargetCatalog, Tracker};
use taintflow::types::{AddressSpaceId, Handle, Target};

const ASID: AddressSpaceId = AddressSpaceId(1);

fn sockaddr_v4(a: u8, b: u8, c: u8, d: u8, port: u16) -> Vec<u8> {
    let mut bytes = vec![2, 0];
    bytes.extend_from_slice(&port.to_be_bytes());
    bytes.extend_from_slice(&[a, b, c, d]);
    bytes.extend_from_slice(&[0; 8]);
    bytes
}

fn network_tracker() -> Tracker<ReplayInspector, InMemoryTaint> {
    let catalog = TargetCatalog::load(
        vec![Target::network("1.2.3.4", 80)],
        vec![Target::network("5.6.7.8", 443)],
    );
    Tracker::new(catalog, ReplayInspector::new(), InMemoryTaint::new())
}

/// Scenario A: recv from the source into a buffer, send that buffer to the
/// sink. The flow must be detected with the full byte count attributed.
#[test]
fn source_recv_to_sink_send_finds_dependency() {
    let mut tracker = network_tracker();
    let events = vec![
        TraceEvent::BlockTranslate { instr: 1000 },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(3),
            sockaddr: sockaddr_v4(1, 2, 3, 4, 80),
        },
        // Gate armed at instr 1000; strictly-greater sample activates.
        TraceEvent::BlockTranslate { instr: 1001 },
        TraceEvent::Recv {
            asid: ASID,
            handle: Handle(3),
            buf: 0x1000,
            len: 16,
        },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(4),
            sockaddr: sockaddr_v4(5, 6, 7, 8, 443),
        },
        TraceEvent::Send {
            asid: ASID,
            handle: Handle(4),
            buf: 0x1000,
            len: 16,
        },
    ];
    trace::apply(&mut tracker, &events);

    let summary = tracker.summary();
    assert!(summary.saw_source_read);
    assert!(summary.saw_sink_write);
    assert!(summary.dependency);
    assert_eq!(summary.sinks.len(), 1);
    assert_eq!(summary.sinks[0].index, 0);
    assert_eq!(summary.sinks[0].tainted_bytes, 16);
    let sources: Vec<u32> = summary.sinks[0].sources.iter().map(|s| s.index).collect();
    assert_eq!(sources, vec![0]);
}

/// Scenario B: the send goes to a peer that is not in the sink catalog.
#[test]
fn send_to_uncatalogued_peer_reports_no_dependency() {
    let mut tracker = network_tracker();
    let events = vec![
        TraceEvent::BlockTranslate { instr: 10 },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(3),
            sockaddr: sockaddr_v4(1, 2, 3, 4, 80),
        },
        TraceEvent::BlockTranslate { instr: 11 },
        TraceEvent::Recv {
            asid: ASID,
            handle: Handle(3),
            buf: 0x1000,
            len: 16,
        },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(4),
            sockaddr: sockaddr_v4(123, 45, 67, 89, 8080),
        },
        TraceEvent::Send {
            asid: ASID,
            handle: Handle(4),
            buf: 0x1000,
            len: 16,
        },
    ];
    trace::apply(&mut tracker, &events);

    let summary = tracker.summary();
    assert!(summary.saw_source_read);
    assert!(!summary.saw_sink_write);
    assert!(!summary.dependency);
    assert!(summary.sinks.is_empty());
}

/// Scenario C: reads on unresolvable handles are dropped without any state
/// change, and later operations proceed normally.
#[test]
fn unresolvable_handle_is_dropped_then_recovers() {
    let mut tracker = network_tracker();

    // No prior connect, no process record: both resolver strategies fail.
    tracker.on_read_return(ASID, Handle(9), 0x1000, 64);
    let summary = tracker.summary();
    assert!(!summary.saw_source_read);
    assert!(!summary.saw_sink_write);
    assert!(!summary.dependency);

    // The same tracker still tracks a subsequent proper flow.
    trace::apply(
        &mut tracker,
        &[
            TraceEvent::BlockTranslate { instr: 5 },
            TraceEvent::Connect {
                asid: ASID,
                handle: Handle(3),
                sockaddr: sockaddr_v4(1, 2, 3, 4, 80),
            },
            TraceEvent::BlockTranslate { instr: 6 },
            TraceEvent::Recv {
                asid: ASID,
                handle: Handle(3),
                buf: 0x1000,
                len: 8,
            },
        ],
    );
    assert!(tracker.summary().saw_source_read);
}

/// Translation holes inside the buffer: the failed bytes are skipped on both
/// the label and the query side, the rest of the range still flows.
#[test]
fn partial_translation_failure_degrades_gracefully() {
    let mut tracker = network_tracker();
    let events = vec![
        TraceEvent::Unmapped { vaddr: 0x1003 },
        TraceEvent::Unmapped { vaddr: 0x100a },
        TraceEvent::BlockTranslate { instr: 10 },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(3),
            sockaddr: sockaddr_v4(1, 2, 3, 4, 80),
        },
        TraceEvent::BlockTranslate { instr: 11 },
        TraceEvent::Recv {
            asid: ASID,
            handle: Handle(3),
            buf: 0x1000,
            len: 16,
        },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(4),
            sockaddr: sockaddr_v4(5, 6, 7, 8, 443),
        },
        TraceEvent::Send {
            asid: ASID,
            handle: Handle(4),
            buf: 0x1000,
            len: 16,
        },
    ];
    trace::apply(&mut tracker, &events);

    let summary = tracker.summary();
    assert!(summary.dependency);
    // 16 bytes minus the two unmapped addresses.
    assert_eq!(summary.sinks[0].tainted_bytes, 14);
}

/// A file source read through introspection feeding a positioned write to a
/// file sink, with process metadata arriving via in-kernel block execution.
#[test]
fn file_to_file_flow_via_introspection() {
    let catalog = TargetCatalog::load(
        vec![Target::file("/etc/shadow")],
        vec![Target::file("/tmp/exfil")],
    );
    let mut tracker = Tracker::new(catalog, ReplayInspector::new(), InMemoryTaint::new());

    let events = vec![
        TraceEvent::Process {
            asid: ASID,
            pid: 77,
            name: "backup".to_owned(),
        },
        TraceEvent::BindPath {
            pid: 77,
            handle: Handle(5),
            path: "/etc/shadow".to_owned(),
        },
        TraceEvent::BindPath {
            pid: 77,
            handle: Handle(6),
            path: "/tmp/exfil".to_owned(),
        },
        TraceEvent::BlockExecute {
            asid: ASID,
            in_kernel: true,
        },
    ];
    trace::apply(&mut tracker, &events);

    // Only connects arm the gate, so a pure file flow keeps the engine
    // cold: the reads and writes are observed but nothing is labeled.
    tracker.on_pread_return(ASID, Handle(5), 0x2000, 32, 0);
    tracker.on_pwrite_return(ASID, Handle(6), 0x2000, 32, 0);

    let summary = tracker.summary();
    assert!(summary.saw_source_read);
    assert!(summary.saw_sink_write);
    assert!(!summary.dependency);
    assert_eq!(summary.sinks[0].tainted_bytes, 0);
}

/// Reconnecting a handle rebinds it: subsequent reads resolve against the
/// new peer (last-writer-wins), so the stale source no longer labels.
#[test]
fn handle_reuse_resolves_against_latest_connect() {
    let mut tracker = network_tracker();
    let events = vec![
        TraceEvent::BlockTranslate { instr: 10 },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(7),
            sockaddr: sockaddr_v4(1, 2, 3, 4, 80),
        },
        TraceEvent::BlockTranslate { instr: 11 },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(7),
            sockaddr: sockaddr_v4(200, 200, 200, 200, 7777),
        },
        TraceEvent::Recv {
            asid: ASID,
            handle: Handle(7),
            buf: 0x1000,
            len: 16,
        },
    ];
    trace::apply(&mut tracker, &events);

    let summary = tracker.summary();
    assert!(!summary.saw_source_read);
    assert!(!summary.dependency);
}

/// Two sources feeding one sink must both show up in the evidence.
#[test]
fn multiple_sources_attributed_to_one_sink() {
    let catalog = TargetCatalog::load(
        vec![
            Target::network("1.2.3.4", 80),
            Target::network("4.3.2.1", 81),
        ],
        vec![Target::network("5.6.7.8", 443)],
    );
    let mut tracker = Tracker::new(catalog, ReplayInspector::new(), InMemoryTaint::new());

    let events = vec![
        TraceEvent::BlockTranslate { instr: 10 },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(3),
            sockaddr: sockaddr_v4(1, 2, 3, 4, 80),
        },
        TraceEvent::BlockTranslate { instr: 11 },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(4),
            sockaddr: sockaddr_v4(4, 3, 2, 1, 81),
        },
        // First half of the buffer from source 0, second half from source 1.
        TraceEvent::Recv {
            asid: ASID,
            handle: Handle(3),
            buf: 0x1000,
            len: 8,
        },
        TraceEvent::Recv {
            asid: ASID,
            handle: Handle(4),
            buf: 0x1008,
            len: 8,
        },
        TraceEvent::Connect {
            asid: ASID,
            handle: Handle(5),
            sockaddr: sockaddr_v4(5, 6, 7, 8, 443),
        },
        TraceEvent::Send {
            asid: ASID,
            handle: Handle(5),
            buf: 0x1000,
            len: 16,
        },
    ];
    trace::apply(&mut tracker, &events);

    let summary = tracker.summary();
    assert!(summary.dependency);
    assert_eq!(summary.sinks[0].tainted_bytes, 16);
    let sources: Vec<u32> = summary.sinks[0].sources.iter().map(|s| s.index).collect();
    assert_eq!(sources, vec![0, 1]);
}
