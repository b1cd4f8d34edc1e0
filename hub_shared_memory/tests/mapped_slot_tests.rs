//! File-backed slot integration tests.
//!
//! A node-side slot and a host-side attachment share one mapped file:
//! writes on either side are visible to the other, whole-record only.

use hub_shared_memory::{SLOT_HEADER_LEN, SharedSlot, ShmError};
use tempfile::TempDir;

#[test]
fn test_host_sees_latest_telemetry_write() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("telemetry");

    let mut node = SharedSlot::create_mapped("telemetry", &path, 10).expect("create");
    let host = SharedSlot::attach_mapped("telemetry", &path).expect("attach");
    assert_eq!(host.capacity(), 10);

    node.write(&[0x11, 50]).expect("first write");
    node.write(&[0x12, 1, 0, 2, 0, 3, 0]).expect("second write");

    assert_eq!(host.read().expect("read"), vec![0x12, 1, 0, 2, 0, 3, 0]);
    assert_eq!(host.sequence(), node.sequence());
}

#[test]
fn test_node_sees_host_command_write() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("commands");

    let node = SharedSlot::create_mapped("commands", &path, 9).expect("create");
    let mut host = SharedSlot::attach_mapped("commands", &path).expect("attach");

    // Zero-filled until the host writes.
    assert!(node.read().expect("read").is_empty());

    host.write(&[0x41, 1, 0, 0xF4, 0x01, 0, 0, 0, 0]).expect("host write");
    assert_eq!(node.read().expect("read")[0], 0x41);
    assert_eq!(host.writes(), 1);
    assert_eq!(node.writes(), 0);
}

#[test]
fn test_created_file_removed_on_drop() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("telemetry");

    let slot = SharedSlot::create_mapped("telemetry", &path, 10).expect("create");
    assert_eq!(
        std::fs::metadata(&path).expect("metadata").len() as usize,
        SLOT_HEADER_LEN + 10
    );
    assert_eq!(slot.path(), Some(path.as_path()));
    drop(slot);
    assert!(!path.exists());
}

#[test]
fn test_attach_missing_file_fails() {
    let dir = TempDir::new().expect("tempdir");
    let result = SharedSlot::attach_mapped("nope", &dir.path().join("nope"));
    assert!(matches!(result, Err(ShmError::Io { .. })));
}

#[test]
fn test_attach_rejects_headerless_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("tiny");
    std::fs::write(&path, [0u8; SLOT_HEADER_LEN]).expect("write");
    assert!(matches!(
        SharedSlot::attach_mapped("tiny", &path),
        Err(ShmError::InvalidSize { size: 0, .. })
    ));
}

#[test]
fn test_host_never_sees_partial_write_under_contention() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("telemetry");

    let mut node = SharedSlot::create_mapped("telemetry", &path, 64).expect("create");
    let host = SharedSlot::attach_mapped("telemetry", &path).expect("attach");

    const WRITES: usize = 20_000;
    let writer = std::thread::spawn(move || {
        let mut payload = [0u8; 64];
        for i in 0..WRITES {
            let fill = (i % 251) as u8;
            let len = 1 + fill as usize % 64;
            payload[..len].fill(fill);
            node.write(&payload[..len]).expect("write");
        }
        node
    });

    let mut out = [0u8; 64];
    while !writer.is_finished() {
        match host.read_into(&mut out) {
            Ok(0) => {}
            Ok(len) => {
                let fill = out[0];
                assert!(
                    out[..len].iter().all(|&b| b == fill),
                    "mixed payload {:?}",
                    &out[..len]
                );
                // Length and fill come from the same write.
                assert_eq!(len, 1 + fill as usize % 64);
            }
            Err(ShmError::TornRead { .. }) => {}
            Err(e) => panic!("unexpected read error: {e}"),
        }
    }

    let node = writer.join().expect("writer thread");
    assert_eq!(node.sequence(), 2 * WRITES as u32);
    assert_eq!(host.sequence() % 2, 0);

    let last = host.read().expect("final read");
    let fill = ((WRITES - 1) % 251) as u8;
    assert_eq!(last, vec![fill; 1 + fill as usize % 64]);
}
