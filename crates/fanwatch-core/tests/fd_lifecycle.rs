//! Descriptor ownership of the enricher.
//!
//! Kept as the only test in this binary: it counts entries of the
//! process's descriptor table, which parallel tests would disturb.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::os::fd::IntoRawFd;
use std::sync::Arc;

use fanwatch_common::types::EventMask;
use fanwatch_core::enrich::{Enricher, ProcfsResolver};
use fanwatch_core::framer::{RawRecord, frame};

fn open_descriptors() -> usize {
    std::fs::read_dir("/proc/self/fd")
        .expect("read /proc/self/fd")
        .count()
}

#[test]
fn every_enriched_descriptor_is_closed_exactly_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pid = i32::try_from(std::process::id()).expect("pid fits");
    let before = open_descriptors();

    // Every fourth file is unlinked before enrichment, and every other
    // record goes through a resolver whose proc root does not exist.
    let mut stream = Vec::new();
    let mut fds = Vec::new();
    for i in 0..32 {
        let path = dir.path().join(format!("f{i}"));
        std::fs::write(&path, b"x").expect("write");
        let fd = std::fs::File::open(&path).expect("open").into_raw_fd();
        if i % 4 == 0 {
            std::fs::remove_file(&path).expect("remove");
        }
        fds.push(fd);
        RawRecord::new(EventMask::OPEN, fd, pid).write_to(&mut stream);
    }
    RawRecord::new(EventMask::QUEUE_OVERFLOW, -1, 0).write_to(&mut stream);
    assert_eq!(open_descriptors(), before + fds.len());

    let real = Enricher::default();
    let broken = Enricher::new(Arc::new(ProcfsResolver::new(dir.path().join("no-proc"))));

    let mut resolved = 0;
    let mut unresolved = 0;
    for (i, record) in frame(&stream).enumerate() {
        let enricher = if i % 2 == 0 { &real } else { &broken };
        match enricher.enrich(&record) {
            Some(event) if event.path.is_some() => resolved += 1,
            Some(_) => unresolved += 1,
            None => assert!(record.is_overflow()),
        }
    }

    assert_eq!(resolved, 16);
    assert_eq!(unresolved, 16);
    assert_eq!(open_descriptors(), before);
}
