//! The concrete scenarios from the compressed-stream design notes, each
//! record a 64-bit little-endian unsigned integer.

use cstream_core::{OpenMode, SeekKind, Stream, StreamError, StreamOptions};
use tempfile::NamedTempFile;

fn temp_path() -> std::path::PathBuf {
    let f = NamedTempFile::new().unwrap();
    let path = f.path().to_path_buf();
    drop(f);
    path
}

#[test]
fn s1_round_trip_write_then_read_from_beginning() {
    let path = temp_path();
    let mut s: Stream<u64> = Stream::open(&path, OpenMode::ReadWrite, StreamOptions::default()).unwrap();
    for i in 0..1000u64 {
        s.write(i).unwrap();
    }
    s.seek(SeekKind::Beginning).unwrap();
    let items = s.read_all(1000).unwrap();
    assert_eq!(items, (0..1000u64).collect::<Vec<_>>());
    s.close().unwrap();
}

#[test]
fn s2_position_fidelity() {
    let path = temp_path();
    let mut s: Stream<u64> = Stream::open(&path, OpenMode::ReadWrite, StreamOptions::default()).unwrap();
    for i in 0..100u64 {
        s.write(i).unwrap();
    }
    s.seek(SeekKind::Beginning).unwrap();
    s.read_all(50).unwrap();
    let p = s.get_position().unwrap();
    s.read_all(50).unwrap();
    s.set_position(p).unwrap();
    assert_eq!(s.read().unwrap(), 50);
    s.close().unwrap();
}

#[test]
fn s3_size_consistency_across_reopen() {
    let path = temp_path();
    let count = 1u64 << 15;
    {
        let mut s: Stream<u64> = Stream::open(&path, OpenMode::Write, StreamOptions::default()).unwrap();
        for i in 0..count {
            s.write(i).unwrap();
        }
        s.close().unwrap();
    }
    let mut s: Stream<u64> = Stream::open(&path, OpenMode::Read, StreamOptions::default()).unwrap();
    assert_eq!(s.size(), count);
    s.seek(SeekKind::Beginning).unwrap();
    let items = s.read_all(count as usize).unwrap();
    assert_eq!(items, (0..count).collect::<Vec<_>>());
    s.close().unwrap();
}

#[test]
fn s4_end_of_stream_after_exact_count() {
    let path = temp_path();
    {
        let mut s: Stream<u64> = Stream::open(&path, OpenMode::Write, StreamOptions::default()).unwrap();
        s.write(10).unwrap();
        s.write(20).unwrap();
        s.write(30).unwrap();
        s.close().unwrap();
    }
    let mut s: Stream<u64> = Stream::open(&path, OpenMode::Read, StreamOptions::default()).unwrap();
    assert_eq!(s.read().unwrap(), 10);
    assert_eq!(s.read().unwrap(), 20);
    assert_eq!(s.read().unwrap(), 30);
    assert!(matches!(s.read(), Err(StreamError::EndOfStream)));
    s.close().unwrap();
}

#[test]
fn s5_block_boundary_crossing() {
    let path = temp_path();
    let options = StreamOptions {
        block_size: 4096,
        ..StreamOptions::default()
    };
    let mut s: Stream<u64> = Stream::open(&path, OpenMode::ReadWrite, options).unwrap();
    for i in 0..1025u64 {
        s.write(i).unwrap();
    }
    s.seek(SeekKind::Beginning).unwrap();
    let items = s.read_all(513).unwrap();
    assert_eq!(items[511], 511);
    assert_eq!(items[512], 512);
    s.close().unwrap();
}

#[test]
fn s6_truncate_resets_to_empty() {
    let path = temp_path();
    let mut s: Stream<u64> = Stream::open(&path, OpenMode::ReadWrite, StreamOptions::default()).unwrap();
    for i in 0..10u64 {
        s.write(i).unwrap();
    }
    s.truncate().unwrap();
    assert_eq!(s.size(), 0);
    assert!(!s.can_read().unwrap());
    s.close().unwrap();
}

#[test]
fn unclean_close_is_detected_on_reopen() {
    let path = temp_path();
    {
        let mut s: Stream<u64> = Stream::open(&path, OpenMode::Write, StreamOptions::default()).unwrap();
        s.write(1).unwrap();
        // dropped without calling close(): the clean flag is never set.
    }
    let result = Stream::<u64>::open(&path, OpenMode::Read, StreamOptions::default());
    assert!(matches!(result, Err(StreamError::InvalidFile(_))));
}

#[test]
fn reopen_with_mismatched_block_size_is_rejected() {
    let path = temp_path();
    {
        let mut s: Stream<u64> = Stream::open(&path, OpenMode::Write, StreamOptions::default()).unwrap();
        s.write(1).unwrap();
        s.close().unwrap();
    }
    let options = StreamOptions {
        block_size: 4096,
        ..StreamOptions::default()
    };
    let result = Stream::<u64>::open(&path, OpenMode::Read, options);
    assert!(matches!(result, Err(StreamError::InvalidFile(_))));
}
