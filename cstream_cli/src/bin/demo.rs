//! cstream walkthrough
//!
//! Writes a synthetic record stream across several block boundaries,
//! demonstrates that reading item `blockItems - 1` and `blockItems` both
//! succeed without an explicit seek, and demonstrates a position-token
//! round trip: capture a position mid-stream, read past it, then resume
//! exactly there.

use std::time::Instant;

use anyhow::Result;

use cstream_codecs::ZstdCodec;
use cstream_core::{OpenMode, SeekKind, Stream, StreamOptions};

const BLOCK_SIZE: u64 = 4096;
const ITEM_SIZE: u64 = 8;
const BLOCK_ITEMS: u64 = BLOCK_SIZE / ITEM_SIZE;
const TOTAL_ITEMS: u64 = BLOCK_ITEMS * 4 + 37;

fn section(title: &str) {
    println!("━━━ {title} {}", "━".repeat(70usize.saturating_sub(title.len() + 5)));
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{v:.2} {}", UNITS[unit])
    }
}

fn timed_step<T, F: FnOnce() -> Result<T>>(label: &str, f: F) -> Result<T> {
    eprint!("  {label:<40} ");
    let t0 = Instant::now();
    let r = f()?;
    eprintln!("done  ({:.3}s)", t0.elapsed().as_secs_f64());
    Ok(r)
}

fn run() -> Result<()> {
    let path = std::env::temp_dir().join(format!("cstream-demo-{}.cst", std::process::id()));
    let _ = std::fs::remove_file(&path);

    section("write");
    let options = StreamOptions {
        block_size: BLOCK_SIZE,
        codec: std::sync::Arc::new(ZstdCodec::default()),
        ..StreamOptions::default()
    };
    let mut stream: Stream<u64> = Stream::open(&path, OpenMode::ReadWrite, options)?;
    timed_step("writing records across 4 blocks", || {
        for i in 0..TOTAL_ITEMS {
            stream.write(i)?;
        }
        Ok(())
    })?;
    println!("  items written   : {}", stream.size());
    println!("  block capacity  : {BLOCK_ITEMS} items/block");

    section("block-boundary read");
    stream.seek(SeekKind::Beginning)?;
    let boundary = stream.read_all((BLOCK_ITEMS + 1) as usize)?;
    let last_of_block0 = boundary[(BLOCK_ITEMS - 1) as usize];
    let first_of_block1 = boundary[BLOCK_ITEMS as usize];
    println!("  item[blockItems-1] = {last_of_block0} (expected {})", BLOCK_ITEMS - 1);
    println!("  item[blockItems]   = {first_of_block1} (expected {BLOCK_ITEMS})");
    assert_eq!(last_of_block0, BLOCK_ITEMS - 1);
    assert_eq!(first_of_block1, BLOCK_ITEMS);

    section("position round trip");
    stream.seek(SeekKind::Beginning)?;
    stream.read_all(100)?;
    let position = stream.get_position()?;
    stream.read_all(200)?;
    stream.set_position(position)?;
    let resumed = stream.read()?;
    println!("  captured position after 100 reads, consumed 200 more, resumed");
    println!("  resumed value   : {resumed} (expected 100)");
    assert_eq!(resumed, 100);

    section("close and verify on disk");
    let file_size_before = std::fs::metadata(&path)?.len();
    stream.close()?;

    let reopened: Stream<u64> = Stream::open(&path, OpenMode::Read, StreamOptions {
        block_size: BLOCK_SIZE,
        codec: std::sync::Arc::new(ZstdCodec::default()),
        ..StreamOptions::default()
    })?;
    println!("  items persisted : {}", reopened.size());
    println!("  file on disk    : {}", human_bytes(file_size_before));
    assert_eq!(reopened.size(), TOTAL_ITEMS);
    reopened.close()?;

    std::fs::remove_file(&path)?;
    println!();
    println!("all checks passed.");
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
