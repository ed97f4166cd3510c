use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use cstream_codecs::{codec_by_id, Lz4Codec, ZstdCodec};
use cstream_core::format::{Header, DEFAULT_BLOCK_SIZE, HEADER_SIZE};
use cstream_core::{Codec, OpenMode, PassthroughCodec, Stream, StreamOptions};

#[derive(Parser)]
#[command(
    name = "cstream",
    about = "Write, read, and inspect compressed append-only record streams",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write newline-separated u64 values into a new stream
    Write {
        /// Source file of decimal values, one per line ("-" reads stdin)
        input: PathBuf,
        /// Destination stream file
        output: PathBuf,
        /// Codec to use: passthrough | zstd | lz4
        #[arg(short, long, default_value = "zstd")]
        codec: String,
        /// Zstd compression level (1-22, only used with --codec zstd)
        #[arg(long, default_value_t = 3)]
        zstd_level: i32,
        /// Uncompressed bytes per block
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: u64,
    },
    /// Read records back out, one decimal value per line
    Read {
        /// Stream file to read
        file: PathBuf,
        /// Stop after this many records (default: all of them)
        #[arg(short, long)]
        limit: Option<u64>,
    },
    /// Print header metadata
    Inspect {
        /// Stream file to inspect
        file: PathBuf,
    },
}

fn codec_from_name(name: &str, zstd_level: i32) -> anyhow::Result<Arc<dyn Codec>> {
    match name {
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassthroughCodec)),
        "zstd" | "z" => Ok(Arc::new(ZstdCodec::new(zstd_level))),
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        other => anyhow::bail!("unknown codec '{other}'. Valid options: passthrough, zstd, lz4"),
    }
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
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

fn read_header(path: &PathBuf) -> anyhow::Result<Header> {
    let mut f = File::open(path).with_context(|| format!("opening {path:?}"))?;
    let mut buf = [0u8; HEADER_SIZE as usize];
    f.read_exact(&mut buf)
        .with_context(|| format!("{path:?} is shorter than a stream header"))?;
    Header::from_bytes(&buf).map_err(|e| anyhow::anyhow!(e))
}

fn run_write(
    input: PathBuf,
    output: PathBuf,
    codec_name: &str,
    zstd_level: i32,
    block_size: u64,
) -> anyhow::Result<()> {
    let codec = codec_from_name(codec_name, zstd_level)?;
    let codec_display = codec.name().to_string();
    let options = StreamOptions {
        block_size,
        codec,
        ..StreamOptions::default()
    };
    let mut stream: Stream<u64> = Stream::open(&output, OpenMode::Write, options)
        .with_context(|| format!("creating output stream {output:?}"))?;

    let text = if input.to_str() == Some("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&input).with_context(|| format!("reading input file {input:?}"))?
    };

    let t0 = Instant::now();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: u64 = line
            .parse()
            .with_context(|| format!("parsing {line:?} as u64"))?;
        stream.write(value)?;
    }
    let items = stream.size();
    stream.close()?;
    let elapsed = t0.elapsed();

    let out_meta = std::fs::metadata(&output)?;
    eprintln!("  codec       : {codec_display}");
    eprintln!("  block size  : {}", human_bytes(block_size));
    eprintln!("  items       : {items}");
    eprintln!("  file size   : {}", human_bytes(out_meta.len()));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_read(file: PathBuf, limit: Option<u64>) -> anyhow::Result<()> {
    let header = read_header(&file)?;
    let codec = codec_by_id(header.codec_id)?;
    let options = StreamOptions {
        block_size: header.block_size,
        codec,
        ..StreamOptions::default()
    };
    let mut stream: Stream<u64> = Stream::open(&file, OpenMode::Read, options)
        .with_context(|| format!("opening stream {file:?}"))?;

    let target = limit.unwrap_or(stream.size());
    let t0 = Instant::now();
    let mut n = 0u64;
    while n < target && stream.can_read()? {
        println!("{}", stream.read()?);
        n += 1;
    }
    stream.close()?;

    eprintln!("  items read  : {n}");
    eprintln!("  elapsed     : {:.3}s", t0.elapsed().as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf) -> anyhow::Result<()> {
    let header = read_header(&file)?;
    let codec = codec_by_id(header.codec_id)?;
    let file_meta = std::fs::metadata(&file)?;

    println!("=== cstream file: {file:?} ===");
    println!();
    println!("  format version : {}", header.version);
    println!("  item size      : {} bytes", header.item_size);
    println!("  block size     : {}", human_bytes(header.block_size));
    println!("  items          : {}", header.item_count);
    println!("  codec          : {} (id={})", codec.name(), header.codec_id);
    println!("  clean close    : {}", header.clean_close);
    println!("  file on disk   : {}", human_bytes(file_meta.len()));
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Write {
            input,
            output,
            codec,
            zstd_level,
            block_size,
        } => run_write(input, output, &codec, zstd_level, block_size),
        Commands::Read { file, limit } => run_read(file, limit),
        Commands::Inspect { file } => run_inspect(file),
    }
}
