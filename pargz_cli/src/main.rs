use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use xxhash_rust::xxh3::Xxh3;

use pargz_codecs::codec_by_name;
use pargz_core::{Codec, ParallelWriter, StreamConfig, DEFAULT_BLOCK_SIZE, DEFAULT_QUEUE_CAPACITY};

/// Read size used when feeding the stream (matches a typical pipe buffer).
const READ_CHUNK: usize = 64 * 1024;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pargz",
    about = "Multi-threaded block compression with ordered, concatenable output",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file in parallel blocks
    Compress {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
        #[command(flatten)]
        stream: StreamArgs,
    },
    /// Decompress a stream of concatenated blocks
    Decompress {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
        /// Codec the stream was written with: gzip | zstd | lz4 | passthrough
        #[arg(short, long, default_value = "gzip")]
        codec: String,
    },
    /// Compress into memory, decompress again, and compare xxh3 digests
    Verify {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        #[command(flatten)]
        stream: StreamArgs,
    },
}

#[derive(Args)]
struct StreamArgs {
    /// Codec to use: gzip | zstd | lz4 | passthrough
    #[arg(short, long, default_value = "gzip")]
    codec: String,
    /// Compression level (gzip 0–9, zstd 1–22; codec default if omitted)
    #[arg(short, long)]
    level: Option<i32>,
    /// Raw bytes per block
    #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,
    /// Compression worker threads (default: one per CPU)
    #[arg(short = 'j', long)]
    workers: Option<usize>,
    /// Blocks that may queue before reading stalls
    #[arg(short, long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue: usize,
}

impl StreamArgs {
    fn codec(&self) -> anyhow::Result<Arc<dyn Codec>> {
        codec_by_name(&self.codec, self.level)
    }

    fn config(&self) -> StreamConfig {
        let mut config = StreamConfig::default()
            .with_block_size(self.block_size)
            .with_queue_capacity(self.queue);
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        config
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn is_stdio(path: &Path) -> bool {
    path.to_str() == Some("-")
}

fn open_input(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("opening input file {:?}", path))?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_output(path: &Path) -> anyhow::Result<Box<dyn Write + Send>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdout()));
    }
    let file = File::create(path).with_context(|| format!("creating output file {:?}", path))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Pump `src` through `writer` in `READ_CHUNK` pieces, hashing the raw bytes.
fn pump<W: Write + Send + 'static>(
    src: &mut dyn Read,
    writer: &mut ParallelWriter<W>,
) -> anyhow::Result<u64> {
    let mut hasher = Xxh3::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write(&buf[..n])?;
    }
    Ok(hasher.digest())
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(input: PathBuf, output: PathBuf, args: StreamArgs) -> anyhow::Result<()> {
    let codec = args.codec()?;
    let config = args.config();
    let mut src = open_input(&input)?;
    let dst = open_output(&output)?;
    let mut writer = ParallelWriter::new(dst, codec, config.clone())?;
    info!(codec = writer.codec().name(), workers = config.workers, "compressing {:?}", input);

    let t0 = Instant::now();
    pump(src.as_mut(), &mut writer)?;
    writer.flush().context("finishing compression")?;
    let stats = writer.stats();
    writer.close()?;
    let elapsed = t0.elapsed();

    eprintln!("  codec       : {}", writer.codec().name());
    eprintln!("  block size  : {}", human_bytes(config.block_size as u64));
    eprintln!("  workers     : {}", config.workers);
    eprintln!("  blocks      : {}", stats.blocks_appended);
    eprintln!("  raw size    : {}", human_bytes(stats.bytes_in));
    eprintln!("  compressed  : {}", human_bytes(stats.bytes_out));
    eprintln!("  ratio       : {:.2}x", stats.ratio());
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((stats.bytes_in as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf, codec_name: &str) -> anyhow::Result<()> {
    let codec = codec_by_name(codec_name, None)?;

    let mut compressed = Vec::new();
    open_input(&input)?.read_to_end(&mut compressed)?;

    let t0 = Instant::now();
    let raw = codec
        .decompress_stream(&compressed)
        .with_context(|| format!("decoding {:?} as {}", input, codec.name()))?;
    let elapsed = t0.elapsed();

    let mut dst = open_output(&output)?;
    dst.write_all(&raw)?;
    dst.flush()?;

    eprintln!("  compressed  : {}", human_bytes(compressed.len() as u64));
    eprintln!("  raw size    : {}", human_bytes(raw.len() as u64));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((raw.len() as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_verify(input: PathBuf, args: StreamArgs) -> anyhow::Result<()> {
    let codec = args.codec()?;
    let config = args.config();

    let mut src = open_input(&input)?;
    let mut writer = ParallelWriter::new(Vec::new(), Arc::clone(&codec), config)?;

    let t0 = Instant::now();
    let expected = pump(src.as_mut(), &mut writer)?;
    let stats = writer.stats();
    let compressed = writer.finish()?;
    let compress_elapsed = t0.elapsed();

    let raw = codec.decompress_stream(&compressed)?;
    let actual = xxhash_rust::xxh3::xxh3_64(&raw);

    eprintln!("  codec       : {}", codec.name());
    eprintln!("  blocks      : {}", stats.blocks_sealed);
    eprintln!("  raw size    : {}", human_bytes(stats.bytes_in));
    eprintln!("  compressed  : {}", human_bytes(compressed.len() as u64));
    eprintln!("  compress    : {:.3}s", compress_elapsed.as_secs_f64());
    eprintln!("  input xxh3  : {:016x}", expected);
    eprintln!("  output xxh3 : {:016x}", actual);

    if expected != actual || raw.len() as u64 != stats.bytes_in {
        anyhow::bail!(
            "round trip mismatch: {} raw bytes in, {} decoded",
            stats.bytes_in,
            raw.len()
        );
    }
    println!("ok");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compress {
            input,
            output,
            stream,
        } => run_compress(input, output, stream),
        Commands::Decompress {
            input,
            output,
            codec,
        } => run_decompress(input, output, &codec),
        Commands::Verify { input, stream } => run_verify(input, stream),
    }
}
