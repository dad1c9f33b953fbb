//! CLI for the rtgraph channel store.
//!
//! Loads an `x,y` CSV stream into a channel and provides commands for
//! summarizing, sampling, inspecting and benchmarking it.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use rtgraph::{Channel, ChannelConfig, InterpolationMode};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// rtgraph: multi-resolution store for live (x, y) sample channels.
#[derive(Parser)]
#[command(name = "rtgraph", version, about)]
struct Cli {
    /// Channel configuration file (JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the level-1 bucket width.
    #[arg(long, global = true)]
    base_width: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Aggregate the samples inside an x interval.
    Summarize {
        /// CSV file of `x,y` lines ("-" for stdin).
        input: PathBuf,

        /// Lower bound of the interval (inclusive). Defaults to the oldest sample.
        #[arg(long)]
        from: Option<f64>,

        /// Upper bound of the interval (inclusive). Defaults to the newest sample.
        #[arg(long)]
        to: Option<f64>,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Read interpolated values at one or more positions.
    Sample {
        /// CSV file of `x,y` lines ("-" for stdin).
        input: PathBuf,

        /// Position to read (repeatable).
        #[arg(long = "at", required = true)]
        at: Vec<f64>,

        /// Interpolation mode (previous, nearest, linear, smooth).
        #[arg(long)]
        mode: Option<InterpolationMode>,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Display sample count, x range and per-level entry counts.
    Info {
        /// CSV file of `x,y` lines ("-" for stdin).
        input: PathBuf,
    },

    /// Run an ingestion and query microbenchmark.
    Bench {
        /// Number of samples to write.
        #[arg(long, default_value = "10000000")]
        points: u32,

        /// Number of interval queries to run after ingestion.
        #[arg(long, default_value = "10000")]
        queries: u32,
    },
}

/// Output format for results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON object.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref(), cli.base_width).and_then(|config| {
        match cli.command {
            Commands::Summarize {
                input,
                from,
                to,
                format,
            } => cmd_summarize(&input, config, from, to, &format),
            Commands::Sample {
                input,
                at,
                mode,
                format,
            } => cmd_sample(&input, config, &at, mode, &format),
            Commands::Info { input } => cmd_info(&input, config),
            Commands::Bench { points, queries } => cmd_bench(config, points, queries),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Builds the channel configuration from the optional file and overrides.
fn load_config(
    path: Option<&Path>,
    base_width: Option<f64>,
) -> Result<ChannelConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => ChannelConfig::load(path)?,
        None => ChannelConfig::default(),
    };
    if let Some(base_width) = base_width {
        config.base_width = base_width;
        config.validate()?;
    }
    Ok(config)
}

/// Reads an `x,y` CSV stream into a new channel.
fn load_channel(input: &Path, config: ChannelConfig) -> Result<Channel, Box<dyn std::error::Error>> {
    let name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stdin")
        .to_string();
    let mut channel = Channel::with_config(name, "x", "y", config)?;

    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(input)
            .map_err(|e| format!("Failed to open '{}': {e}", input.display()))?;
        Box::new(BufReader::new(file))
    };

    for (x, y) in read_rows(reader)? {
        channel.add_value(x, y)?;
    }

    info!(
        channel = channel.name(),
        samples = channel.len(),
        levels = channel.pyramid().level_count(),
        "loaded channel"
    );
    Ok(channel)
}

/// Parses `x,y` rows, ordered by x.
///
/// Blank lines, `#` comments and non-numeric header lines before the first
/// row are skipped. Unsorted input is sorted by x (stably) so equal positions keep their
/// input order.
fn read_rows(reader: impl BufRead) -> Result<Vec<(f64, f64)>, Box<dyn std::error::Error>> {
    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(row) = parse_row(line) else {
            if rows.is_empty() {
                debug!(header = line, "skipping header row");
                continue;
            }
            return Err(format!("line {}: expected 'x,y', got '{line}'", line_no + 1).into());
        };
        rows.push(row);
    }

    if !rows.is_sorted_by(|a, b| a.0 <= b.0) {
        warn!(rows = rows.len(), "input is not sorted by x, sorting before ingestion");
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    Ok(rows)
}

fn parse_row(line: &str) -> Option<(f64, f64)> {
    let mut fields = line.split(',').map(str::trim);
    let x = fields.next()?.parse().ok()?;
    let y = fields.next()?.parse().ok()?;
    Some((x, y))
}

/// Implements `rtgraph summarize <input>`.
fn cmd_summarize(
    input: &Path,
    config: ChannelConfig,
    from: Option<f64>,
    to: Option<f64>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let channel = load_channel(input, config)?;
    let (oldest, newest) = channel.x_range().ok_or("input contains no samples")?;
    let x_lo = from.unwrap_or(oldest);
    let x_hi = to.unwrap_or(newest);

    let query = channel.query_interval_detailed(x_lo, x_hi)?;
    let s = query.summary;

    match format {
        OutputFormat::Csv => {
            println!(
                "# channel={}, level={}, buckets={}, raw={}",
                channel.name(),
                query.level_used,
                query.buckets_merged,
                query.raw_samples_scanned
            );
            println!("x_lo,x_hi,x_start,x_end,mean,min,max,count");
            println!(
                "{x_lo},{x_hi},{},{},{},{},{},{}",
                s.x_start, s.x_end, s.mean, s.min, s.max, s.count
            );
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "channel": channel.name(),
                "x_lo": x_lo,
                "x_hi": x_hi,
                "summary": s,
                "level_used": query.level_used,
                "buckets_merged": query.buckets_merged,
                "raw_samples_scanned": query.raw_samples_scanned,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `rtgraph sample <input> --at X`.
fn cmd_sample(
    input: &Path,
    config: ChannelConfig,
    positions: &[f64],
    mode: Option<InterpolationMode>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut channel = load_channel(input, config)?;
    if let Some(mode) = mode {
        channel.set_interpolation(mode);
    }

    let mut iter = channel.make_iterator();
    let mut values = Vec::with_capacity(positions.len());
    for &x in positions {
        // Positions before the oldest sample have no value
        let value = if iter.seek_at(x) {
            Some(iter.read_value()?)
        } else {
            None
        };
        values.push((x, value));
    }

    match format {
        OutputFormat::Csv => {
            println!("# channel={}, mode={}", channel.name(), channel.interpolation());
            println!("x,value");
            for (x, value) in &values {
                match value {
                    Some(v) => println!("{x},{v}"),
                    None => println!("{x},"),
                }
            }
        }
        OutputFormat::Json => {
            let data: Vec<serde_json::Value> = values
                .iter()
                .map(|(x, value)| serde_json::json!({ "x": x, "value": value }))
                .collect();
            let output = serde_json::json!({
                "channel": channel.name(),
                "mode": channel.interpolation(),
                "data": data,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `rtgraph info <input>`.
fn cmd_info(input: &Path, config: ChannelConfig) -> Result<(), Box<dyn std::error::Error>> {
    let channel = load_channel(input, config)?;
    let config = channel.config();

    println!("Channel: {}", channel.name());
    println!("  Samples: {}", channel.len());
    match channel.x_range() {
        Some((oldest, newest)) => println!("  X range: [{oldest}, {newest}]"),
        None => println!("  X range: (empty)"),
    }
    println!("  Base width: {}", config.base_width);
    println!("  Origin: {}", config.origin);
    println!("  Interpolation: {}", config.interpolation);
    println!(
        "  Capacity: max_samples={}, max_x_range={}",
        format_bound(config.max_samples),
        format_bound(config.max_x_range)
    );
    println!();

    let pyramid = channel.pyramid();
    println!("Levels: {}", pyramid.level_count());
    for level in pyramid.levels() {
        println!(
            "  Level {:2}: width={}, closed={}, open={}",
            level.level(),
            level.width(),
            level.closed().len(),
            if level.open().is_some() { "yes" } else { "no" }
        );
    }

    Ok(())
}

/// Implements `rtgraph bench`.
#[allow(clippy::cast_precision_loss)] // Benchmark stats are fine with f64 precision
fn cmd_bench(config: ChannelConfig, points: u32, queries: u32) -> Result<(), Box<dyn std::error::Error>> {
    println!("rtgraph ingestion benchmark");
    println!("  Points: {points}");
    println!("  Base width: {}", config.base_width);
    println!();

    let mut channel = Channel::with_config("bench", "s", "V", config)?;

    let start = Instant::now();
    for i in 0..points {
        channel.add_value(f64::from(i), f64::from(i % 1_000))?;
    }
    let elapsed = start.elapsed();
    let ns_per_write = elapsed.as_nanos() as f64 / f64::from(points.max(1));
    let writes_per_sec = f64::from(points) / elapsed.as_secs_f64();

    println!("Results:");
    println!("  Total writes: {}", channel.len());
    println!("  Levels: {}", channel.pyramid().level_count());
    println!("  Elapsed: {elapsed:.3?}");
    println!("  Avg latency: {ns_per_write:.1} ns/write");
    println!("  Throughput: {writes_per_sec:.0} writes/sec");

    if queries > 0 && points > 1 {
        let span = f64::from(points - 1);
        let start = Instant::now();
        let mut scanned = 0usize;
        for q in 0..queries {
            // Widths spread over several orders of magnitude
            let width = span / f64::from(1u32 << (q % 16));
            let x_lo = (f64::from(q) * 7.3) % (span - width).max(1.0);
            scanned += channel.query_interval_detailed(x_lo, x_lo + width)?.raw_samples_scanned;
        }
        let elapsed = start.elapsed();

        println!();
        println!("  Queries: {queries}");
        println!("  Elapsed: {elapsed:.3?}");
        println!(
            "  Avg latency: {:.1} ns/query",
            elapsed.as_nanos() as f64 / f64::from(queries)
        );
        println!(
            "  Avg raw samples scanned: {:.1}",
            scanned as f64 / f64::from(queries)
        );
    }
    println!();

    Ok(())
}

/// Formats a capacity bound, where zero means unbounded.
fn format_bound<T: PartialOrd + Default + std::fmt::Display>(value: T) -> String {
    if value > T::default() {
        value.to_string()
    } else {
        "unbounded".to_string()
    }
}
