use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::info;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

use tsframe::config::{ClockConfig, Timezone};

#[derive(Parser, Debug)]
#[command(name = "tsframe-clock")]
#[command(about = "Generate a partitioned uniform clock")]
struct Args {
    /// JSON clock config; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// First timestamp: YYYY-MM-DD, YYYY-MM-DDTHH:MM:SS or nanoseconds
    #[arg(long)]
    begin: Option<String>,

    /// Last timestamp (inclusive), same formats as --begin
    #[arg(long)]
    end: Option<String>,

    /// Tick spacing, e.g. 250ms, 1s, 5m, 1h, 1d or nanoseconds
    #[arg(short, long)]
    frequency: Option<String>,

    /// Tick phase relative to --begin, same formats as --frequency
    #[arg(long)]
    offset: Option<String>,

    /// Target number of partitions
    #[arg(short, long)]
    partitions: Option<usize>,

    /// Timezone of --begin/--end: UTC or +HHMM/-HHMM
    #[arg(long)]
    timezone: Option<String>,

    /// Maximum number of ticks to print
    #[arg(long, default_value_t = 100)]
    limit: usize,

    /// Write the resolved config to this path
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClockConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ClockConfig::default(),
    };
    if let Some(begin) = &args.begin {
        config.begin = parse_timestamp(begin).context("invalid --begin")?;
    }
    if let Some(end) = &args.end {
        config.end = parse_timestamp(end).context("invalid --end")?;
    }
    if let Some(frequency) = &args.frequency {
        config.frequency = parse_duration(frequency).context("invalid --frequency")?;
    }
    if let Some(offset) = &args.offset {
        config.offset = parse_duration(offset).context("invalid --offset")?;
    }
    if let Some(partitions) = args.partitions {
        config.num_partitions = partitions;
    }
    if let Some(timezone) = &args.timezone {
        config.timezone = timezone.parse::<Timezone>()?;
    }

    if let Some(path) = &args.write_config {
        config
            .save(path)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        info!("Wrote config to {}", path.display());
    }

    let spec = config.to_spec()?;
    let layout = spec.layout()?;
    info!(
        "Clock: first_tick={} last_tick={} ticks={} partitions={}",
        layout.first_tick(),
        layout.last_tick(),
        layout.num_ticks(),
        layout.num_partitions()
    );
    let clock = spec.generate()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for (index, split) in clock.splits().enumerate() {
        writeln!(out, "# partition {index} {split}")?;
    }
    let mut remaining = args.limit;
    for (index, partition) in clock.partitions().iter().enumerate() {
        if remaining == 0 {
            break;
        }
        for (tick, _) in partition.rows().take(remaining) {
            writeln!(out, "{index}\t{tick}")?;
            remaining -= 1;
        }
    }
    out.flush()?;
    Ok(())
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` or integer nanoseconds.
fn parse_timestamp(value: &str) -> Result<i64> {
    if let Ok(nanos) = value.parse::<i64>() {
        return Ok(nanos);
    }
    let datetime = if let Ok(date) = Date::parse(value, format_description!("[year]-[month]-[day]"))
    {
        date.midnight()
    } else {
        PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
        .with_context(|| format!("unrecognized timestamp: {value}"))?
    };
    let nanos = datetime.assume_utc().unix_timestamp_nanos();
    i64::try_from(nanos).map_err(|_| anyhow!("timestamp out of range: {value}"))
}

/// Parse a duration such as `250ms`, `1s`, `5m`, `1h`, `1d` or integer
/// nanoseconds.
fn parse_duration(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(nanos) = value.parse::<i64>() {
        return Ok(nanos);
    }
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '-'))
        .ok_or_else(|| anyhow!("missing unit in duration: {value}"))?;
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount
        .parse()
        .with_context(|| format!("invalid amount in duration: {value}"))?;
    let scale: i64 = match unit.trim() {
        "ns" => 1,
        "us" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" | "min" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        "d" => 86_400 * 1_000_000_000,
        other => bail!("unknown duration unit '{other}' in {value}"),
    };
    amount
        .checked_mul(scale)
        .ok_or_else(|| anyhow!("duration overflows: {value}"))
}
