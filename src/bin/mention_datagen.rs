//! Synthetic Mention Generator
//!
//! Writes nested-form mention records to a JSONL stream file (or stdout),
//! with random authors and athletes drawn from a fixed roster. Seeded, so the
//! same arguments always produce the same file.
//!
//! Usage:
//!   mention_datagen --count 500 --seed 7 --out streams/nba-mentions.jsonl --roster-out roster.json

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use tampering_detector::models::Player;
use tampering_detector::stream::clock::{millis_to_datetime, parse_timestamp, Millis};

/// (account, display name, team)
const ROSTER: [(&str, &str, &str); 4] = [
    ("KingJames", "Lebron James", "LAL"),
    ("AntDavis23", "Anthony Davis", "LAL"),
    ("KyrieIrving", "Kyrie Irving", "BKN"),
    ("StephenCurry30", "Stephen Curry", "GSW"),
];

#[derive(Parser, Debug)]
#[command(name = "mention_datagen")]
#[command(about = "Generate synthetic NBA mention records")]
struct Args {
    /// Number of mentions
    #[arg(long, default_value = "100")]
    count: u64,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// First event time (RFC 3339); defaults to now
    #[arg(long)]
    start: Option<String>,

    /// Mean spacing between event times
    #[arg(long, default_value = "2000")]
    spacing_ms: u64,

    /// Max out-of-orderness applied to each event time (both directions)
    #[arg(long, default_value = "0")]
    jitter_ms: u64,

    /// Probability of repeating the previous tweet id
    #[arg(long, default_value = "0.0", value_parser = parse_probability)]
    duplicate_rate: f64,

    /// Output file; stdout when omitted
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also write the roster JSON used for enrichment
    #[arg(long)]
    roster_out: Option<PathBuf>,
}

fn parse_probability(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{}: {}", raw, e))?;
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("{} is not a probability in [0, 1]", raw));
    }
    Ok(value)
}

fn roster() -> Vec<Player> {
    ROSTER
        .iter()
        .map(|(account, name, team)| Player::new(*account, *name, *team))
        .collect()
}

fn mention(id: u64, event_time: DateTime<Utc>, author: &str, athlete: &str) -> Value {
    json!({
        "event_time": event_time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        "data": [{
            "text": "Dummy Text",
            "id": id,
            "context_annotations": [
                {
                    "domain": {"id": "3", "name": "TV Shows", "description": "Television shows from around the world"},
                    "entity": {"id": "10000607734", "name": "NBA Basketball"}
                },
                {
                    "domain": {"id": "60", "name": "Athlete", "description": "An athlete in the world"},
                    "entity": {"id": "1142269203002454017", "name": athlete}
                }
            ]
        }],
        "includes": {"users": [{"username": author}]}
    })
}

fn generate(args: &Args, start: Millis) -> Vec<Value> {
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let players = roster();
    let jitter = args.jitter_ms as i64;
    let duplicate_rate = args.duplicate_rate.clamp(0.0, 1.0);

    let mut out = Vec::with_capacity(args.count as usize);
    let mut base = start;
    let mut last_id: Option<u64> = None;

    for _ in 0..args.count {
        base += args.spacing_ms as i64;
        let offset = if jitter > 0 { rng.gen_range(-jitter..=jitter) } else { 0 };
        let Some(event_time) = millis_to_datetime(base + offset) else {
            continue;
        };

        let id = match last_id {
            Some(prev) if rng.gen_bool(duplicate_rate) => prev,
            _ => rng.gen_range(0..=100_000u64),
        };
        last_id = Some(id);

        let (Some(author), Some(athlete)) = (players.choose(&mut rng), players.choose(&mut rng))
        else {
            continue;
        };
        out.push(mention(id, event_time, &author.account, &athlete.name));
    }
    out
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let start = match &args.start {
        Some(raw) => parse_timestamp(raw).with_context(|| format!("invalid --start {}", raw))?,
        None => Utc::now().timestamp_millis(),
    };

    let records = generate(&args, start);

    let mut writer: Box<dyn Write> = match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Box::new(std::io::BufWriter::new(
                std::fs::File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            ))
        }
        None => Box::new(std::io::stdout().lock()),
    };
    for record in &records {
        writeln!(writer, "{}", record)?;
    }
    writer.flush()?;

    if let Some(path) = &args.roster_out {
        std::fs::write(path, serde_json::to_string_pretty(&roster())?)
            .with_context(|| format!("Failed to write roster {}", path.display()))?;
    }

    info!("✍️  Generated {} mentions (seed {})", records.len(), args.seed);
    Ok(())
}
