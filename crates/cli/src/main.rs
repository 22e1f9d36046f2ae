//! `streakproj`: fold event batches into projection states offline.
//!
//! # Usage
//!
//! ```text
//! streakproj apply --events batch.jsonl --state state.json --timezone Asia/Seoul
//! streakproj day-key --at 2024-01-01T23:00:00Z --timezone America/New_York
//! ```
//!
//! Environment (`STREAKPROJ_*`) provides defaults; flags override it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::debug;

use streakproj_events::Event;
use streakproj_infra::ProjectorConfig;
use streakproj_observability::LogFormat;
use streakproj_projector::{
    ProjectionState, Projector, QualifyingPolicy, Tz, day_key, parse_timezone,
};

#[derive(Parser, Debug)]
#[command(name = "streakproj", about = "Idempotent contribution projection tool")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fold a batch of events into a stored state and print the result.
    Apply {
        /// Events as a JSON array or one JSON object per line.
        #[arg(long, value_name = "FILE")]
        events: PathBuf,

        /// Current state (StreamProjectionPhase1 JSON). Omit for a new subject.
        #[arg(long, value_name = "FILE")]
        state: Option<PathBuf>,

        /// Subject timezone (IANA name).
        #[arg(long, env = "STREAKPROJ_SUBJECT_TIMEZONE")]
        timezone: Option<String>,

        /// Event types that count as contributions (repeatable).
        #[arg(long = "qualifying", value_name = "TYPE")]
        qualifying: Vec<String>,

        /// Write the new state here instead of stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the day-key of a timestamp in a timezone.
    DayKey {
        /// RFC 3339 timestamp.
        #[arg(long)]
        at: String,

        #[arg(long)]
        timezone: String,
    },
}

fn main() -> Result<()> {
    streakproj_observability::tracing::init(LogFormat::Pretty);
    let args = Args::parse();

    match args.command {
        Command::Apply {
            events,
            state,
            timezone,
            qualifying,
            output,
        } => {
            let config = ProjectorConfig::from_env().context("loading configuration")?;

            let policy = if qualifying.is_empty() {
                config.qualifying_policy()
            } else {
                QualifyingPolicy::new(qualifying)
            };
            let tz = resolve_timezone(timezone.as_deref(), config.default_timezone)?;
            let projector = Projector::new(policy);

            let current = match &state {
                Some(path) => read_state(path)?,
                None => projector.zero_state(),
            };
            let batch = read_events(&events)?;
            debug!(events = batch.len(), applied_seq = current.applied_seq, "folding batch");

            let next = projector
                .apply(&current, &batch, tz)
                .context("folding event batch")?;
            let rendered = serde_json::to_string_pretty(&next)?;

            match output {
                Some(path) => std::fs::write(&path, rendered + "\n")
                    .with_context(|| format!("writing state to {}", path.display()))?,
                None => println!("{rendered}"),
            }
        }
        Command::DayKey { at, timezone } => {
            let at: DateTime<Utc> = DateTime::parse_from_rfc3339(&at)
                .with_context(|| format!("parsing timestamp '{at}'"))?
                .with_timezone(&Utc);
            let tz = parse_timezone(&timezone)?;
            println!("{}", day_key(at, tz));
        }
    }

    Ok(())
}

fn resolve_timezone(flag: Option<&str>, default: Option<Tz>) -> Result<Option<Tz>> {
    match flag {
        Some(name) => Ok(Some(parse_timezone(name)?)),
        None => Ok(default),
    }
}

fn read_state(path: &Path) -> Result<ProjectionState> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading state file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing state file {}", path.display()))
}

fn read_events(path: &Path) -> Result<Vec<Event>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading events file {}", path.display()))?;
    parse_events(&raw).with_context(|| format!("parsing events file {}", path.display()))
}

/// Accepts a JSON array or JSON lines.
fn parse_events(raw: &str) -> Result<Vec<Event>> {
    if raw.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(raw)?);
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", n + 1))
        })
        .collect()
}
