//! syncview CLI entry point.
//!
//! Renders live/target manifest diffs the way the console does and replays
//! captured application event streams.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};

use syncview::application::apps::{ApplicationCollection, reduce};
use syncview::domain::ResourceDiff;
use syncview::infra::app_config::load_config;
use syncview::infra::diff::queue::DiffQueue;
use syncview::infra::host::ManualHost;
use syncview::infra::stream::sse::{SseDecoder, decode_watch_event};

#[derive(Parser, Debug)]
#[command(name = "syncview")]
#[command(version)]
#[command(about = "Live manifest diffs and application watch streams", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the unified diff between a live and a target manifest
    Diff {
        /// Live manifest (JSON or YAML)
        live: PathBuf,
        /// Target manifest (JSON or YAML)
        target: PathBuf,
        /// Show the whole manifest instead of compact hunks
        #[arg(long)]
        full: bool,
        /// Keep metadata.managedFields in the output
        #[arg(long)]
        keep_managed_fields: bool,
    },

    /// Replay a captured application event stream and print the result
    Replay {
        /// File holding the raw text/event-stream body
        capture: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    match args.command {
        Commands::Diff {
            live,
            target,
            full,
            keep_managed_fields,
        } => run_diff(&live, &target, full, keep_managed_fields),
        Commands::Replay { capture } => run_replay(&capture),
    }
}

fn read_manifest(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(_) => serde_yaml::from_str(&text)
            .with_context(|| format!("{} is neither JSON nor YAML", path.display())),
    }
}

fn meta<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

fn run_diff(live: &Path, target: &Path, full: bool, keep_managed_fields: bool) -> Result<()> {
    let config = load_config();
    let live = read_manifest(live)?;
    let target = read_manifest(target)?;

    let identity = if target.is_null() { &live } else { &target };
    let group = meta(identity, "/apiVersion")
        .rsplit_once('/')
        .map(|(group, _)| group)
        .unwrap_or_default();
    let resource = ResourceDiff {
        group: group.to_string(),
        kind: meta(identity, "/kind").to_string(),
        namespace: meta(identity, "/metadata/namespace").to_string(),
        name: meta(identity, "/metadata/name").to_string(),
        live_state: Some(live),
        target_state: Some(target),
        ..Default::default()
    };

    let mut normalize = config.diff.normalize_options();
    if keep_managed_fields {
        normalize.hide_managed_fields = false;
    }
    let mut view_options = config.diff.view_options();
    if full {
        view_options.compact_diff = false;
    }
    let mut job = resource.to_job(normalize, view_options)?;
    if job.id.is_empty() {
        job.id = "manifest".to_string();
        job.name = job.id.clone();
    }

    let host = ManualHost::new();
    let queue = DiffQueue::new(host.clone(), config.diff.queue_config());
    let handle = queue.enqueue(job);
    queue.enable();
    host.run_until_idle();

    let text = handle
        .try_result()
        .ok_or_else(|| anyhow!("diff did not complete"))??;
    print!("{text}");
    Ok(())
}

fn run_replay(capture: &Path) -> Result<()> {
    let bytes = std::fs::read(capture)
        .with_context(|| format!("Failed to read {}", capture.display()))?;

    let mut decoder = SseDecoder::new();
    let mut apps = ApplicationCollection::new();
    let mut frames = 0usize;
    let mut changed = 0usize;
    for frame in decoder.push(&bytes) {
        frames += 1;
        if let Some(event) = decode_watch_event(&frame.data)
            && reduce(&mut apps, event).changed()
        {
            changed += 1;
        }
    }

    println!("{frames} frames, {changed} changes, {} applications", apps.len());
    for app in apps.sorted() {
        println!(
            "{:<40} {:<12} {:<12} {}",
            app.key(),
            app.sync_status(),
            app.health_status(),
            app.project()
        );
    }
    let summary = apps.summary();
    for (status, count) in &summary.by_sync {
        println!("sync {status}: {count}");
    }
    for (status, count) in &summary.by_health {
        println!("health {status}: {count}");
    }
    Ok(())
}
