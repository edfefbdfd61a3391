// src/main.rs

//! `persistmon <exe> [wait-seconds]`
//!
//! 1. Load `persistmon.toml` next to the executable & set up logging
//! 2. Start the kernel file monitor (degraded mode if it cannot start)
//! 3. Launch the target and wait
//! 4. Stop the monitor, print bucket counts, optionally write JSON

// ───── std / 3rd-party imports ──────────────────────────────────────────────
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::Dispatch;
use std::{
    fs,
    path::{Path, PathBuf},
    process::{self, Command, Stdio},
    thread,
    time::Duration,
};

// ───── local imports ────────────────────────────────────────────────────────
use agent::config::{self, Config};
use agent::summary::FileRisk;
use agent::FileMonitor;

// ───── helpers ──────────────────────────────────────────────────────────────

/// Print an error with context and terminate the process.
macro_rules! fatal {
    ($ctx:expr, $($arg:tt)+) => {{
        eprintln!(
            "[{}][ERROR][{}] {}",
            chrono::Local::now().to_rfc3339(),
            $ctx,
            format!($($arg)+)
        );
        std::process::exit(1);
    }};
}

/// Directory that contains the running executable.
fn exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot determine exe path")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("executable must live in some directory")
}

/// Configure global logging as requested in `cfg.logging`.
fn setup_logging(exe_dir: &Path, cfg: &Config) -> Result<()> {
    let level = cfg.logging.level_filter()?;

    let log_path = cfg
        .logging
        .enable
        .then(|| exe_dir.join(cfg.logging.file_name()));

    let mut dispatch = Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!(
                "[{}][{:5}][{}][pid={}][tid={:?}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                process::id(),
                thread::current().id(),
                msg
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(path) = log_path {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

struct Args {
    target: PathBuf,
    wait: Option<Duration>,
}

fn parse_args() -> Result<Args> {
    let mut argv = std::env::args().skip(1);
    let Some(target) = argv.next() else {
        bail!("usage: persistmon <exe> [wait-seconds]");
    };
    let wait = argv
        .next()
        .map(|s| s.parse::<u64>().with_context(|| format!("invalid wait-seconds '{s}'")))
        .transpose()?
        .map(Duration::from_secs);
    let target = PathBuf::from(target);
    if !target.exists() {
        bail!("file does not exist: {}", target.display());
    }
    Ok(Args { target, wait })
}

// ───── run ──────────────────────────────────────────────────────────────────

fn run(args: Args, cfg: Config) -> Result<()> {
    let wait = args.wait.unwrap_or(cfg.run.wait);
    log::info!("Target {} (wait {})", args.target.display(), humantime::format_duration(wait));

    // 1 ─ Monitor
    let mut monitor = FileMonitor::new(&cfg.monitor);
    let capturing = monitor.start();
    if !capturing {
        log::warn!("File capture unavailable (administrator rights required); continuing without it");
    }

    // 2 ─ Target
    let child = Command::new(&args.target)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let child = match child {
        Ok(child) => child,
        Err(e) => {
            monitor.stop();
            return Err(e).with_context(|| format!("cannot launch {}", args.target.display()));
        }
    };
    log::info!("Target running (pid {})", child.id());

    // 3 ─ Wait, then stop capture
    thread::sleep(wait);
    monitor.stop();

    let stats = monitor.stats();
    let summary = monitor.summarize_changes();
    log::info!(
        "Captured {} file events ({} records seen, {} dropped)",
        stats.accepted,
        stats.seen,
        stats.dropped
    );

    // 4 ─ Report
    println!("created:  {}", summary.created.len());
    println!("deleted:  {}", summary.deleted.len());
    println!("modified: {}", summary.modified.len());
    println!("renamed:  {}", summary.renamed.len());
    for path in summary.risky_paths(FileRisk::High) {
        println!("high-risk: {path}");
    }

    if let Some(out) = &cfg.run.output {
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(out, json).with_context(|| format!("cannot write {}", out.display()))?;
        log::info!("Summary written to {}", out.display());
    }
    Ok(())
}

fn main() {
    let args = parse_args().unwrap_or_else(|e| fatal!("args", "{:#}", e));
    let exe_dir = exe_dir().unwrap_or_else(|e| fatal!("main", "{:#}", e));
    let cfg = config::load(&exe_dir.join("persistmon.toml"))
        .unwrap_or_else(|e| fatal!("config", "{}", e));

    setup_logging(&exe_dir, &cfg).unwrap_or_else(|e| fatal!("logging", "{:#}", e));

    if let Err(e) = run(args, cfg) {
        fatal!("main", "{:#}", e);
    }
}
