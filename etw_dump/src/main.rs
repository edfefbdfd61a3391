//! Build with `cargo run --release --bin etw_dump -- [seconds]` and run **as Admin**.
//! Captures Kernel-File events for N seconds (default 10), printing every
//! accepted event as it lands, then the per-path bucket counts.

use agent::{FileMonitor, config::MonitorConfig};
use chrono::Local;
use log::LevelFilter;
use std::{
    thread,
    time::{Duration, Instant},
};

const POLL: Duration = Duration::from_millis(250);

fn main() {
    /*── args & console logging ─────────────────*/
    let secs = std::env::args()
        .nth(1)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10);

    let _ = fern::Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!(
                "[{}][{:5}][{}] {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                msg
            ))
        })
        .level(LevelFilter::Info)
        .chain(std::io::stderr())
        .apply();

    /*── start session ──────────────────────────*/
    let mut monitor = FileMonitor::new(&MonitorConfig {
        session_name: format!("{}Dump", shared::DEFAULT_SESSION_NAME),
        ..MonitorConfig::default()
    });
    if !monitor.start() {
        eprintln!("❌ session start failed (run as Admin, on Windows)");
        return;
    }
    println!("✅ Capturing for {secs}s…");

    /*── tail the log ───────────────────────────*/
    let deadline = Instant::now() + Duration::from_secs(secs);
    let mut printed = 0usize;
    while Instant::now() < deadline {
        thread::sleep(POLL);
        let events = monitor.snapshot_events();
        for e in events.iter().skip(printed) {
            println!(
                "{:<12} {:6} {:<24} {}",
                e.kind.as_str(),
                e.process_id,
                e.process_name,
                e.path
            );
        }
        printed = events.len();
    }

    /*── stop & summarize ───────────────────────*/
    monitor.stop();
    let stats = monitor.stats();
    let summary = monitor.summarize_changes();
    println!(
        "\nseen {} / accepted {} / dropped {}",
        stats.seen, stats.accepted, stats.dropped
    );
    println!(
        "created {}  deleted {}  modified {}  renamed {}",
        summary.created.len(),
        summary.deleted.len(),
        summary.modified.len(),
        summary.renamed.len()
    );
}
