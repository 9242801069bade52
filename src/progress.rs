//! Phase progress for the analysis run.
//!
//! Each pipeline phase gets a `PhaseProgress`: a bar for the per-song pass,
//! a spinner for the corpus pass. In log-only mode nothing is drawn and the
//! phase reports through `tracing` instead, which keeps piped output
//! readable.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Songs between two `[PHASE] n/total` lines in log-only mode.
const LOG_EVERY: u64 = 1000;

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// `2.5s` under a minute, `1.5m` above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Progress of one named phase. Safe to share across rayon workers.
pub struct PhaseProgress {
    phase: &'static str,
    bar: ProgressBar,
    total: Option<u64>,
    done: AtomicU64,
    started: Instant,
}

impl PhaseProgress {
    /// Counted phase over `total` songs.
    pub fn counted(phase: &'static str, total: u64, message: &str) -> Self {
        let bar = ProgressBar::new(total);
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Self::start(phase, bar, Some(total), message)
    }

    /// Phase without a meaningful item count.
    pub fn indeterminate(phase: &'static str, message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            if let Ok(style) = ProgressStyle::default_spinner().template("{msg} {spinner} [{elapsed_precise}]") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        Self::start(phase, bar, None, message)
    }

    fn start(phase: &'static str, bar: ProgressBar, total: Option<u64>, message: &str) -> Self {
        bar.set_message(message.to_string());
        if is_log_only() {
            tracing::info!("[{}] {}", phase, message);
        }
        Self {
            phase,
            bar,
            total,
            done: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Record one finished item.
    pub fn inc(&self) {
        self.bar.inc(1);
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if let (true, Some(total)) = (is_log_only(), self.total) {
            if should_log(done, total) {
                let pct = 100.0 * done as f64 / total as f64;
                tracing::info!("[{}] {}/{} ({:.1}%)", self.phase, done, total, pct);
            }
        }
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    /// Close the phase; the message gets the elapsed time appended.
    pub fn finish(&self, message: &str) {
        let message = format!("{} in {}", message, format_duration(self.started.elapsed()));
        if is_log_only() {
            tracing::info!("[{}] {}", self.phase, message);
        }
        self.bar.finish_with_message(message);
    }
}

/// Whether the `done`-th item of `total` gets a log line.
fn should_log(done: u64, total: u64) -> bool {
    total > 0 && (done % LOG_EVERY == 0 || done == total)
}
