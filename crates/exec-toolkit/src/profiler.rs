//! Named wall-clock timers with running averages.
//!
//! Profilers live in a process-wide registry keyed by name, so a timer can be
//! started in one place and stopped in another:
//!
//! ```
//! use exec_toolkit::profiler;
//!
//! profiler::start("doc.fetch");
//! // ... work ...
//! let elapsed = profiler::stop("doc.fetch", 1);
//! assert!(elapsed.is_some());
//! assert_eq!(profiler::stats("doc.fetch").map(|s| s.count), Some(1));
//! ```
//!
//! Every `log_interval`-th measurement of a name is logged at `INFO` as
//! `"<name>: <ms> ms."`, followed by the running average once there is more
//! than one measurement.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Default)]
struct Registry {
    profilers: HashMap<String, Profiler>,
    stats: HashMap<String, ProfilerStats>,
}

static REGISTRY: LazyLock<Mutex<Registry>> = LazyLock::new(|| Mutex::new(Registry::default()));

fn registry() -> MutexGuard<'static, Registry> {
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Accumulated measurements of one profiler name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfilerStats {
    pub count: u64,
    pub total: Duration,
}

impl ProfilerStats {
    /// Average measurement in milliseconds, rounded to one decimal.
    pub fn average_ms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let average = self.total.as_millis() as f64 / self.count as f64;
        (average * 10.0).round() / 10.0
    }
}

/// A single timer.
#[derive(Debug, Clone)]
pub struct Profiler {
    name: String,
    started_at: Instant,
    stopped_at: Option<Instant>,
}

impl Profiler {
    /// Creates and starts an unregistered timer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started_at: Instant::now(),
            stopped_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.stopped_at.is_none()
    }

    /// Time between start and stop, or since start while running.
    pub fn elapsed(&self) -> Duration {
        match self.stopped_at {
            Some(stopped_at) => stopped_at.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }

    /// Stops the timer and records the measurement under its name.
    ///
    /// With `log_interval == 0` nothing is recorded or logged.
    pub fn stop(&mut self, log_interval: u64) -> Duration {
        self.stopped_at = Some(Instant::now());
        let elapsed = self.elapsed();
        if log_interval > 0 {
            let stats = {
                let mut registry = registry();
                let stats = registry.stats.entry(self.name.clone()).or_default();
                stats.count += 1;
                stats.total += elapsed;
                *stats
            };
            if stats.count % log_interval == 0 {
                info!(profiler = %self.name, "{}", measurement_line(&self.name, elapsed, &stats));
            }
        }
        elapsed
    }
}

fn measurement_line(name: &str, elapsed: Duration, stats: &ProfilerStats) -> String {
    let mut line = format!("{}: {} ms.", name, elapsed.as_millis());
    if stats.count > 1 {
        line.push_str(&format!(
            " Average: {} ms ({} measurements).",
            stats.average_ms(),
            stats.count
        ));
    }
    line
}

/// Starts a profiler named `name`, replacing any profiler of that name.
pub fn start(name: impl Into<String>) -> Profiler {
    let profiler = Profiler::new(name);
    registry()
        .profilers
        .insert(profiler.name.clone(), profiler.clone());
    profiler
}

/// Stops the registered profiler `name` and returns its measurement.
///
/// Returns `None` (and logs an error) when no profiler of that name exists.
pub fn stop(name: &str, log_interval: u64) -> Option<Duration> {
    let Some(mut profiler) = get(name) else {
        error!("Profiler not running: {}.", name);
        return None;
    };
    let elapsed = profiler.stop(log_interval);
    if let Some(registered) = registry().profilers.get_mut(name) {
        if registered.started_at == profiler.started_at {
            registered.stopped_at = profiler.stopped_at;
        }
    }
    Some(elapsed)
}

/// Returns a snapshot of the registered profiler `name`.
pub fn get(name: &str) -> Option<Profiler> {
    registry().profilers.get(name).cloned()
}

/// Returns the accumulated measurements of `name`.
pub fn stats(name: &str) -> Option<ProfilerStats> {
    registry().stats.get(name).copied()
}

/// Clears every profiler and all accumulated measurements.
pub fn reset_all() {
    let mut registry = registry();
    registry.profilers.clear();
    registry.stats.clear();
}
