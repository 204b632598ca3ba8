//! Health statistics for the exporter itself.
//!
//! Tracks poll cycle timing and outcomes, per-kind failure counters and HTTP
//! request rates, and renders them as the plain-text table served on
//! `/health`.

use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant, SystemTime};

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// (last, avg, max, min, count)
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Sliding window of HTTP request timestamps.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(256)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            // Keep only the last 10 minutes
            let cutoff = now.checked_sub(Duration::from_secs(600));
            while let (Some(&front), Some(cutoff)) = (guard.front(), cutoff) {
                if front >= cutoff {
                    break;
                }
                guard.pop_front();
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        let Ok(guard) = self.inner.lock() else {
            return 0;
        };
        match Instant::now().checked_sub(Duration::from_secs(60)) {
            Some(cutoff) => guard.iter().filter(|&&t| t >= cutoff).count() as u64,
            None => guard.len() as u64,
        }
    }
}

/// Exporter health statistics shared by the poller and the HTTP handlers.
pub struct HealthStats {
    // Poll cycles
    pub cycle_duration_seconds: Stat,
    pub targets_exported: Stat,
    pub total_cycles: AtomicU64,
    pub cycle_success_count: AtomicU64,
    pub cycle_failure_count: AtomicU64,
    pub publish_count: AtomicU64,

    // Error tracking
    pub token_failures: AtomicU64,
    pub token_rejections: AtomicU64,
    pub region_failures: AtomicU64,
    pub render_failures: AtomicU64,
    pub cycle_panics: AtomicU64,

    // HTTP server
    pub http_request_timestamps: RequestTimestamps,
    pub metrics_endpoint_calls: AtomicU64,

    // Timing
    pub start_time: Instant,
    pub last_success_time: StdRwLock<Option<Instant>>,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            cycle_duration_seconds: Stat::default(),
            targets_exported: Stat::default(),
            total_cycles: AtomicU64::new(0),
            cycle_success_count: AtomicU64::new(0),
            cycle_failure_count: AtomicU64::new(0),
            publish_count: AtomicU64::new(0),
            token_failures: AtomicU64::new(0),
            token_rejections: AtomicU64::new(0),
            region_failures: AtomicU64::new(0),
            render_failures: AtomicU64::new(0),
            cycle_panics: AtomicU64::new(0),
            http_request_timestamps: RequestTimestamps::default(),
            metrics_endpoint_calls: AtomicU64::new(0),
            start_time: Instant::now(),
            last_success_time: StdRwLock::new(None),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_cycle(&self, duration_seconds: f64, targets: u64, success: bool) {
        self.cycle_duration_seconds.add_sample(duration_seconds);
        self.targets_exported.add_sample(targets as f64);
        self.total_cycles.fetch_add(1, Ordering::Relaxed);
        if success {
            self.cycle_success_count.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut guard) = self.last_success_time.write() {
                *guard = Some(Instant::now());
            }
        } else {
            self.cycle_failure_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_publish(&self) {
        self.publish_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_token_failure(&self) {
        self.token_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_token_rejection(&self) {
        self.token_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_region_failure(&self) {
        self.region_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render_failure(&self) {
        self.render_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_panic(&self) {
        self.cycle_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_metrics_endpoint_call(&self) {
        self.metrics_endpoint_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_cycle_success_rate(&self) -> f64 {
        let success = self.cycle_success_count.load(Ordering::Relaxed);
        let failure = self.cycle_failure_count.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Time since the last successful cycle, if there was one.
    pub fn since_last_success(&self) -> Option<Duration> {
        self.last_success_time
            .read()
            .ok()
            .and_then(|guard| guard.map(|t| t.elapsed()))
    }

    pub fn get_last_success_time_str(&self) -> String {
        const SECS_PER_DAY: u64 = 86400;
        const SECS_PER_HOUR: u64 = 3600;
        const SECS_PER_MINUTE: u64 = 60;

        let Some(elapsed) = self.since_last_success() else {
            return "N/A".to_string();
        };
        match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
            Ok(now) => {
                let secs = now.as_secs().saturating_sub(elapsed.as_secs());
                let hours = (secs % SECS_PER_DAY) / SECS_PER_HOUR;
                let minutes = (secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
                let seconds = secs % SECS_PER_MINUTE;
                format!("{:02}:{:02}:{:02} UTC", hours, minutes, seconds)
            }
            Err(_) => "N/A".to_string(),
        }
    }

    pub fn render_table(&self) -> String {
        let (cd_cur, cd_avg, cd_max, cd_min, _) = self.cycle_duration_seconds.snapshot();
        let (te_cur, te_avg, te_max, te_min, _) = self.targets_exported.snapshot();
        let total = self.total_cycles.load(Ordering::Relaxed);
        let success_rate = self.get_cycle_success_rate();

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();
        writeln!(out).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "POLL CYCLES").ok();
        writeln!(out, "-----------").ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "cycle_duration (s)",
            format!("{:.3}", cd_cur),
            format!("{:.3}", cd_avg),
            format!("{:.3}", cd_max),
            format!("{:.3}", cd_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "targets_exported",
            format!("{:.0}", te_cur),
            format!("{:.1}", te_avg),
            format!("{:.0}", te_max),
            format!("{:.0}", te_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "{:left$} : {}", "total_cycles", total, left = left_col).ok();
        writeln!(
            out,
            "{:left$} : {:.1}",
            "cycle_success_rate (%)",
            success_rate,
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} : {}",
            "snapshots_published",
            self.publish_count.load(Ordering::Relaxed),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} : {}",
            "last_successful_cycle",
            self.get_last_success_time_str(),
            left = left_col
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "ERRORS").ok();
        writeln!(out, "------").ok();
        for (name, counter) in [
            ("token_failures", &self.token_failures),
            ("token_rejections", &self.token_rejections),
            ("region_failures", &self.region_failures),
            ("render_failures", &self.render_failures),
            ("cycle_panics", &self.cycle_panics),
        ] {
            writeln!(
                out,
                "{:left$} : {}",
                name,
                counter.load(Ordering::Relaxed),
                left = left_col
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "HTTP SERVER").ok();
        writeln!(out, "-----------").ok();
        writeln!(
            out,
            "{:left$} : {}",
            "requests_last_minute",
            self.http_request_timestamps.count_last_minute(),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} : {}",
            "metrics_endpoint_calls",
            self.metrics_endpoint_calls.load(Ordering::Relaxed),
            left = left_col
        )
        .ok();

        out
    }
}
