//! Tick timing telemetry.
//!
//! Intervals are folded into a running window (count, sum, max, overruns)
//! and also kept in a small fixed history for the percentile. Nothing here
//! allocates, so it runs on the tick thread.

use std::fmt;
use std::time::Duration;

/// Recent intervals kept for the percentile.
const HISTORY_LEN: usize = 256;

/// Timing of the ticks seen since the previous report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickSummary {
    pub ticks: u64,
    pub mean: Duration,
    pub max: Duration,
    /// 95th percentile over the most recent intervals, at most `HISTORY_LEN`.
    pub p95: Duration,
    pub overruns: u64,
    pub total_overruns: u64,
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ticks, mean {}us, p95 {}us, max {}us, {} overruns ({} total)",
            self.ticks,
            self.mean.as_micros(),
            self.p95.as_micros(),
            self.max.as_micros(),
            self.overruns,
            self.total_overruns
        )
    }
}

pub struct TickTelemetry {
    history_us: [u32; HISTORY_LEN],
    /// Next slot to overwrite.
    cursor: usize,
    /// Valid entries in `history_us`.
    filled: usize,

    window_ticks: u64,
    window_sum: Duration,
    window_max: Duration,
    window_overruns: u64,

    total_overruns: u64,
}

impl Default for TickTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TickTelemetry {
    pub fn new() -> Self {
        Self {
            history_us: [0; HISTORY_LEN],
            cursor: 0,
            filled: 0,
            window_ticks: 0,
            window_sum: Duration::ZERO,
            window_max: Duration::ZERO,
            window_overruns: 0,
            total_overruns: 0,
        }
    }

    /// Record one measured interval. Returns true if it exceeded `threshold`.
    pub fn record(&mut self, interval: Duration, threshold: Duration) -> bool {
        self.history_us[self.cursor] = u32::try_from(interval.as_micros()).unwrap_or(u32::MAX);
        self.cursor = (self.cursor + 1) % HISTORY_LEN;
        self.filled = (self.filled + 1).min(HISTORY_LEN);

        self.window_ticks += 1;
        self.window_sum = self.window_sum.saturating_add(interval);
        self.window_max = self.window_max.max(interval);

        let overrun = interval > threshold;
        if overrun {
            self.window_overruns += 1;
            self.total_overruns += 1;
        }
        overrun
    }

    pub fn overrun_count(&self) -> u64 {
        self.total_overruns
    }

    /// Report the current window and start a new one. The percentile
    /// history carries over.
    pub fn take_summary(&mut self) -> TickSummary {
        let summary = TickSummary {
            ticks: self.window_ticks,
            mean: mean(self.window_sum, self.window_ticks),
            max: self.window_max,
            p95: Duration::from_micros(self.percentile(95) as u64),
            overruns: self.window_overruns,
            total_overruns: self.total_overruns,
        };

        self.window_ticks = 0;
        self.window_sum = Duration::ZERO;
        self.window_max = Duration::ZERO;
        self.window_overruns = 0;

        summary
    }

    /// Nearest-rank percentile over the history; 0 when empty.
    fn percentile(&self, pct: usize) -> u32 {
        if self.filled == 0 {
            return 0;
        }
        let mut scratch = self.history_us;
        let samples = &mut scratch[..self.filled];
        let rank = (pct * samples.len()).div_ceil(100).clamp(1, samples.len());
        *samples.select_nth_unstable(rank - 1).1
    }
}

fn mean(sum: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(n) => sum / n,
        Err(_) => Duration::from_secs_f64(sum.as_secs_f64() / count as f64),
    }
}
