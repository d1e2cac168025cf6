//! Relay statistics with Prometheus text exposition.
//!
//! Counters are relaxed atomics bumped by the producer and consumer threads
//! and read by whoever renders them. The buffers themselves never touch these:
//! the relay loops translate what `commit` / `update` report into counts.
//!
//! The age histogram uses logarithmic 1-2-5 buckets from 10 µs to 100 ms,
//! covering everything from a tight poll loop to a slow audio period.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Prometheus histogram
// ---------------------------------------------------------------------------

const NUM_BUCKETS: usize = 13;

/// Upper bounds in nanoseconds + Prometheus `le` label strings.
const BUCKETS: [(u64, &str); NUM_BUCKETS] = [
    (10_000, "0.00001"),      // 10μs
    (20_000, "0.00002"),      // 20μs
    (50_000, "0.00005"),      // 50μs
    (100_000, "0.0001"),      // 100μs
    (200_000, "0.0002"),      // 200μs
    (500_000, "0.0005"),      // 500μs
    (1_000_000, "0.001"),     // 1ms
    (2_000_000, "0.002"),     // 2ms
    (5_000_000, "0.005"),     // 5ms
    (10_000_000, "0.01"),     // 10ms
    (20_000_000, "0.02"),     // 20ms
    (50_000_000, "0.05"),     // 50ms
    (100_000_000, "0.1"),     // 100ms
];

pub struct PromHistogram {
    /// Cumulative bucket counters. Index i counts observations <= BUCKETS[i].
    buckets: [AtomicU64; NUM_BUCKETS],
    sum_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for PromHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl PromHistogram {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a duration observation. Increments all cumulative buckets
    /// whose upper bound >= the observed value.
    pub fn record(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        if let Some(first) = BUCKETS.iter().position(|&(bound_ns, _)| nanos <= bound_ns) {
            for bucket in &self.buckets[first..] {
                bucket.fetch_add(1, Relaxed);
            }
        }

        self.sum_ns.fetch_add(nanos, Relaxed);
        self.count.fetch_add(1, Relaxed);
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Relaxed)
    }

    /// Mean of all observations, zero when empty.
    #[must_use]
    pub fn mean(&self) -> Duration {
        match self.count.load(Relaxed) {
            0 => Duration::ZERO,
            n => Duration::from_nanos(self.sum_ns.load(Relaxed) / n),
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        for (i, &(_, le)) in BUCKETS.iter().enumerate() {
            let count = self.buckets[i].load(Relaxed);
            let _ = writeln!(out, "{name}_bucket{{le=\"{le}\"}} {count}");
        }
        let total = self.count.load(Relaxed);
        let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {total}");

        #[allow(clippy::cast_precision_loss)] // Display only.
        let sum_secs = self.sum_ns.load(Relaxed) as f64 / 1_000_000_000.0;
        let _ = writeln!(out, "{name}_sum {sum_secs}");
        let _ = writeln!(out, "{name}_count {total}");
    }
}

/// Whole microseconds in `duration`, saturating at `u64::MAX`.
#[must_use]
pub fn saturating_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Relay counters
// ---------------------------------------------------------------------------

/// Counters shared by the relay's producer and consumer threads.
#[derive(Default)]
pub struct RelayStats {
    /// Producer commits.
    pub commits: AtomicU64,
    /// Commits that replaced a payload the consumer never claimed.
    pub overwrites: AtomicU64,
    /// Consumer polls.
    pub reads: AtomicU64,
    /// Polls that claimed a newer payload.
    pub claims: AtomicU64,
    /// Polls that found nothing new and returned the held payload again.
    pub stale_reads: AtomicU64,
    /// Commits never observed by the consumer, derived from version gaps.
    pub skipped: AtomicU64,
    /// Payloads that failed their consistency check. Must stay zero.
    pub torn: AtomicU64,
    /// Time from commit to the consumer's first observation of the payload.
    pub age: PromHistogram,
}

/// Plain copy of the counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub commits: u64,
    pub overwrites: u64,
    pub reads: u64,
    pub claims: u64,
    pub stale_reads: u64,
    pub skipped: u64,
    pub torn: u64,
}

impl RelayStats {
    /// Account for one consumer observation.
    ///
    /// `claimed` is what `update` returned; `gap` is the version delta between
    /// this payload and the previously observed one.
    pub fn record_read(&self, claimed: bool, gap: u64) {
        self.reads.fetch_add(1, Relaxed);
        if claimed {
            self.claims.fetch_add(1, Relaxed);
            self.skipped.fetch_add(gap.saturating_sub(1), Relaxed);
        } else {
            self.stale_reads.fetch_add(1, Relaxed);
        }
    }

    /// Account for one producer commit.
    pub fn record_commit(&self, overwrote: bool) {
        self.commits.fetch_add(1, Relaxed);
        if overwrote {
            self.overwrites.fetch_add(1, Relaxed);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            commits: self.commits.load(Relaxed),
            overwrites: self.overwrites.load(Relaxed),
            reads: self.reads.load(Relaxed),
            claims: self.claims.load(Relaxed),
            stale_reads: self.stale_reads.load(Relaxed),
            skipped: self.skipped.load(Relaxed),
            torn: self.torn.load(Relaxed),
        }
    }

    /// Render all counters in Prometheus text exposition format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::with_capacity(2048);

        let counters = [
            ("relay_commits_total", "Producer commits", s.commits),
            (
                "relay_overwrites_total",
                "Commits that discarded an unclaimed payload",
                s.overwrites,
            ),
            ("relay_reads_total", "Consumer polls", s.reads),
            (
                "relay_claims_total",
                "Polls that claimed a newer payload",
                s.claims,
            ),
            (
                "relay_stale_reads_total",
                "Polls that returned the held payload again",
                s.stale_reads,
            ),
            (
                "relay_skipped_total",
                "Commits never observed by the consumer",
                s.skipped,
            ),
            (
                "relay_torn_total",
                "Payloads that failed the consistency check",
                s.torn,
            ),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }

        let _ = writeln!(
            out,
            "# HELP relay_payload_age_seconds Commit to first observation latency"
        );
        let _ = writeln!(out, "# TYPE relay_payload_age_seconds histogram");
        self.age.render("relay_payload_age_seconds", &mut out);

        out
    }
}
