//! Per-session read statistics
//!
//! Tracks how many records and bytes a session produced and the latency of
//! every record read.

use std::time::{Duration, Instant};

use hdrhistogram::Histogram;

/// Read statistics for one session
pub struct ReadStats {
    records: u64,
    bytes: u64,
    /// Record read latency in microseconds
    histogram: Histogram<u64>,
    start_time: Instant,
}

impl Default for ReadStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadStats {
    pub fn new() -> Self {
        Self {
            records: 0,
            bytes: 0,
            // 1us .. 1h, 3 significant digits
            histogram: Histogram::new_with_bounds(1, 3_600_000_000, 3)
                .expect("Failed to create histogram"),
            start_time: Instant::now(),
        }
    }

    /// Record one completed read
    #[inline]
    pub fn record_read(&mut self, bytes: usize, latency: Duration) {
        self.records += 1;
        self.bytes += bytes as u64;
        let latency_us = (latency.as_micros() as u64).max(1);
        self.histogram.saturating_record(latency_us);
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Latency at a percentile, in microseconds
    pub fn latency_us_at(&self, percentile: f64) -> u64 {
        if self.records == 0 {
            return 0;
        }
        self.histogram.value_at_percentile(percentile)
    }

    /// Snapshot for reporting
    pub fn snapshot(&self) -> ReadStatsSnapshot {
        let elapsed = self.elapsed().as_secs_f64();
        let throughput = if elapsed > 0.0 {
            self.records as f64 / elapsed
        } else {
            0.0
        };
        ReadStatsSnapshot {
            records: self.records,
            bytes: self.bytes,
            duration_secs: elapsed,
            records_per_sec: throughput,
            mean_latency_us: if self.records == 0 { 0.0 } else { self.histogram.mean() },
            p50_latency_us: self.latency_us_at(50.0),
            p99_latency_us: self.latency_us_at(99.0),
            max_latency_us: if self.records == 0 { 0 } else { self.histogram.max() },
        }
    }
}

/// Point-in-time copy of the statistics
#[derive(Debug, Clone)]
pub struct ReadStatsSnapshot {
    pub records: u64,
    pub bytes: u64,
    pub duration_secs: f64,
    pub records_per_sec: f64,
    pub mean_latency_us: f64,
    pub p50_latency_us: u64,
    pub p99_latency_us: u64,
    pub max_latency_us: u64,
}

impl ReadStatsSnapshot {
    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} records, {} bytes in {:.3}s ({:.1} rec/s), latency p50={}us p99={}us max={}us",
            self.records,
            self.bytes,
            self.duration_secs,
            self.records_per_sec,
            self.p50_latency_us,
            self.p99_latency_us,
            self.max_latency_us
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = ReadStats::new();
        let snap = stats.snapshot();
        assert_eq!(snap.records, 0);
        assert_eq!(snap.bytes, 0);
        assert_eq!(snap.p99_latency_us, 0);
        assert_eq!(snap.max_latency_us, 0);
    }

    #[test]
    fn test_record_reads() {
        let mut stats = ReadStats::new();
        stats.record_read(100, Duration::from_micros(10));
        stats.record_read(50, Duration::from_micros(1000));
        stats.record_read(50, Duration::ZERO);

        assert_eq!(stats.records(), 3);
        assert_eq!(stats.bytes(), 200);
        let snap = stats.snapshot();
        assert!(snap.max_latency_us >= 999);
        assert!(snap.p50_latency_us >= 9 && snap.p50_latency_us <= 11);
        assert!(snap.summary().contains("3 records, 200 bytes"));
    }
}
