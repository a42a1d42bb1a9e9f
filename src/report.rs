//! Throughput result types and formatting.

use std::time::Duration;

/// Outcome of one download stream.
#[derive(Debug, Clone)]
pub struct StreamReport {
    pub index: usize,
    pub bytes: u64,
    pub elapsed: Duration,
    /// Set when the copy ended with an error instead of EOF.
    pub error: Option<String>,
}

/// Aggregate of a client run.
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub streams: Vec<StreamReport>,
    /// Sum of all stream byte counts.
    pub total_bytes: u64,
    /// Wall-clock time from the first copy starting to the last one ending.
    pub elapsed: Duration,
}

impl TransferReport {
    /// Megabits per second over the wall-clock duration.
    pub fn throughput_mbps(&self) -> f64 {
        mbps(self.total_bytes, self.elapsed)
    }

    /// Streams that ended with an error.
    pub fn failed_streams(&self) -> usize {
        self.streams.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Bytes over a duration in megabits per second; zero for a zero duration.
pub fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / secs / 1_000_000.0
}

/// Render a rate, switching to Gbps at 1000 Mbps.
pub fn format_rate(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.2} Gbps", mbps / 1000.0)
    } else {
        format!("{:.1} Mbps", mbps)
    }
}

/// Human-readable one-line summary of a client run.
pub fn format_summary(report: &TransferReport) -> String {
    let n = report.streams.len();
    let mut summary = format!(
        "Received {} bytes in {:?} ({}, {} stream{})",
        report.total_bytes,
        report.elapsed,
        format_rate(report.throughput_mbps()),
        n,
        if n == 1 { "" } else { "s" },
    );

    let failed = report.failed_streams();
    if failed > 0 {
        summary.push_str(&format!(", {failed} failed"));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(index: usize, bytes: u64, error: Option<&str>) -> StreamReport {
        StreamReport {
            index,
            bytes,
            elapsed: Duration::from_secs(1),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_mbps() {
        assert_eq!(mbps(125_000_000, Duration::from_secs(1)), 1000.0);
        assert_eq!(mbps(1_000_000, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_format_summary_gbps() {
        let report = TransferReport {
            streams: vec![stream(0, 600_000_000, None), stream(1, 577_000_000, None)],
            total_bytes: 1_177_000_000,
            elapsed: Duration::from_secs(1),
        };
        let summary = format_summary(&report);
        assert!(summary.contains("9.42 Gbps"), "{summary}");
        assert!(summary.contains("2 streams"), "{summary}");
        assert!(!summary.contains("failed"), "{summary}");
    }

    #[test]
    fn test_format_summary_mbps_single_stream() {
        let report = TransferReport {
            streams: vec![stream(0, 30_662_500, None)],
            total_bytes: 30_662_500,
            elapsed: Duration::from_secs(1),
        };
        let summary = format_summary(&report);
        assert!(summary.starts_with("Received 30662500 bytes in 1s"), "{summary}");
        assert!(summary.contains("245.3 Mbps"), "{summary}");
        assert!(summary.contains("1 stream)"), "{summary}");
    }

    #[test]
    fn test_format_summary_reports_failures() {
        let report = TransferReport {
            streams: vec![stream(0, 10, None), stream(1, 4, Some("reset"))],
            total_bytes: 14,
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(report.failed_streams(), 1);
        assert!(format_summary(&report).ends_with(", 1 failed"));
    }
}
