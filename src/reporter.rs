// src/reporter.rs
// Progress reporter: the default consumer of batch events
//
// Runs as its own task and never touches engine state. If its output goes
// away (closed stdout in JSON mode) it asks the engine to stop.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::{BatchResult, StopHandle};
use crate::events::Subscription;

/// How progress lines are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable `tracing` lines on stderr
    #[default]
    Log,
    /// One JSON object per event on stdout
    Json,
}

/// What the reporter saw by the time its sequence ended
#[derive(Debug, Clone, Default)]
pub struct ReporterSummary {
    pub events_seen: u64,
    pub dropped: u64,
    pub last: Option<BatchResult>,
    pub disconnected: bool,
}

pub struct ProgressReporter {
    every: u64,
    format: ReportFormat,
    bounds: Option<(u64, u64)>,
    stop: Option<StopHandle>,
    output: Box<dyn AsyncWrite + Unpin + Send>,
}

impl ProgressReporter {
    pub fn new(every: u64, format: ReportFormat) -> Self {
        Self {
            every: every.max(1),
            format,
            bounds: None,
            stop: None,
            output: Box::new(tokio::io::stdout()),
        }
    }

    /// Write JSON lines to `output` instead of stdout
    pub fn with_output<W>(mut self, output: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.output = Box::new(output);
        self
    }

    /// Report percent complete for a bounded run over `[start, limit)`
    pub fn with_limit(mut self, start: u64, limit: u64) -> Self {
        self.bounds = Some((start, limit));
        self
    }

    /// Stop the engine if this reporter loses its output
    pub fn stop_on_disconnect(mut self, stop: StopHandle) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn spawn(self, subscription: Subscription) -> JoinHandle<ReporterSummary> {
        tokio::spawn(self.run(subscription))
    }

    pub async fn run(mut self, mut subscription: Subscription) -> ReporterSummary {
        let mut summary = ReporterSummary::default();

        while let Some(event) = subscription.recv().await {
            summary.events_seen += 1;
            let due = event.batch_index % self.every == 0;
            if due {
                if let Err(e) = self.emit(&event).await {
                    warn!("Progress output closed ({}), requesting stop", e);
                    if let Some(stop) = &self.stop {
                        stop.stop();
                    }
                    summary.disconnected = true;
                    summary.last = Some(event);
                    break;
                }
            }
            summary.last = Some(event);
        }

        summary.dropped = subscription.dropped();
        if summary.dropped > 0 {
            info!(
                "Progress reporter skipped {} events while behind",
                summary.dropped
            );
        }
        summary
    }

    async fn emit(&mut self, event: &BatchResult) -> std::io::Result<()> {
        match self.format {
            ReportFormat::Log => {
                info!("{}", self.render(event));
                Ok(())
            }
            ReportFormat::Json => {
                let mut line = serde_json::to_vec(event)?;
                line.push(b'\n');
                self.output.write_all(&line).await?;
                self.output.flush().await
            }
        }
    }

    /// One human-readable progress line
    pub fn render(&self, event: &BatchResult) -> String {
        let mut line = format!(
            "Batch {} {}: {} found, Total Primes Found: {}, Longest Digits: {}, {}",
            event.batch_index,
            event.range,
            event.primes_found_in_batch,
            event.total_primes,
            event.max_digit_count,
            throughput(event.range.len(), event.batch_duration),
        );
        if let Some(percent) = self.percent_complete(event) {
            line.push_str(&format!(" ({:.1}%)", percent));
        }
        line
    }

    fn percent_complete(&self, event: &BatchResult) -> Option<f64> {
        let (start, limit) = self.bounds?;
        if limit <= start {
            return Some(100.0);
        }
        let done = event.range.high.saturating_sub(start) as f64;
        Some((done / (limit - start) as f64 * 100.0).min(100.0))
    }
}

fn throughput(numbers: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return format!("{} numbers", numbers);
    }
    format!("{:.2}M numbers/s", numbers as f64 / secs / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Range;
    use crate::events::EventChannel;

    fn event(batch_index: u64, low: u64, high: u64) -> BatchResult {
        BatchResult {
            batch_index,
            range: Range { low, high },
            primes_found_in_batch: 10,
            total_primes: batch_index * 10,
            max_digit_count: 3,
            batch_duration: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_render_contains_totals() {
        let reporter = ProgressReporter::new(1, ReportFormat::Log);
        let line = reporter.render(&event(2, 100, 200));
        assert!(line.contains("Batch 2"));
        assert!(line.contains("[100, 200)"));
        assert!(line.contains("Total Primes Found: 20"));
        assert!(line.contains("Longest Digits: 3"));
        assert!(!line.contains('%'));
    }

    #[test]
    fn test_render_percent_for_bounded_runs() {
        let reporter = ProgressReporter::new(1, ReportFormat::Log).with_limit(2, 202);
        assert!(reporter.render(&event(1, 2, 102)).contains("(50.0%)"));
        assert!(reporter.render(&event(2, 102, 202)).contains("(100.0%)"));
    }

    #[test]
    fn test_throughput_zero_duration() {
        assert_eq!(throughput(5, Duration::ZERO), "5 numbers");
        assert_eq!(throughput(2_000_000, Duration::from_secs(1)), "2.00M numbers/s");
    }

    #[tokio::test]
    async fn test_run_counts_events_until_close() {
        let channel = EventChannel::new(16);
        let reporter = ProgressReporter::new(2, ReportFormat::Log);
        let handle = reporter.spawn(channel.subscribe());

        for i in 1..=5 {
            channel.publish(event(i, i * 100, i * 100 + 100));
        }
        channel.close();

        let summary = handle.await.unwrap();
        assert_eq!(summary.events_seen, 5);
        assert_eq!(summary.dropped, 0);
        assert!(!summary.disconnected);
        assert_eq!(summary.last.map(|e| e.batch_index), Some(5));
    }

    #[tokio::test]
    async fn test_json_lines_written_to_output() {
        let (writer, mut reader) = tokio::io::duplex(4096);
        let channel = EventChannel::new(16);
        let reporter = ProgressReporter::new(1, ReportFormat::Json).with_output(writer);
        let handle = reporter.spawn(channel.subscribe());

        channel.publish(event(1, 2, 102));
        channel.publish(event(2, 102, 202));
        channel.close();

        let summary = handle.await.unwrap();
        assert_eq!(summary.events_seen, 2);
        assert!(!summary.disconnected);

        let mut written = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut reader, &mut written)
            .await
            .unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["batch_index"], 2);
        assert_eq!(lines[1]["range"]["high"], 202);
    }

    #[tokio::test]
    async fn test_closed_output_requests_stop() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = crate::store::PrimeStore::open(dir.path().join("primes.txt")).unwrap();
        let channel = EventChannel::new(16);
        let engine = crate::engine::BatchEngine::new(store, channel.clone(), 100, None).unwrap();
        let stop = engine.stop_handle();

        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let reporter = ProgressReporter::new(1, ReportFormat::Json)
            .with_output(writer)
            .stop_on_disconnect(stop.clone());
        let handle = reporter.spawn(channel.subscribe());

        channel.publish(event(1, 2, 102));

        let summary = handle.await.unwrap();
        assert!(summary.disconnected);
        assert_eq!(summary.events_seen, 1);
        assert!(stop.is_stopped());
    }
}
