//! Logging Module
//!
//! Structured logging utilities built on the `tracing` crate, plus a
//! progress logger for long-running dataset scans.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging for the CLI
///
/// # Arguments
/// * `verbose` - Enable debug-level output with module targets
pub fn init_logging(verbose: bool) -> Result<(), String> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(verbose)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Progress logger for long-running operations
///
/// Emits a log line every `log_interval` items and a summary on `finish`.
pub struct ProgressLogger {
    operation: String,
    total: usize,
    current: usize,
    log_interval: usize,
    start_time: std::time::Instant,
}

impl ProgressLogger {
    /// Create a new progress logger that reports roughly ten times per run
    pub fn new(operation: &str, total: usize) -> Self {
        Self {
            operation: operation.to_string(),
            total,
            current: 0,
            log_interval: (total / 10).max(1),
            start_time: std::time::Instant::now(),
        }
    }

    /// Override the reporting interval
    pub fn with_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval.max(1);
        self
    }

    /// Update progress to an absolute count
    pub fn update(&mut self, count: usize) {
        self.current = count;

        if self.current % self.log_interval == 0 || self.current == self.total {
            let percentage = 100.0 * self.current as f64 / self.total.max(1) as f64;
            tracing::info!(
                "{}: {}/{} ({:.1}%)",
                self.operation,
                self.current,
                self.total,
                percentage
            );
        }
    }

    /// Increment progress by one item
    pub fn increment(&mut self) {
        self.update(self.current + 1);
    }

    /// Log completion with throughput
    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed();
        let items_per_sec = self.total as f64 / elapsed.as_secs_f64().max(1e-9);

        tracing::info!(
            "{}: completed {} items in {:.2}s ({:.1} items/s)",
            self.operation,
            self.total,
            elapsed.as_secs_f64(),
            items_per_sec
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_logger_tracks_count() {
        let mut logger = ProgressLogger::new("Scan", 100);
        logger.update(50);
        assert_eq!(logger.current, 50);
        logger.increment();
        assert_eq!(logger.current, 51);
    }

    #[test]
    fn test_progress_logger_interval_floor() {
        let logger = ProgressLogger::new("Scan", 3).with_interval(0);
        assert_eq!(logger.log_interval, 1);
    }
}
