use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tracing_appender::non_blocking::WorkerGuard;

#[derive(Debug, Default)]
pub struct LoggingMetrics {
    pub flush_count: AtomicU64,
    pub shutdown_in_progress: AtomicBool,
}

impl LoggingMetrics {
    pub fn record_flush(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flush_count(&self) -> u64 {
        self.flush_count.load(Ordering::Relaxed)
    }

    pub fn is_shutdown_in_progress(&self) -> bool {
        self.shutdown_in_progress.load(Ordering::Acquire)
    }

    fn start_shutdown(&self) {
        self.shutdown_in_progress.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingStats {
    pub flush_count: u64,
    pub shutdown_in_progress: bool,
    pub file_sink_active: bool,
}

/// Keeps the file sink's background writer alive.
///
/// Dropping the handle flushes pending file output; prefer
/// [`LoggingHandle::shutdown`] or [`LoggingHandle::shutdown_async`] so the
/// flush is logged and bounded.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    pub metrics: Arc<LoggingMetrics>,
    flush_timeout: Duration,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            file_guard,
            metrics: Arc::new(LoggingMetrics::default()),
            flush_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_flush_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Records a flush request. The non-blocking writer flushes on its own;
    /// a hard flush only happens when the guard is dropped.
    pub fn flush(&self) {
        self.metrics.record_flush();
        tracing::debug!(flush_count = self.metrics.flush_count(), "logging flush requested");
    }

    pub fn shutdown(mut self) {
        self.metrics.start_shutdown();
        tracing::info!(
            total_flushes = self.metrics.flush_count(),
            "logging shutdown"
        );

        let start = Instant::now();
        drop(self.file_guard.take());
        let elapsed = start.elapsed();

        if elapsed > self.flush_timeout {
            eprintln!(
                "logging shutdown took {}ms (timeout {}ms)",
                elapsed.as_millis(),
                self.flush_timeout.as_millis()
            );
        }
    }

    /// Drops the file guard on a blocking thread, waiting at most `timeout`.
    pub async fn shutdown_async(
        mut self,
        timeout: Duration,
    ) {
        self.metrics.start_shutdown();
        tracing::info!(timeout_ms = timeout.as_millis() as u64, "async logging shutdown");

        let guard = self.file_guard.take();
        match tokio::time::timeout(timeout, tokio::task::spawn_blocking(move || drop(guard))).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => eprintln!("logging shutdown task failed: {err}"),
            Err(_) => eprintln!("logging shutdown exceeded {}ms", timeout.as_millis()),
        }
    }

    pub fn stats(&self) -> LoggingStats {
        LoggingStats {
            flush_count: self.metrics.flush_count(),
            shutdown_in_progress: self.metrics.is_shutdown_in_progress(),
            file_sink_active: self.file_guard.is_some(),
        }
    }
}

impl Drop for LoggingHandle {
    fn drop(&mut self) {
        if self.file_guard.is_some() && !self.metrics.is_shutdown_in_progress() {
            eprintln!("LoggingHandle dropped without shutdown(); buffered file logs are flushed on a best-effort basis");
        }
    }
}

impl std::fmt::Debug for LoggingHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("stats", &self.stats())
            .field("flush_timeout", &self.flush_timeout)
            .finish()
    }
}
