use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use eval::EvaluationReport;

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_extract_time_us: AtomicU64,
    total_embed_time_us: AtomicU64,
    total_compare_time_us: AtomicU64,
    total_request_time_us: AtomicU64,

    // Counts
    total_facts_extracted: AtomicUsize,
    total_hallucinations: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            total_extract_time_us: AtomicU64::new(0),
            total_embed_time_us: AtomicU64::new(0),
            total_compare_time_us: AtomicU64::new(0),
            total_request_time_us: AtomicU64::new(0),
            total_facts_extracted: AtomicUsize::new(0),
            total_hallucinations: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_request_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_evaluation(&self, report: &EvaluationReport) {
        let timings = &report.timings;
        self.total_extract_time_us
            .fetch_add(timings.extract_ms * 1000, Ordering::Relaxed);
        self.total_embed_time_us
            .fetch_add(timings.embed_ms * 1000, Ordering::Relaxed);
        self.total_compare_time_us
            .fetch_add(timings.compare_ms * 1000, Ordering::Relaxed);

        let counts = &report.fact_counts;
        self.total_facts_extracted
            .fetch_add(counts.source_extracted + counts.summary_extracted, Ordering::Relaxed);
        self.total_hallucinations
            .fetch_add(counts.hallucinations, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let successful = self.successful_requests.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: successful,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_extract_time_ms: avg_time_ms(&self.total_extract_time_us, successful),
            avg_embed_time_ms: avg_time_ms(&self.total_embed_time_us, successful),
            avg_compare_time_ms: avg_time_ms(&self.total_compare_time_us, successful),
            avg_request_time_ms: avg_time_ms(
                &self.total_request_time_us,
                self.total_requests.load(Ordering::Relaxed),
            ),
            total_facts_extracted: self.total_facts_extracted.load(Ordering::Relaxed),
            total_hallucinations: self.total_hallucinations.load(Ordering::Relaxed),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    if count > 0 {
        total / count as f64 / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_extract_time_ms: f64,
    pub avg_embed_time_ms: f64,
    pub avg_compare_time_ms: f64,
    pub avg_request_time_ms: f64,
    pub total_facts_extracted: usize,
    pub total_hallucinations: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
