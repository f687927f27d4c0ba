use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::{json, Value};

/// Process wide request counters served from `/debug/vars`.
#[derive(Debug, Default)]
pub struct Metrics {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    processing_time_us: AtomicU64,
    responses_by_status: Mutex<BTreeMap<u16, u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_response(&self, status: u16, elapsed_us: u64) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.processing_time_us.fetch_add(elapsed_us, Ordering::Relaxed);

        let mut by_status = self
            .responses_by_status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *by_status.entry(status).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> Value {
        let by_status: BTreeMap<String, u64> = self
            .responses_by_status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(status, count)| (status.to_string(), *count))
            .collect();

        json!({
            "total_requests_received": self.requests_received.load(Ordering::Relaxed),
            "total_responses_sent": self.responses_sent.load(Ordering::Relaxed),
            "total_processing_time_μs": self.processing_time_us.load(Ordering::Relaxed),
            "total_responses_sent_by_status": by_status,
        })
    }
}

pub async fn track_metrics(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    metrics.requests_received.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let response = next.run(request).await;

    let elapsed = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    metrics.record_response(response.status().as_u16(), elapsed);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_counts_by_status() {
        let metrics = Metrics::new();
        metrics.requests_received.fetch_add(3, Ordering::Relaxed);
        metrics.record_response(200, 10);
        metrics.record_response(200, 5);
        metrics.record_response(429, 1);

        let snap = metrics.snapshot();
        assert_eq!(snap["total_requests_received"], 3);
        assert_eq!(snap["total_responses_sent"], 3);
        assert_eq!(snap["total_processing_time_μs"], 16);
        assert_eq!(snap["total_responses_sent_by_status"]["200"], 2);
        assert_eq!(snap["total_responses_sent_by_status"]["429"], 1);
    }
}
