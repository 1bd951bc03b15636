//! Concurrent recording through the shared collector

use std::sync::Arc;

use request_observatory::{MetricsCollector, RequestOutcome};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tasks_lose_no_counts() {
    let collector = Arc::new(MetricsCollector::new(50).unwrap());

    let tasks: Vec<_> = (0..8)
        .map(|task| {
            let collector = collector.clone();
            tokio::spawn(async move {
                for i in 0..250 {
                    let mut outcome =
                        RequestOutcome::new(format!("/t/{task}"), "GET", 200, i as f64);
                    if i % 10 == 0 {
                        outcome = outcome.failed_with("Timeout");
                    }
                    collector.record(outcome);
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.total_requests, 2000);
    assert_eq!(snapshot.total_errors, 200);
    assert_eq!(snapshot.error_types.get("Timeout"), Some(&200));
    assert_eq!(snapshot.recent_request_count, 50);
    assert_eq!(snapshot.lifetime_latency.count, 2000);
}
