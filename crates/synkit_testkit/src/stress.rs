//! Stress tests for the sync engine.
//!
//! These drive many requests, sequentially and from several threads, and
//! report throughput together with how many requests the engine rejected.

use crate::fixtures::{book_key, payload, wire};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use synkit_codec::Key;
use synkit_storage::EntityStore;
use synkit_sync_engine::SyncEngine;
use synkit_sync_protocol::EntityPayload;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total requests sent.
    pub total_ops: usize,
    /// Requests the engine answered.
    pub successful_ops: usize,
    /// Requests the engine rejected.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Requests per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let secs = duration.as_secs_f64();
        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second: if secs > 0.0 { total as f64 / secs } else { 0.0 },
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Requests:   {}", self.total_ops);
        println!("Answered:   {}", self.successful_ops);
        println!("Rejected:   {}", self.failed_ops);
        println!("Duration:   {:?}", self.duration);
        println!("Throughput: {:.2} req/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of requests to send.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Number of distinct remote keys.
    pub entity_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            entity_count: 100,
        }
    }
}

fn stress_key(i: usize, config: &StressConfig) -> Key {
    book_key(&format!("stress-{}", i % config.entity_count.max(1)))
}

/// Builds the payload a client holding `version` would send.
fn edit<S: EntityStore>(engine: &SyncEngine<S>, key: &Key, field: &str, i: usize) -> EntityPayload {
    let version = engine
        .records()
        .get_by_remote_key(&key.to_remote())
        .ok()
        .flatten()
        .map_or(0, |record| record.version());
    payload(key, version).with_property(field, wire("int", json!(i)))
}

/// Sends `operations` edits round-robin over `entity_count` keys.
pub fn stress_sequential_syncs<S: EntityStore>(
    engine: &SyncEngine<S>,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = stress_key(i, config);
        let request = edit(engine, &key, "n", i);
        match engine.sync_entity(&request, &format!("h{i}"), None) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Mixes edits, unchanged resends and deletions.
pub fn stress_mixed_operations<S: EntityStore>(
    engine: &SyncEngine<S>,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = stress_key(i, config);
        let result = match i % 3 {
            0 => {
                let request = edit(engine, &key, "n", i);
                engine.sync_entity(&request, &format!("h{i}"), None).map(|_| ())
            }
            1 => {
                let request = edit(engine, &key, "n", i);
                engine.sync_entity(&request, "same", None).map(|_| ())
            }
            _ => engine.sync_deleted_entity(&key.to_remote(), None).map(|_| ()),
        };

        match result {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Sends edits from `threads` threads at once, each editing its own field
/// of shared keys.
pub fn stress_concurrent_syncs<S: EntityStore + 'static>(
    engine: Arc<SyncEngine<S>>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();

            thread::spawn(move || {
                let field = format!("t{t}");
                for i in 0..ops_per_thread {
                    let key = stress_key(i, &config);
                    let request = edit(&engine, &key, &field, i);
                    match engine.sync_entity(&request, &format!("h{t}-{i}"), None) {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
