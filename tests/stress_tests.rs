//! Stress tests for concurrent delivery
//!
//! These tests verify:
//! - No record is lost or duplicated when many threads share a logger
//! - Deferred dispatch delivers everything once drained
//! - Child loggers share transports safely across threads
//! - Reliability decorators stay consistent under concurrent load

use relay_logger::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;
use tempfile::TempDir;

const THREADS: usize = 8;
const PER_THREAD: usize = 250;

fn memory_logger(mode: DispatchMode) -> (Logger, Arc<MemoryTransport>) {
    let memory = Arc::new(MemoryTransport::new());
    let logger = Logger::builder()
        .level(Level::BORING)
        .dispatch_mode(mode)
        .shared_transport(memory.clone())
        .build();
    (logger, memory)
}

fn spawn_writers<F>(logger: &Logger, write: F)
where
    F: Fn(&Logger, usize, usize) + Send + Sync + 'static,
{
    let write = Arc::new(write);
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|thread_id| {
            let logger = logger.clone();
            let barrier = barrier.clone();
            let write = write.clone();
            std::thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    write(&logger, thread_id, i);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer thread panicked");
    }
}

fn assert_all_delivered(messages: Vec<String>) {
    assert_eq!(messages.len(), THREADS * PER_THREAD);
    let unique: HashSet<String> = messages.into_iter().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD, "duplicate records delivered");
    for thread_id in 0..THREADS {
        for i in 0..PER_THREAD {
            assert!(
                unique.contains(&format!("t{}-{}", thread_id, i)),
                "record t{}-{} was lost",
                thread_id,
                i
            );
        }
    }
}

/// Every record from every thread reaches the transport exactly once
#[test]
fn test_concurrent_sync_logging() {
    let (logger, memory) = memory_logger(DispatchMode::Sync);

    spawn_writers(&logger, |logger, thread_id, i| {
        logger.info(format!("t{}-{}", thread_id, i)).unwrap();
    });

    assert_all_delivered(memory.messages());
}

/// Deferred writes from many threads are all delivered after draining
#[test]
fn test_concurrent_deferred_logging() {
    let memory = Arc::new(MemoryTransport::new().with_async(Duration::ZERO));
    let logger = Logger::builder()
        .dispatch_mode(DispatchMode::Deferred)
        .shared_transport(memory.clone())
        .build();

    spawn_writers(&logger, |logger, thread_id, i| {
        logger.warn(format!("t{}-{}", thread_id, i)).unwrap();
    });

    assert!(logger.drain(Duration::from_secs(10)), "deferred deliveries did not drain");
    assert_all_delivered(memory.messages());
}

/// Children created per thread share the parent's transports
#[test]
fn test_children_share_transports_across_threads() {
    let (logger, memory) = memory_logger(DispatchMode::Sync);

    spawn_writers(&logger, |logger, thread_id, i| {
        let child = logger.create_child(
            ChildOptions::new()
                .prefix(format!("worker-{}", thread_id))
                .context_field("worker", thread_id),
        );
        assert!(child.shares_transports_with(logger));
        child.debug(format!("t{}-{}", thread_id, i)).unwrap();
    });

    let records = memory.records();
    for record in &records {
        let worker = record.field("worker").and_then(|v| v.as_u64()).unwrap();
        assert_eq!(record.prefix.as_deref(), Some(format!("worker-{}", worker).as_str()));
        assert!(record.message.starts_with(&format!("t{}-", worker)));
    }
    assert_all_delivered(memory.messages());
}

/// Concurrent appends to one file produce whole lines only
#[test]
fn test_concurrent_file_logging() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("stress.log");
    let logger = Logger::builder()
        .transport(FileTransport::new(&path).expect("Failed to create file transport"))
        .output_format(OutputFormat::Json)
        .build();

    spawn_writers(&logger, |logger, thread_id, i| {
        logger
            .info_with(
                format!("t{}-{}", thread_id, i),
                Metadata::new().with_field("thread", thread_id),
            )
            .unwrap();
    });
    logger.flush().unwrap();

    let content = std::fs::read_to_string(&path).expect("Failed to read log file");
    let messages: Vec<String> = content
        .lines()
        .map(|line| {
            let parsed: serde_json::Value = serde_json::from_str(line).expect("torn line");
            parsed["message"].as_str().unwrap().to_string()
        })
        .collect();
    assert_all_delivered(messages);
}

/// A shared breaker counts every concurrent request exactly once
#[test]
fn test_circuit_breaker_metrics_under_contention() {
    let inner = Arc::new(MemoryTransport::new());
    let breaker = Arc::new(CircuitBreakerTransport::new(
        inner.clone(),
        CircuitBreakerOptions::default(),
    ));
    let logger = Logger::builder().shared_transport(breaker.clone()).build();

    spawn_writers(&logger, |logger, thread_id, i| {
        logger.error(format!("t{}-{}", thread_id, i)).unwrap();
    });

    let metrics = breaker.metrics();
    assert_eq!(metrics.total_requests, (THREADS * PER_THREAD) as u64);
    assert_eq!(metrics.successful_requests, (THREADS * PER_THREAD) as u64);
    assert_eq!(metrics.failed_requests, 0);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_all_delivered(inner.messages());
}

/// Batches never lose or duplicate records when fed from many threads
#[test]
fn test_concurrent_batch_aggregation() {
    let delivered: Arc<parking_lot::Mutex<Vec<String>>> = Arc::default();
    let flushes = Arc::new(AtomicUsize::new(0));
    let (sink, count) = (delivered.clone(), flushes.clone());

    let aggregator = Arc::new(BatchAggregator::new(16, move |batch: &[BufferedRecord]| {
        count.fetch_add(1, Ordering::SeqCst);
        sink.lock()
            .extend(batch.iter().map(|item| item.record.message.clone()));
        Ok(())
    }));
    let logger = Logger::builder().shared_aggregator(aggregator.clone()).build();

    spawn_writers(&logger, |logger, thread_id, i| {
        logger.info(format!("t{}-{}", thread_id, i)).unwrap();
    });

    assert!(flushes.load(Ordering::SeqCst) > 0);
    assert!(logger.flush_aggregators().is_ready());
    assert!(aggregator.is_empty());
    assert_all_delivered(delivered.lock().clone());
}

/// Retries of many concurrent deferred records all complete
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retry_under_concurrent_load() {
    let inner = Arc::new(
        MemoryTransport::new()
            .with_async(Duration::ZERO)
            .failing_times(20, Some("ECONNRESET"), "reset"),
    );
    let logger = Logger::builder()
        .dispatch_mode(DispatchMode::Deferred)
        .shared_transport(inner.clone())
        .retry(RetryOptions {
            max_attempts: 30,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
            circuit_breaker_threshold: 1000,
            ..RetryOptions::default()
        })
        .build();

    for i in 0..200 {
        logger.info(format!("r{}", i)).unwrap();
    }
    logger.idle().await;

    assert_eq!(inner.len(), 200);
    assert_eq!(inner.attempts(), 220);
}
