//! Fan-out over several aggregators

use super::{Aggregator, FlushOutcome, SharedAggregator};
use crate::core::error::Result;
use crate::core::formatter::Formatter;
use crate::core::record::LogRecord;

/// Forwards every record to each child aggregator
#[derive(Clone, Default)]
pub struct CompositeAggregator {
    children: Vec<SharedAggregator>,
}

impl CompositeAggregator {
    pub fn new(children: Vec<SharedAggregator>) -> Self {
        Self { children }
    }

    pub fn add(&mut self, child: SharedAggregator) {
        self.children.push(child);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Aggregator for CompositeAggregator {
    /// Every child sees the record; the first error is returned
    fn aggregate(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        let mut first_error = None;
        for child in &self.children {
            if let Err(e) = child.aggregate(record, formatter) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn flush(&self) -> FlushOutcome {
        FlushOutcome::join_all(self.children.iter().map(|child| child.flush()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{BatchAggregator, BufferedRecord};
    use crate::core::error::LoggerError;
    use crate::core::level::Level;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_batch(max_size: usize, counter: Arc<AtomicUsize>) -> SharedAggregator {
        Arc::new(BatchAggregator::new(max_size, move |batch: &[BufferedRecord]| {
            counter.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(())
        }))
    }

    #[test]
    fn test_fan_out_and_ready_flush() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let composite = CompositeAggregator::new(vec![
            counter_batch(10, a.clone()),
            counter_batch(10, b.clone()),
        ]);

        composite
            .aggregate(&LogRecord::new(Level::INFO, "x"), &Formatter::plain())
            .unwrap();
        let outcome = composite.flush();

        assert!(outcome.is_ready());
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pending_when_any_child_is_async() {
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        let async_child: SharedAggregator = Arc::new(BatchAggregator::with_async(10, move |batch| {
            let d = d.clone();
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                d.fetch_add(batch.len(), Ordering::SeqCst);
                Ok(())
            }
        }));
        let sync_count = Arc::new(AtomicUsize::new(0));
        let composite =
            CompositeAggregator::new(vec![counter_batch(10, sync_count.clone()), async_child]);

        composite
            .aggregate(&LogRecord::new(Level::INFO, "x"), &Formatter::plain())
            .unwrap();
        let outcome = composite.flush();
        assert!(!outcome.is_ready());

        outcome.resolve().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(sync_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_child_error_does_not_stop_others() {
        let failing: SharedAggregator = Arc::new(BatchAggregator::new(1, |_: &[BufferedRecord]| {
            Err(LoggerError::aggregator("broken"))
        }));
        let count = Arc::new(AtomicUsize::new(0));
        let composite = CompositeAggregator::new(vec![failing, counter_batch(1, count.clone())]);

        let result = composite.aggregate(&LogRecord::new(Level::INFO, "x"), &Formatter::plain());
        assert!(result.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
