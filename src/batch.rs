//! Batch executor: splits oversized reads and reassembles their results.
//!
//! A logical read of `count` items starting at `offset` is served by one or
//! more transport calls. Sizes at or above the split cache ceiling are
//! partitioned up front; a call that fails with the oversized signature is
//! recorded in the cache and halved. Chunks run one after another in
//! ascending offset order, so concatenating their results reproduces the
//! output of a single unsplit call.

use crate::cache::{OperationKey, SplitCache};
use crate::error::{Error, Result};
use crate::types::{ProbeResults, Record};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// A contiguous sub-range of a logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub offset: usize,
    pub count: usize,
}

impl ChunkRange {
    pub fn end(&self) -> usize {
        self.offset + self.count
    }
}

/// Partition `[offset, offset + count)` into ranges of at most `step` items.
///
/// Ranges are contiguous, disjoint and in ascending order; only the last one
/// may be shorter than `step`.
pub fn plan_chunks(offset: usize, count: usize, step: usize) -> Vec<ChunkRange> {
    let step = step.max(1);
    let end = offset + count;
    (offset..end)
        .step_by(step)
        .map(|start| ChunkRange {
            offset: start,
            count: step.min(end - start),
        })
        .collect()
}

/// A result that can be assembled from chunk results.
pub trait BatchOutput: Default {
    /// Append the result of the next chunk.
    fn append(&mut self, next: Self);
}

impl BatchOutput for Vec<Record> {
    fn append(&mut self, mut next: Self) {
        Vec::append(self, &mut next);
    }
}

impl BatchOutput for ProbeResults {
    fn append(&mut self, next: Self) {
        if self.is_empty() {
            *self = next;
            return;
        }
        let mut next = next.into_iter();
        for (mine, theirs) in self.iter_mut().zip(next.by_ref()) {
            mine.extend(theirs);
        }
        self.extend(next);
    }
}

/// Drives the split/retry protocol for one operation key.
#[derive(Clone)]
pub struct BatchExecutor {
    cache: Arc<dyn SplitCache>,
}

impl BatchExecutor {
    pub fn new(cache: Arc<dyn SplitCache>) -> Self {
        Self { cache }
    }

    /// The shared split cache.
    pub fn cache(&self) -> &Arc<dyn SplitCache> {
        &self.cache
    }

    /// Chunk size used when a request is split before any attempt.
    ///
    /// A learned ceiling is a size that failed, so requests are cut to half
    /// of it; an untested default is used as is.
    fn pre_split_step(&self, key: &OperationKey) -> usize {
        match self.cache.learned(key) {
            Some(ceiling) => ceiling.div_ceil(2).max(1),
            None => self.cache.default_ceiling(key),
        }
    }

    /// Serve `count` items starting at `offset` through `issue`.
    ///
    /// `issue` performs exactly one transport call for the given range.
    /// Only [`Error::Oversized`] is retried, by halving the failed range;
    /// every other error aborts the whole request without touching the cache.
    /// An oversized failure on a single item is terminal. A queued range at
    /// or above a ceiling learned during the request is split again before it
    /// is sent, so no size is attempted after it has been seen to fail.
    pub async fn execute<T, F, Fut>(
        &self,
        key: &OperationKey,
        offset: usize,
        count: usize,
        suggested_chunk: Option<usize>,
        mut issue: F,
    ) -> Result<T>
    where
        T: BatchOutput,
        F: FnMut(ChunkRange) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if count == 0 {
            return Err(Error::Validation("count must be positive".to_string()));
        }
        if suggested_chunk == Some(0) {
            return Err(Error::Validation("chunk size must be positive".to_string()));
        }

        let chunk = suggested_chunk.unwrap_or_else(|| self.cache.get(key));
        let mut pending: VecDeque<ChunkRange> = if count < chunk {
            VecDeque::from([ChunkRange { offset, count }])
        } else {
            let step = suggested_chunk.unwrap_or_else(|| self.pre_split_step(key));
            debug!(kind = ?key.kind, count, step, "pre-splitting request");
            plan_chunks(offset, count, step).into()
        };

        let mut output = T::default();
        while let Some(range) = pending.pop_front() {
            // A sibling of a range that just failed may already be known to
            // be too large.
            if let Some(learned) = self.cache.learned(key) {
                if range.count > 1 && range.count >= learned {
                    let step = learned.div_ceil(2);
                    debug!(
                        kind = ?key.kind,
                        count = range.count,
                        learned,
                        step,
                        "re-planning chunk at learned ceiling"
                    );
                    for sub in plan_chunks(range.offset, range.count, step).into_iter().rev() {
                        pending.push_front(sub);
                    }
                    continue;
                }
            }

            debug!(kind = ?key.kind, offset = range.offset, count = range.count, "issuing chunk");
            match issue(range).await {
                Ok(part) => output.append(part),
                Err(err) if err.is_oversized() && range.count > 1 => {
                    self.cache.record_failure(key, range.count);
                    let half = range.count.div_ceil(2);
                    debug!(
                        kind = ?key.kind,
                        failed = range.count,
                        retry = half,
                        "oversized exchange, splitting"
                    );
                    for sub in plan_chunks(range.offset, range.count, half).into_iter().rev() {
                        pending.push_front(sub);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Ceilings, MemorySplitCache, OperationKind};
    use parking_lot::Mutex;

    fn key(kind: OperationKind) -> OperationKey {
        OperationKey::new(kind, "db", "coll", 1, false)
    }

    /// Fake transport call: fails any request of `threshold` items or more.
    struct FakeScan {
        threshold: usize,
        calls: Mutex<Vec<ChunkRange>>,
    }

    impl FakeScan {
        fn new(threshold: usize) -> Self {
            Self {
                threshold,
                calls: Mutex::new(Vec::new()),
            }
        }

        async fn issue(&self, range: ChunkRange) -> Result<Vec<Record>> {
            self.calls.lock().push(range);
            if range.count >= self.threshold {
                return Err(Error::Oversized(tonic::Status::resource_exhausted(
                    "Received message larger than max",
                )));
            }
            Ok((range.offset..range.end())
                .map(|i| Record::new(format!("doc-{i}")))
                .collect())
        }

        fn calls(&self) -> Vec<ChunkRange> {
            self.calls.lock().clone()
        }

        fn failures(&self) -> usize {
            self.calls()
                .iter()
                .filter(|r| r.count >= self.threshold)
                .count()
        }
    }

    fn expected_ids(offset: usize, count: usize) -> Vec<String> {
        (offset..offset + count).map(|i| format!("doc-{i}")).collect()
    }

    fn ids(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_plan_chunks_completeness() {
        for &(offset, count, step) in &[
            (0, 1, 1),
            (0, 40000, 32768),
            (17, 100, 7),
            (5, 10, 10),
            (3, 9, 100),
            (0, 50000, 25000),
        ] {
            let chunks = plan_chunks(offset, count, step);
            assert_eq!(chunks.iter().map(|c| c.count).sum::<usize>(), count);
            assert_eq!(chunks[0].offset, offset);
            for pair in chunks.windows(2) {
                assert_eq!(pair[0].end(), pair[1].offset);
            }
            assert!(chunks.iter().all(|c| c.count > 0 && c.count <= step));
        }
    }

    #[test]
    fn test_plan_chunks_scan_scenario() {
        let sizes: Vec<usize> = plan_chunks(0, 40000, 32768).iter().map(|c| c.count).collect();
        assert_eq!(sizes, vec![32768, 7232]);
    }

    #[test]
    fn test_probe_results_append() {
        let mut out: ProbeResults = Vec::new();
        BatchOutput::append(&mut out, vec![vec![Record::new("a")], vec![Record::new("x")]]);
        BatchOutput::append(&mut out, vec![vec![Record::new("b")], vec![]]);
        assert_eq!(ids(&out[0]), vec!["a", "b"]);
        assert_eq!(ids(&out[1]), vec!["x"]);
    }

    #[tokio::test]
    async fn test_scan_split_on_default_ceiling() {
        let executor = BatchExecutor::new(Arc::new(MemorySplitCache::new()));
        let fake = FakeScan::new(usize::MAX);
        let records: Vec<Record> = executor
            .execute(&key(OperationKind::Scan), 0, 40000, None, |r| fake.issue(r))
            .await
            .unwrap();

        let sizes: Vec<usize> = fake.calls().iter().map(|c| c.count).collect();
        assert_eq!(sizes, vec![32768, 7232]);
        assert_eq!(ids(&records), expected_ids(0, 40000));
    }

    #[tokio::test]
    async fn test_small_request_is_single_call() {
        let executor = BatchExecutor::new(Arc::new(MemorySplitCache::new()));
        let fake = FakeScan::new(usize::MAX);
        let records: Vec<Record> = executor
            .execute(&key(OperationKind::Scan), 5, 10, None, |r| fake.issue(r))
            .await
            .unwrap();
        assert_eq!(fake.calls(), vec![ChunkRange { offset: 5, count: 10 }]);
        assert_eq!(ids(&records), expected_ids(5, 10));
    }

    #[tokio::test]
    async fn test_order_preserved_across_nested_splits() {
        let executor = BatchExecutor::new(Arc::new(MemorySplitCache::new()));
        // Forces two rounds of halving: 1000 -> 500 -> 250.
        let fake = FakeScan::new(400);
        let records: Vec<Record> = executor
            .execute(&key(OperationKind::Scan), 100, 1000, None, |r| fake.issue(r))
            .await
            .unwrap();
        assert_eq!(ids(&records), expected_ids(100, 1000));

        let offsets: Vec<usize> = fake
            .calls()
            .iter()
            .filter(|r| r.count < 400)
            .map(|r| r.offset)
            .collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_adaptive_learning() {
        let cache = Arc::new(MemorySplitCache::new());
        let executor = BatchExecutor::new(cache.clone());
        let k = key(OperationKind::Scan);

        // First call fails once, splits, and completes.
        let fake = FakeScan::new(1000);
        let records: Vec<Record> = executor
            .execute(&k, 0, 1500, None, |r| fake.issue(r))
            .await
            .unwrap();
        assert_eq!(fake.failures(), 1);
        assert_eq!(ids(&records), expected_ids(0, 1500));
        assert_eq!(cache.learned(&k), Some(1500));

        // Same key: pre-split, no oversized attempt.
        let fake = FakeScan::new(1000);
        let records: Vec<Record> = executor
            .execute(&k, 0, 1500, None, |r| fake.issue(r))
            .await
            .unwrap();
        assert_eq!(fake.failures(), 0);
        assert_eq!(ids(&records), expected_ids(0, 1500));

        // A different key learns on its own.
        let other = OperationKey::new(OperationKind::Scan, "db", "other", 1, false);
        let fake = FakeScan::new(1000);
        let _: Vec<Record> = executor
            .execute(&other, 0, 1500, None, |r| fake.issue(r))
            .await
            .unwrap();
        assert_eq!(fake.failures(), 1);
        assert_eq!(cache.learned(&other), Some(1500));
    }

    #[tokio::test]
    async fn test_learned_ceiling_applies_to_queued_chunks() {
        let cache = Arc::new(MemorySplitCache::with_ceilings(Ceilings {
            scan: 1000,
            ..Ceilings::default()
        }));
        let executor = BatchExecutor::new(cache.clone());
        let k = key(OperationKind::Scan);

        let fake = FakeScan::new(800);
        let records: Vec<Record> = executor
            .execute(&k, 0, 3000, None, |r| fake.issue(r))
            .await
            .unwrap();

        assert_eq!(fake.failures(), 1);
        let sizes: Vec<usize> = fake.calls().iter().map(|c| c.count).collect();
        assert_eq!(sizes, vec![1000, 500, 500, 500, 500, 500, 500]);
        assert_eq!(ids(&records), expected_ids(0, 3000));
        assert_eq!(cache.learned(&k), Some(1000));
    }

    #[tokio::test]
    async fn test_cache_write_and_pre_split_scenario() {
        let cache = Arc::new(MemorySplitCache::with_ceilings(Ceilings {
            scan: 100_000,
            ..Ceilings::default()
        }));
        let executor = BatchExecutor::new(cache.clone());
        let k = key(OperationKind::Scan);

        let fake = FakeScan::new(50000);
        let _: Vec<Record> = executor
            .execute(&k, 0, 50000, None, |r| fake.issue(r))
            .await
            .unwrap();
        assert_eq!(cache.get(&k), 50000);

        let fake = FakeScan::new(usize::MAX);
        let _: Vec<Record> = executor
            .execute(&k, 0, 50000, None, |r| fake.issue(r))
            .await
            .unwrap();
        let sizes: Vec<usize> = fake.calls().iter().map(|c| c.count).collect();
        assert_eq!(sizes, vec![25000, 25000]);
    }

    #[tokio::test]
    async fn test_non_retryable_error_aborts() {
        let cache = Arc::new(MemorySplitCache::new());
        let executor = BatchExecutor::new(cache.clone());
        let k = key(OperationKind::Scan);
        let calls = Mutex::new(0usize);

        let result: Result<Vec<Record>> = executor
            .execute(&k, 0, 40000, None, |range| {
                *calls.lock() += 1;
                async move {
                    if range.offset == 0 {
                        Err(Error::Transport(tonic::Status::unauthenticated("bad key")))
                    } else {
                        Ok(Vec::new())
                    }
                }
            })
            .await;

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(*calls.lock(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let executor = BatchExecutor::new(Arc::new(MemorySplitCache::new()));
        let calls = Mutex::new(0usize);
        let result: Result<Vec<Record>> = executor
            .execute(&key(OperationKind::Scan), 0, 10, None, |_| {
                *calls.lock() += 1;
                async {
                    Err(Error::Server {
                        code: 1,
                        message: "boom".to_string(),
                    })
                }
            })
            .await;
        assert!(matches!(result, Err(Error::Server { code: 1, .. })));
        assert_eq!(*calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_single_item_failure_is_terminal() {
        let cache = Arc::new(MemorySplitCache::new());
        let executor = BatchExecutor::new(cache.clone());
        let k = key(OperationKind::Scan);
        let fake = FakeScan::new(1);
        let result: Result<Vec<Record>> = executor
            .execute(&k, 0, 4, None, |r| fake.issue(r))
            .await;
        assert!(matches!(result, Err(Error::Oversized(_))));
        // 4 -> 2 -> 1 (terminal)
        let sizes: Vec<usize> = fake.calls().iter().map(|c| c.count).collect();
        assert_eq!(sizes, vec![4, 2, 1]);
        assert_eq!(cache.learned(&k), Some(2));
    }

    #[tokio::test]
    async fn test_suggested_chunk() {
        let executor = BatchExecutor::new(Arc::new(MemorySplitCache::new()));
        let fake = FakeScan::new(usize::MAX);
        let records: Vec<Record> = executor
            .execute(&key(OperationKind::Scan), 0, 25, Some(10), |r| fake.issue(r))
            .await
            .unwrap();
        let sizes: Vec<usize> = fake.calls().iter().map(|c| c.count).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(ids(&records), expected_ids(0, 25));
    }

    #[tokio::test]
    async fn test_zero_count_rejected() {
        let executor = BatchExecutor::new(Arc::new(MemorySplitCache::new()));
        let fake = FakeScan::new(usize::MAX);
        let result: Result<Vec<Record>> = executor
            .execute(&key(OperationKind::Scan), 0, 0, None, |r| fake.issue(r))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(fake.calls().is_empty());
    }
}
