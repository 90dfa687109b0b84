//! Two-phase search: slim identifier pass, rehydration, merge.
//!
//! When a search asking for full records cannot be served in one exchange,
//! it is run as:
//! 1. a slim search returning only `(id, score)` per hit,
//! 2. a fetch-by-identifier scan per probe returning the requested fields,
//! 3. a merge pairing every rehydrated record with its slim-pass score.
//!
//! Both passes go through the [`BatchExecutor`], so each may be split. The
//! rehydrate pass is expected to return records in the order the ids were
//! requested; [`MergeStrategy::Positional`] relies on that.

use crate::batch::{BatchExecutor, ChunkRange};
use crate::cache::OperationKey;
use crate::error::{Error, RehydrationError, Result};
use crate::types::{ProbeResults, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

/// Ranked `(id, score)` pairs per probe, output of the slim pass.
pub type ScoredIds = Vec<Vec<(String, f32)>>;

/// How rehydrated records are paired with slim-pass scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Record `i` takes score `i`. Mismatched ids are logged, not corrected.
    #[default]
    Positional,
    /// Each score is matched to the record carrying the same id.
    ById,
}

/// Reduce slim search results to ranked `(id, score)` pairs.
///
/// Every hit must carry a score.
pub fn scored_ids(results: ProbeResults) -> Result<ScoredIds> {
    results
        .into_iter()
        .enumerate()
        .map(|(probe, hits)| -> Result<Vec<(String, f32)>> {
            hits.into_iter()
                .map(|r| match r.score {
                    Some(score) => Ok((r.id, score)),
                    None => Err(Error::from(RehydrationError::MissingScore { probe, id: r.id })),
                })
                .collect()
        })
        .collect()
}

/// Pair rehydrated records with the scores of the slim pass.
///
/// Every slim hit must yield exactly one merged record; a count mismatch or,
/// with [`MergeStrategy::ById`], a missing id is an error.
pub fn merge(
    scored: ScoredIds,
    rehydrated: ProbeResults,
    strategy: MergeStrategy,
) -> Result<ProbeResults> {
    if scored.len() != rehydrated.len() {
        return Err(RehydrationError::ProbeMismatch {
            slim: scored.len(),
            rehydrated: rehydrated.len(),
        }
        .into());
    }

    scored
        .into_iter()
        .zip(rehydrated)
        .enumerate()
        .map(|(probe, (hits, records))| -> Result<Vec<Record>> {
            if hits.len() != records.len() {
                return Err(RehydrationError::CountMismatch {
                    probe,
                    expected: hits.len(),
                    got: records.len(),
                }
                .into());
            }
            match strategy {
                MergeStrategy::Positional => Ok(merge_positional(probe, hits, records)),
                MergeStrategy::ById => merge_by_id(probe, hits, records),
            }
        })
        .collect()
}

fn merge_positional(probe: usize, hits: Vec<(String, f32)>, records: Vec<Record>) -> Vec<Record> {
    hits.into_iter()
        .zip(records)
        .map(|((id, score), mut record)| {
            if record.id != id {
                warn!(
                    probe,
                    expected = %id,
                    got = %record.id,
                    "rehydrated record out of order; score paired by position"
                );
            }
            record.score = Some(score);
            record
        })
        .collect()
}

fn merge_by_id(
    probe: usize,
    hits: Vec<(String, f32)>,
    records: Vec<Record>,
) -> Result<Vec<Record>> {
    let by_id: HashMap<String, Record> = records.into_iter().map(|r| (r.id.clone(), r)).collect();
    hits.into_iter()
        .map(|(id, score)| -> Result<Record> {
            let mut record = by_id
                .get(&id)
                .cloned()
                .ok_or_else(|| RehydrationError::MissingId {
                    probe,
                    id: id.clone(),
                })?;
            record.score = Some(score);
            Ok(record)
        })
        .collect()
}

/// Runs the slim pass, the rehydrate pass and the merge.
pub struct SearchEnricher<'a> {
    executor: &'a BatchExecutor,
    strategy: MergeStrategy,
}

impl<'a> SearchEnricher<'a> {
    pub fn new(executor: &'a BatchExecutor, strategy: MergeStrategy) -> Self {
        Self { executor, strategy }
    }

    /// Phase A: identifier-and-score search for `count` hits per probe.
    ///
    /// `search` issues one slim search for the given hit range.
    pub async fn slim_pass<F, Fut>(
        &self,
        key: &OperationKey,
        count: usize,
        search: F,
    ) -> Result<ScoredIds>
    where
        F: FnMut(ChunkRange) -> Fut,
        Fut: Future<Output = Result<ProbeResults>>,
    {
        let results = self.executor.execute(key, 0, count, None, search).await?;
        scored_ids(results)
    }

    /// Phase B: fetch full records for every probe's ids, in id order.
    ///
    /// Probes are processed one after another; the first failure aborts the
    /// whole pass. Probes without hits issue no call.
    pub async fn rehydrate<F, Fut>(
        &self,
        key: &OperationKey,
        scored: &ScoredIds,
        mut fetch: F,
    ) -> Result<ProbeResults>
    where
        F: FnMut(Vec<String>) -> Fut,
        Fut: Future<Output = Result<Vec<Record>>>,
    {
        let mut results = Vec::with_capacity(scored.len());
        for (probe, hits) in scored.iter().enumerate() {
            if hits.is_empty() {
                results.push(Vec::new());
                continue;
            }
            debug!(probe, ids = hits.len(), "rehydrating probe");
            let records: Vec<Record> = self
                .executor
                .execute(key, 0, hits.len(), None, |range| {
                    let ids = hits[range.offset..range.end()]
                        .iter()
                        .map(|(id, _)| id.clone())
                        .collect();
                    fetch(ids)
                })
                .await?;
            results.push(records);
        }
        Ok(results)
    }

    /// All three phases.
    pub async fn run<S, SFut, F, FFut>(
        &self,
        slim_key: &OperationKey,
        scan_key: &OperationKey,
        count: usize,
        search: S,
        fetch: F,
    ) -> Result<ProbeResults>
    where
        S: FnMut(ChunkRange) -> SFut,
        SFut: Future<Output = Result<ProbeResults>>,
        F: FnMut(Vec<String>) -> FFut,
        FFut: Future<Output = Result<Vec<Record>>>,
    {
        let scored = self.slim_pass(slim_key, count, search).await?;
        let rehydrated = self.rehydrate(scan_key, &scored, fetch).await?;
        merge(scored, rehydrated, self.strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemorySplitCache, OperationKind};
    use crate::types::FieldValue;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn full(id: &str) -> Record {
        Record::new(id).with_field("title", format!("title of {id}"))
    }

    fn slim(id: &str, score: f32) -> Record {
        Record {
            score: Some(score),
            ..Record::new(id)
        }
    }

    fn hits(pairs: &[(&str, f32)]) -> Vec<(String, f32)> {
        pairs.iter().map(|(id, s)| (id.to_string(), *s)).collect()
    }

    #[test]
    fn test_merge_in_order() {
        let merged = merge(
            vec![hits(&[("a", 0.9), ("b", 0.7)])],
            vec![vec![full("a"), full("b")]],
            MergeStrategy::Positional,
        )
        .unwrap();
        assert_eq!(merged[0][0].id, "a");
        assert_eq!(merged[0][0].score, Some(0.9));
        assert_eq!(
            merged[0][0].field("title"),
            Some(&FieldValue::String("title of a".to_string()))
        );
        assert_eq!(merged[0][1].id, "b");
        assert_eq!(merged[0][1].score, Some(0.7));
    }

    /// Positional pairing trusts the rehydrate order. When the server answers
    /// out of order, scores land on the wrong records.
    #[test]
    fn test_positional_merge_out_of_order_mismatches_scores() {
        let merged = merge(
            vec![hits(&[("a", 0.9), ("b", 0.7)])],
            vec![vec![full("b"), full("a")]],
            MergeStrategy::Positional,
        )
        .unwrap();
        assert_eq!(merged[0][0].id, "b");
        assert_eq!(merged[0][0].score, Some(0.9));
        assert_eq!(merged[0][1].id, "a");
        assert_eq!(merged[0][1].score, Some(0.7));
    }

    #[test]
    fn test_by_id_merge_out_of_order() {
        let merged = merge(
            vec![hits(&[("a", 0.9), ("b", 0.7)])],
            vec![vec![full("b"), full("a")]],
            MergeStrategy::ById,
        )
        .unwrap();
        assert_eq!(merged[0][0].id, "a");
        assert_eq!(merged[0][0].score, Some(0.9));
        assert_eq!(merged[0][1].id, "b");
        assert_eq!(merged[0][1].score, Some(0.7));
    }

    #[test]
    fn test_merge_count_mismatch_is_error() {
        let err = merge(
            vec![hits(&[("a", 0.9), ("b", 0.7)])],
            vec![vec![full("a")]],
            MergeStrategy::Positional,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Rehydration(RehydrationError::CountMismatch {
                probe: 0,
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_merge_missing_id_is_error() {
        let err = merge(
            vec![hits(&[("a", 0.9), ("b", 0.7)])],
            vec![vec![full("a"), full("c")]],
            MergeStrategy::ById,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Rehydration(RehydrationError::MissingId { ref id, .. }) if id == "b"
        ));
    }

    #[test]
    fn test_merge_probe_mismatch_is_error() {
        let err = merge(vec![vec![], vec![]], vec![vec![]], MergeStrategy::Positional).unwrap_err();
        assert!(matches!(
            err,
            Error::Rehydration(RehydrationError::ProbeMismatch { .. })
        ));
    }

    #[test]
    fn test_scored_ids_requires_scores() {
        let scored = scored_ids(vec![vec![slim("a", 0.9)], vec![slim("b", 0.5)]]).unwrap();
        assert_eq!(scored, vec![hits(&[("a", 0.9)]), hits(&[("b", 0.5)])]);

        let err = scored_ids(vec![vec![slim("a", 0.9)], vec![Record::new("b")]]).unwrap_err();
        assert!(matches!(
            err,
            Error::Rehydration(RehydrationError::MissingScore { probe: 1, ref id }) if id == "b"
        ));
    }

    #[tokio::test]
    async fn test_run_two_probes_with_empty_probe() {
        let executor = BatchExecutor::new(Arc::new(MemorySplitCache::new()));
        let enricher = SearchEnricher::new(&executor, MergeStrategy::Positional);
        let slim_key = OperationKey::new(OperationKind::SlimSearch, "db", "coll", 2, false);
        let scan_key = OperationKey::new(OperationKind::Scan, "db", "coll", 1, false);
        let fetched = Mutex::new(Vec::new());

        let results = enricher
            .run(
                &slim_key,
                &scan_key,
                2,
                |_| async { Ok::<_, Error>(vec![vec![slim("a", 0.9), slim("b", 0.7)], vec![]]) },
                |ids: Vec<String>| {
                    fetched.lock().push(ids.clone());
                    async move { Ok::<Vec<Record>, Error>(ids.iter().map(|id| full(id)).collect()) }
                },
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].len(), 2);
        assert_eq!(results[0][1].score, Some(0.7));
        assert!(results[1].is_empty());
        assert_eq!(*fetched.lock(), vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[tokio::test]
    async fn test_rehydrate_failure_aborts_remaining_probes() {
        let executor = BatchExecutor::new(Arc::new(MemorySplitCache::new()));
        let enricher = SearchEnricher::new(&executor, MergeStrategy::Positional);
        let scan_key = OperationKey::new(OperationKind::Scan, "db", "coll", 1, false);
        let calls = Mutex::new(0usize);

        let scored = vec![hits(&[("a", 0.9)]), hits(&[("b", 0.8)])];
        let result = enricher
            .rehydrate(&scan_key, &scored, |_ids| {
                *calls.lock() += 1;
                async { Err::<Vec<Record>, _>(Error::Transport(tonic::Status::unavailable("no route"))) }
            })
            .await;

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(*calls.lock(), 1);
    }
}
