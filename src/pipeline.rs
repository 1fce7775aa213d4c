//! Four-stage filter pipeline over a fetched task listing.
//!
//! Papers are addressed by their position in the dataset, never by ID, so
//! every stage's survivors and discards stay attributable to the original
//! listing. Each stage only sees the survivors of the stage before it.
//!
//! | Stage | Report | Keeps                                        |
//! |-------|--------|----------------------------------------------|
//! | 1     | 2      | papers with at least one code repository     |
//! | 2     | 3      | papers published inside `[min_date, max_date]` |
//! | 3     | 4      | papers matching the AND-OR query             |
//! | 4     | 5      | papers not matching the NOT query            |

use crate::enricher::{self, LookupFailurePolicy, Strategy};
use crate::error::Result;
use crate::matcher::{matches_and_or, matches_not, AndOrQuery, NotQuery};
use crate::paperswithcode::Paper;
use crate::report::ReportWriter;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, info};

/// Ordered set of dataset indices with constant-time membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    order: Vec<usize>,
    members: HashSet<usize>,
}

impl IndexSet {
    /// Every index of a dataset of `len` papers
    pub fn all(len: usize) -> Self {
        (0..len).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.contains(&index)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }

    /// True when the two sets share no index.
    pub fn is_disjoint(&self, other: &IndexSet) -> bool {
        self.members.is_disjoint(&other.members)
    }
}

impl FromIterator<usize> for IndexSet {
    /// Later duplicates are dropped; the first occurrence keeps its position.
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = IndexSet::default();
        for index in iter {
            if set.members.insert(index) {
                set.order.push(index);
            }
        }
        set
    }
}

/// Partition of one stage's input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub survivors: IndexSet,
    pub discards: IndexSet,
}

/// Split `input` by `keep`, preserving input order on both sides.
pub fn partition(input: &IndexSet, mut keep: impl FnMut(usize) -> bool) -> StageOutcome {
    let (kept, dropped): (Vec<usize>, Vec<usize>) = input.iter().partition(|&i| keep(i));
    StageOutcome {
        survivors: kept.into_iter().collect(),
        discards: dropped.into_iter().collect(),
    }
}

/// Inclusive publication window, day granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.min <= date && date <= self.max
    }
}

/// Stage 1: keep indices whose enrichment flag is set.
///
/// `has_code` is aligned with `input` order, as returned by [`enricher::enrich`].
pub fn filter_has_code(input: &IndexSet, has_code: &[bool]) -> StageOutcome {
    let flagged: HashSet<usize> = input
        .iter()
        .zip(has_code.iter())
        .filter(|(_, flag)| **flag)
        .map(|(i, _)| i)
        .collect();
    partition(input, |i| flagged.contains(&i))
}

/// Stage 2: keep papers published inside `range`; undated papers are dropped.
pub fn filter_date_range(dataset: &[Paper], input: &IndexSet, range: &DateRange) -> StageOutcome {
    partition(input, |i| dataset[i].published.is_some_and(|d| range.contains(d)))
}

/// Stage 3: keep papers whose title and abstract satisfy the AND-OR query.
pub fn filter_and_or(dataset: &[Paper], input: &IndexSet, query: &AndOrQuery) -> StageOutcome {
    partition(input, |i| matches_and_or(&dataset[i].search_text(), query))
}

/// Stage 4: drop papers whose title or abstract hit the NOT query.
pub fn filter_not(dataset: &[Paper], input: &IndexSet, query: &NotQuery) -> StageOutcome {
    partition(input, |i| !matches_not(&dataset[i].search_text(), query))
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CodeAvailability,
    DateRange,
    AndOrQuery,
    NotQuery,
}

impl Stage {
    /// Report file number; `papers_list_1.txt` is the unfiltered listing.
    pub fn report_number(self) -> u8 {
        match self {
            Stage::CodeAvailability => 2,
            Stage::DateRange => 3,
            Stage::AndOrQuery => 4,
            Stage::NotQuery => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::CodeAvailability => "code availability",
            Stage::DateRange => "publication date",
            Stage::AndOrQuery => "AND-OR query",
            Stage::NotQuery => "NOT query",
        }
    }
}

/// Filter parameters for one run
#[derive(Debug, Clone)]
pub struct FilterSettings {
    pub date_range: DateRange,
    pub and_or: AndOrQuery,
    pub not: NotQuery,
}

/// How stage 1 reaches the repository-count endpoint
#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    pub strategy: Strategy,
    pub failure_policy: LookupFailurePolicy,
}

/// Sizes of one finished stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub input: usize,
    pub survivors: usize,
    pub discards: usize,
}

/// Result of a full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub total: usize,
    pub stages: Vec<StageReport>,
    pub survivors: IndexSet,
}

/// Run all four stages over `dataset`.
///
/// `lookup` maps a dataset index to its repository count; it is only called
/// for papers that carry an identifier. When `writer` is set, the full
/// listing is written first, then each stage's survivors and discards before
/// the next stage starts.
pub async fn run<F, Fut>(
    dataset: &[Paper],
    settings: &FilterSettings,
    enrich_options: EnrichOptions,
    lookup: F,
    writer: Option<&ReportWriter>,
) -> Result<PipelineSummary>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<u64>>,
{
    let all = IndexSet::all(dataset.len());
    if let Some(writer) = writer {
        writer.write_listing(dataset, &all)?;
    }

    let mut stages = Vec::with_capacity(4);

    info!("Filtering out papers that do not have associated code...");
    let has_code = enricher::enrich(
        all.as_slice(),
        enrich_options.strategy,
        enrich_options.failure_policy,
        |i| {
            let lookup_target = (!dataset[i].id.is_empty()).then(|| lookup(i));
            async move {
                match lookup_target {
                    Some(request) => request.await,
                    None => {
                        debug!(index = i, "Paper has no identifier, no code lookup");
                        Ok(0)
                    }
                }
            }
        },
    )
    .await?;
    let outcome = filter_has_code(&all, &has_code);
    let mut current = finish_stage(dataset, Stage::CodeAvailability, &all, outcome, writer, &mut stages)?;

    info!(
        "Filtering out papers published before {} and after {}...",
        settings.date_range.min, settings.date_range.max
    );
    let outcome = filter_date_range(dataset, &current, &settings.date_range);
    current = finish_stage(dataset, Stage::DateRange, &current, outcome, writer, &mut stages)?;

    info!("Filtering papers based on AND-OR query...");
    let outcome = filter_and_or(dataset, &current, &settings.and_or);
    current = finish_stage(dataset, Stage::AndOrQuery, &current, outcome, writer, &mut stages)?;

    info!("Filtering papers based on NOT query...");
    let outcome = filter_not(dataset, &current, &settings.not);
    current = finish_stage(dataset, Stage::NotQuery, &current, outcome, writer, &mut stages)?;

    Ok(PipelineSummary {
        total: dataset.len(),
        stages,
        survivors: current,
    })
}

fn finish_stage(
    dataset: &[Paper],
    stage: Stage,
    input: &IndexSet,
    outcome: StageOutcome,
    writer: Option<&ReportWriter>,
    stages: &mut Vec<StageReport>,
) -> Result<IndexSet> {
    debug_assert_eq!(outcome.survivors.len() + outcome.discards.len(), input.len());
    debug_assert!(outcome.survivors.is_disjoint(&outcome.discards));

    if let Some(writer) = writer {
        writer.write_stage(dataset, stage.report_number(), &outcome)?;
    }

    info!(stage = stage.name(), "Removed {} papers from list", outcome.discards.len());
    info!(stage = stage.name(), "Remaining papers in list = {}", outcome.survivors.len());

    stages.push(StageReport {
        stage,
        input: input.len(),
        survivors: outcome.survivors.len(),
        discards: outcome.discards.len(),
    });
    Ok(outcome.survivors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PwcError;
    use crate::report::Verbosity;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn paper(id: &str, title: &str, abstract_text: Option<&str>, published: Option<NaiveDate>) -> Paper {
        Paper {
            id: id.to_string(),
            title: title.to_string(),
            abstract_text: abstract_text.map(str::to_string),
            published,
            ..Default::default()
        }
    }

    fn assert_partitions(input: &IndexSet, outcome: &StageOutcome) {
        assert_eq!(outcome.survivors.len() + outcome.discards.len(), input.len());
        assert!(outcome.survivors.is_disjoint(&outcome.discards));
        for i in input.iter() {
            assert!(outcome.survivors.contains(i) || outcome.discards.contains(i));
        }
    }

    fn settings() -> FilterSettings {
        FilterSettings {
            date_range: DateRange {
                min: date(2018, 1, 1),
                max: date(2023, 7, 31),
            },
            and_or: AndOrQuery::new([vec!["online", "real-time"]]),
            not: NotQuery::new(["facial", "underwater"]),
        }
    }

    /// Five papers: 0 and 3 have no code, 4 is too old, 2 misses the AND-OR query.
    fn scenario() -> (Vec<Paper>, Vec<u64>) {
        let dataset = vec![
            paper("p0", "Online mapping", Some("fast"), Some(date(2020, 5, 1))),
            paper("p1", "Real-time depth fusion", None, Some(date(2021, 2, 3))),
            paper("p2", "Offline reconstruction", Some("batch"), Some(date(2022, 8, 9))),
            paper("p3", "Online stereo", Some("gpu"), Some(date(2019, 1, 1))),
            paper("p4", "Online SLAM", Some("classic"), Some(date(2015, 6, 6))),
        ];
        (dataset, vec![0, 2, 1, 0, 5])
    }

    #[test]
    fn test_index_set_order_and_membership() {
        let set: IndexSet = vec![4, 1, 4, 7].into_iter().collect();
        assert_eq!(set.as_slice(), &[4, 1, 7]);
        assert!(set.contains(7));
        assert!(!set.contains(2));

        let other: IndexSet = vec![1].into_iter().collect();
        assert!(!set.is_disjoint(&other));
        assert!(set.is_disjoint(&vec![2, 3].into_iter().collect()));
    }

    #[test]
    fn test_partition_invariants() {
        let input: IndexSet = vec![9, 3, 5, 0, 2].into_iter().collect();
        let outcome = partition(&input, |i| i % 3 == 0);
        assert_partitions(&input, &outcome);
        assert_eq!(outcome.survivors.as_slice(), &[9, 3, 0]);
        assert_eq!(outcome.discards.as_slice(), &[5, 2]);
    }

    #[test]
    fn test_filter_has_code_aligned_with_input() {
        let input: IndexSet = vec![3, 1, 2].into_iter().collect();
        let outcome = filter_has_code(&input, &[false, true, true]);
        assert_partitions(&input, &outcome);
        assert_eq!(outcome.survivors.as_slice(), &[1, 2]);
        assert_eq!(outcome.discards.as_slice(), &[3]);
    }

    #[test]
    fn test_date_bounds_inclusive() {
        let range = DateRange {
            min: date(2020, 1, 1),
            max: date(2020, 12, 31),
        };
        let dataset = vec![
            paper("a", "t", None, Some(date(2020, 1, 1))),
            paper("b", "t", None, Some(date(2020, 12, 31))),
            paper("c", "t", None, Some(date(2019, 12, 31))),
            paper("d", "t", None, Some(date(2021, 1, 1))),
            paper("e", "t", None, None),
        ];
        let input = IndexSet::all(dataset.len());
        let outcome = filter_date_range(&dataset, &input, &range);
        assert_partitions(&input, &outcome);
        assert_eq!(outcome.survivors.as_slice(), &[0, 1]);
        assert_eq!(outcome.discards.as_slice(), &[2, 3, 4]);
    }

    #[test]
    fn test_and_or_filter_idempotent() {
        let (dataset, _) = scenario();
        let query = AndOrQuery::new([vec!["online", "real-time"], vec!["mapping", "slam", "fusion", "stereo"]]);
        let input = IndexSet::all(dataset.len());

        let first = filter_and_or(&dataset, &input, &query);
        assert_partitions(&input, &first);
        let second = filter_and_or(&dataset, &first.survivors, &query);
        assert_eq!(second.survivors, first.survivors);
        assert!(second.discards.is_empty());
    }

    #[test]
    fn test_null_abstract_is_searchable() {
        let dataset = vec![paper("a", "Real-Time Fusion", None, None)];
        let input = IndexSet::all(1);
        let outcome = filter_and_or(&dataset, &input, &AndOrQuery::new([vec!["real-time"]]));
        assert_eq!(outcome.survivors.as_slice(), &[0]);
        let outcome = filter_not(&dataset, &input, &NotQuery::new(["fusion"]));
        assert_eq!(outcome.discards.as_slice(), &[0]);
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let (dataset, counts) = scenario();
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = ReportWriter::new(dir.path(), Verbosity::Compact);

        let summary = run(
            &dataset,
            &settings(),
            EnrichOptions {
                strategy: Strategy::Concurrent { workers: 3 },
                failure_policy: LookupFailurePolicy::Abort,
            },
            |i| {
                let count = counts[i];
                async move { Ok(count) }
            },
            Some(&writer),
        )
        .await
        .expect("pipeline");

        assert_eq!(summary.total, 5);
        assert_eq!(summary.survivors.as_slice(), &[1]);
        let sizes: Vec<_> = summary.stages.iter().map(|s| (s.input, s.survivors, s.discards)).collect();
        assert_eq!(sizes, vec![(5, 3, 2), (3, 2, 1), (2, 1, 1), (1, 1, 0)]);
        for pair in summary.stages.windows(2) {
            assert_eq!(pair[1].input, pair[0].survivors);
        }

        let read = |name: &str| std::fs::read_to_string(dir.path().join(name)).expect("report");
        let leading = |text: String| -> Vec<usize> {
            text.lines()
                .filter_map(|l| l.split(' ').next())
                .filter_map(|n| n.parse().ok())
                .collect()
        };
        assert_eq!(leading(read("papers_list_1.txt")), vec![0, 1, 2, 3, 4]);
        assert_eq!(leading(read("discard_list_2.txt")), vec![0, 3]);
        assert_eq!(leading(read("discard_list_3.txt")), vec![4]);
        assert_eq!(leading(read("discard_list_4.txt")), vec![2]);
        assert_eq!(read("discard_list_5.txt"), "");
        assert_eq!(leading(read("papers_list_5.txt")), vec![1]);
    }

    #[tokio::test]
    async fn test_run_skips_lookup_without_identifier() {
        let dataset = vec![
            paper("", "Online a", None, Some(date(2020, 1, 1))),
            paper("p1", "Online b", None, Some(date(2020, 1, 1))),
        ];
        let summary = run(
            &dataset,
            &settings(),
            EnrichOptions {
                strategy: Strategy::Sequential,
                failure_policy: LookupFailurePolicy::Abort,
            },
            |i| async move {
                if i == 0 {
                    Err(PwcError::Validation("should not be called".to_string()))
                } else {
                    Ok(1)
                }
            },
            None,
        )
        .await
        .expect("pipeline");
        assert_eq!(summary.survivors.as_slice(), &[1]);
    }

    #[tokio::test]
    async fn test_run_lookup_failure_aborts() {
        let (dataset, _) = scenario();
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = ReportWriter::new(dir.path(), Verbosity::Compact);

        let result = run(
            &dataset,
            &settings(),
            EnrichOptions {
                strategy: Strategy::Sequential,
                failure_policy: LookupFailurePolicy::Abort,
            },
            |i| async move {
                if i == 3 {
                    Err(PwcError::Api {
                        code: 500,
                        message: "down".to_string(),
                    })
                } else {
                    Ok(1)
                }
            },
            Some(&writer),
        )
        .await;

        assert!(matches!(result, Err(PwcError::LookupFailed { index: 3, .. })));
        assert!(dir.path().join("papers_list_1.txt").exists());
        assert!(!dir.path().join("papers_list_2.txt").exists());
    }
}
