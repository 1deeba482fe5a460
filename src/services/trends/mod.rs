// Trend Aggregation Module
// Dated corpora to year-by-label statistics:
// - corpus: CSV/JSON loading and year parsing
// - aggregation: batched classification, tallies, sharding
// - report: trend and per-record prediction CSVs

pub mod aggregation;
pub mod corpus;
pub mod report;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{ClassLabel, YearlyAggregate};
use crate::services::config_store::TrendConfig;

pub use aggregation::{aggregate, classify_records, classify_sharded, tally_labels, RecordPrediction, TrendRun};
pub use corpus::{load_corpus, CorpusLoad};

/// What to do when a prediction batch fails mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop and report the tally so far.
    #[default]
    Abort,
    /// Retry the failed batch one record at a time and drop the records that still fail.
    Skip,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown failure policy '{}' (expected abort or skip)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendOptions {
    pub window_start: i32,
    pub window_end: i32,
    pub batch_size: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for TrendOptions {
    fn default() -> Self {
        Self::from(&TrendConfig::default())
    }
}

impl From<&TrendConfig> for TrendOptions {
    fn from(config: &TrendConfig) -> Self {
        Self {
            window_start: config.window_start,
            window_end: config.window_end,
            batch_size: config.batch_size.max(1),
            failure_policy: config.failure_policy,
        }
    }
}

impl TrendOptions {
    pub fn in_window(&self, year: i32) -> bool {
        year >= self.window_start && year <= self.window_end
    }
}

/// Count-only tally of predicted labels per year. Merging is commutative and
/// associative, so shards can be combined in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendTally {
    counts: BTreeMap<i32, [u64; 3]>,
}

impl TrendTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, year: i32, label: ClassLabel) {
        self.counts.entry(year).or_insert([0; 3])[label.ordinal()] += 1;
    }

    pub fn merge(&mut self, other: &TrendTally) {
        for (year, counts) in &other.counts {
            let slot = self.counts.entry(*year).or_insert([0; 3]);
            for (mine, theirs) in slot.iter_mut().zip(counts) {
                *mine += theirs;
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.values().flat_map(|c| c.iter()).sum()
    }

    /// One row per observed year, ascending; every label present.
    pub fn to_aggregates(&self) -> Vec<YearlyAggregate> {
        self.counts
            .iter()
            .map(|(year, counts)| YearlyAggregate::from_counts(*year, *counts))
            .collect()
    }
}
