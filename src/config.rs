//! Run configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! command-line overrides applied by the binary.

use crate::enricher::{LookupFailurePolicy, Strategy};
use crate::error::{PwcError, Result};
use crate::matcher::{AndOrQuery, NotQuery};
use crate::paperswithcode::{DEFAULT_API_BASE, MAX_ITEMS_PER_PAGE};
use crate::pipeline::{DateRange, EnrichOptions, FilterSettings};
use crate::report::Verbosity;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameters of one retrieval-and-filter run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Task (subject area) slug from the PapersWithCode URL, e.g. `3d-reconstruction`
    pub task_id: String,
    /// Listing page size, at most 500
    pub items_per_page: u32,
    /// Earliest publication date kept (inclusive)
    pub min_date: NaiveDate,
    /// Latest publication date kept (inclusive)
    pub max_date: NaiveDate,
    /// `[["a", "b"], ["c"]]` keeps papers matching `(a OR b) AND c`
    pub and_or_query: AndOrQuery,
    /// Papers containing any of these terms are dropped
    pub not_query: NotQuery,
    pub verbosity: Verbosity,
    /// Write reports and transcript under `output_dir`
    pub persist: bool,
    pub output_dir: PathBuf,
    pub api_base: String,
    /// Lookup pool size; `None` derives it from available parallelism
    pub workers: Option<usize>,
    /// Force one lookup at a time
    pub sequential: bool,
    pub lookup_failure: LookupFailurePolicy,
    /// Per-request HTTP timeout
    pub timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            task_id: "3d-reconstruction".to_string(),
            items_per_page: MAX_ITEMS_PER_PAGE,
            min_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            max_date: NaiveDate::from_ymd_opt(2023, 7, 31).unwrap_or_default(),
            and_or_query: AndOrQuery::new([vec!["online", "progressive", "collab", "real-time", "end-to-end"]]),
            not_query: NotQuery::new([
                "facial",
                "human",
                "underwater",
                "road surface",
                "morphable",
                "deform",
                "x-ray",
                "histology",
                "endoscopic",
            ]),
            verbosity: Verbosity::Detailed,
            persist: true,
            output_dir: PathBuf::from("."),
            api_base: DEFAULT_API_BASE.to_string(),
            workers: None,
            sequential: false,
            lookup_failure: LookupFailurePolicy::Abort,
            timeout_secs: 30,
        }
    }
}

impl RunConfig {
    /// Load a TOML file; keys it omits keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| PwcError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PwcError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PwcError::Config(e.to_string()))
    }

    /// Check ranges the API and the date filter rely on.
    pub fn validate(&self) -> Result<()> {
        if self.task_id.trim().is_empty() {
            return Err(PwcError::Validation("task_id must not be empty".to_string()));
        }
        if self.items_per_page == 0 || self.items_per_page > MAX_ITEMS_PER_PAGE {
            return Err(PwcError::Validation(format!(
                "items_per_page must be between 1 and {}, got {}",
                MAX_ITEMS_PER_PAGE, self.items_per_page
            )));
        }
        if self.min_date > self.max_date {
            return Err(PwcError::Validation(format!(
                "min_date {} is after max_date {}",
                self.min_date, self.max_date
            )));
        }
        if self.workers == Some(0) {
            return Err(PwcError::Validation("workers must be at least 1".to_string()));
        }
        if self.and_or_query.has_empty_group() {
            return Err(PwcError::Validation(
                "and_or_query contains an empty OR-group".to_string(),
            ));
        }
        Ok(())
    }

    /// Lookup strategy, decided once per run.
    ///
    /// `sequential` wins over `workers`; without either the host is probed.
    pub fn strategy(&self) -> Strategy {
        match (self.sequential, self.workers) {
            (true, _) => Strategy::Sequential,
            (false, Some(workers)) => Strategy::Concurrent {
                workers: workers.max(1),
            },
            (false, None) => Strategy::detect(),
        }
    }

    pub fn enrich_options(&self) -> EnrichOptions {
        EnrichOptions {
            strategy: self.strategy(),
            failure_policy: self.lookup_failure,
        }
    }

    pub fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            date_range: DateRange {
                min: self.min_date,
                max: self.max_date,
            },
            and_or: self.and_or_query.clone(),
            not: self.not_query.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
