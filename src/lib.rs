//! # rustpwc
//!
//! PapersWithCode task retrieval and multi-stage filtering pipeline
//!
//! ## Modules
//!
//! - [`paperswithcode`] - Paginated task listing and repository-count lookups
//! - [`enricher`] - Bounded concurrent (or sequential) per-paper lookups
//! - [`matcher`] - AND-OR and NOT substring queries
//! - [`pipeline`] - Index-stable four-stage filter pipeline
//! - [`report`] - Plain-text stage reports
//! - [`transcript`] - Scoped stdout + `log.txt` mirroring
//! - [`config`] - Run configuration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustpwc::{config::RunConfig, paperswithcode::PwcClient, pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RunConfig::default();
//!     let client = PwcClient::new(&config.api_base, config.timeout())?;
//!     let listing = client.fetch_task_papers(&config.task_id, config.items_per_page).await?;
//!     let papers = &listing.papers;
//!     let summary = pipeline::run(
//!         papers,
//!         &config.filter_settings(),
//!         config.enrich_options(),
//!         |i| client.repository_count(&papers[i].id),
//!         None,
//!     )
//!     .await?;
//!     println!("{} of {} papers kept", summary.survivors.len(), summary.total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod enricher;
pub mod error;
pub mod matcher;
pub mod paperswithcode;
pub mod pipeline;
pub mod report;
pub mod transcript;

pub use error::{PwcError, Result};
