//! PapersWithCode API client.
//!
//! Provides the two collaborator endpoints the pipeline needs:
//!
//! - Task listing: `GET /tasks/{task}/papers/`, paginated through a `next` URL
//! - Repository count: `GET /papers/{id}/repositories/`
//!
//! API Details:
//! - Page numbers start at 1
//! - At most 500 items per page
//! - Every listing response carries the server-side total in `count`

use crate::error::{PwcError, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// PapersWithCode API base URL
pub const DEFAULT_API_BASE: &str = "https://paperswithcode.com/api/v1";

/// Maximum items per listing page (server limit)
pub const MAX_ITEMS_PER_PAGE: u32 = 500;

/// A paper as returned by the task listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paper {
    /// PapersWithCode paper ID (may be empty)
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    /// Publication date, `None` when missing or unparsable
    #[serde(default, deserialize_with = "lenient_date")]
    pub published: Option<NaiveDate>,
}

impl Paper {
    /// Lower-cased `title + " " + abstract`, the text keyword queries run against.
    pub fn search_text(&self) -> String {
        format!(
            "{} {}",
            self.title.to_lowercase(),
            self.abstract_text.as_deref().unwrap_or_default().to_lowercase()
        )
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        let day = s.get(..10).unwrap_or(&s);
        match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(e) => {
                warn!(value = %s, error = %e, "Unparsable publication date");
                None
            }
        }
    }))
}

/// All papers of a task, in server order.
#[derive(Debug, Clone)]
pub struct Listing {
    pub papers: Vec<Paper>,
    /// Number of pages fetched
    pub pages: usize,
    /// `count` from the last response
    pub reported_total: u64,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    count: u64,
    next: Option<String>,
    #[serde(default)]
    results: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
struct RepositoriesResponse {
    count: u64,
}

/// PapersWithCode API client
#[derive(Debug, Clone)]
pub struct PwcClient {
    client: Client,
    base_url: String,
}

impl PwcClient {
    /// Create a new client against `base_url`
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. [`DEFAULT_API_BASE`]
    /// * `timeout` - Per-request transport timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(base_url)
            .map_err(|e| PwcError::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PwcError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Listing endpoint for a task
    pub fn task_papers_url(&self, task_id: &str) -> String {
        format!("{}/tasks/{}/papers/", self.base_url, urlencoding::encode(task_id))
    }

    /// Repository endpoint for a paper
    pub fn repositories_url(&self, paper_id: &str) -> String {
        format!("{}/papers/{}/repositories/", self.base_url, urlencoding::encode(paper_id))
    }

    /// Fetch every page of a task's paper listing.
    ///
    /// Starts at page 1 and follows `next` until it is null. The number of
    /// concatenated papers must equal the final reported `count`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-success statuses, malformed JSON, an
    /// out-of-range `items_per_page` or a count mismatch.
    pub async fn fetch_task_papers(&self, task_id: &str, items_per_page: u32) -> Result<Listing> {
        if items_per_page == 0 || items_per_page > MAX_ITEMS_PER_PAGE {
            return Err(PwcError::Config(format!(
                "items_per_page must be between 1 and {}, got {}",
                MAX_ITEMS_PER_PAGE, items_per_page
            )));
        }

        info!("Retrieving pages of '{}'", task_id);

        let first = self
            .client
            .get(self.task_papers_url(task_id))
            .query(&[("page", 1u32), ("items_per_page", items_per_page)]);

        let mut page_no = 1usize;
        let mut page = self.fetch_page(first).await?;
        info!(page = page_no, count = page.results.len(), "Fetching page {}... contains {} papers", page_no, page.results.len());

        let mut papers = std::mem::take(&mut page.results);

        while let Some(next) = page.next.take() {
            page_no += 1;
            debug!(url = %next, page = page_no, "Following next page");
            page = self.fetch_page(self.client.get(&next)).await?;
            info!(page = page_no, count = page.results.len(), "Fetching page {}... contains {} papers", page_no, page.results.len());
            papers.append(&mut page.results);
        }

        info!("Retrieval done!");
        info!("Total pages retrieved  = {}", page_no);
        info!("Total papers retrieved = {}", papers.len());

        if papers.len() as u64 != page.count {
            return Err(PwcError::Consistency {
                reported: page.count,
                retrieved: papers.len(),
            });
        }

        Ok(Listing {
            papers,
            pages: page_no,
            reported_total: page.count,
        })
    }

    async fn fetch_page(&self, request: reqwest::RequestBuilder) -> Result<PageResponse> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(PwcError::Api {
                code: status.as_u16(),
                message: format!("PapersWithCode listing error: {}", status),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Number of code repositories linked to a paper.
    pub async fn repository_count(&self, paper_id: &str) -> Result<u64> {
        let response = self.client.get(self.repositories_url(paper_id)).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(PwcError::Api {
                code: status.as_u16(),
                message: format!("PapersWithCode repositories error for '{}': {}", paper_id, status),
            });
        }

        let body = response.text().await?;
        let data: RepositoriesResponse = serde_json::from_str(&body)?;
        Ok(data.count)
    }
}
