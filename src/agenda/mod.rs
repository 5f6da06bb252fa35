// Client for the public events dataset served by OpenDataSoft


use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use chrono::{Days, Local, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use ureq::Agent;
use url::Url;

use crate::config::AgendaConfig;
use crate::processing::RawRecord;

/// One page of the records endpoint
#[derive(Debug, Default, Deserialize)]
struct RecordsPage {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    results: Vec<Value>,
}

/// Why a single page request failed
#[derive(Debug, Error)]
enum PageError {
    #[error("HTTP error {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(ureq::Error),
    #[error("invalid response: {0:#}")]
    Body(anyhow::Error),
}

impl PageError {
    /// Timeouts, connection failures, server errors and rate limiting are worth another try
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status(status) => *status >= 500 || *status == 429,
            Self::Transport(error) => matches!(
                error,
                ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_)
            ),
            Self::Body(_) => false,
        }
    }
}

/// Paginated reader of the agenda records endpoint
#[derive(Debug, Clone)]
pub struct AgendaClient {
    agent: Agent,
    api_url: Url,
    page_size: u32,
    window_days: u32,
    max_retries: u32,
    retry_delay: Duration,
    rate_limit: Duration,
}

impl AgendaClient {
    #[inline]
    pub fn new(config: &AgendaConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .with_context(|| format!("Invalid agenda API URL: {}", config.api_url))?;

        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Ok(Self {
            agent,
            api_url,
            page_size: config.page_size.max(1),
            window_days: config.window_days,
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
            rate_limit: Duration::from_millis(config.rate_limit_ms),
        })
    }

    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[inline]
    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Fetch every event of a region whose first date lies within the configured
    /// window around today.
    ///
    /// Pagination stops on an empty page, once `total_count` records were collected,
    /// or when a page keeps failing; the records gathered up to that point are returned.
    #[inline]
    pub async fn fetch_events(&self, region: &str) -> Vec<RawRecord> {
        let today = Local::now().date_naive();
        let where_clause = where_clause(region, today, self.window_days);
        info!(
            "Fetching events for region {} from {}",
            region, self.api_url
        );
        debug!("Filter: {}", where_clause);

        let bar = if console::user_attended_stderr() {
            ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Fetching events {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut events: Vec<RawRecord> = Vec::new();
        let mut total_count: Option<usize> = None;
        let mut offset: usize = 0;
        let mut last_request: Option<Instant> = None;

        loop {
            self.apply_rate_limit(&mut last_request).await;

            let page = match self.get_page(&where_clause, offset).await {
                Ok(page) => page,
                Err(e) => {
                    error!(
                        "Stopping pagination at offset {} after error: {}",
                        offset, e
                    );
                    break;
                }
            };

            let total = *total_count.get_or_insert_with(|| {
                info!("{} events match the filter", page.total_count);
                bar.set_length(page.total_count as u64);
                page.total_count
            });
            if total == 0 {
                info!("No events found for region {}", region);
                break;
            }

            if page.results.is_empty() {
                debug!("Empty page at offset {}, stopping", offset);
                break;
            }

            debug!(
                "Fetched {} events at offset {}",
                page.results.len(),
                offset
            );
            events.extend(page.results.into_iter().map(RawRecord::from_api));
            bar.set_position(events.len() as u64);

            if events.len() >= total {
                break;
            }
            offset += self.page_size as usize;
        }

        bar.finish_and_clear();
        info!("Fetched {} events for region {}", events.len(), region);
        events
    }

    async fn get_page(&self, where_clause: &str, offset: usize) -> Result<RecordsPage> {
        let url = self.page_url(where_clause, offset);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!("Retrying page at offset {} (attempt {})", offset, attempt + 1);
                sleep(self.retry_delay).await;
            }

            let agent = self.agent.clone();
            let request_url = url.clone();
            let outcome = tokio::task::spawn_blocking(move || try_get(&agent, &request_url))
                .await
                .context("Page request task failed")?;

            match outcome {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    warn!("Retryable error for offset {}: {}", offset, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    return Err(anyhow!("Request for offset {} failed: {}", offset, e));
                }
            }
        }

        Err(last_error.map_or_else(
            || anyhow!("All retry attempts failed"),
            |e| anyhow!("Request for offset {} failed: {}", offset, e),
        ))
    }

    fn page_url(&self, where_clause: &str, offset: usize) -> Url {
        let mut url = self.api_url.clone();
        url.query_pairs_mut()
            .append_pair("where", where_clause)
            .append_pair("limit", &self.page_size.to_string())
            .append_pair("offset", &offset.to_string());
        url
    }

    async fn apply_rate_limit(&self, last_request: &mut Option<Instant>) {
        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < self.rate_limit {
                let sleep_duration = self.rate_limit - elapsed;
                debug!("Rate limiting: sleeping for {:?}", sleep_duration);
                sleep(sleep_duration).await;
            }
        }

        *last_request = Some(Instant::now());
    }
}

fn try_get(agent: &Agent, url: &Url) -> Result<RecordsPage, PageError> {
    debug!("Making HTTP GET request to: {}", url);

    match agent.get(url.as_str()).call() {
        Ok(mut response) => {
            let text = response
                .body_mut()
                .read_to_string()
                .map_err(PageError::Transport)?;
            serde_json::from_str(&text)
                .context("Failed to parse records page")
                .map_err(PageError::Body)
        }
        Err(ureq::Error::StatusCode(code)) => Err(PageError::Status(code)),
        Err(e) => Err(PageError::Transport(e)),
    }
}

/// ODSQL filter selecting a region's events starting within `window_days` of `today`
#[inline]
pub fn where_clause(region: &str, today: NaiveDate, window_days: u32) -> String {
    let window = Days::new(u64::from(window_days));
    let from = today.checked_sub_days(window).unwrap_or(NaiveDate::MIN);
    let to = today.checked_add_days(window).unwrap_or(NaiveDate::MAX);

    format!(
        "firstdate_begin >= date'{}' AND firstdate_begin <= date'{}' AND location_region=\"{}\"",
        from.format("%Y-%m-%d"),
        to.format("%Y-%m-%d"),
        region.replace('"', "\\\"")
    )
}
