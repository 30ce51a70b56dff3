use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result, format_server_error};
use crate::query::{SearchCriteria, encoded_query};
use crate::response::{CatalogRecord, SearchPage, normalize_page};
use crate::util::{append_query, backoff, search_url};

/// Status and body of one catalog request.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Issues authenticated GET requests against the hub.
///
/// The paginator only sees this seam, so it can be driven by scripted
/// responses instead of a live hub.
pub trait Transport {
    fn get(&self, url: &str) -> Result<RawResponse>;
}

/// Basic-auth transport over a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("scihub-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("scihub-rs")),
        );

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(config.timeout);

        if !config.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            http: builder.build()?,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn authorized(&self, url: &str) -> RequestBuilder {
        self.http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Sends the request and hands back the unread response, for streaming.
    pub(crate) fn send(&self, url: &str) -> Result<Response> {
        Ok(self.authorized(url).send()?)
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<RawResponse> {
        let resp = self.send(url)?;
        let status = resp.status();
        let body = resp.bytes()?.to_vec();
        Ok(RawResponse { status, body })
    }
}

/// Full result set of one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Result count declared by the hub.
    pub total_results: usize,
    /// Records in hub order, across all pages.
    pub records: Vec<CatalogRecord>,
}

/// Capability to run a catalog search to completion.
pub trait CatalogSearcher {
    fn search(&self, criteria: &SearchCriteria) -> Result<QueryResult>;
}

/// Query builder, paginator and normaliser bound to one hub.
#[derive(Debug, Clone)]
pub struct CatalogEngine<T = HttpTransport> {
    transport: T,
    base_url: String,
    rows: usize,
    retry_max: usize,
    retry_delay: Duration,
    sleep_max: Duration,
}

impl CatalogEngine<HttpTransport> {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new(config)?, config))
    }
}

impl<T: Transport> CatalogEngine<T> {
    pub fn with_transport(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            rows: config.rows.max(1),
            retry_max: config.retry_max,
            retry_delay: config.retry_delay,
            sleep_max: config.sleep_max,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Retrieves every page of an already encoded query URL.
    ///
    /// Stops once as many records as the hub declared have been collected.
    pub fn fetch_all(&self, query_url: &str) -> Result<QueryResult> {
        debug!(offset = 0, rows = self.rows, "requesting result page");
        let first = self.transport.get(query_url)?;
        if !first.status.is_success() {
            return Err(format_server_error(
                first.status,
                query_url,
                &String::from_utf8_lossy(&first.body),
            ));
        }

        let page = normalize_page(&first.body)?;
        let total = page.total_results;
        let mut records = page.records;
        let mut offset = self.rows;

        while records.len() < total {
            let next_url = append_query(query_url, "start", offset);
            let page = self.fetch_continuation(&next_url, offset)?;
            if page.records.is_empty() {
                return Err(Error::IncompleteResults {
                    declared: total,
                    received: records.len(),
                });
            }
            records.extend(page.records);
            offset += self.rows;
        }

        info!(total, received = records.len(), "search complete");
        Ok(QueryResult {
            total_results: total,
            records,
        })
    }

    /// Continuation pages are retried on non-success statuses with
    /// exponential backoff; transport errors abort immediately.
    fn fetch_continuation(&self, url: &str, offset: usize) -> Result<SearchPage> {
        let mut delay = self.retry_delay;
        let mut attempts = 0usize;

        loop {
            debug!(offset, rows = self.rows, "requesting result page");
            let resp = self.transport.get(url)?;
            attempts += 1;

            if resp.status.is_success() {
                return normalize_page(&resp.body);
            }

            if attempts > self.retry_max {
                return Err(Error::RetriesExhausted {
                    offset,
                    attempts,
                    status: resp.status.as_u16(),
                });
            }

            warn!(
                offset,
                status = resp.status.as_u16(),
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "result page failed, retrying"
            );
            thread::sleep(delay);
            delay = backoff(delay, self.sleep_max);
        }
    }
}

impl<T: Transport> CatalogSearcher for CatalogEngine<T> {
    fn search(&self, criteria: &SearchCriteria) -> Result<QueryResult> {
        let query = encoded_query(criteria, self.rows)?;
        let url = format!("{}?{}", search_url(&self.base_url), query);
        self.fetch_all(&url)
    }
}
