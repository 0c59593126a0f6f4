//! Blocking HTTP client for the ReportPortal REST API.

use std::time::Duration;

use launch_report_core::{ItemStatus, Launch, Page, QueryParams, TestItem};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::wire::{decode_item_page, decode_launch_page, item_query, launch_query};
use crate::config::{Credentials, ResolvedConfig};
use crate::error::{ReportError, Result};

/// User agent sent with every request.
pub const USER_AGENT_VALUE: &str = concat!("launch-report/", env!("CARGO_PKG_VERSION"));

/// A decoded launch page together with the response body it came from.
#[derive(Debug, Clone)]
pub struct LaunchPage {
    pub page: Page<Launch>,
    /// Response body exactly as received, for caching.
    pub raw: Value,
}

/// Operations the pipeline needs from the reporting service.
pub trait LaunchApi {
    /// Fetches one page of launches matching `params`.
    fn fetch_launches(&self, params: &QueryParams) -> Result<LaunchPage>;

    /// Fetches every FAILED leaf item of a launch, across all item pages.
    fn fetch_test_items(&self, launch_id: i64) -> Result<Vec<TestItem>>;
}

/// HTTP implementation of [`LaunchApi`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    project: String,
    credentials: Credentials,
    timeout: Duration,
}

impl ApiClient {
    /// Builds a client from resolved settings.
    ///
    /// SSL verification, timeout and credentials are fixed for the lifetime
    /// of the client.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Network`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &ResolvedConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        if !config.verify_ssl {
            warn!(base_url = %config.base_url, "SSL certificate verification is disabled");
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| ReportError::Network {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project: config.project.clone(),
            credentials: config.credentials.clone(),
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, project: &str, resource: &str) -> String {
        format!("{}/api/v1/{}/{}", self.base_url, project, resource)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::Bearer(token) => request.bearer_auth(token),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }

    /// Maps a transport failure, filling in the configured timeout.
    fn transport_error(&self, url: &str, err: reqwest::Error) -> ReportError {
        if err.is_timeout() {
            ReportError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            ReportError::from(err)
        }
    }

    /// Issues one GET and returns the parsed JSON body.
    fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        info!(endpoint = %url, params = ?query, "GET");

        let request = self.authorize(self.client.get(url).query(query));
        let response = request.send().map_err(|e| self.transport_error(url, e))?;
        let status = response.status();
        let body = response.text().map_err(|e| self.transport_error(url, e))?;
        debug!(endpoint = %url, status = status.as_u16(), bytes = body.len(), "response received");

        if !status.is_success() {
            return Err(ReportError::api(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| ReportError::InvalidResponse {
            message: format!("response from {url} is not JSON: {e}"),
        })
    }
}

impl LaunchApi for ApiClient {
    fn fetch_launches(&self, params: &QueryParams) -> Result<LaunchPage> {
        let url = self.endpoint(&params.project, "launch");
        let raw = self.get_json(&url, &launch_query(params))?;
        let page = decode_launch_page(&raw)?;
        debug!(
            page = page.page.number,
            total_pages = page.page.total_pages,
            launches = page.content.len(),
            "decoded launch page"
        );
        Ok(LaunchPage { page, raw })
    }

    fn fetch_test_items(&self, launch_id: i64) -> Result<Vec<TestItem>> {
        let url = self.endpoint(&self.project, "item");
        let mut items = Vec::new();
        let mut page_number = 1;
        loop {
            let raw = self.get_json(&url, &item_query(launch_id, page_number))?;
            let page = decode_item_page(&raw)?;
            // Stop on the requested page number, not the echoed one.
            let last = page.content.is_empty() || page_number >= page.page.total_pages;
            items.extend(page.content);
            if last {
                break;
            }
            page_number += 1;
        }
        // The server-side status filter is advisory on older deployments.
        items.retain(|item| item.status == ItemStatus::Failed);
        debug!(launch_id, failed = items.len(), "fetched failed test items");
        Ok(items)
    }
}
