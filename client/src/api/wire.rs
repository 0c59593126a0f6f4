//! ReportPortal API v1 wire format: query parameters and response decoding.

use chrono::{DateTime, Utc};
use launch_report_core::{
    Attribute, ItemStatus, Launch, LaunchStatus, Page, PageInfo, QueryParams, TestItem,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{ReportError, Result};

/// Page size used when listing test items.
pub const ITEM_PAGE_SIZE: u32 = 100;

/// Query string for one launch-listing request.
///
/// # Examples
///
/// ```
/// use launch_report_client::api::launch_query;
/// use launch_report_core::{Attribute, QueryParams};
///
/// let mut params = QueryParams::new("shop", 2, 50);
/// params.tags = vec!["smoke".into()];
/// params.attributes = vec![Attribute::new("os", "linux")];
///
/// let query = launch_query(&params);
/// assert!(query.contains(&("page.page".to_string(), "2".to_string())));
/// assert!(query.contains(&(
///     "filter.has.compositeAttribute".to_string(),
///     "os:linux,smoke".to_string()
/// )));
/// ```
pub fn launch_query(params: &QueryParams) -> Vec<(String, String)> {
    let params = params.normalized();
    let mut query = vec![
        ("page.page".to_string(), params.page.to_string()),
        ("page.size".to_string(), params.limit.to_string()),
        ("page.sort".to_string(), "startTime,DESC".to_string()),
    ];
    if let Some(name) = params.name {
        query.push(("filter.cnt.name".to_string(), name));
    }
    if let Some(excluded) = params.exclude_name {
        query.push(("filter.!cnt.name".to_string(), excluded));
    }
    if let Some(status) = params.status {
        query.push(("filter.eq.status".to_string(), status.as_str().to_string()));
    }
    let composite: Vec<String> = params
        .attributes
        .iter()
        .map(|a| format!("{}:{}", a.key, a.value))
        .chain(params.tags.iter().cloned())
        .collect();
    if !composite.is_empty() {
        query.push(("filter.has.compositeAttribute".to_string(), composite.join(",")));
    }
    if let Some(from) = params.start_from {
        query.push((
            "filter.gte.startTime".to_string(),
            from.timestamp_millis().to_string(),
        ));
    }
    if let Some(to) = params.start_to {
        query.push((
            "filter.lte.startTime".to_string(),
            to.timestamp_millis().to_string(),
        ));
    }
    query
}

/// Query string for one page of failed leaf items of a launch.
pub fn item_query(launch_id: i64, page: u32) -> Vec<(String, String)> {
    vec![
        ("filter.eq.launchId".to_string(), launch_id.to_string()),
        ("filter.eq.hasChildren".to_string(), "false".to_string()),
        ("filter.in.status".to_string(), "FAILED".to_string()),
        ("page.page".to_string(), page.to_string()),
        ("page.size".to_string(), ITEM_PAGE_SIZE.to_string()),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePage {
    #[serde(default)]
    content: Vec<Value>,
    page: Option<WirePageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePageInfo {
    #[serde(default)]
    number: u32,
    #[serde(default)]
    size: u32,
    #[serde(default)]
    total_elements: u64,
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLaunch {
    id: i64,
    #[serde(default)]
    number: Option<i64>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    status: String,
    start_time: WireTime,
    #[serde(default)]
    attributes: Vec<WireAttribute>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    statistics: Option<WireStatistics>,
}

#[derive(Debug, Deserialize)]
struct WireAttribute {
    #[serde(default)]
    key: Option<String>,
    value: String,
}

#[derive(Debug, Deserialize)]
struct WireStatistics {
    #[serde(default)]
    executions: Option<WireExecutions>,
}

#[derive(Debug, Deserialize)]
struct WireExecutions {
    #[serde(default)]
    failed: u64,
}

/// `startTime` is epoch millis in API v5 and an RFC 3339 string in some
/// deployments.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTime {
    Millis(i64),
    Text(String),
}

impl WireTime {
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            Self::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireItem {
    id: i64,
    launch_id: i64,
    name: String,
    status: ItemStatus,
    #[serde(default)]
    parent: Option<i64>,
    #[serde(default)]
    path_names: Option<WirePathNames>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePathNames {
    #[serde(default)]
    item_paths: Vec<WirePathEntry>,
}

#[derive(Debug, Deserialize)]
struct WirePathEntry {
    id: i64,
    name: String,
}

impl WireItem {
    fn into_item(self) -> TestItem {
        let item = TestItem::new(self.id, self.launch_id, self.name, self.status);
        let Some(parent) = self.parent else {
            return item;
        };
        let suite_name = self
            .path_names
            .and_then(|p| p.item_paths.into_iter().find(|entry| entry.id == parent))
            .map(|entry| entry.name);
        item.with_suite(parent, suite_name)
    }
}

fn parse_envelope(raw: &Value) -> Result<(Vec<Value>, Option<WirePageInfo>)> {
    let page = WirePage::deserialize(raw).map_err(|e| ReportError::InvalidResponse {
        message: format!("unexpected page envelope: {e}"),
    })?;
    Ok((page.content, page.page))
}

fn page_info(info: Option<WirePageInfo>, len: usize) -> PageInfo {
    match info {
        Some(info) => PageInfo {
            number: info.number.max(1),
            size: info.size,
            total_elements: info.total_elements,
            total_pages: info.total_pages,
        },
        None => PageInfo {
            number: 1,
            size: len as u32,
            total_elements: len as u64,
            total_pages: 1,
        },
    }
}

fn decode_launch(value: Value) -> Result<Option<Launch>> {
    let wire: WireLaunch = serde_json::from_value(value).map_err(|e| {
        ReportError::InvalidResponse {
            message: format!("malformed launch record: {e}"),
        }
    })?;

    let status = match wire.status.parse::<LaunchStatus>() {
        Ok(status) => status,
        Err(err) => {
            warn!(launch_id = wire.id, error = %err, "skipping launch with unknown status");
            return Ok(None);
        }
    };
    let Some(start_time) = wire.start_time.to_datetime() else {
        return Err(ReportError::InvalidResponse {
            message: format!("launch {} has an unreadable startTime", wire.id),
        });
    };

    let mut attributes = Vec::new();
    let mut tags = Vec::new();
    for attr in wire.attributes {
        match attr.key.filter(|k| !k.is_empty()) {
            Some(key) => attributes.push(Attribute::new(key, attr.value)),
            None => {
                if !tags.contains(&attr.value) {
                    tags.push(attr.value);
                }
            }
        }
    }
    for tag in wire.tags {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let failed_count = wire
        .statistics
        .and_then(|s| s.executions)
        .map_or(0, |e| e.failed);

    Ok(Some(Launch {
        id: wire.id,
        number: wire.number,
        name: wire.name,
        description: wire.description.filter(|d| !d.is_empty()),
        status,
        start_time,
        attributes,
        tags,
        failed_count,
    }))
}

/// Decodes a launch-listing response body.
///
/// Launches with a status outside the five known values are dropped with a
/// warning.
///
/// # Errors
///
/// Returns [`ReportError::InvalidResponse`] when the body is not a page
/// envelope or a launch record is malformed.
pub fn decode_launch_page(raw: &Value) -> Result<Page<Launch>> {
    let (content, info) = parse_envelope(raw)?;
    let page = page_info(info, content.len());
    let mut launches = Vec::with_capacity(content.len());
    for value in content {
        if let Some(launch) = decode_launch(value)? {
            launches.push(launch);
        }
    }
    Ok(Page {
        content: launches,
        page,
    })
}

/// Decodes a test-item listing response body.
///
/// # Errors
///
/// Returns [`ReportError::InvalidResponse`] for a malformed body.
pub fn decode_item_page(raw: &Value) -> Result<Page<TestItem>> {
    let (content, info) = parse_envelope(raw)?;
    let page = page_info(info, content.len());
    let items = content
        .into_iter()
        .map(|value| {
            serde_json::from_value::<WireItem>(value)
                .map(WireItem::into_item)
                .map_err(|e| ReportError::InvalidResponse {
                    message: format!("malformed test item: {e}"),
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Page {
        content: items,
        page,
    })
}
