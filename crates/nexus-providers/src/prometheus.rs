//! Instant PromQL queries against a Prometheus HTTP API.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use nexus_config::Config;
use nexus_core::args::get_string;
use nexus_core::{
    ArgSchema, ArgType, Arguments, CallContext, Provider, ProviderError, ProviderResult,
    ToolDescriptor, ToolResult,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

/// Module name.
pub const MODULE_NAME: &str = "prometheus";

const QUERY_TOOL: &str = "prometheus_query_metric";

#[derive(Debug)]
struct PrometheusSettings {
    base_url: String,
    client: reqwest::Client,
}

/// Runs PromQL instant queries.
#[derive(Debug, Default)]
pub struct PrometheusProvider {
    settings: OnceLock<PrometheusSettings>,
}

impl PrometheusProvider {
    /// Create an uninitialized provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn settings(&self) -> ProviderResult<&PrometheusSettings> {
        self.settings.get().ok_or_else(|| ProviderError::NotInitialized {
            module: MODULE_NAME.to_string(),
        })
    }

    async fn query(&self, ctx: &CallContext, args: &Arguments) -> ProviderResult<ToolResult> {
        let settings = self.settings()?;
        let Some(query) = get_string(args, "query") else {
            return Ok(ToolResult::error("query is required"));
        };
        let endpoint = match build_query_url(&settings.base_url, &query) {
            Ok(url) => url,
            Err(e) => return Ok(ToolResult::error(format!("invalid prometheus url: {e}"))),
        };

        debug!(%endpoint, "querying prometheus");
        let response = tokio::select! {
            () = ctx.cancelled() => return Err(ProviderError::Cancelled),
            response = settings.client.get(endpoint).send() => response,
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => return Ok(ToolResult::error(format!("failed to query prometheus: {e}"))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::error(format!(
                "prometheus returned status {}",
                status.as_u16()
            )));
        }

        let body = tokio::select! {
            () = ctx.cancelled() => return Err(ProviderError::Cancelled),
            body = response.bytes() => body,
        };
        let body = match body {
            Ok(body) => body,
            Err(e) => return Ok(ToolResult::error(format!("failed to query prometheus: {e}"))),
        };
        let payload: QueryResponse = serde_json::from_slice(&body)?;
        if payload.status != "success" {
            return Ok(ToolResult::error(match payload.error {
                Some(e) if !e.is_empty() => format!("prometheus error: {e}"),
                _ => "prometheus query failed".to_string(),
            }));
        }
        Ok(ToolResult::text(format_result(&payload.data, &query)))
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: QueryData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    #[serde(default)]
    result_type: String,
    /// Series objects for vector/matrix, a bare `[time, value]` pair for
    /// scalar/string.
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    value: Option<Vec<Value>>,
    #[serde(default)]
    values: Option<Vec<Vec<Value>>>,
}

/// `<base>/api/v1/query?query=<q>`, keeping other query parameters.
fn build_query_url(base: &str, query: &str) -> Result<Url, String> {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return Err("base url is empty".to_string());
    }
    let mut url = Url::parse(trimmed).map_err(|e| e.to_string())?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err("base url must include scheme and host".to_string());
    }

    let path = format!("{}/api/v1/query", url.path().trim_end_matches('/'));
    url.set_path(&path);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "query")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("query", query);
    Ok(url)
}

fn format_result(data: &QueryData, query: &str) -> String {
    let rows = rows(&data.result);
    if rows.is_empty() {
        return format!("prometheus: query={query:?} returned no data");
    }
    let mut out = format!("prometheus: query={query:?} resultType={}", data.result_type);
    for row in rows {
        let _ = write!(out, "\n- {row}");
    }
    out
}

fn rows(result: &Value) -> Vec<String> {
    match result {
        // scalar and string results: [time, "value"]
        Value::Array(pair) if pair.first().is_some_and(|v| !v.is_object()) => {
            vec![format!("value={}", format_sample(pair))]
        },
        Value::Array(items) => items
            .iter()
            .filter_map(|item| serde_json::from_value::<Series>(item.clone()).ok())
            .map(|series| format_series(&series))
            .collect(),
        _ => Vec::new(),
    }
}

fn format_series(series: &Series) -> String {
    let metric = format_metric(&series.metric);
    match (&series.value, &series.values) {
        (Some(sample), _) => format!("metric={metric} value={}", format_sample(sample)),
        (None, Some(samples)) => match samples.last() {
            Some(last) => format!(
                "metric={metric} value={} ({} samples)",
                format_sample(last),
                samples.len()
            ),
            None => format!("metric={metric} value=unknown"),
        },
        (None, None) => format!("metric={metric} value=unknown"),
    }
}

/// `{k="v", ...}` with keys sorted.
fn format_metric(metric: &BTreeMap<String, String>) -> String {
    if metric.is_empty() {
        return "{}".to_string();
    }
    let parts: Vec<String> = metric.iter().map(|(k, v)| format!("{k}={v:?}")).collect();
    format!("{{{}}}", parts.join(", "))
}

/// `value @ timestamp` from a `[timestamp, "value"]` pair.
fn format_sample(sample: &[Value]) -> String {
    match sample {
        [ts, value, ..] => format!("{} @ {}", scalar(value), scalar(ts)),
        _ => "unknown".to_string(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Provider for PrometheusProvider {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn enabled(&self, config: &Config) -> bool {
        config.modules.prometheus.enabled
    }

    fn init(&self, config: &Config) -> ProviderResult<()> {
        let section = &config.modules.prometheus;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(section.timeout_secs))
            .build()
            .map_err(|e| ProviderError::InitFailed {
                message: format!("failed to build prometheus client: {e}"),
            })?;
        info!(url = %section.url, timeout_secs = section.timeout_secs, "prometheus module initialized");

        self.settings
            .set(PrometheusSettings {
                base_url: section.url.clone(),
                client,
            })
            .map_err(|_| ProviderError::InitFailed {
                message: "prometheus module initialized twice".to_string(),
            })
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        if self.settings.get().is_none() {
            return Vec::new();
        }
        vec![
            ToolDescriptor::read_only(QUERY_TOOL, "Query a Prometheus metric using PromQL.")
                .with_arg(ArgSchema::required(
                    "query",
                    ArgType::String,
                    "PromQL query string",
                )),
        ]
    }

    async fn handle_call(
        &self,
        ctx: &CallContext,
        tool: &str,
        args: &Arguments,
    ) -> ProviderResult<ToolResult> {
        match tool {
            QUERY_TOOL => self.query(ctx, args).await,
            _ => Err(ProviderError::UnknownTool {
                tool: tool.to_string(),
            }),
        }
    }
}
