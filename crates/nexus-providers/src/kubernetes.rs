//! Cluster inspection through `kubectl ... -o json`.
//!
//! Every query shells out to the configured `kubectl` with the resolved
//! kubeconfig and decodes the JSON into the small subset of the API types
//! below. Failures of `kubectl` itself are tool errors; undecodable output
//! is a provider fault.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::OnceLock;

use async_trait::async_trait;
use nexus_config::{Config, expand_home};
use nexus_core::args::{clamp, clamp_count, get_bool, get_int, get_string, get_string_or};
use nexus_core::{
    ArgSchema, ArgType, Arguments, CallContext, Provider, ProviderError, ProviderResult,
    ToolDescriptor, ToolResult,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::command::{check_cli, run_cli};
use crate::filter::LineFilter;

/// Module name.
pub const MODULE_NAME: &str = "kubernetes";

const LIST_NAMESPACES: &str = "k8s_list_namespaces";
const LIST_PODS: &str = "k8s_list_pods";
const LIST_PODS_ALL: &str = "k8s_list_pods_all";
const GET_LOGS: &str = "k8s_get_logs";

// ---------------------------------------------------------------------------
// API subset
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct List<T> {
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ObjectMeta {
    name: String,
    namespace: String,
    creation_timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Namespace {
    metadata: ObjectMeta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Pod {
    metadata: ObjectMeta,
    spec: PodSpec,
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PodSpec {
    containers: Vec<ContainerSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContainerSpec {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PodStatus {
    phase: String,
    reason: String,
    message: String,
    conditions: Vec<PodCondition>,
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PodCondition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ContainerStatus {
    name: String,
    restart_count: i64,
    state: ContainerState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContainerState {
    waiting: Option<WaitingState>,
    running: Option<serde_json::Value>,
    terminated: Option<TerminatedState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WaitingState {
    reason: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TerminatedState {
    reason: String,
    exit_code: i64,
}

/// Deployment, daemonset, statefulset or job; only the selector matters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Workload {
    spec: WorkloadSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkloadSpec {
    selector: Option<LabelSelector>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LabelSelector {
    match_labels: BTreeMap<String, String>,
    match_expressions: Vec<LabelSelectorRequirement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LabelSelectorRequirement {
    key: String,
    operator: String,
    values: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Event {
    metadata: ObjectMeta,
    #[serde(rename = "type")]
    kind: String,
    reason: String,
    message: String,
    count: i64,
    event_time: Option<String>,
    last_timestamp: Option<String>,
}

impl Event {
    /// Most precise timestamp the event carries.
    fn time(&self) -> &str {
        self.event_time
            .as_deref()
            .or(self.last_timestamp.as_deref())
            .or(self.metadata.creation_timestamp.as_deref())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Workload kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Pod,
    Deployment,
    DaemonSet,
    StatefulSet,
    Job,
}

impl Kind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pod" | "pods" => Some(Self::Pod),
            "deployment" | "deploy" | "deployments" => Some(Self::Deployment),
            "daemonset" | "ds" | "daemonsets" => Some(Self::DaemonSet),
            "statefulset" | "sts" | "statefulsets" => Some(Self::StatefulSet),
            "job" | "jobs" => Some(Self::Job),
            _ => None,
        }
    }

    fn resource(self) -> &'static str {
        match self {
            Self::Pod => "pod",
            Self::Deployment => "deployment",
            Self::DaemonSet => "daemonset",
            Self::StatefulSet => "statefulset",
            Self::Job => "job",
        }
    }
}

// ---------------------------------------------------------------------------
// kubectl
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Kubectl {
    program: String,
    kubeconfig: Option<PathBuf>,
}

impl Kubectl {
    fn argv(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len().saturating_add(2));
        if let Some(path) = &self.kubeconfig {
            argv.push("--kubeconfig".to_string());
            argv.push(path.to_string_lossy().into_owned());
        }
        argv.extend(args.iter().map(|a| (*a).to_string()));
        argv
    }

    async fn text(&self, ctx: &CallContext, args: &[&str]) -> ProviderResult<Result<String, String>> {
        Ok(run_cli(ctx, &self.program, &self.argv(args))
            .await?
            .map(|out| out.stdout))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        args: &[&str],
    ) -> ProviderResult<Result<T, String>> {
        match self.text(ctx, args).await? {
            Ok(stdout) => Ok(Ok(serde_json::from_str(&stdout)?)),
            Err(e) => Ok(Err(e)),
        }
    }

    async fn pods(&self, ctx: &CallContext, namespace: &str) -> ProviderResult<Result<List<Pod>, String>> {
        self.get(ctx, &["get", "pods", "-n", namespace, "-o", "json"]).await
    }

    async fn pods_for_selector(
        &self,
        ctx: &CallContext,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> ProviderResult<Result<Vec<Pod>, String>> {
        let Some(selector) = selector else {
            return Ok(Err("selector not defined".to_string()));
        };
        let selector = match selector_string(selector) {
            Ok(s) => s,
            Err(e) => return Ok(Err(e)),
        };
        let mut args = vec!["get", "pods", "-n", namespace];
        if !selector.is_empty() {
            args.extend(["-l", selector.as_str()]);
        }
        args.extend(["-o", "json"]);
        Ok(self.get::<List<Pod>>(ctx, &args).await?.map(|l| l.items))
    }

    /// Newest `limit` events for a pod, formatted one per line.
    async fn pod_events(
        &self,
        ctx: &CallContext,
        namespace: &str,
        pod: &str,
        limit: usize,
    ) -> ProviderResult<String> {
        let selector = format!("involvedObject.kind=Pod,involvedObject.name={pod}");
        let args = ["get", "events", "-n", namespace, "--field-selector", &selector, "-o", "json"];
        Ok(match self.get::<List<Event>>(ctx, &args).await? {
            Ok(list) => format_events(list.items, limit),
            Err(e) => format!("failed to fetch events: {e}"),
        })
    }
}

/// Render a label selector the way `kubectl -l` expects it.
fn selector_string(selector: &LabelSelector) -> Result<String, String> {
    let mut parts: Vec<String> = selector
        .match_labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    for req in &selector.match_expressions {
        let values = req.values.join(",");
        parts.push(match req.operator.as_str() {
            "In" => format!("{} in ({values})", req.key),
            "NotIn" => format!("{} notin ({values})", req.key),
            "Exists" => req.key.clone(),
            "DoesNotExist" => format!("!{}", req.key),
            other => return Err(format!("{other:?} is not a valid label selector operator")),
        });
    }
    Ok(parts.join(","))
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

fn first_restart_count(pod: &Pod) -> i64 {
    pod.status
        .container_statuses
        .first()
        .map_or(0, |s| s.restart_count)
}

fn is_not_ready(pod: &Pod) -> bool {
    pod.status
        .conditions
        .iter()
        .any(|c| c.kind == "Ready" && c.status != "True")
}

fn pod_has_errors(pod: &Pod) -> bool {
    if matches!(pod.status.phase.as_str(), "Failed" | "Pending") || is_not_ready(pod) {
        return true;
    }
    pod.status.container_statuses.iter().any(|s| {
        s.restart_count > 0
            || s.state.waiting.as_ref().is_some_and(|w| !w.reason.is_empty())
            || s.state.terminated.as_ref().is_some_and(|t| t.exit_code != 0)
    })
}

fn pod_error_summary(pod: &Pod) -> String {
    let mut parts = Vec::new();
    parts.push(pod.status.reason.clone());
    if is_not_ready(pod) {
        parts.push("not-ready".to_string());
    }
    for s in &pod.status.container_statuses {
        if let Some(w) = s.state.waiting.as_ref().filter(|w| !w.reason.is_empty()) {
            parts.push(format!("{}:waiting({})", s.name, w.reason));
        }
        if let Some(t) = s.state.terminated.as_ref().filter(|t| t.exit_code != 0) {
            parts.push(format!("{}:exit({})", s.name, t.exit_code));
        }
        if s.restart_count > 0 {
            parts.push(format!("{}:restarts({})", s.name, s.restart_count));
        }
    }
    unique(parts).join(", ")
}

/// Drop empty and repeated entries, keeping first occurrences in order.
fn unique(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}

fn summarize_pod_status(pod: &Pod) -> String {
    let mut lines = Vec::new();
    if !pod.status.reason.is_empty() {
        lines.push(format!("Reason: {}", pod.status.reason));
    }
    if !pod.status.message.is_empty() {
        lines.push(format!("Message: {}", pod.status.message));
    }
    for s in &pod.status.container_statuses {
        let state = if let Some(w) = &s.state.waiting {
            format!("waiting({})", w.reason)
        } else if let Some(t) = &s.state.terminated {
            format!("terminated({})", t.reason)
        } else if s.state.running.is_some() {
            "running".to_string()
        } else {
            "unknown".to_string()
        };
        lines.push(format!(
            "Container {}: state={state} restarts={}",
            s.name, s.restart_count
        ));
    }
    lines.join("\n")
}

/// RFC 3339 UTC timestamp with the fractional seconds removed.
fn event_timestamp(ts: &str) -> String {
    match ts.strip_suffix('Z') {
        Some(base) => format!("{}Z", base.split('.').next().unwrap_or(base)),
        None => ts.to_string(),
    }
}

fn format_events(mut events: Vec<Event>, limit: usize) -> String {
    events.sort_by_cached_key(|e| std::cmp::Reverse(event_timestamp(e.time())));
    events.truncate(limit);
    events
        .iter()
        .map(|e| {
            format!(
                "- [{}] {} {} (count={}): {}",
                event_timestamp(e.time()),
                e.kind,
                e.reason,
                e.count,
                e.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_namespaces(namespaces: &[Namespace], max: usize) -> String {
    if namespaces.is_empty() {
        return "No namespaces found.".to_string();
    }
    let shown = &namespaces[..namespaces.len().min(max)];
    let mut out = format!(
        "Namespaces (showing {} of {}):\n",
        shown.len(),
        namespaces.len()
    );
    for ns in shown {
        let _ = writeln!(out, "- {}", ns.metadata.name);
    }
    out
}

fn format_pods(pods: &[Pod], namespace: &str) -> String {
    if pods.is_empty() {
        return format!("No pods found in namespace '{namespace}'.");
    }
    let mut out = String::new();
    for pod in pods {
        let _ = writeln!(
            out,
            "Pod: {} | Status: {} | Restarts: {}",
            pod.metadata.name,
            pod.status.phase,
            first_restart_count(pod)
        );
    }
    out
}

fn format_pods_all(pods: &[Pod], error_only: bool, max: usize) -> String {
    if pods.is_empty() {
        return "No pods found.".to_string();
    }
    let mut out = format!("Pods across all namespaces (error_only={error_only}):\n");
    let mut listed = 0usize;
    for pod in pods {
        if error_only && !pod_has_errors(pod) {
            continue;
        }
        listed = listed.saturating_add(1);
        let _ = write!(
            out,
            "- {}/{} | phase={}",
            pod.metadata.namespace, pod.metadata.name, pod.status.phase
        );
        let summary = pod_error_summary(pod);
        if !summary.is_empty() {
            let _ = write!(out, " | {summary}");
        }
        out.push('\n');
        if listed >= max {
            let _ = writeln!(out, "... truncated at {max} pods");
            break;
        }
    }
    if listed == 0 {
        return "No erroring pods found.".to_string();
    }
    out
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Read-only cluster inspection.
#[derive(Debug, Default)]
pub struct KubernetesProvider {
    kubectl: OnceLock<Kubectl>,
}

/// Options of a `k8s_get_logs` call.
#[derive(Debug)]
struct LogRequest {
    namespace: String,
    container: Option<String>,
    tail_lines: i64,
    since_seconds: i64,
    previous: bool,
    filter: LineFilter,
    event_limit: usize,
}

impl KubernetesProvider {
    /// Create an uninitialized provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn kubectl(&self) -> ProviderResult<&Kubectl> {
        self.kubectl.get().ok_or_else(|| ProviderError::NotInitialized {
            module: MODULE_NAME.to_string(),
        })
    }

    async fn list_namespaces(&self, ctx: &CallContext, args: &Arguments) -> ProviderResult<ToolResult> {
        let max = clamp_count(get_int(args, "max_namespaces", 200), 1, 1000);
        let kubectl = self.kubectl()?;
        Ok(
            match kubectl
                .get::<List<Namespace>>(ctx, &["get", "namespaces", "-o", "json"])
                .await?
            {
                Ok(list) => ToolResult::text(format_namespaces(&list.items, max)),
                Err(e) => ToolResult::error(format!("failed to list namespaces: {e}")),
            },
        )
    }

    async fn list_pods(&self, ctx: &CallContext, args: &Arguments) -> ProviderResult<ToolResult> {
        let namespace = get_string_or(args, "namespace", "default");
        Ok(match self.kubectl()?.pods(ctx, &namespace).await? {
            Ok(list) => ToolResult::text(format_pods(&list.items, &namespace)),
            Err(e) => ToolResult::error(format!("failed to list pods: {e}")),
        })
    }

    async fn list_pods_all(&self, ctx: &CallContext, args: &Arguments) -> ProviderResult<ToolResult> {
        let error_only = get_bool(args, "error_only", true);
        let max = clamp_count(get_int(args, "max_pods", 200), 1, 1000);
        let kubectl = self.kubectl()?;
        Ok(
            match kubectl
                .get::<List<Pod>>(ctx, &["get", "pods", "--all-namespaces", "-o", "json"])
                .await?
            {
                Ok(list) => ToolResult::text(format_pods_all(&list.items, error_only, max)),
                Err(e) => ToolResult::error(format!("failed to list pods across namespaces: {e}")),
            },
        )
    }

    async fn get_logs(&self, ctx: &CallContext, args: &Arguments) -> ProviderResult<ToolResult> {
        let kind_raw = get_string_or(args, "kind", "pod").to_lowercase();
        let Some(name) = get_string(args, "name") else {
            return Ok(ToolResult::error("name is required"));
        };
        let Some(kind) = Kind::parse(&kind_raw) else {
            return Ok(ToolResult::error(
                "kind must be one of: pod, deployment, daemonset, statefulset, job",
            ));
        };
        let request = LogRequest {
            namespace: get_string_or(args, "namespace", "default"),
            container: get_string(args, "container"),
            tail_lines: clamp(get_int(args, "tail_lines", 200), 1, 500),
            since_seconds: get_int(args, "since_seconds", 0),
            previous: get_bool(args, "previous", false),
            filter: LineFilter::new()
                .containing(&get_string(args, "contains").unwrap_or_default(), false)
                .error_only(get_bool(args, "error_only", true)),
            event_limit: clamp_count(get_int(args, "event_limit", 5), 1, 20),
        };
        let kubectl = self.kubectl()?;
        let ns = request.namespace.as_str();
        let resource = kind.resource();

        let pods = if kind == Kind::Pod {
            match kubectl
                .get::<Pod>(ctx, &["get", "pod", &name, "-n", ns, "-o", "json"])
                .await?
            {
                Ok(pod) => vec![pod],
                Err(e) => return Ok(ToolResult::error(format!("failed to get pod {name}: {e}"))),
            }
        } else {
            let workload = match kubectl
                .get::<Workload>(ctx, &["get", resource, &name, "-n", ns, "-o", "json"])
                .await?
            {
                Ok(w) => w,
                Err(e) => {
                    return Ok(ToolResult::error(format!(
                        "failed to get {resource} {name}: {e}"
                    )));
                },
            };
            match kubectl
                .pods_for_selector(ctx, ns, workload.spec.selector.as_ref())
                .await?
            {
                Ok(pods) => pods,
                Err(e) => {
                    return Ok(ToolResult::error(format!(
                        "failed to list pods for {resource} {name}: {e}"
                    )));
                },
            }
        };

        if pods.is_empty() {
            return Ok(ToolResult::text(format!(
                "No pods found for {kind_raw}/{name} in namespace {ns}."
            )));
        }

        let mut out = String::new();
        for pod in &pods {
            write_pod_logs(ctx, kubectl, pod, &request, &mut out).await?;
        }
        Ok(ToolResult::text(out))
    }
}

async fn write_pod_logs(
    ctx: &CallContext,
    kubectl: &Kubectl,
    pod: &Pod,
    req: &LogRequest,
    out: &mut String,
) -> ProviderResult<()> {
    let pod_name = pod.metadata.name.as_str();
    let ns = req.namespace.as_str();
    let _ = writeln!(out, "=== Pod: {pod_name} | Phase: {} ===", pod.status.phase);

    let status = summarize_pod_status(pod);
    if !status.is_empty() {
        let _ = writeln!(out, "{status}");
    }
    let events = kubectl.pod_events(ctx, ns, pod_name, req.event_limit).await?;
    if !events.is_empty() {
        let _ = writeln!(out, "Events:\n{events}");
    }

    let containers: Vec<&str> = match &req.container {
        Some(c) => vec![c.as_str()],
        None => pod.spec.containers.iter().map(|c| c.name.as_str()).collect(),
    };
    for container in containers {
        let tail = format!("--tail={}", req.tail_lines);
        let since = format!("--since={}s", req.since_seconds);
        let mut args = vec!["logs", pod_name, "-n", ns, "-c", container, tail.as_str()];
        if req.since_seconds > 0 {
            args.push(since.as_str());
        }
        if req.previous {
            args.push("--previous");
        }

        debug!(pod = pod_name, container, "fetching container logs");
        match kubectl.text(ctx, &args).await? {
            Ok(logs) => {
                let mut filtered = req.filter.apply(logs.trim_end());
                if filtered.is_empty() {
                    filtered = "(no matching log lines)".to_string();
                }
                let _ = writeln!(
                    out,
                    "[container {container}] tail={} since={}s previous={}\n{filtered}",
                    req.tail_lines, req.since_seconds, req.previous
                );
            },
            Err(e) => {
                let _ = writeln!(out, "[container {container}] log error: {e}");
            },
        }
    }
    out.push('\n');
    Ok(())
}

#[async_trait]
impl Provider for KubernetesProvider {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn enabled(&self, config: &Config) -> bool {
        config.modules.kubernetes.enabled
    }

    fn init(&self, config: &Config) -> ProviderResult<()> {
        let section = &config.modules.kubernetes;
        let path = expand_home(&section.kubeconfig);
        let kubeconfig = if path.is_file() {
            Some(path)
        } else {
            debug!(path = %path.display(), "kubeconfig not found, using kubectl defaults");
            None
        };
        check_cli(MODULE_NAME, &section.kubectl);
        info!(kubectl = %section.kubectl, "kubernetes module initialized");

        self.kubectl
            .set(Kubectl {
                program: section.kubectl.clone(),
                kubeconfig,
            })
            .map_err(|_| ProviderError::InitFailed {
                message: "kubernetes module initialized twice".to_string(),
            })
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        if self.kubectl.get().is_none() {
            return Vec::new();
        }
        vec![
            ToolDescriptor::read_only(LIST_NAMESPACES, "List all namespaces in the cluster.")
                .with_arg(ArgSchema::optional(
                    "max_namespaces",
                    ArgType::Number,
                    "Max namespaces to return (default 200, max 1000).",
                )),
            ToolDescriptor::read_only(
                LIST_PODS,
                "List all pods in a specific namespace. Use this to check app health.",
            )
            .with_arg(ArgSchema::required(
                "namespace",
                ArgType::String,
                "The namespace to query (e.g., 'default', 'kube-system')",
            )),
            ToolDescriptor::read_only(
                LIST_PODS_ALL,
                "List pods across all namespaces, optionally filtering to erroring pods.",
            )
            .with_arg(ArgSchema::optional(
                "error_only",
                ArgType::Boolean,
                "Only include pods with error conditions (default true).",
            ))
            .with_arg(ArgSchema::optional(
                "max_pods",
                ArgType::Number,
                "Max pods to return (default 200, max 1000).",
            )),
            ToolDescriptor::read_only(
                GET_LOGS,
                "Fetch error-focused logs for a pod or workload (deployment, daemonset, statefulset, job).",
            )
            .with_arg(ArgSchema::required("namespace", ArgType::String, "Kubernetes namespace (e.g., 'default')."))
            .with_arg(ArgSchema::required(
                "kind",
                ArgType::String,
                "Resource kind: pod, deployment, daemonset, statefulset, job.",
            ))
            .with_arg(ArgSchema::required("name", ArgType::String, "Resource name (pod/workload)."))
            .with_arg(ArgSchema::optional(
                "container",
                ArgType::String,
                "Container name (optional). If empty, all containers are included.",
            ))
            .with_arg(ArgSchema::optional(
                "tail_lines",
                ArgType::Number,
                "Max log lines per container (default 200, max 500).",
            ))
            .with_arg(ArgSchema::optional(
                "since_seconds",
                ArgType::Number,
                "Only return logs newer than this many seconds.",
            ))
            .with_arg(ArgSchema::optional(
                "previous",
                ArgType::Boolean,
                "Return logs from the previous container instance if it crashed.",
            ))
            .with_arg(ArgSchema::optional(
                "contains",
                ArgType::String,
                "Filter logs to lines containing this string (case-insensitive).",
            ))
            .with_arg(ArgSchema::optional(
                "error_only",
                ArgType::Boolean,
                "Only include common error patterns (recommended to reduce token usage).",
            ))
            .with_arg(ArgSchema::optional(
                "event_limit",
                ArgType::Number,
                "Max events to include per pod (default 5, max 20).",
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
            LIST_NAMESPACES => self.list_namespaces(ctx, args).await,
            LIST_PODS => self.list_pods(ctx, args).await,
            LIST_PODS_ALL => self.list_pods_all(ctx, args).await,
            GET_LOGS => self.get_logs(ctx, args).await,
            _ => Err(ProviderError::UnknownTool {
                tool: tool.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn pod(value: Value) -> Pod {
        serde_json::from_value(value).unwrap()
    }

    fn healthy_pod() -> Pod {
        pod(json!({
            "metadata": {"name": "api-1", "namespace": "prod"},
            "spec": {"containers": [{"name": "api"}]},
            "status": {
                "phase": "Running",
                "conditions": [{"type": "Ready", "status": "True"}],
                "containerStatuses": [
                    {"name": "api", "restartCount": 0, "state": {"running": {"startedAt": "2024-01-01T00:00:00Z"}}}
                ]
            }
        }))
    }

    fn crashing_pod() -> Pod {
        pod(json!({
            "metadata": {"name": "worker-7", "namespace": "jobs"},
            "spec": {"containers": [{"name": "worker"}, {"name": "sidecar"}]},
            "status": {
                "phase": "Running",
                "conditions": [{"type": "Ready", "status": "False"}],
                "containerStatuses": [
                    {"name": "worker", "restartCount": 4, "state": {"waiting": {"reason": "CrashLoopBackOff"}}},
                    {"name": "sidecar", "restartCount": 0, "state": {"terminated": {"reason": "Error", "exitCode": 137}}}
                ]
            }
        }))
    }

    // ---- Pod health ----

    #[test]
    fn test_healthy_pod_has_no_errors() {
        let p = healthy_pod();
        assert!(!pod_has_errors(&p));
        assert_eq!(pod_error_summary(&p), "");
    }

    #[test]
    fn test_crashing_pod_summary() {
        let p = crashing_pod();
        assert!(pod_has_errors(&p));
        assert_eq!(
            pod_error_summary(&p),
            "not-ready, worker:waiting(CrashLoopBackOff), worker:restarts(4), sidecar:exit(137)"
        );
    }

    #[test]
    fn test_pending_and_failed_phases_are_errors() {
        for phase in ["Pending", "Failed"] {
            let p = pod(json!({"status": {"phase": phase}}));
            assert!(pod_has_errors(&p), "{phase}");
        }
        assert!(!pod_has_errors(&pod(json!({"status": {"phase": "Succeeded"}}))));
    }

    #[test]
    fn test_evicted_pod() {
        let p = pod(json!({"status": {"phase": "Failed", "reason": "Evicted", "message": "low memory"}}));
        assert_eq!(pod_error_summary(&p), "Evicted");
        assert_eq!(summarize_pod_status(&p), "Reason: Evicted\nMessage: low memory");
    }

    #[test]
    fn test_summarize_container_states() {
        assert_eq!(
            summarize_pod_status(&crashing_pod()),
            "Container worker: state=waiting(CrashLoopBackOff) restarts=4\n\
             Container sidecar: state=terminated(Error) restarts=0"
        );
        assert_eq!(
            summarize_pod_status(&healthy_pod()),
            "Container api: state=running restarts=0"
        );
    }

    // ---- Listing ----

    #[test]
    fn test_format_pods() {
        let out = format_pods(&[healthy_pod(), crashing_pod()], "prod");
        assert_eq!(
            out,
            "Pod: api-1 | Status: Running | Restarts: 0\nPod: worker-7 | Status: Running | Restarts: 4\n"
        );
        assert_eq!(format_pods(&[], "empty"), "No pods found in namespace 'empty'.");
    }

    #[test]
    fn test_format_pods_all_error_only() {
        let out = format_pods_all(&[healthy_pod(), crashing_pod()], true, 200);
        assert_eq!(
            out,
            "Pods across all namespaces (error_only=true):\n\
             - jobs/worker-7 | phase=Running | not-ready, worker:waiting(CrashLoopBackOff), worker:restarts(4), sidecar:exit(137)\n"
        );
        assert_eq!(
            format_pods_all(&[healthy_pod()], true, 200),
            "No erroring pods found."
        );
    }

    #[test]
    fn test_format_pods_all_truncates() {
        let out = format_pods_all(&[healthy_pod(), crashing_pod()], false, 1);
        assert_eq!(
            out,
            "Pods across all namespaces (error_only=false):\n- prod/api-1 | phase=Running\n... truncated at 1 pods\n"
        );
    }

    #[test]
    fn test_format_namespaces() {
        let list: List<Namespace> = serde_json::from_value(json!({
            "items": [{"metadata": {"name": "default"}}, {"metadata": {"name": "kube-system"}}, {"metadata": {"name": "prod"}}]
        }))
        .unwrap();
        assert_eq!(
            format_namespaces(&list.items, 2),
            "Namespaces (showing 2 of 3):\n- default\n- kube-system\n"
        );
        assert_eq!(format_namespaces(&[], 2), "No namespaces found.");
    }

    // ---- Selectors and events ----

    #[test]
    fn test_selector_string() {
        let selector: LabelSelector = serde_json::from_value(json!({
            "matchLabels": {"tier": "web", "app": "shop"},
            "matchExpressions": [
                {"key": "env", "operator": "In", "values": ["prod", "staging"]},
                {"key": "canary", "operator": "DoesNotExist"},
                {"key": "zone", "operator": "Exists"}
            ]
        }))
        .unwrap();
        assert_eq!(
            selector_string(&selector).unwrap(),
            "app=shop,tier=web,env in (prod,staging),!canary,zone"
        );
    }

    #[test]
    fn test_selector_bad_operator() {
        let selector: LabelSelector = serde_json::from_value(json!({
            "matchExpressions": [{"key": "a", "operator": "Near"}]
        }))
        .unwrap();
        assert!(selector_string(&selector).is_err());
    }

    #[test]
    fn test_format_events_newest_first() {
        let list: List<Event> = serde_json::from_value(json!({"items": [
            {"type": "Normal", "reason": "Pulled", "message": "pulled", "count": 1,
             "lastTimestamp": "2024-05-01T10:00:00Z"},
            {"type": "Warning", "reason": "BackOff", "message": "back-off restarting", "count": 7,
             "eventTime": "2024-05-01T10:05:00.123456Z"},
            {"type": "Normal", "reason": "Scheduled", "message": "assigned",
             "metadata": {"creationTimestamp": "2024-05-01T09:00:00Z"}}
        ]}))
        .unwrap();
        assert_eq!(
            format_events(list.items, 2),
            "- [2024-05-01T10:05:00Z] Warning BackOff (count=7): back-off restarting\n\
             - [2024-05-01T10:00:00Z] Normal Pulled (count=1): pulled"
        );
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!(Kind::parse("deploy"), Some(Kind::Deployment));
        assert_eq!(Kind::parse("ds"), Some(Kind::DaemonSet));
        assert_eq!(Kind::parse("sts"), Some(Kind::StatefulSet));
        assert_eq!(Kind::parse("jobs"), Some(Kind::Job));
        assert_eq!(Kind::parse("cronjob"), None);
    }

    #[test]
    fn test_kubeconfig_flag_only_when_present() {
        let without = Kubectl {
            program: "kubectl".to_string(),
            kubeconfig: None,
        };
        assert_eq!(without.argv(&["get", "pods"]), ["get", "pods"]);

        let with = Kubectl {
            program: "kubectl".to_string(),
            kubeconfig: Some(PathBuf::from("/tmp/kc")),
        };
        assert_eq!(
            with.argv(&["get", "pods"]),
            ["--kubeconfig", "/tmp/kc", "get", "pods"]
        );
    }

    // ---- Calls (fake kubectl) ----

    #[cfg(unix)]
    fn provider_with_fake_kubectl(dir: &std::path::Path, script: &str) -> KubernetesProvider {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("kubectl");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = Config::default();
        config.modules.kubernetes.kubectl = path.to_string_lossy().into_owned();
        config.modules.kubernetes.kubeconfig = dir.join("missing-kubeconfig").to_string_lossy().into_owned();
        let provider = KubernetesProvider::new();
        provider.init(&config).unwrap();
        provider
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_pods_via_kubectl() {
        let dir = tempfile::tempdir().unwrap();
        let pods = json!({"items": [{
            "metadata": {"name": "web-1"},
            "status": {"phase": "Running", "containerStatuses": [{"name": "web", "restartCount": 2}]}
        }]});
        std::fs::write(dir.path().join("pods.json"), pods.to_string()).unwrap();
        let script = format!(
            "[ \"$*\" = \"get pods -n shop -o json\" ] || {{ echo \"unexpected: $*\" >&2; exit 1; }}\ncat {}",
            dir.path().join("pods.json").display()
        );
        let provider = provider_with_fake_kubectl(dir.path(), &script);

        let result = provider
            .handle_call(&CallContext::default(), LIST_PODS, &args(json!({"namespace": "shop"})))
            .await
            .unwrap();
        assert!(!result.is_error, "{}", result.text_content());
        assert_eq!(
            result.text_content(),
            "Pod: web-1 | Status: Running | Restarts: 2\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kubectl_failure_is_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider_with_fake_kubectl(
            dir.path(),
            "echo 'error: You must be logged in to the server (Unauthorized)' >&2; exit 1",
        );
        let result = provider
            .handle_call(&CallContext::default(), LIST_NAMESPACES, &Arguments::new())
            .await
            .unwrap();
        assert!(result.is_error);
        let text = result.text_content();
        assert!(text.starts_with("failed to list namespaces: "), "{text}");
        assert!(text.contains("Unauthorized"), "{text}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deployment_logs_via_kubectl() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, value: Value| {
            std::fs::write(dir.path().join(name), value.to_string()).unwrap();
        };
        write(
            "deploy.json",
            json!({"spec": {"selector": {"matchLabels": {"app": "web"}}}}),
        );
        write(
            "pods.json",
            json!({"items": [{
                "metadata": {"name": "web-1"},
                "spec": {"containers": [{"name": "app"}]},
                "status": {"phase": "Running", "containerStatuses": [
                    {"name": "app", "restartCount": 1, "state": {"running": {}}}
                ]}
            }]}),
        );
        write(
            "events.json",
            json!({"items": [{"type": "Warning", "reason": "BackOff", "count": 3,
                              "message": "Back-off restarting", "lastTimestamp": "2024-05-01T10:00:00Z"}]}),
        );
        let d = dir.path().display();
        let script = format!(
            r#"case "$*" in
  "get deployment web -n default -o json") cat {d}/deploy.json ;;
  "get pods -n default -l app=web -o json") cat {d}/pods.json ;;
  "get events -n default --field-selector involvedObject.kind=Pod,involvedObject.name=web-1 -o json") cat {d}/events.json ;;
  "logs web-1 -n default -c app --tail=50") printf 'listening\nERROR db timeout\nok\n' ;;
  *) echo "unexpected: $*" >&2; exit 1 ;;
esac"#
        );
        let provider = provider_with_fake_kubectl(dir.path(), &script);

        let result = provider
            .handle_call(
                &CallContext::default(),
                GET_LOGS,
                &args(json!({"kind": "Deployment", "name": "web", "tail_lines": 50})),
            )
            .await
            .unwrap();
        assert!(!result.is_error, "{}", result.text_content());
        assert_eq!(
            result.text_content(),
            "=== Pod: web-1 | Phase: Running ===\n\
             Container app: state=running restarts=1\n\
             Events:\n\
             - [2024-05-01T10:00:00Z] Warning BackOff (count=3): Back-off restarting\n\
             [container app] tail=50 since=0s previous=false\n\
             ERROR db timeout\n\n"
        );
    }

    #[tokio::test]
    async fn test_get_logs_validation() {
        let provider = KubernetesProvider::new();
        provider.init(&Config::default()).unwrap();

        let missing = provider
            .handle_call(&CallContext::default(), GET_LOGS, &args(json!({"kind": "pod"})))
            .await
            .unwrap();
        assert_eq!(missing.text_content(), "name is required");

        let bad_kind = provider
            .handle_call(
                &CallContext::default(),
                GET_LOGS,
                &args(json!({"kind": "cronjob", "name": "x"})),
            )
            .await
            .unwrap();
        assert!(bad_kind.is_error);
        assert_eq!(
            bad_kind.text_content(),
            "kind must be one of: pod, deployment, daemonset, statefulset, job"
        );
    }

    #[tokio::test]
    async fn test_call_before_init() {
        let result = KubernetesProvider::new()
            .handle_call(&CallContext::default(), LIST_PODS, &Arguments::new())
            .await;
        assert!(matches!(result, Err(ProviderError::NotInitialized { .. })));
    }
}
