//! Configuration types for the Nexus gateway.
//!
//! Every struct implements [`Default`] with the production defaults, and
//! deserializes with `#[serde(default)]` so omitted keys keep them.

use serde::{Deserialize, Serialize};

/// Default server name.
pub const DEFAULT_SERVER_NAME: &str = "Nexus";
/// Default server version string.
pub const DEFAULT_SERVER_VERSION: &str = "v0.0.1";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Default confirmation prompt timeout.
pub const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 120;
/// Default kubeconfig location.
pub const DEFAULT_KUBECONFIG: &str = "~/.kube/config";
/// Default kubectl binary.
pub const DEFAULT_KUBECTL: &str = "kubectl";
/// Default Prometheus endpoint.
pub const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";
/// Default Prometheus HTTP timeout.
pub const DEFAULT_PROMETHEUS_TIMEOUT_SECS: u64 = 15;
/// Default docker binary.
pub const DEFAULT_DOCKER_CLI: &str = "docker";
/// Default byte budget for log reads and plugin output.
pub const DEFAULT_MAX_BYTES: i64 = 256 * 1024;
/// Default line budget.
pub const DEFAULT_MAX_LINES: i64 = 200;
/// Default plugins directory.
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server identity and global switches.
    pub server: ServerSection,
    /// Tool policy patterns.
    pub policy: PolicySection,
    /// Per-module settings.
    pub modules: ModulesSection,
}

impl Config {
    /// Replace empty strings and non-positive limits with their defaults.
    pub fn apply_defaults(&mut self) {
        let server = &mut self.server;
        fill_str(&mut server.name, DEFAULT_SERVER_NAME);
        fill_str(&mut server.version, DEFAULT_SERVER_VERSION);
        fill_str(&mut server.log_level, DEFAULT_LOG_LEVEL);
        if server.confirm_timeout_secs == 0 {
            server.confirm_timeout_secs = DEFAULT_CONFIRM_TIMEOUT_SECS;
        }

        let m = &mut self.modules;
        fill_str(&mut m.kubernetes.kubeconfig, DEFAULT_KUBECONFIG);
        fill_str(&mut m.kubernetes.kubectl, DEFAULT_KUBECTL);
        fill_str(&mut m.prometheus.url, DEFAULT_PROMETHEUS_URL);
        if m.prometheus.timeout_secs == 0 {
            m.prometheus.timeout_secs = DEFAULT_PROMETHEUS_TIMEOUT_SECS;
        }
        fill_limit(&mut m.logs.max_bytes, DEFAULT_MAX_BYTES);
        fill_limit(&mut m.logs.max_lines, DEFAULT_MAX_LINES);
        fill_str(&mut m.docker.cli, DEFAULT_DOCKER_CLI);
        fill_limit(&mut m.docker.max_lines, DEFAULT_MAX_LINES);
        fill_str(&mut m.plugins.dir, DEFAULT_PLUGINS_DIR);
        fill_limit(&mut m.plugins.max_bytes, DEFAULT_MAX_BYTES);
    }
}

fn fill_str(field: &mut String, default: &str) {
    if field.trim().is_empty() {
        *field = default.to_string();
    }
}

fn fill_limit(field: &mut i64, default: i64) {
    if *field <= 0 {
        *field = default;
    }
}

// ---------------------------------------------------------------------------
// ServerSection
// ---------------------------------------------------------------------------

/// Server identity and global switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Name reported to clients.
    pub name: String,
    /// Version reported to clients.
    pub version: String,
    /// Log level (`debug`, `info`, `warn`, `error`).
    pub log_level: String,
    /// Block tools whose names look mutating.
    pub safe_mode: bool,
    /// Upper bound on how long a confirmation prompt may block a call.
    pub confirm_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            version: DEFAULT_SERVER_VERSION.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            safe_mode: true,
            confirm_timeout_secs: DEFAULT_CONFIRM_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// PolicySection
// ---------------------------------------------------------------------------

/// Allow/deny/confirm glob patterns.
///
/// Tool patterns match either the bare tool name or `module/tool`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// Modules allowed when an allow list is in effect.
    pub allow_modules: Vec<String>,
    /// Modules that are always denied.
    pub deny_modules: Vec<String>,
    /// Tools allowed when an allow list is in effect.
    pub allow_tools: Vec<String>,
    /// Tools that are always denied.
    pub deny_tools: Vec<String>,
    /// Tools that need interactive confirmation.
    pub confirm_tools: Vec<String>,
}

// ---------------------------------------------------------------------------
// ModulesSection
// ---------------------------------------------------------------------------

/// Per-module settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesSection {
    /// Cluster inspection.
    pub kubernetes: KubernetesSection,
    /// Metrics queries.
    pub prometheus: PrometheusSection,
    /// Local log files.
    pub logs: LogsSection,
    /// Container inspection.
    pub docker: DockerSection,
    /// Manifest-driven plugins.
    pub plugins: PluginsSection,
}

/// Kubernetes module settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesSection {
    /// Whether the module is active.
    pub enabled: bool,
    /// Kubeconfig path; a leading `~/` is expanded.
    pub kubeconfig: String,
    /// kubectl binary name or path.
    pub kubectl: String,
}

impl Default for KubernetesSection {
    fn default() -> Self {
        Self {
            enabled: true,
            kubeconfig: DEFAULT_KUBECONFIG.to_string(),
            kubectl: DEFAULT_KUBECTL.to_string(),
        }
    }
}

/// Prometheus module settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusSection {
    /// Whether the module is active.
    pub enabled: bool,
    /// Base URL of the Prometheus server.
    pub url: String,
    /// HTTP client timeout.
    pub timeout_secs: u64,
}

impl Default for PrometheusSection {
    fn default() -> Self {
        Self {
            enabled: false,
            url: DEFAULT_PROMETHEUS_URL.to_string(),
            timeout_secs: DEFAULT_PROMETHEUS_TIMEOUT_SECS,
        }
    }
}

/// Local log module settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsSection {
    /// Whether the module is active.
    pub enabled: bool,
    /// Directory roots that may be read. Empty denies everything.
    pub allow_paths: Vec<String>,
    /// Bytes read from the end of a file.
    pub max_bytes: i64,
    /// Upper bound on returned lines.
    pub max_lines: i64,
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_paths: Vec::new(),
            max_bytes: DEFAULT_MAX_BYTES,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// Docker module settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerSection {
    /// Whether the module is active.
    pub enabled: bool,
    /// docker binary name or path.
    pub cli: String,
    /// Upper bound on returned log lines.
    pub max_lines: i64,
}

impl Default for DockerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            cli: DEFAULT_DOCKER_CLI.to_string(),
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// Plugin module settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsSection {
    /// Whether the module is active.
    pub enabled: bool,
    /// Directory holding one subdirectory per plugin.
    pub dir: String,
    /// Upper bound on returned plugin output.
    pub max_bytes: i64,
    /// Environment passed to plugin processes: `KEY=VALUE` or a bare
    /// `KEY` inherited from the host.
    pub env: Vec<String>,
}

impl Default for PluginsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: DEFAULT_PLUGINS_DIR.to_string(),
            max_bytes: DEFAULT_MAX_BYTES,
            env: Vec::new(),
        }
    }
}
