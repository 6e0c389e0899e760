//! Tool policy: which tools are advertised, confirmed, or refused.
//!
//! A [`Policy`] is built from the `policy` section of the configuration
//! plus the global safe-mode switch. It holds no per-call state; the same
//! inputs always give the same [`Decision`].
//!
//! # Policy Check Order
//!
//! 1. Safe mode is on and the tool name contains a mutating keyword -> `Deny`
//! 2. The module matches a deny-module pattern -> `Deny`
//! 3. The tool (bare or `module/tool`) matches a deny-tool pattern -> `Deny`
//! 4. An allow list exists and neither module nor tool matches it -> `Deny`
//! 5. The tool matches a confirm-tool pattern -> `Confirm`
//! 6. Otherwise -> `Allow`
//!
//! Patterns use shell-glob syntax (`*`, `?`, `[abc]`). `*` does not cross
//! a `/`. A pattern that fails to compile never matches.

use std::fmt;

use globset::{GlobBuilder, GlobMatcher};
use nexus_config::{Config, PolicySection};
use serde::{Deserialize, Serialize};

/// Tool-name fragments that safe mode refuses outright.
pub const MUTATING_KEYWORDS: &[&str] = &[
    "delete", "update", "scale", "write", "create", "apply", "patch",
];

/// Outcome of evaluating a `(module, tool)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Run without asking.
    Allow,
    /// Never run.
    Deny,
    /// Run only after a human says yes.
    Confirm,
}

impl Decision {
    /// Inventory label for this decision.
    #[must_use]
    pub fn status_label(self) -> &'static str {
        match self {
            Self::Allow => "allowed",
            Self::Deny => "denied",
            Self::Confirm => "confirm",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Deny => write!(f, "deny"),
            Self::Confirm => write!(f, "confirm"),
        }
    }
}

/// Why a pair was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Safe mode matched a mutating keyword.
    SafeMode {
        /// The keyword found in the tool name.
        keyword: &'static str,
    },
    /// The module matched a deny-module pattern.
    DeniedModule,
    /// The tool matched a deny-tool pattern.
    DeniedTool,
    /// An allow list exists and nothing in it matched.
    NotAllowListed,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SafeMode { keyword } => write!(f, "safe mode blocks '{keyword}' tools"),
            Self::DeniedModule => write!(f, "module is denied"),
            Self::DeniedTool => write!(f, "tool is denied"),
            Self::NotAllowListed => write!(f, "not in allow list"),
        }
    }
}

/// A decision together with the deny reason, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// The decision.
    pub decision: Decision,
    /// Set when `decision` is [`Decision::Deny`].
    pub reason: Option<DenyReason>,
}

impl Evaluation {
    fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            reason: None,
        }
    }

    fn confirm() -> Self {
        Self {
            decision: Decision::Confirm,
            reason: None,
        }
    }

    fn deny(reason: DenyReason) -> Self {
        Self {
            decision: Decision::Deny,
            reason: Some(reason),
        }
    }
}

/// Compiled pattern list.
#[derive(Debug, Clone, Default)]
struct PatternSet {
    matchers: Vec<GlobMatcher>,
}

impl PatternSet {
    fn compile(patterns: &[String]) -> Self {
        let matchers = patterns
            .iter()
            .filter_map(|pattern| {
                GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .ok()
                    .map(|g| g.compile_matcher())
            })
            .collect();
        Self { matchers }
    }

    fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    fn matches(&self, candidate: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(candidate))
    }

    /// Match a tool by bare name or as `module/tool`.
    fn matches_tool(&self, module: &str, tool: &str) -> bool {
        !self.is_empty() && (self.matches(tool) || self.matches(&format!("{module}/{tool}")))
    }
}

/// Allow/deny/confirm policy over module and tool names.
///
/// # Example
///
/// ```
/// use nexus_approval::{Decision, Policy};
/// use nexus_config::PolicySection;
///
/// let section = PolicySection {
///     deny_tools: vec!["k8s_list_pods".to_string()],
///     ..PolicySection::default()
/// };
/// let policy = Policy::new(&section, false);
/// assert_eq!(policy.evaluate("kubernetes", "k8s_list_pods"), Decision::Deny);
/// assert_eq!(policy.evaluate("kubernetes", "k8s_get_logs"), Decision::Allow);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Policy {
    safe_mode: bool,
    allow_modules: PatternSet,
    deny_modules: PatternSet,
    allow_tools: PatternSet,
    deny_tools: PatternSet,
    confirm_tools: PatternSet,
    has_allow_list: bool,
}

impl Policy {
    /// Build a policy from its configuration section.
    ///
    /// An allow list counts as configured when either allow list has
    /// entries, even if none of them compile.
    #[must_use]
    pub fn new(section: &PolicySection, safe_mode: bool) -> Self {
        Self {
            safe_mode,
            allow_modules: PatternSet::compile(&section.allow_modules),
            deny_modules: PatternSet::compile(&section.deny_modules),
            allow_tools: PatternSet::compile(&section.allow_tools),
            deny_tools: PatternSet::compile(&section.deny_tools),
            confirm_tools: PatternSet::compile(&section.confirm_tools),
            has_allow_list: !section.allow_modules.is_empty() || !section.allow_tools.is_empty(),
        }
    }

    /// Build a policy from the full configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.policy, config.server.safe_mode)
    }

    /// Whether safe mode is on.
    #[must_use]
    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }

    /// Decide what to do with `tool` owned by `module`.
    #[must_use]
    pub fn evaluate(&self, module: &str, tool: &str) -> Decision {
        self.explain(module, tool).decision
    }

    /// Like [`Policy::evaluate`], also reporting why a pair was denied.
    #[must_use]
    pub fn explain(&self, module: &str, tool: &str) -> Evaluation {
        if self.safe_mode
            && let Some(keyword) = mutating_keyword(tool)
        {
            return Evaluation::deny(DenyReason::SafeMode { keyword });
        }

        if self.deny_modules.matches(module) {
            return Evaluation::deny(DenyReason::DeniedModule);
        }
        if self.deny_tools.matches_tool(module, tool) {
            return Evaluation::deny(DenyReason::DeniedTool);
        }

        if self.has_allow_list
            && !self.allow_modules.matches(module)
            && !self.allow_tools.matches_tool(module, tool)
        {
            return Evaluation::deny(DenyReason::NotAllowListed);
        }

        if self.confirm_tools.matches_tool(module, tool) {
            return Evaluation::confirm();
        }

        Evaluation::allow()
    }
}

/// First mutating keyword contained in `tool`, case-insensitively.
fn mutating_keyword(tool: &str) -> Option<&'static str> {
    let lower = tool.to_lowercase();
    MUTATING_KEYWORDS
        .iter()
        .copied()
        .find(|kw| lower.contains(kw))
}
