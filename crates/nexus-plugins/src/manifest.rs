//! Plugin manifest types.
//!
//! A manifest (`nexus.yaml` inside the plugin directory) declares the
//! plugin's identity, the executable to run and the tools it offers:
//!
//! ```yaml
//! apiVersion: nexus/v1
//! kind: Plugin
//! metadata:
//!   name: disk-report
//!   vendor: acme
//!   version: 1.0.0
//! spec:
//!   command: ./run.sh
//!   args: ["--quiet"]
//!   env: { REPORT_FORMAT: text }
//!   capabilities:
//!     tools:
//!       - name: usage
//!         description: Disk usage per mount
//!         read_only: true
//!         args:
//!           - { name: mount, type: string, required: false }
//! ```
//!
//! Unknown keys are ignored and every field is optional.

use std::collections::BTreeMap;

use nexus_core::{ArgSchema, ArgType, ToolDescriptor};
use serde::{Deserialize, Serialize};

/// A plugin manifest loaded from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginManifest {
    /// Schema version marker.
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Document kind marker.
    pub kind: String,
    /// Plugin identity.
    pub metadata: Metadata,
    /// How to run the plugin and what it offers.
    pub spec: PluginSpec,
}

/// Plugin identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Plugin name; defaults to the directory name.
    pub name: String,
    /// Publisher.
    pub vendor: String,
    /// Version string.
    pub version: String,
    /// Human-readable description.
    pub description: String,
}

/// Execution settings and capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSpec {
    /// Executable, absolute or relative to the plugin directory.
    pub command: String,
    /// Arguments passed before the marker flag.
    pub args: Vec<String>,
    /// Extra environment for the process.
    pub env: BTreeMap<String, String>,
    /// Declared tools.
    pub capabilities: Capabilities,
}

/// Capability list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Tools the plugin implements.
    pub tools: Vec<ToolSpec>,
}

/// One tool declared by a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSpec {
    /// Tool name, unique within the plugin.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// The tool does not change state.
    pub read_only: bool,
    /// Ordered arguments.
    pub args: Vec<ArgSpec>,
}

/// One argument of a plugin tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgSpec {
    /// Argument name.
    pub name: String,
    /// Loose type name: `string`, `int`, `number`, `bool`, ...
    #[serde(rename = "type")]
    pub arg_type: String,
    /// Whether the caller must supply it.
    pub required: bool,
    /// Human-readable description.
    pub description: String,
}

impl ToolSpec {
    /// Build the gateway descriptor for this tool under `qualified_name`.
    #[must_use]
    pub fn to_descriptor(&self, qualified_name: String) -> ToolDescriptor {
        ToolDescriptor {
            name: qualified_name,
            description: self.description.clone(),
            args: self.args.iter().map(ArgSpec::to_schema).collect(),
            read_only: self.read_only,
            destructive: !self.read_only,
        }
    }
}

impl ArgSpec {
    fn to_schema(&self) -> ArgSchema {
        ArgSchema {
            name: self.name.clone(),
            arg_type: ArgType::normalize(&self.arg_type),
            required: self.required,
            description: self.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
apiVersion: nexus/v1
kind: Plugin
metadata:
  name: disk-report
  vendor: acme
  version: 1.0.0
  description: Disk reports
spec:
  command: ./run.sh
  args: ["--quiet"]
  env:
    REPORT_FORMAT: text
  capabilities:
    tools:
      - name: usage
        description: Disk usage per mount
        read_only: true
        args:
          - name: mount
            type: STRING
            description: Mount point
          - name: depth
            type: int
            required: true
      - name: cleanup
        description: Remove temp files
"#;

    #[test]
    fn test_parse_full_manifest() {
        let manifest: PluginManifest = serde_yaml::from_str(FULL).unwrap();
        assert_eq!(manifest.api_version, "nexus/v1");
        assert_eq!(manifest.kind, "Plugin");
        assert_eq!(manifest.metadata.name, "disk-report");
        assert_eq!(manifest.spec.command, "./run.sh");
        assert_eq!(manifest.spec.args, vec!["--quiet"]);
        assert_eq!(manifest.spec.env["REPORT_FORMAT"], "text");
        assert_eq!(manifest.spec.capabilities.tools.len(), 2);
        assert!(!manifest.spec.capabilities.tools[1].read_only);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let manifest: PluginManifest =
            serde_yaml::from_str("metadata:\n  name: x\n  homepage: http://example\nextra: 1\n")
                .unwrap();
        assert_eq!(manifest.metadata.name, "x");
        assert!(manifest.spec.capabilities.tools.is_empty());
    }

    #[test]
    fn test_descriptor_annotations_and_types() {
        let manifest: PluginManifest = serde_yaml::from_str(FULL).unwrap();
        let usage = manifest.spec.capabilities.tools[0]
            .to_descriptor("plugin/disk-report/usage".to_string());
        assert!(usage.read_only);
        assert!(!usage.destructive);
        assert_eq!(usage.args[0].arg_type, ArgType::String);
        assert_eq!(usage.args[1].arg_type, ArgType::Integer);
        assert!(usage.args[1].required);

        let cleanup = manifest.spec.capabilities.tools[1]
            .to_descriptor("plugin/disk-report/cleanup".to_string());
        assert!(!cleanup.read_only);
        assert!(cleanup.destructive);
    }
}
