//! Tool descriptors and results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Declared type of a tool argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    /// Free-form string.
    #[default]
    String,
    /// Floating point number.
    Number,
    /// Whole number.
    Integer,
    /// True/false flag.
    Boolean,
}

impl ArgType {
    /// Normalize a loosely written type name.
    ///
    /// Matching is case-insensitive; unrecognized names map to
    /// [`ArgType::String`].
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Self::Integer,
            "bool" | "boolean" => Self::Boolean,
            "number" | "float" => Self::Number,
            _ => Self::String,
        }
    }

    /// JSON Schema type keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// One declared tool argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSchema {
    /// Argument name.
    pub name: String,
    /// Argument type.
    pub arg_type: ArgType,
    /// Whether the caller must supply it.
    pub required: bool,
    /// Human-readable description.
    pub description: String,
}

impl ArgSchema {
    /// Create an optional argument.
    #[must_use]
    pub fn optional(name: impl Into<String>, arg_type: ArgType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg_type,
            required: false,
            description: description.into(),
        }
    }

    /// Create a required argument.
    #[must_use]
    pub fn required(name: impl Into<String>, arg_type: ArgType, description: impl Into<String>) -> Self {
        Self {
            required: true,
            ..Self::optional(name, arg_type, description)
        }
    }
}

/// Description of a tool a provider exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Qualified tool name, unique across all active providers.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Ordered argument schema.
    pub args: Vec<ArgSchema>,
    /// The tool only reads state.
    pub read_only: bool,
    /// The tool may change or destroy state.
    pub destructive: bool,
}

impl ToolDescriptor {
    /// Create a read-only, non-destructive tool with no arguments.
    #[must_use]
    pub fn read_only(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args: Vec::new(),
            read_only: true,
            destructive: false,
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: ArgSchema) -> Self {
        self.args.push(arg);
        self
    }

    /// JSON Schema object for the tool input.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for arg in &self.args {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::from(arg.arg_type.as_str()));
            if !arg.description.is_empty() {
                prop.insert("description".into(), Value::from(arg.description.clone()));
            }
            properties.insert(arg.name.clone(), Value::Object(prop));
            if arg.required {
                required.push(Value::from(arg.name.clone()));
            }
        }

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = Value::Array(required);
        }
        schema
    }
}

/// Content returned by a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool reported a failure.
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful result with text content.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: content.into(),
            }],
            is_error: false,
        }
    }

    /// Create a successful result carrying a structured payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be rendered as JSON.
    pub fn structured(payload: &Value) -> Result<Self, serde_json::Error> {
        serde_json::to_string_pretty(payload).map(Self::text)
    }

    /// Create a failure result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Get text content as a single string.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                ToolContent::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
