//! [`ConfigTemplate`]: a parameterised configuration scaffold rendered by
//! substituting named variables into its serialized textual form (spec
//! §3.1, §4.F).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The declared type of a [`TemplateVariable`], checked against the value
/// supplied at render time (spec §4.F "validate").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateVariableType {
    String,
    Number,
    Boolean,
    Array,
}

impl TemplateVariableType {
    /// Whether `value`'s JSON shape matches this declared type. Numbers
    /// accept integer or floating-point; booleans accept only booleans;
    /// arrays accept only sequences (spec §4.F "validate").
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            TemplateVariableType::String => value.is_string(),
            TemplateVariableType::Number => value.is_number(),
            TemplateVariableType::Boolean => value.is_boolean(),
            TemplateVariableType::Array => value.is_array(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TemplateVariableType::String => "string",
            TemplateVariableType::Number => "number",
            TemplateVariableType::Boolean => "boolean",
            TemplateVariableType::Array => "array",
        }
    }
}

/// One named slot a template declares. Render-time values are matched
/// against `name` and type-checked against `var_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    pub var_type: TemplateVariableType,
    pub required: bool,
    pub default_value: Option<Value>,
    #[serde(default)]
    pub description: String,
}

/// A reusable, parameterised configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Structured document containing `${name}`-style placeholders for
    /// each declared variable (spec §9: substitution operates on the
    /// serialised text of this document, not its tree).
    pub template: Value,
    pub variables: Vec<TemplateVariable>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigTemplate {
    /// Every declared variable name must be unique (spec §3.1 invariant).
    pub fn validate_variable_names_unique(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for variable in &self.variables {
            if !seen.insert(variable.name.as_str()) {
                return Err(format!("duplicate template variable name '{}'", variable.name));
            }
        }
        Ok(())
    }
}

/// Fields required to register a new template. `id`, `created_at`, and
/// `updated_at` are assigned by the Repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConfigTemplate {
    pub name: String,
    pub description: String,
    pub category: String,
    pub template: Value,
    pub variables: Vec<TemplateVariable>,
}
