//! Variable validation and textual substitution producing a configuration
//! document from a stored [`ConfigTemplate`] (spec §4.F).
//!
//! Substitution is a simple named-token replacement operating on the
//! template's *serialized JSON text*, not its structured tree (spec §9: "a
//! known limitation and is documented — numeric placeholders become text in
//! the output"). The placeholder grammar is `${name}`: bounded and
//! unambiguous to scan for without pulling in a templating crate, which spec
//! leaves as an implementation detail while fixing the substitution
//! semantics (recorded in DESIGN.md as an Open Question resolution).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::ConfigTemplate;
use crate::repository::TemplateRepository;

/// Renders [`ConfigTemplate`]s against caller-supplied variables.
pub struct TemplateRenderer {
    templates: Arc<dyn TemplateRepository>,
}

impl TemplateRenderer {
    pub fn new(templates: Arc<dyn TemplateRepository>) -> Self {
        Self { templates }
    }

    /// Check that every `required` variable is provided or has a default,
    /// and that every provided value's JSON shape matches its declared type.
    /// Fails with [`Error::VariableValidation`] naming the first offending
    /// variable (spec §4.F "validate").
    pub async fn validate(&self, template_id: Uuid, variables: &HashMap<String, Value>) -> Result<()> {
        let template = self.templates.get_template(template_id).await?;
        validate_against(&template, variables)
    }

    /// Build the effective variable map (provided value, else default, else
    /// fail if required), substitute into the template's serialized text,
    /// and parse the result back into a structured document (spec §4.F
    /// "generate").
    pub async fn generate(&self, template_id: Uuid, variables: HashMap<String, Value>) -> Result<Value> {
        let template = self.templates.get_template(template_id).await?;
        validate_against(&template, &variables)?;

        let mut effective = HashMap::new();
        for var in &template.variables {
            if let Some(value) = variables.get(&var.name) {
                effective.insert(var.name.as_str(), value);
            } else if let Some(default) = &var.default_value {
                effective.insert(var.name.as_str(), default);
            }
        }

        let mut text = serde_json::to_string(&template.template)?;
        for (name, value) in effective {
            let token = format!("${{{name}}}");
            text = text.replace(&token, &stringify_placeholder(value));
        }

        serde_json::from_str(&text)
            .map_err(|e| Error::Parse(format!("rendered template is not valid JSON: {e}")))
    }
}

fn validate_against(template: &ConfigTemplate, variables: &HashMap<String, Value>) -> Result<()> {
    for var in &template.variables {
        match variables.get(&var.name) {
            Some(value) if !var.var_type.accepts(value) => {
                return Err(Error::VariableValidation(format!(
                    "variable '{}' must be {} but got {}",
                    var.name,
                    var.var_type.name(),
                    json_type_name(value)
                )));
            }
            Some(_) => {}
            None if var.required && var.default_value.is_none() => {
                return Err(Error::VariableValidation(format!(
                    "missing required variable '{}'",
                    var.name
                )));
            }
            None => {}
        }
    }
    Ok(())
}

/// A variable's textual form for substitution. Strings interpolate raw
/// (the placeholder token is expected to sit inside the template's own
/// quoting); every other JSON shape interpolates via its compact JSON text
/// (spec §4.F: "numeric values interpolate as their decimal text form ...
/// arrays and structured values interpolate via their structured text
/// form"), escaped as JSON-string content since that text lands inside the
/// surrounding quotes rather than replacing them — unescaped, an array or
/// object placeholder's own quote characters would break the document.
fn stringify_placeholder(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => {
            let raw = other.to_string();
            let escaped = serde_json::to_string(&raw).expect("a string always serializes");
            escaped[1..escaped.len() - 1].to_string()
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
