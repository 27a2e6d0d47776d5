//! Secret redaction for connector log lines.
//!
//! The connector spec marks credential fields with `airbyte_secret: true`.
//! Any configured value for such a field is scrubbed from log output before
//! it reaches the tracing layer or the sink.

use std::collections::BTreeSet;

use serde_json::Value;

const MASK: &str = "***";

/// Collects secret values from a source configuration and replaces every
/// occurrence of them in a string.
#[derive(Debug, Clone, Default)]
pub struct SecretRedactor {
    /// Secret values, longest first so overlapping secrets redact fully.
    secrets: Vec<String>,
}

impl SecretRedactor {
    /// A redactor with nothing to redact.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a redactor from a connector spec and the configuration the
    /// connector was launched with. Walks `connectionSpecification` for
    /// fields flagged `airbyte_secret` and records their configured values.
    pub fn from_spec(spec: &Value, config: &Value) -> Self {
        let mut secret_fields = BTreeSet::new();
        if let Some(schema) = spec.get("connectionSpecification") {
            collect_secret_fields(schema, &mut secret_fields);
        }

        let mut secrets = Vec::new();
        for field in &secret_fields {
            collect_values(config, field, &mut secrets);
        }
        secrets.sort();
        secrets.dedup();
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        Self { secrets }
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Returns `text` with every known secret value replaced by `***`.
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), MASK);
            }
        }
        out
    }
}

/// Records property names whose schema carries `airbyte_secret: true`,
/// descending through `properties` and `oneOf` branches.
fn collect_secret_fields(schema: &Value, fields: &mut BTreeSet<String>) {
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (name, prop) in props {
            if prop.get("airbyte_secret").and_then(Value::as_bool) == Some(true) {
                fields.insert(name.clone());
            }
            collect_secret_fields(prop, fields);
        }
    }
    if let Some(branches) = schema.get("oneOf").and_then(Value::as_array) {
        for branch in branches {
            collect_secret_fields(branch, fields);
        }
    }
}

/// Gathers every string value stored under `field` anywhere in the config.
fn collect_values(config: &Value, field: &str, out: &mut Vec<String>) {
    match config {
        Value::Object(map) => {
            for (key, value) in map {
                if key == field {
                    if let Some(text) = value.as_str() {
                        if !text.is_empty() {
                            out.push(text.to_string());
                        }
                    }
                }
                collect_values(value, field, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_values(item, field, out);
            }
        }
        _ => {}
    }
}
