//! Field-level validation helpers and category schema checks.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Field name -> list of user-facing messages, serialized as the `errors` object
/// of a 422 response.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, msg: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(msg.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Adds `msg` when `value` is missing or blank.
    pub fn require(&mut self, field: &str, value: Option<&str>, msg: &str) {
        if value.map(|v| v.trim().is_empty()).unwrap_or(true) {
            self.add(field, msg);
        }
    }

    /// Adds `msg` when `value` is longer than `max` characters.
    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize, msg: &str) {
        if value.map(|v| v.chars().count() > max).unwrap_or(false) {
            self.add(field, msg);
        }
    }

    /// Converts to `Err(DomainError::Validation)` when any error was recorded.
    pub fn into_result(self) -> Result<(), super::DomainError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(super::DomainError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, msgs)| format!("{}: {}", field, msgs.join(", ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Minimal email shape check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

/// One field of a category's dynamic form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub label: Option<String>,
    pub required: bool,
    pub options: Option<Vec<String>>,
}

/// Parses a category `schema_definition` JSON document.
///
/// The document must be an object with a `fields` array, and every field must
/// carry `name` and `type`.
pub fn parse_category_schema(raw: &str) -> Result<Vec<SchemaField>, String> {
    let doc: Value = serde_json::from_str(raw)
        .map_err(|_| "Şema tanımı geçerli bir JSON formatında olmalıdır".to_string())?;

    let fields = doc
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| "Şema tanımı \"fields\" anahtarı içermelidir".to_string())?;

    fields
        .iter()
        .map(|field| {
            let name = field.get("name").and_then(Value::as_str);
            let field_type = field.get("type").and_then(Value::as_str);
            match (name, field_type) {
                (Some(name), Some(field_type)) => Ok(SchemaField {
                    name: name.to_string(),
                    field_type: field_type.to_string(),
                    label: field.get("label").and_then(Value::as_str).map(String::from),
                    required: field
                        .get("required")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    options: field.get("options").and_then(Value::as_array).map(|opts| {
                        opts.iter()
                            .filter_map(|o| o.as_str().map(String::from))
                            .collect()
                    }),
                }),
                _ => Err(
                    "Her şema alanı \"name\" ve \"type\" özelliklerine sahip olmalıdır"
                        .to_string(),
                ),
            }
        })
        .collect()
}

/// Checks item specifications against a category schema and records failures
/// under `specifications.<field>`.
pub fn check_specifications(fields: &[SchemaField], specs: Option<&Value>, errors: &mut FieldErrors) {
    let empty = serde_json::Map::new();
    let specs = specs.and_then(Value::as_object).unwrap_or(&empty);

    for field in fields {
        let key = format!("specifications.{}", field.name);
        let label = field.label.as_deref().unwrap_or(&field.name);
        match specs.get(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    errors.add(&key, format!("{} alanı zorunludur", label));
                }
            }
            Some(Value::String(s)) if s.trim().is_empty() && field.required => {
                errors.add(&key, format!("{} alanı zorunludur", label));
            }
            Some(value) => {
                let type_ok = match field.field_type.as_str() {
                    "number" => value.is_number(),
                    "boolean" => value.is_boolean(),
                    _ => true,
                };
                if !type_ok {
                    errors.add(&key, format!("{} alanı {} türünde olmalıdır", label, field.field_type));
                    continue;
                }
                if let (Some(options), Some(s)) = (&field.options, value.as_str()) {
                    if !options.is_empty() && !options.iter().any(|o| o == s) {
                        errors.add(&key, format!("{} için geçersiz seçim", label));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_requires_fields_array() {
        assert!(parse_category_schema(r#"{"columns": []}"#).is_err());
        assert!(parse_category_schema("not json").is_err());
        assert!(parse_category_schema(r#"{"fields": [{"name": "ram"}]}"#).is_err());
    }

    #[test]
    fn schema_parses_required_and_options() {
        let fields = parse_category_schema(
            r#"{"fields": [
                {"name": "ram", "type": "number", "required": true},
                {"name": "os", "type": "select", "options": ["linux", "windows"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields[0].required);
        assert_eq!(fields[1].options.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn specifications_checked_against_schema() {
        let fields = parse_category_schema(
            r#"{"fields": [
                {"name": "ram", "type": "number", "required": true},
                {"name": "os", "type": "select", "options": ["linux", "windows"]}
            ]}"#,
        )
        .unwrap();

        let mut errors = FieldErrors::default();
        check_specifications(&fields, Some(&json!({"os": "beos"})), &mut errors);
        assert!(errors.has("specifications.ram"));
        assert!(errors.has("specifications.os"));

        let mut errors = FieldErrors::default();
        check_specifications(&fields, Some(&json!({"ram": 16, "os": "linux"})), &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("staff@lab.edu.tr"));
        assert!(!is_valid_email("staff.lab.edu"));
        assert!(!is_valid_email("@lab.edu"));
        assert!(!is_valid_email("a@b@c.d"));
    }
}
