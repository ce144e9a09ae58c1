//! Structured object extraction from free-form model output

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::block::fenced_blocks;

type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Target shape for a structured query
///
/// Carries the JSON Schema shown to the model and a validator deciding
/// whether a parsed candidate conforms.
#[derive(Clone)]
pub struct ObjectSchema {
    name: String,
    schema: Value,
    validator: Validator,
}

impl ObjectSchema {
    /// Build a schema from a Rust type
    ///
    /// The JSON Schema is generated with schemars (doc comments become field
    /// descriptions) and a candidate is valid when it deserializes into `T`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// #[derive(Deserialize, JsonSchema)]
    /// struct Plan {
    ///     /// Ordered steps to follow
    ///     steps: Vec<String>,
    /// }
    ///
    /// let schema = ObjectSchema::of::<Plan>();
    /// ```
    pub fn of<T: JsonSchema + DeserializeOwned + 'static>() -> Self {
        let root = schema_for!(T);
        let schema = serde_json::to_value(&root).unwrap_or_else(|_| Value::Object(Default::default()));
        Self {
            name: T::schema_name(),
            schema,
            validator: Arc::new(|value: &Value| {
                serde_json::from_value::<T>(value.clone())
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }),
        }
    }

    /// Build a schema from a raw JSON Schema and a custom validator
    pub fn new<F>(name: impl Into<String>, schema: Value, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            schema,
            validator: Arc::new(validator),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn validate(&self, value: &Value) -> Result<(), String> {
        (self.validator)(value)
    }

    /// Instruction asking the model to answer with a conforming JSON value
    pub fn instruction(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.schema).unwrap_or_default();
        format!(
            "Respond with a single JSON value of type {} that conforms to this JSON Schema:\n{}\nDo not include any text other than the JSON value.",
            self.name, schema
        )
    }
}

impl fmt::Debug for ObjectSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectSchema")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Text held no value conforming to the schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: String,
}

/// Locate a JSON value conforming to `schema` anywhere in `text`
///
/// Candidates are tried in order: the whole text, the contents of fenced
/// blocks, every balanced `{...}` or `[...]` slice, and finally the text
/// itself as a JSON string. The first one that parses and validates wins.
pub fn extract_object(text: &str, schema: &ObjectSchema) -> Result<Value, ParseError> {
    let trimmed = text.trim();
    let mut rejection: Option<String> = None;

    let mut candidates: Vec<String> = vec![trimmed.to_string()];
    candidates.extend(fenced_blocks(text));
    candidates.extend(balanced_json_slices(text).into_iter().map(str::to_string));

    for candidate in &candidates {
        let Some(value) = parse_lenient(candidate) else {
            continue;
        };
        match schema.validate(&value) {
            Ok(()) => return Ok(value),
            Err(reason) => {
                rejection.get_or_insert(reason);
            }
        }
    }

    let as_string = Value::String(trimmed.to_string());
    if schema.validate(&as_string).is_ok() {
        return Ok(as_string);
    }

    Err(ParseError {
        reason: rejection.unwrap_or_else(|| "no JSON value found in response".to_string()),
    })
}

/// Typed convenience over [`extract_object`]
pub fn extract_typed<T: JsonSchema + DeserializeOwned + 'static>(text: &str) -> Result<T, ParseError> {
    let value = extract_object(text, &ObjectSchema::of::<T>())?;
    serde_json::from_value(value).map_err(|e| ParseError {
        reason: e.to_string(),
    })
}

fn parse_lenient(candidate: &str) -> Option<Value> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    serde_json::from_str(candidate)
        .ok()
        .or_else(|| serde_json::from_str(&strip_trailing_commas(candidate)).ok())
}

/// Every balanced JSON-looking slice, outermost first
///
/// Brackets inside string literals are ignored.
fn balanced_json_slices(text: &str) -> Vec<&str> {
    text.char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .filter_map(|(start, _)| balanced_from(text, start))
        .collect()
}

fn balanced_from(text: &str, start: usize) -> Option<&str> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_str = false;
    let mut escape = false;
    for (i, c) in text[start..].char_indices() {
        if in_str {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_str = false;
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Drop commas that directly precede a closing bracket
fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_str = false;
    let mut escape = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_str {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_str = false;
            }
        } else if c == '"' {
            in_str = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Plan {
        /// Ordered steps to follow
        steps: Vec<String>,
    }

    #[test]
    fn test_list_embedded_in_prose() {
        let schema = ObjectSchema::of::<Vec<String>>();
        let value = extract_object("Steps: [\"a\",\"b\"]", &schema).unwrap();
        assert_eq!(value, json!(["a", "b"]));
    }

    #[test]
    fn test_prose_is_rejected() {
        let schema = ObjectSchema::of::<Vec<String>>();
        let err = extract_object("I would rather not answer that.", &schema).unwrap_err();
        assert_eq!(err.reason, "no JSON value found in response");
    }

    #[test]
    fn test_object_in_fenced_block() {
        let text = "Sure!\n```json\n{\"steps\": [\"mix\", \"bake\"]}\n```\nEnjoy.";
        let plan: Plan = extract_typed(text).unwrap();
        assert_eq!(plan.steps, vec!["mix", "bake"]);
    }

    #[test]
    fn test_skips_nonconforming_candidates() {
        let text = "Ignore {\"other\": 1} and use {\"steps\": [\"x\"]}";
        let plan: Plan = extract_typed(text).unwrap();
        assert_eq!(plan.steps, vec!["x"]);
    }

    #[test]
    fn test_reports_validation_failure() {
        let schema = ObjectSchema::of::<Plan>();
        let err = extract_object("{\"steps\": 3}", &schema).unwrap_err();
        assert!(err.reason.contains("invalid type"), "{}", err.reason);
    }

    #[test]
    fn test_brackets_inside_strings() {
        let text = "Result: {\"steps\": [\"use ] and } freely\"]} trailing";
        let plan: Plan = extract_typed(text).unwrap();
        assert_eq!(plan.steps, vec!["use ] and } freely"]);
    }

    #[test]
    fn test_trailing_commas_repaired() {
        let text = "{\"steps\": [\"a\", \"b\",],}";
        let plan: Plan = extract_typed(text).unwrap();
        assert_eq!(plan.steps, vec!["a", "b"]);
    }

    #[test]
    fn test_plain_string_target() {
        let value: String = extract_typed("  just words  ").unwrap();
        assert_eq!(value, "just words");
    }

    #[test]
    fn test_schema_metadata() {
        let schema = ObjectSchema::of::<Plan>();
        assert_eq!(schema.name(), "Plan");
        let rendered = serde_json::to_string(schema.schema()).unwrap();
        assert!(rendered.contains("Ordered steps to follow"));
        assert!(schema.instruction().contains("type Plan"));
    }

    #[test]
    fn test_custom_validator() {
        let schema = ObjectSchema::new("Positive", json!({"type": "integer"}), |v| {
            match v.as_i64() {
                Some(n) if n > 0 => Ok(()),
                _ => Err("expected a positive integer".to_string()),
            }
        });
        assert_eq!(extract_object("The answer is 42", &schema).unwrap_err().reason, "no JSON value found in response");
        assert_eq!(extract_object("42", &schema).unwrap(), json!(42));
        assert_eq!(
            extract_object("-1", &schema).unwrap_err().reason,
            "expected a positive integer"
        );
    }

    #[test]
    fn test_strip_trailing_commas_leaves_strings() {
        assert_eq!(strip_trailing_commas("[\"a,]\",]"), "[\"a,]\"]");
    }
}
