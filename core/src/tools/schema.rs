use crate::mcp::{McpError, McpResult};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// One declared input of a discovered tool. Every parameter is exposed to the
/// model as a string; `declared_type` keeps what the server advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParameter {
    pub name: String,
    pub declared_type: Option<String>,
    pub description: String,
    pub required: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("arguments must be a JSON object")]
    NotAnObject,
    #[error("missing required argument `{0}`")]
    MissingRequired(String),
    #[error("argument `{0}` must be a string")]
    NotAString(String),
}

/// Validated parameter set built once per discovered tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSchema {
    parameters: Vec<ToolParameter>,
}

impl InputSchema {
    /// Parses an MCP `inputSchema`. Malformed schemas are rejected here rather
    /// than at call time.
    pub fn from_json_schema(tool: &str, schema: &Value) -> McpResult<Self> {
        let binding = |reason: String| McpError::ToolBinding {
            tool: tool.to_string(),
            reason,
        };

        let schema = match schema {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => return Err(binding("input schema is not an object".to_string())),
        };

        let required: Vec<&str> = match schema.get("required") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| binding("`required` must list property names".to_string()))
                })
                .collect::<McpResult<_>>()?,
            Some(_) => return Err(binding("`required` is not an array".to_string())),
        };

        let properties = match schema.get("properties") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(properties)) => properties.clone(),
            Some(_) => return Err(binding("`properties` is not an object".to_string())),
        };

        if let Some(missing) = required.iter().find(|name| !properties.contains_key(**name)) {
            return Err(binding(format!(
                "required property `{missing}` is not declared"
            )));
        }

        let parameters = properties
            .into_iter()
            .map(|(name, spec)| {
                let spec = spec
                    .as_object()
                    .ok_or_else(|| binding(format!("property `{name}` is not an object")))?;
                Ok(ToolParameter {
                    required: required.contains(&name.as_str()),
                    declared_type: spec.get("type").and_then(Value::as_str).map(str::to_string),
                    description: spec
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    name,
                })
            })
            .collect::<McpResult<Vec<_>>>()?;

        Ok(Self { parameters })
    }

    pub fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// JSON schema handed to the model: all properties are strings.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                let mut spec = json!({"type": "string"});
                if !p.description.is_empty() {
                    spec["description"] = json!(p.description);
                }
                (p.name.clone(), spec)
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Checks model-supplied arguments and returns the map to forward.
    ///
    /// Null or absent optional values are dropped, scalars are turned into
    /// strings, and keys the schema does not declare are ignored.
    pub fn validate(&self, args: &Value) -> Result<Map<String, Value>, ArgumentError> {
        let empty = Map::new();
        let args = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => return Err(ArgumentError::NotAnObject),
        };

        let mut forwarded = Map::new();
        for parameter in &self.parameters {
            let value = match args.get(&parameter.name) {
                None | Some(Value::Null) if parameter.required => {
                    return Err(ArgumentError::MissingRequired(parameter.name.clone()));
                }
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) => Value::String(s.clone()),
                Some(Value::Number(n)) => Value::String(n.to_string()),
                Some(Value::Bool(b)) => Value::String(b.to_string()),
                Some(_) => return Err(ArgumentError::NotAString(parameter.name.clone())),
            };
            forwarded.insert(parameter.name.clone(), value);
        }
        Ok(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_file_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to read"},
                "head": {"type": "number"},
                "tail": {"type": "number"}
            },
            "required": ["path"]
        })
    }

    #[test]
    fn parameters_match_declared_properties_and_required_set() {
        let schema = InputSchema::from_json_schema("read_file", &read_file_schema()).unwrap();
        let mut seen: Vec<(&str, bool)> = schema
            .parameters()
            .iter()
            .map(|p| (p.name.as_str(), p.required))
            .collect();
        seen.sort();
        assert_eq!(seen, vec![("head", false), ("path", true), ("tail", false)]);

        let head = schema.parameters().iter().find(|p| p.name == "head").unwrap();
        assert_eq!(head.declared_type.as_deref(), Some("number"));
    }

    #[test]
    fn model_schema_flattens_types_to_string() {
        let schema = InputSchema::from_json_schema("read_file", &read_file_schema()).unwrap();
        let generated = schema.to_json_schema();

        assert_eq!(generated["properties"]["head"]["type"], "string");
        assert_eq!(generated["properties"]["path"]["description"], "File to read");
        assert_eq!(generated["required"], json!(["path"]));
    }

    #[test]
    fn schema_without_properties_takes_no_arguments() {
        let schema =
            InputSchema::from_json_schema("list_allowed_directories", &json!({"type": "object"}))
                .unwrap();
        assert!(schema.is_empty());
        assert_eq!(schema.validate(&json!({"junk": 1})).unwrap(), Map::new());
        assert_eq!(schema.to_json_schema()["properties"], json!({}));
    }

    #[test]
    fn malformed_schemas_fail_fast() {
        for bad in [
            json!("object"),
            json!({"properties": ["path"]}),
            json!({"properties": {"path": "string"}}),
            json!({"properties": {}, "required": "path"}),
            json!({"properties": {}, "required": ["path"]}),
        ] {
            let err = InputSchema::from_json_schema("broken", &bad).unwrap_err();
            assert!(matches!(err, McpError::ToolBinding { .. }), "{bad}");
        }
    }

    #[test]
    fn validate_strips_nulls_and_unknown_keys() {
        let schema = InputSchema::from_json_schema("read_file", &read_file_schema()).unwrap();
        let forwarded = schema
            .validate(&json!({"path": "a.txt", "head": null, "extra": "x"}))
            .unwrap();

        assert_eq!(Value::Object(forwarded), json!({"path": "a.txt"}));
    }

    #[test]
    fn validate_stringifies_scalars() {
        let schema = InputSchema::from_json_schema("read_file", &read_file_schema()).unwrap();
        let forwarded = schema.validate(&json!({"path": "a.txt", "head": 10})).unwrap();
        assert_eq!(forwarded["head"], json!("10"));
    }

    #[test]
    fn validate_reports_missing_required() {
        let schema = InputSchema::from_json_schema("read_file", &read_file_schema()).unwrap();
        assert_eq!(
            schema.validate(&json!({"path": null})),
            Err(ArgumentError::MissingRequired("path".into()))
        );
        assert_eq!(
            schema.validate(&json!({"path": ["a"]})),
            Err(ArgumentError::NotAString("path".into()))
        );
        assert_eq!(schema.validate(&json!([1])), Err(ArgumentError::NotAnObject));
    }
}
