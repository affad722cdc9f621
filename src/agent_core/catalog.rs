//! Tool catalog: descriptors turned into the schemas the model sees.
//!
//! Argument types are free-form hints (`int`, `list[str]`, `float`, ...).
//! They collapse onto five JSON-Schema types through one fixed mapping.

use serde_json::{json, Map, Value};

use crate::inference::ToolSchema;
use crate::mcp_client::ToolDescriptor;

/// Map a semantic type hint to a JSON-Schema type.
///
/// Generic parameters are ignored (`list[str]` is a list) and matching is
/// case-insensitive. Anything unrecognized is a string.
pub fn json_type_for(hint: &str) -> &'static str {
    let base = hint
        .trim()
        .split(['[', '<', '('])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let base = base.strip_prefix("typing.").unwrap_or(&base);

    match base {
        "int" | "integer" => "integer",
        "float" | "double" | "complex" | "number" => "number",
        "bool" | "boolean" => "boolean",
        "list" | "tuple" | "set" | "frozenset" | "array" | "sequence" => "array",
        _ => "string",
    }
}

/// Build one schema per descriptor, preserving order.
pub fn build_tool_catalog(tools: &[ToolDescriptor]) -> Vec<ToolSchema> {
    tools.iter().map(tool_schema).collect()
}

fn tool_schema(tool: &ToolDescriptor) -> ToolSchema {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for arg in &tool.arguments {
        properties.insert(
            arg.name.clone(),
            json!({
                "type": json_type_for(&arg.semantic_type),
                "description": arg.description,
            }),
        );
        if arg.is_required() {
            required.push(Value::String(arg.name.clone()));
        }
    }

    ToolSchema {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

/// Required arguments of `tool` absent from `input`, in schema order.
///
/// Unknown tools have no requirements.
pub fn missing_required(catalog: &[ToolSchema], tool: &str, input: &Value) -> Vec<String> {
    let Some(schema) = catalog.iter().find(|s| s.name == tool) else {
        return Vec::new();
    };
    let provided = input.as_object();

    schema.input_schema["required"]
        .as_array()
        .map(|required| {
            required
                .iter()
                .filter_map(|name| name.as_str())
                .filter(|name| !provided.is_some_and(|obj| obj.contains_key(*name)))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
