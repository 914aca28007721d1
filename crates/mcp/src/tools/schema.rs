// Helper functions for creating tool input schemas

pub fn json_schema_object(properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_string(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_integer(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "integer",
        "description": description
    })
}

pub fn json_schema_object_value(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "description": description
    })
}

pub fn json_schema_array(items: serde_json::Value, description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "array",
        "items": items,
        "description": description
    })
}

/// Array schema with no item constraint and an empty-list default.
pub fn json_schema_domain(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "array",
        "description": description,
        "default": []
    })
}
