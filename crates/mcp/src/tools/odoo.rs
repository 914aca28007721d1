// The fixed set of Odoo tools: names, required arguments, schemas, rendering

use crate::protocol::ToolSchema;
use crate::tools::schema::{
    json_schema_array, json_schema_domain, json_schema_integer, json_schema_object,
    json_schema_object_value, json_schema_string,
};
use odoo_client::Method;
use serde_json::{json, Value};

/// Prefix of the names advertised over MCP.
pub const TOOL_PREFIX: &str = "odoo_";

/// One of the supported tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OdooTool {
    ListCompanies,
    SearchRead,
    Create,
    Write,
    Unlink,
    Search,
    Read,
    SearchCount,
}

impl OdooTool {
    /// All tools, in the order they are listed to clients.
    pub const ALL: [OdooTool; 8] = [
        Self::ListCompanies,
        Self::SearchRead,
        Self::Create,
        Self::Write,
        Self::Unlink,
        Self::Search,
        Self::Read,
        Self::SearchCount,
    ];

    /// Bare operation name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListCompanies => "list_companies",
            Self::SearchRead => "search_read",
            Self::Create => "create",
            Self::Write => "write",
            Self::Unlink => "unlink",
            Self::Search => "search",
            Self::Read => "read",
            Self::SearchCount => "search_count",
        }
    }

    /// Name advertised in `tools/list`.
    pub fn mcp_name(&self) -> String {
        format!("{}{}", TOOL_PREFIX, self.name())
    }

    /// Accepts both `create` and `odoo_create`.
    pub fn from_name(name: &str) -> Option<Self> {
        let bare = name.strip_prefix(TOOL_PREFIX).unwrap_or(name);
        Self::ALL.into_iter().find(|tool| tool.name() == bare)
    }

    /// Arguments that must be present and non-null.
    pub fn required_args(&self) -> &'static [&'static str] {
        match self {
            Self::ListCompanies => &[],
            Self::SearchRead | Self::Search | Self::SearchCount => &["company", "model"],
            Self::Create => &["company", "model", "values"],
            Self::Write => &["company", "model", "ids", "values"],
            Self::Unlink | Self::Read => &["company", "model", "ids"],
        }
    }

    /// Remote method, `None` for tools answered locally.
    pub fn method(&self) -> Option<Method> {
        match self {
            Self::ListCompanies => None,
            Self::SearchRead => Some(Method::SearchRead),
            Self::Create => Some(Method::Create),
            Self::Write => Some(Method::Write),
            Self::Unlink => Some(Method::Unlink),
            Self::Search => Some(Method::Search),
            Self::Read => Some(Method::Read),
            Self::SearchCount => Some(Method::SearchCount),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ListCompanies => "List all available company configurations",
            Self::SearchRead => {
                "Search and read records from an Odoo model. Combines search and read operations."
            }
            Self::Create => "Create a new record in an Odoo model",
            Self::Write => "Update existing records in an Odoo model",
            Self::Unlink => "Delete records from an Odoo model",
            Self::Search => "Search for record IDs matching criteria (without reading full records)",
            Self::Read => "Read specific records by their IDs",
            Self::SearchCount => "Count the number of records matching search criteria",
        }
    }

    pub fn schema(&self) -> ToolSchema {
        let properties = match self {
            Self::ListCompanies => json!({}),
            Self::SearchRead => json!({
                "company": company_property(),
                "model": json_schema_string("The Odoo model name (e.g., 'res.partner', 'account.move', 'product.product')"),
                "domain": json_schema_domain("Search domain as a list of criteria (e.g., [['name', '=', 'John']]). Use [] for all records."),
                "fields": json_schema_array(json!({"type": "string"}), "List of field names to retrieve. If not specified, returns all fields."),
                "limit": json_schema_integer("Maximum number of records to return"),
                "offset": json_schema_integer("Number of records to skip"),
                "order": json_schema_string("Sorting order (e.g., 'name asc', 'create_date desc')")
            }),
            Self::Create => json!({
                "company": company_property(),
                "model": json_schema_string("The Odoo model name (e.g., 'res.partner', 'account.move')"),
                "values": json_schema_object_value("Dictionary of field values for the new record")
            }),
            Self::Write => json!({
                "company": company_property(),
                "model": json_schema_string("The Odoo model name"),
                "ids": ids_property("List of record IDs to update"),
                "values": json_schema_object_value("Dictionary of field values to update")
            }),
            Self::Unlink => json!({
                "company": company_property(),
                "model": json_schema_string("The Odoo model name"),
                "ids": ids_property("List of record IDs to delete")
            }),
            Self::Search => json!({
                "company": company_property(),
                "model": json_schema_string("The Odoo model name"),
                "domain": json_schema_domain("Search domain as a list of criteria"),
                "limit": json_schema_integer("Maximum number of IDs to return"),
                "offset": json_schema_integer("Number of records to skip"),
                "order": json_schema_string("Sorting order")
            }),
            Self::Read => json!({
                "company": company_property(),
                "model": json_schema_string("The Odoo model name"),
                "ids": ids_property("List of record IDs to read"),
                "fields": json_schema_array(json!({"type": "string"}), "List of field names to retrieve")
            }),
            Self::SearchCount => json!({
                "company": company_property(),
                "model": json_schema_string("The Odoo model name"),
                "domain": json_schema_domain("Search domain as a list of criteria")
            }),
        };

        ToolSchema {
            name: self.mcp_name(),
            description: self.description().to_string(),
            input_schema: json_schema_object(properties, self.required_args()),
        }
    }

    /// Render a successful result as tool output text.
    pub fn render(&self, result: &Value) -> String {
        match self {
            Self::ListCompanies => {
                let names: Vec<&str> = result
                    .as_array()
                    .map(|names| names.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                format!(
                    "Available companies: {}\n\nTotal: {}",
                    names.join(", "),
                    names.len()
                )
            }
            Self::Create => format!("Created record with ID: {}", scalar(result)),
            Self::Write => format!("Updated successfully: {}", scalar(result)),
            Self::Unlink => format!("Deleted successfully: {}", scalar(result)),
            Self::SearchCount => format!("Count: {}", scalar(result)),
            Self::SearchRead | Self::Search | Self::Read => pretty(result),
        }
    }
}

fn company_property() -> Value {
    json_schema_string("The company configuration name to use (as defined in the configuration file sections)")
}

fn ids_property(description: &str) -> Value {
    json_schema_array(json!({"type": "integer"}), description)
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for tool in OdooTool::ALL {
            assert_eq!(OdooTool::from_name(tool.name()), Some(tool));
            assert_eq!(OdooTool::from_name(&tool.mcp_name()), Some(tool));
        }
        assert_eq!(OdooTool::from_name("odoo_execute_kw"), None);
        assert_eq!(OdooTool::from_name("delete"), None);
    }

    #[test]
    fn test_required_args_table() {
        assert!(OdooTool::ListCompanies.required_args().is_empty());
        assert_eq!(OdooTool::SearchRead.required_args(), &["company", "model"]);
        assert_eq!(OdooTool::Create.required_args(), &["company", "model", "values"]);
        assert_eq!(
            OdooTool::Write.required_args(),
            &["company", "model", "ids", "values"]
        );
        assert_eq!(OdooTool::Unlink.required_args(), &["company", "model", "ids"]);
        assert_eq!(OdooTool::Read.required_args(), &["company", "model", "ids"]);
        assert_eq!(OdooTool::SearchCount.required_args(), &["company", "model"]);
    }

    #[test]
    fn test_methods() {
        assert_eq!(OdooTool::ListCompanies.method(), None);
        assert_eq!(OdooTool::SearchCount.method(), Some(Method::SearchCount));
        assert_eq!(OdooTool::Unlink.method().map(|m| m.as_str()), Some("unlink"));
    }

    #[test]
    fn test_schema_lists_required_arguments() {
        let schema = OdooTool::Write.schema();

        assert_eq!(schema.name, "odoo_write");
        assert_eq!(
            schema.input_schema["required"],
            json!(["company", "model", "ids", "values"])
        );
        assert_eq!(schema.input_schema["properties"]["ids"]["items"]["type"], "integer");

        let schema = OdooTool::ListCompanies.schema();
        assert_eq!(schema.input_schema["required"], json!([]));
    }

    #[test]
    fn test_render() {
        assert_eq!(
            OdooTool::ListCompanies.render(&json!(["acme", "initech"])),
            "Available companies: acme, initech\n\nTotal: 2"
        );
        assert_eq!(OdooTool::Create.render(&json!(42)), "Created record with ID: 42");
        assert_eq!(OdooTool::Create.render(&json!([42])), "Created record with ID: [42]");
        assert_eq!(OdooTool::Write.render(&json!(true)), "Updated successfully: true");
        assert_eq!(OdooTool::Unlink.render(&json!(true)), "Deleted successfully: true");
        assert_eq!(OdooTool::SearchCount.render(&json!(7)), "Count: 7");
        assert_eq!(
            OdooTool::Search.render(&json!([1, 2])),
            serde_json::to_string_pretty(&json!([1, 2])).unwrap()
        );
    }
}
