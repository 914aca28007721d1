pub mod odoo;
mod schema;

pub use odoo::{OdooTool, TOOL_PREFIX};
pub use schema::{
    json_schema_array, json_schema_domain, json_schema_integer, json_schema_object,
    json_schema_object_value, json_schema_string,
};
