// MCP (Model Context Protocol) server for Odoo.
// Exposes record operations on several configured companies as MCP tools.

pub mod company;
pub mod config;
pub mod dispatcher;
pub mod protocol;
pub mod server;
pub mod tools;

pub use company::CompanyRegistry;
pub use config::{ConfigError, ConfigLoader, EnvDefaults};
pub use dispatcher::{Dispatcher, Plan};
pub use server::McpServer;
pub use tools::OdooTool;
