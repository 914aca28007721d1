//! Transport layer for the Odoo client.

pub mod http;

pub use http::{Attempt, Execution, HttpTransport};
