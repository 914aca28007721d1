//! # Odoo Client
//!
//! Resilient client for the Odoo External JSON-2 API.
//!
//! Every call is a `POST {base_url}/json/2/{model}/{method}` carrying a bearer
//! token and the target database. Calls are bounded by the profile's timeout
//! and retried with exponential backoff on 429/5xx responses, timeouts and
//! connection failures.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use odoo_client::{CompanyProfile, OdooClient, OdooResult, SearchOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> OdooResult<()> {
//!     let profile = CompanyProfile::new(
//!         "acme",
//!         "https://acme.odoo.com",
//!         "acme-prod",
//!         "your-api-key",
//!     )?;
//!     let client = OdooClient::new(Arc::new(profile))?;
//!
//!     let options = SearchOptions {
//!         fields: vec!["name".to_string()],
//!         limit: Some(10),
//!         ..Default::default()
//!     };
//!     let partners = client.search_read("res.partner", vec![], &options).await?;
//!     println!("{}", partners);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod transport;

pub use client::OdooClient;
pub use config::{CompanyProfile, RetryConfig};
pub use error::{ErrorKind, OdooError, OdooResult, RETRYABLE_STATUS_CODES};
pub use request::{Method, OperationRequest, SearchOptions};
pub use transport::{Attempt, Execution, HttpTransport};
