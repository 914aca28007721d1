//! Operation requests sent to the JSON-2 endpoint.

use serde_json::{Map, Value};
use std::fmt;

/// Remote ORM method invoked by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    SearchRead,
    Create,
    Write,
    Unlink,
    Search,
    Read,
    SearchCount,
}

impl Method {
    /// Name used in the endpoint path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchRead => "search_read",
            Self::Create => "create",
            Self::Write => "write",
            Self::Unlink => "unlink",
            Self::Search => "search",
            Self::Read => "read",
            Self::SearchCount => "search_count",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional paging and projection arguments shared by the search methods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub fields: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order: Option<String>,
}

/// A single call against `/json/2/{model}/{method}`.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub model: String,
    pub method: Method,
    pub payload: Map<String, Value>,
}

impl OperationRequest {
    pub fn new(model: impl Into<String>, method: Method, payload: Map<String, Value>) -> Self {
        Self {
            model: model.into(),
            method,
            payload,
        }
    }

    pub fn search_read(model: impl Into<String>, domain: Vec<Value>, options: &SearchOptions) -> Self {
        let mut payload = domain_payload(domain);
        insert_fields(&mut payload, &options.fields);
        insert_paging(&mut payload, options);
        Self::new(model, Method::SearchRead, payload)
    }

    pub fn search(model: impl Into<String>, domain: Vec<Value>, options: &SearchOptions) -> Self {
        let mut payload = domain_payload(domain);
        insert_paging(&mut payload, options);
        Self::new(model, Method::Search, payload)
    }

    pub fn read(model: impl Into<String>, ids: Vec<i64>, fields: &[String]) -> Self {
        let mut payload = ids_payload(ids);
        insert_fields(&mut payload, fields);
        Self::new(model, Method::Read, payload)
    }

    pub fn search_count(model: impl Into<String>, domain: Vec<Value>) -> Self {
        Self::new(model, Method::SearchCount, domain_payload(domain))
    }

    pub fn create(model: impl Into<String>, values: Map<String, Value>) -> Self {
        let mut payload = Map::new();
        payload.insert("values".to_string(), Value::Object(values));
        Self::new(model, Method::Create, payload)
    }

    pub fn write(model: impl Into<String>, ids: Vec<i64>, values: Map<String, Value>) -> Self {
        let mut payload = ids_payload(ids);
        payload.insert("values".to_string(), Value::Object(values));
        Self::new(model, Method::Write, payload)
    }

    pub fn unlink(model: impl Into<String>, ids: Vec<i64>) -> Self {
        Self::new(model, Method::Unlink, ids_payload(ids))
    }
}

fn domain_payload(domain: Vec<Value>) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("domain".to_string(), Value::Array(domain));
    payload
}

fn ids_payload(ids: Vec<i64>) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert(
        "ids".to_string(),
        Value::Array(ids.into_iter().map(Value::from).collect()),
    );
    payload
}

fn insert_fields(payload: &mut Map<String, Value>, fields: &[String]) {
    if !fields.is_empty() {
        payload.insert(
            "fields".to_string(),
            Value::Array(fields.iter().cloned().map(Value::String).collect()),
        );
    }
}

// Zero limit/offset and an empty order are omitted, matching the server defaults.
fn insert_paging(payload: &mut Map<String, Value>, options: &SearchOptions) {
    if let Some(limit) = options.limit.filter(|l| *l > 0) {
        payload.insert("limit".to_string(), Value::from(limit));
    }
    if let Some(offset) = options.offset.filter(|o| *o > 0) {
        payload.insert("offset".to_string(), Value::from(offset));
    }
    if let Some(order) = options.order.as_deref().filter(|o| !o.is_empty()) {
        payload.insert("order".to_string(), Value::String(order.to_string()));
    }
}
