// Operation dispatcher: validates tool arguments and routes them to the
// right company's client

use crate::company::CompanyRegistry;
use crate::tools::OdooTool;
use odoo_client::{Method, OdooClient, OdooError, OdooResult, OperationRequest, SearchOptions};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What a validated tool call turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Answered from the registry without network I/O.
    ListCompanies,
    /// A remote call against one company.
    Remote {
        company: String,
        request: OperationRequest,
    },
}

/// Routes tool calls to per-company clients.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<CompanyRegistry>,
    clients: HashMap<String, OdooClient>,
}

impl Dispatcher {
    /// Build one client per registered company.
    pub fn new(registry: Arc<CompanyRegistry>) -> OdooResult<Self> {
        let mut clients = HashMap::with_capacity(registry.len());
        for profile in registry.profiles() {
            clients.insert(profile.name.clone(), OdooClient::new(profile.clone())?);
        }

        Ok(Self { registry, clients })
    }

    pub async fn dispatch(&self, tool_name: &str, arguments: &Value) -> OdooResult<Value> {
        self.dispatch_with_cancel(tool_name, arguments, &CancellationToken::new())
            .await
    }

    /// Validate and run a tool call. The raw upstream result is returned
    /// unchanged.
    pub async fn dispatch_with_cancel(
        &self,
        tool_name: &str,
        arguments: &Value,
        cancel: &CancellationToken,
    ) -> OdooResult<Value> {
        let tool =
            OdooTool::from_name(tool_name).ok_or_else(|| OdooError::UnknownTool(tool_name.to_string()))?;

        match plan(tool, arguments)? {
            Plan::ListCompanies => Ok(Value::from(self.registry.names())),
            Plan::Remote { company, request } => {
                let client = self.client(&company)?;
                debug!(
                    tool = tool.name(),
                    company = %company,
                    model = %request.model,
                    "Dispatching tool call"
                );
                client.execute(&request, cancel).await
            }
        }
    }

    fn client(&self, company: &str) -> OdooResult<&OdooClient> {
        let profile = self.registry.resolve(company)?;
        self.clients.get(&profile.name).ok_or_else(|| {
            OdooError::Config(format!("no client built for company '{}'", profile.name))
        })
    }
}

/// Check a tool's arguments and build the call it maps to.
pub fn plan(tool: OdooTool, arguments: &Value) -> OdooResult<Plan> {
    let args = Arguments::new(arguments)?;
    args.require(tool.required_args())?;

    let Some(method) = tool.method() else {
        return Ok(Plan::ListCompanies);
    };

    let company = args.non_empty_string("company")?;
    let model = args.model()?;

    let request = match method {
        Method::SearchRead => OperationRequest::search_read(
            model,
            args.domain()?,
            &SearchOptions {
                fields: args.fields()?,
                ..args.paging()?
            },
        ),
        Method::Search => OperationRequest::search(model, args.domain()?, &args.paging()?),
        Method::Read => OperationRequest::read(model, args.ids()?, &args.fields()?),
        Method::SearchCount => OperationRequest::search_count(model, args.domain()?),
        Method::Create => OperationRequest::create(model, args.values()?),
        Method::Write => OperationRequest::write(model, args.ids()?, args.values()?),
        Method::Unlink => OperationRequest::unlink(model, args.ids()?),
    };

    Ok(Plan::Remote { company, request })
}

struct Arguments<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Arguments<'a> {
    fn new(arguments: &'a Value) -> OdooResult<Self> {
        match arguments {
            Value::Object(map) => Ok(Self { map: Some(map) }),
            Value::Null => Ok(Self { map: None }),
            _ => Err(OdooError::Validation(
                "arguments must be a JSON object".to_string(),
            )),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map
            .and_then(|map| map.get(key))
            .filter(|value| !value.is_null())
    }

    fn require(&self, required: &[&str]) -> OdooResult<()> {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|key| self.get(key).is_none())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(OdooError::Validation(format!(
                "missing required arguments: {}",
                missing.join(", ")
            )))
        }
    }

    fn non_empty_string(&self, key: &str) -> OdooResult<String> {
        match self.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(Value::String(_)) => Err(invalid(key, "must not be empty")),
            Some(_) => Err(invalid(key, "must be a string")),
            None => Err(invalid(key, "is required")),
        }
    }

    // Model names end up in the URL path.
    fn model(&self) -> OdooResult<String> {
        let model = self.non_empty_string("model")?;
        let valid = model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
        if !valid {
            return Err(invalid(
                "model",
                "may only contain letters, digits, '.' and '_'",
            ));
        }
        Ok(model)
    }

    fn domain(&self) -> OdooResult<Vec<Value>> {
        match self.get("domain") {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(invalid("domain", "must be a list")),
        }
    }

    fn fields(&self) -> OdooResult<Vec<String>> {
        match self.get("fields") {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid("fields", "must be a list of strings"))
                })
                .collect(),
            Some(_) => Err(invalid("fields", "must be a list of strings")),
        }
    }

    fn ids(&self) -> OdooResult<Vec<i64>> {
        match self.get("ids") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_i64()
                        .ok_or_else(|| invalid("ids", "must be a list of integers"))
                })
                .collect(),
            Some(_) => Err(invalid("ids", "must be a list of integers")),
            None => Err(invalid("ids", "is required")),
        }
    }

    fn values(&self) -> OdooResult<Map<String, Value>> {
        match self.get("values") {
            Some(Value::Object(values)) => Ok(values.clone()),
            Some(_) => Err(invalid("values", "must be an object")),
            None => Err(invalid("values", "is required")),
        }
    }

    fn count(&self, key: &str) -> OdooResult<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid(key, "must be a non-negative integer")),
        }
    }

    fn paging(&self) -> OdooResult<SearchOptions> {
        let order = match self.get("order") {
            None => None,
            Some(Value::String(order)) => Some(order.clone()),
            Some(_) => return Err(invalid("order", "must be a string")),
        };

        Ok(SearchOptions {
            fields: Vec::new(),
            limit: self.count("limit")?,
            offset: self.count("offset")?,
            order,
        })
    }
}

fn invalid(key: &str, problem: &str) -> OdooError {
    OdooError::Validation(format!("'{}' {}", key, problem))
}
