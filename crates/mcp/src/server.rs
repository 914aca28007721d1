// MCP server: newline-delimited JSON-RPC 2.0 over stdio

use crate::dispatcher::Dispatcher;
use crate::protocol::*;
use crate::tools::OdooTool;
use anyhow::{Context, Result};
use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use odoo_client::OdooError;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest accepted request line.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

const SERVER_NAME: &str = "odoo-mcp";

const INSTRUCTIONS: &str = "Tools for reading and writing Odoo records across several \
    configured companies. Call odoo_list_companies first to see which company names are available.";

type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    max_line_length: usize,
}

impl McpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            max_line_length: MAX_LINE_BYTES,
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn run_stdio(&self) -> Result<()> {
        info!("MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests read from `reader`, writing responses to `writer`.
    ///
    /// `tools/call` requests run concurrently. When the reader reaches EOF
    /// every in-flight call is cancelled and awaited before returning.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut lines = FramedRead::new(reader, RequestLines::new(self.max_line_length));
        let (tx, rx) = mpsc::channel::<JsonRpcResponse>(64);
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let in_flight: InFlight = Arc::new(Mutex::new(HashMap::new()));
        let mut calls = JoinSet::new();

        loop {
            let line = match lines.next().await {
                Some(Ok(Frame::Line(line))) => line,
                Some(Ok(Frame::Oversized)) => {
                    warn!(max_bytes = self.max_line_length, "Request line too long");
                    let response = JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error());
                    if tx.send(response).await.is_err() {
                        break;
                    }
                    continue;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to read from input");
                    break;
                }
                None => break,
            };

            // Reap finished calls so the set does not grow unbounded.
            while calls.try_join_next().is_some() {}

            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line, &tx, &in_flight, &mut calls).await {
                if tx.send(response).await.is_err() {
                    break;
                }
            }
        }

        let pending = {
            let tokens = in_flight.lock().await;
            for token in tokens.values() {
                token.cancel();
            }
            tokens.len()
        };
        if pending > 0 {
            info!(pending, "Input closed, cancelling in-flight calls");
        }
        while calls.join_next().await.is_some() {}

        drop(tx);
        writer_task.await.context("response writer panicked")?
    }

    /// Handle one input line. Returns the immediate response, if any.
    async fn handle_line(
        &self,
        line: &str,
        tx: &mpsc::Sender<JsonRpcResponse>,
        in_flight: &InFlight,
        calls: &mut JoinSet<()>,
    ) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Unparsable request line");
                return Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()));
            }
        };

        let request: JsonRpcRequest = match serde_json::from_value(value.clone()) {
            Ok(request) => request,
            Err(_) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
            }
        };

        if request.jsonrpc != "2.0" {
            return request
                .id
                .map(|id| JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        let Some(id) = request.id.clone() else {
            self.handle_notification(&request, in_flight).await;
            return None;
        };

        debug!(method = %request.method, id = %id, "Request received");

        match request.method.as_str() {
            "initialize" => Some(result_response(id, &initialize_result())),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Some(result_response(id, &list_tools_result())),
            "tools/call" => {
                let params = match parse_call_params(request.params) {
                    Ok(params) => params,
                    Err(error) => return Some(JsonRpcResponse::error(id, error)),
                };
                self.spawn_call(id, params, tx.clone(), in_flight, calls).await;
                None
            }
            other => Some(JsonRpcResponse::error(id, JsonRpcError::method_not_found(other))),
        }
    }

    async fn handle_notification(&self, request: &JsonRpcRequest, in_flight: &InFlight) {
        match request.method.as_str() {
            "notifications/initialized" => debug!("Client initialized"),
            "notifications/cancelled" => {
                let params = request
                    .params
                    .clone()
                    .and_then(|params| serde_json::from_value::<CancelledParams>(params).ok());
                let Some(params) = params else {
                    debug!("Ignoring malformed cancellation");
                    return;
                };

                let key = request_key(&params.request_id);
                if let Some(token) = in_flight.lock().await.get(&key) {
                    info!(
                        request_id = %params.request_id,
                        reason = params.reason.as_deref().unwrap_or(""),
                        "Cancelling tool call"
                    );
                    token.cancel();
                }
            }
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    async fn spawn_call(
        &self,
        id: Value,
        params: CallToolParams,
        tx: mpsc::Sender<JsonRpcResponse>,
        in_flight: &InFlight,
        calls: &mut JoinSet<()>,
    ) {
        let key = request_key(&id);
        let token = CancellationToken::new();
        in_flight.lock().await.insert(key.clone(), token.clone());

        let dispatcher = self.dispatcher.clone();
        let in_flight = in_flight.clone();

        calls.spawn(async move {
            let started = Instant::now();
            let arguments = params.arguments.unwrap_or(Value::Null);
            let outcome = dispatcher
                .dispatch_with_cancel(&params.name, &arguments, &token)
                .await;
            in_flight.lock().await.remove(&key);

            let result = match outcome {
                Ok(value) => {
                    info!(
                        tool = %params.name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Tool call succeeded"
                    );
                    CallToolResult::text(render_success(&params.name, &value))
                }
                Err(OdooError::Cancelled) => {
                    info!(tool = %params.name, "Tool call cancelled");
                    return;
                }
                Err(e) => {
                    warn!(
                        tool = %params.name,
                        kind = %e.kind(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %e,
                        "Tool call failed"
                    );
                    CallToolResult::error(e.to_string())
                }
            };

            let _ = tx.send(result_response(id, &result)).await;
        });
    }
}

/// One decoded input frame.
#[derive(Debug, PartialEq)]
enum Frame {
    Line(String),
    /// A line longer than the limit; its bytes are dropped up to the next newline.
    Oversized,
}

/// Line decoder that reports over-long lines as a frame instead of an error,
/// so the input stream keeps going after one.
struct RequestLines {
    inner: LinesCodec,
}

impl RequestLines {
    fn new(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
        }
    }

    fn frame(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<Frame>, LinesCodecError> {
        match result {
            Ok(line) => Ok(line.map(Frame::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Frame::Oversized)),
            Err(e) => Err(e),
        }
    }
}

impl Decoder for RequestLines {
    type Item = Frame;
    type Error = LinesCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        Self::frame(self.inner.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        Self::frame(self.inner.decode_eof(src))
    }
}

async fn write_responses<W>(writer: W, mut rx: mpsc::Receiver<JsonRpcResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    while let Some(response) = rx.recv().await {
        let line = serde_json::to_string(&response).context("failed to serialize response")?;
        sink.send(line).await.context("failed to write response")?;
    }
    Ok(())
}

fn parse_call_params(params: Option<Value>) -> Result<CallToolParams, JsonRpcError> {
    match params {
        Some(params @ Value::Object(_)) => serde_json::from_value(params)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e))),
        _ => Err(JsonRpcError::invalid_params(
            "tools/call params must be an object",
        )),
    }
}

fn render_success(tool_name: &str, value: &Value) -> String {
    match OdooTool::from_name(tool_name) {
        Some(tool) => tool.render(value),
        None => value.to_string(),
    }
}

fn result_response<T: Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
    }
}

fn request_key(id: &Value) -> String {
    id.to_string()
}

fn initialize_result() -> InitializeResult {
    InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
        },
        server_info: ServerInfo {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        instructions: Some(INSTRUCTIONS.to_string()),
    }
}

fn list_tools_result() -> ListToolsResult {
    ListToolsResult {
        tools: OdooTool::ALL.iter().map(OdooTool::schema).collect(),
    }
}
