//! Line-framed JSON-RPC 2.0 server.
//!
//! One JSON message per line in each direction. Every request runs on its
//! own task and all responses go through a single writer, so the order of
//! responses follows completion, not arrival. A request cancelled through
//! `notifications/cancelled` gets no response.

use std::collections::HashMap;
use std::sync::Arc;

use nexus_config::Config;
use nexus_core::{CallContext, ProviderError, ToolDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{GatewayError, GatewayResult};

/// Protocol revision announced when the client names none, or one this
/// server does not speak.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol revisions the server will agree to when a client asks for them.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

// ============================================================================
// SECTION: Server
// ============================================================================

/// Serves the dispatcher's tools to one client.
#[derive(Debug, Clone)]
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    name: Arc<str>,
    version: Arc<str>,
}

impl Server {
    /// Create a server announcing the configured name and version.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, config: &Config) -> Self {
        Self {
            dispatcher,
            name: Arc::from(config.server.name.as_str()),
            version: Arc::from(config.server.version.as_str()),
        }
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    ///
    /// # Errors
    ///
    /// Returns an error if reading stdin or writing stdout fails.
    pub async fn serve_stdio(&self) -> GatewayResult<()> {
        let reader = tokio::io::BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches end of input and every request in
    /// flight has finished.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> GatewayResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(server = %self.name, version = %self.version, "serving on stdio");
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let write_loop = async move {
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let read_loop = async move {
            let in_flight: InFlight = Arc::default();
            let mut tasks = JoinSet::new();
            let mut lines = reader.lines();
            let result = loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(GatewayError::Io(e)),
                };
                if line.trim().is_empty() {
                    continue;
                }
                self.accept(&line, &tx, &in_flight, &mut tasks).await;
                while let Some(joined) = tasks.try_join_next() {
                    log_join(joined);
                }
            };
            while let Some(joined) = tasks.join_next().await {
                log_join(joined);
            }
            debug!("input closed");
            result
        };

        let (read, write) = tokio::join!(read_loop, write_loop);
        read?;
        write.map_err(|e| GatewayError::Transport(format!("failed to write response: {e}")))
    }

    /// Parse one line and either answer it, act on it, or spawn it.
    async fn accept(
        &self,
        line: &str,
        tx: &mpsc::UnboundedSender<String>,
        in_flight: &InFlight,
        tasks: &mut JoinSet<()>,
    ) {
        let raw: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "unparseable message");
                send(
                    tx,
                    &JsonRpcResponse::failure(Value::Null, PARSE_ERROR, "parse error"),
                );
                return;
            },
        };
        let id = raw.get("id").cloned();
        let message: JsonRpcMessage = match serde_json::from_value(raw) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "malformed message");
                if let Some(id) = id {
                    send(
                        tx,
                        &JsonRpcResponse::failure(id, INVALID_REQUEST, "invalid request"),
                    );
                }
                return;
            },
        };

        let Some(id) = message.id else {
            notification(&message.method, message.params, in_flight).await;
            return;
        };
        if message.jsonrpc != "2.0" {
            send(
                tx,
                &JsonRpcResponse::failure(id, INVALID_REQUEST, "invalid json-rpc version"),
            );
            return;
        }

        let key = id.to_string();
        let token = CancellationToken::new();
        in_flight.lock().await.insert(key.clone(), token.clone());

        let server = self.clone();
        let tx = tx.clone();
        let in_flight = Arc::clone(in_flight);
        tasks.spawn(async move {
            let ctx = CallContext::new(token.clone());
            let outcome = server
                .handle_request(&ctx, &message.method, message.params)
                .await;
            in_flight.lock().await.remove(&key);
            if token.is_cancelled() {
                debug!(id = %key, method = %message.method, "request cancelled; dropping response");
                return;
            }
            let response = match outcome {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(error) => JsonRpcResponse {
                    jsonrpc: "2.0",
                    id,
                    result: None,
                    error: Some(error),
                },
            };
            send(&tx, &response);
        });
    }

    async fn handle_request(
        &self,
        ctx: &CallContext,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => Ok(self.initialize(params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.list_tools() })),
            "tools/call" => self.call_tool(ctx, params).await,
            _ => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("method not found: {method}"),
            )),
        }
    }

    // ========================================================================
    // SECTION: Methods
    // ========================================================================

    fn initialize(&self, params: Option<&Value>) -> Value {
        let protocol = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .filter(|requested| SUPPORTED_PROTOCOL_VERSIONS.contains(requested))
            .unwrap_or(PROTOCOL_VERSION);
        json!({
            "protocolVersion": protocol,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": &*self.name, "version": &*self.version },
        })
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        self.dispatcher
            .advertised_tools()
            .iter()
            .map(ToolDefinition::from_descriptor)
            .collect()
    }

    async fn call_tool(
        &self,
        ctx: &CallContext,
        params: Option<Value>,
    ) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|_| JsonRpcError::new(INVALID_PARAMS, "invalid tool params"))?;
        let arguments = match params.arguments {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                return Err(JsonRpcError::new(
                    INVALID_PARAMS,
                    "tool arguments must be an object",
                ));
            },
        };

        match self.dispatcher.invoke(ctx, &params.name, arguments).await {
            Ok(result) => Ok(json!({
                "content": result.content,
                "isError": result.is_error,
            })),
            Err(e @ GatewayError::UnknownTool { .. }) => {
                Err(JsonRpcError::new(INVALID_PARAMS, e.to_string()))
            },
            Err(GatewayError::Provider(ProviderError::Cancelled)) => {
                Err(JsonRpcError::new(INTERNAL_ERROR, "request cancelled"))
            },
            Err(e) => {
                error!(tool = %params.name, error = %e, "tool call failed");
                Err(JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
            },
        }
    }
}

async fn notification(method: &str, params: Option<Value>, in_flight: &InFlight) {
    match method {
        "notifications/initialized" => debug!("client initialized"),
        "notifications/cancelled" => {
            let Some(request_id) = params.as_ref().and_then(|p| p.get("requestId")) else {
                debug!("cancel notification without requestId");
                return;
            };
            let key = request_id.to_string();
            if let Some(token) = in_flight.lock().await.remove(&key) {
                info!(id = %key, "cancelling request");
                token.cancel();
            } else {
                debug!(id = %key, "cancel for unknown or finished request");
            }
        },
        other => debug!(method = %other, "ignoring notification"),
    }
}

fn send(tx: &mpsc::UnboundedSender<String>, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(line) => {
            if tx.send(line).is_err() {
                warn!("response writer closed");
            }
        },
        Err(e) => error!(error = %e, "failed to serialize response"),
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "request task failed");
    }
}

// ============================================================================
// SECTION: JSON-RPC Types
// ============================================================================

/// Incoming request or notification.
#[derive(Debug, Deserialize)]
struct JsonRpcMessage {
    /// Protocol version.
    jsonrpc: String,
    /// Request identifier; absent on notifications.
    #[serde(default)]
    id: Option<Value>,
    /// Method name.
    method: String,
    /// Optional parameters.
    #[serde(default)]
    params: Option<Value>,
}

/// Response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError::new(code, message)),
        }
    }
}

/// Error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// `tools/call` parameters.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Tool as advertised by `tools/list`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDefinition {
    name: String,
    description: String,
    input_schema: Value,
    annotations: ToolAnnotations,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolAnnotations {
    read_only_hint: bool,
    destructive_hint: bool,
}

impl ToolDefinition {
    fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema(),
            annotations: ToolAnnotations {
                read_only_hint: descriptor.read_only,
                destructive_hint: descriptor.destructive,
            },
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
