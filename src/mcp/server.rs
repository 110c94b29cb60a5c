//! Servidor MCP do Lore.
//!
//! Serve as tools da base de conhecimento sobre um transporte de linhas e roda
//! o scheduler de manutenção enquanto o cliente estiver conectado.

use std::io::{BufRead, BufReader, BufWriter, Stdin, Stdout, Write};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::knowledge::KnowledgeBase;
use crate::maintenance::MaintenanceScheduler;
use crate::LoreResult;

use super::protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult,
};
use super::tools::ToolHandler;
use super::transport::{Incoming, LineTransport};

/// Servidor MCP sobre qualquer transporte de linhas.
pub struct McpServer<R, W> {
    transport: LineTransport<R, W>,
    tools: ToolHandler,
    initialized: bool,
}

impl McpServer<BufReader<Stdin>, BufWriter<Stdout>> {
    /// Servidor no stdin/stdout do processo.
    pub fn stdio(knowledge: Arc<KnowledgeBase>) -> Self {
        Self::new(knowledge, LineTransport::stdio())
    }
}

impl<R: BufRead, W: Write> McpServer<R, W> {
    pub fn new(knowledge: Arc<KnowledgeBase>, transport: LineTransport<R, W>) -> Self {
        Self {
            transport,
            tools: ToolHandler::new(knowledge),
            initialized: false,
        }
    }

    /// Serve até o cliente fechar o stream, então para a manutenção
    /// e faz flush do que ainda estiver pendente.
    pub async fn run(&mut self) -> LoreResult<()> {
        let knowledge = Arc::clone(self.tools.knowledge());
        let scheduler = MaintenanceScheduler::new(
            knowledge.clone(),
            knowledge.config().maintenance.clone(),
        )
        .start();

        tracing::info!(jobs = scheduler.job_count(), "Lore MCP server starting");

        let served = self.serve().await;

        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!(error = %e, "Final flush failed");
        }
        tracing::info!("Lore MCP server stopped");
        served
    }

    /// Devolve o transporte.
    pub fn into_transport(self) -> LineTransport<R, W> {
        self.transport
    }

    async fn serve(&mut self) -> LoreResult<()> {
        loop {
            let request = match self.transport.read_message()? {
                Incoming::Request(request) => request,
                Incoming::Malformed(detail) => {
                    tracing::warn!(error = %detail, "Malformed message");
                    self.transport
                        .write_response(&JsonRpcResponse::error(None, JsonRpcError::parse_error(detail)))?;
                    continue;
                }
                Incoming::Eof => {
                    tracing::info!("Client disconnected");
                    return Ok(());
                }
            };

            // Notificações nunca recebem resposta.
            let is_notification = request.is_notification();
            let response = self.handle_request(request).await;

            if !is_notification {
                if let Err(e) = self.transport.write_response(&response) {
                    tracing::error!(error = %e, "Failed to write response");
                }
            }
        }
    }

    async fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, "Handling request");

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request(format!("unsupported jsonrpc '{}'", request.jsonrpc)),
            );
        }

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "initialized" | "notifications/initialized" => {
                tracing::info!("Client initialization complete");
                JsonRpcResponse::success(request.id, json!({}))
            }
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "shutdown" => {
                tracing::info!("Client requested shutdown");
                self.initialized = false;
                JsonRpcResponse::success(request.id, Value::Null)
            }
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            _ => JsonRpcResponse::error(request.id, JsonRpcError::method_not_found(&request.method)),
        }
    }

    fn handle_initialize(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::info!("Client initializing connection");
        self.initialized = true;

        match serde_json::to_value(InitializeResult::default()) {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(e) => JsonRpcResponse::error(request.id, JsonRpcError::internal_error(e.to_string())),
        }
    }

    fn handle_tools_list(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let result = ListToolsResult {
            tools: ToolHandler::list_tools(),
        };

        match serde_json::to_value(result) {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(e) => JsonRpcResponse::error(request.id, JsonRpcError::internal_error(e.to_string())),
        }
    }

    async fn handle_tools_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: CallToolParams = match request.params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                );
            }
            None => {
                return JsonRpcResponse::error(request.id, JsonRpcError::invalid_params("Missing params"));
            }
        };

        tracing::info!(tool = %params.name, "Calling tool");

        let result = self
            .tools
            .handle_tool_call(&params.name, params.arguments)
            .await;

        match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, JsonRpcError::internal_error(e.to_string())),
        }
    }
}
