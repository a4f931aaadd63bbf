//! Tool registration and invocation.
//!
//! [`ToolRegistry`] is built once at startup: each allowed operation from the
//! loaded descriptions becomes one MCP tool with a compiled input schema and
//! a fixed middleware chain. Per call, [`ToolRegistry::call_tool`] runs the
//! pipeline: validate arguments, resolve credentials, build the request, run
//! the middleware chain in order, dispatch once (no retries), and wrap the
//! response.

use crate::credentials::CredentialStrategy;
use crate::error::{InvokeError, RegistryError, Result};
use crate::middleware::RequestMiddleware;
use crate::request::{CallContext, RequestTemplate, TenantHeaders, build_call_context};
use reqwest::Method;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool, ToolAnnotations};
use searchbridge_openapi_tools::filter::ToolFilter;
use searchbridge_openapi_tools::schema::{CompiledSchema, compile};
use searchbridge_openapi_tools::spec::{
    ApiDescription, Operation, ParamLocation, SchemaMetadata, SchemaNode, ServerTemplate,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One operation registered as a callable tool.
struct RegisteredTool {
    operation_id: String,
    description: String,
    template: RequestTemplate,
    input_schema: CompiledSchema,
    middlewares: Vec<Arc<dyn RequestMiddleware>>,
}

/// The startup-built table of callable tools.
///
/// The registry is immutable after registration; concurrent calls share it
/// behind an `Arc` and never affect each other.
pub struct ToolRegistry {
    client: reqwest::Client,
    credentials: CredentialStrategy,
    tenant_headers: TenantHeaders,
    tools: HashMap<String, Arc<RegisteredTool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new(credentials: CredentialStrategy) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            tenant_headers: TenantHeaders::default(),
            tools: HashMap::new(),
        }
    }

    /// Override the header names carrying tenant identity.
    #[must_use]
    pub fn with_tenant_headers(mut self, tenant_headers: TenantHeaders) -> Self {
        self.tenant_headers = tenant_headers;
        self
    }

    /// Register every allowed operation of one description.
    ///
    /// Registration is all-or-nothing: on error the registry is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MissingServer`] when the description declares
    /// no servers, and [`RegistryError::DuplicateOperationId`] when an
    /// operation id collides with one already registered (or with another
    /// operation in the same description).
    pub fn register_description(
        &mut self,
        description: &ApiDescription,
        filter: &ToolFilter,
        middlewares: &[Arc<dyn RequestMiddleware>],
    ) -> std::result::Result<(), RegistryError> {
        let server = description
            .servers
            .first()
            .ok_or(RegistryError::MissingServer)?;

        let server_defaults: BTreeMap<String, String> = server
            .variables
            .iter()
            .filter_map(|(name, var)| var.default.clone().map(|d| (name.clone(), d)))
            .collect();

        let mut batch: Vec<Arc<RegisteredTool>> = Vec::new();
        for (path, method, op) in description.operations() {
            if !filter.is_allowed(&op.operation_id) {
                tracing::debug!(operation_id = %op.operation_id, "filtered out");
                continue;
            }

            let id = op.operation_id.clone();
            let already_registered = self.tools.contains_key(&id)
                || batch.iter().any(|t| t.operation_id == id);
            if already_registered {
                return Err(RegistryError::DuplicateOperationId(id));
            }

            let input_schema = compile(&self.build_input_schema(server, op));
            let query_params: Vec<String> = op
                .parameters
                .iter()
                .filter(|p| p.location == ParamLocation::Query)
                .map(|p| p.name.clone())
                .collect();

            tracing::debug!(operation_id = %id, %path, %method, "registered tool");
            batch.push(Arc::new(RegisteredTool {
                operation_id: id,
                description: op.doc(),
                template: RequestTemplate {
                    method: parse_method(method),
                    server_url: server.url.clone(),
                    server_defaults: server_defaults.clone(),
                    path: path.to_string(),
                    query_params,
                },
                input_schema,
                middlewares: middlewares.to_vec(),
            }));
        }

        for tool in batch {
            self.tools.insert(tool.operation_id.clone(), tool);
        }
        Ok(())
    }

    /// The tool-call input schema for one operation.
    ///
    /// Injected arguments (`applicationId`, server URL variables) sit next to
    /// the declared parameters and the `requestBody` slot in one flat object.
    fn build_input_schema(&self, server: &ServerTemplate, op: &Operation) -> SchemaNode {
        let mut properties: BTreeMap<String, SchemaNode> = BTreeMap::new();
        let mut required: Vec<String> = Vec::new();

        properties.insert(
            "applicationId".to_string(),
            SchemaNode::string("Identifier of the application to run this call against."),
        );
        if self.credentials.requires_application_id() {
            required.push("applicationId".to_string());
        }

        for (name, var) in &server.variables {
            if properties.contains_key(name) {
                continue;
            }
            let mut node = SchemaNode::string(
                var.description
                    .clone()
                    .unwrap_or_else(|| format!("Value for the '{name}' slot of the server URL.")),
            );
            match &var.default {
                Some(default) => {
                    node.metadata_mut().default = Some(Value::String(default.clone()));
                }
                None => required.push(name.clone()),
            }
            properties.insert(name.clone(), node);
        }

        for param in &op.parameters {
            let mut node = param.schema.clone().unwrap_or_else(SchemaNode::any);
            if node.metadata().description.is_none() {
                node.metadata_mut().description.clone_from(&param.description);
            }
            // Path parameters are structurally required regardless of the
            // declared flag: the URL cannot be built without them.
            if param.required || param.location == ParamLocation::Path {
                required.push(param.name.clone());
            }
            properties.insert(param.name.clone(), node);
        }

        if let Some(body) = &op.request_body {
            let mut node = body.json_schema().cloned().unwrap_or_else(SchemaNode::any);
            if node.metadata().description.is_none() {
                node.metadata_mut().description.clone_from(&body.description);
            }
            if body.required {
                required.push("requestBody".to_string());
            }
            properties.insert("requestBody".to_string(), node);
        }

        SchemaNode::Object {
            properties,
            required,
            metadata: SchemaMetadata::default(),
        }
    }

    /// List the MCP `Tool`s exposed by this registry, in stable name order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        let mut registered: Vec<&Arc<RegisteredTool>> = self.tools.values().collect();
        registered.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));

        registered
            .into_iter()
            .map(|t| {
                let schema_obj = t
                    .input_schema
                    .json_schema()
                    .as_object()
                    .cloned()
                    .unwrap_or_else(JsonObject::new);
                let mut tool = Tool::new(
                    t.operation_id.clone(),
                    t.description.clone(),
                    Arc::new(schema_obj),
                );
                tool.annotations = Some(annotations_for_method(&t.template.method));
                tool
            })
            .collect()
    }

    /// Execute one tool call through the full pipeline.
    ///
    /// Upstream error statuses are not errors here: the response body passes
    /// through as result content and the caller interprets it.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::UnknownTool`] for an unregistered name,
    /// [`InvokeError::Validation`] with every violated field, and the
    /// credential/usage/transport errors of the downstream pipeline stages.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| InvokeError::UnknownTool(name.to_string()))?;

        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        tool.input_schema
            .validate(&with_parsed_body(&arguments))
            .map_err(InvokeError::Validation)?;
        let args = arguments
            .as_object()
            .ok_or_else(|| InvokeError::Usage("arguments must be a JSON object".to_string()))?;

        let application_id = args
            .get("applicationId")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let credential = self.credentials.resolve(application_id).await?;

        let mut ctx = build_call_context(&tool.template, args, &credential, &self.tenant_headers)?;
        for middleware in &tool.middlewares {
            ctx = middleware.apply(ctx, args).await?;
        }

        let text = self.dispatch(ctx).await?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    async fn dispatch(&self, ctx: CallContext) -> Result<String> {
        tracing::debug!(method = %ctx.method, url = %ctx.url, "dispatching");

        let mut request = self.client.request(ctx.method, ctx.url);
        for (name, value) in &ctx.headers {
            request = request.header(name, value);
        }
        if let Some(body) = ctx.body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| InvokeError::Transport(format!("failed reading response body: {e}")))?;

        if !status.is_success() {
            tracing::debug!(%status, "upstream returned an error status");
        }

        Ok(if text.is_empty() {
            status.to_string()
        } else {
            text
        })
    }
}

/// The arguments as seen by validation.
///
/// Callers sometimes pre-serialize the request body; the declared body shape
/// applies to the parsed form, so a `requestBody` string holding valid JSON
/// is validated parsed. The original string still reaches dispatch unchanged.
/// A string that is not valid JSON is left as-is and fails against any
/// non-string body schema.
fn with_parsed_body(arguments: &Value) -> Value {
    let Some(obj) = arguments.as_object() else {
        return arguments.clone();
    };
    let Some(Value::String(text)) = obj.get("requestBody") else {
        return arguments.clone();
    };
    match serde_json::from_str::<Value>(text) {
        Ok(parsed) => {
            let mut view = obj.clone();
            view.insert("requestBody".to_string(), parsed);
            Value::Object(view)
        }
        Err(_) => arguments.clone(),
    }
}

fn parse_method(method: &str) -> Method {
    match method {
        "get" => Method::GET,
        "post" => Method::POST,
        "put" => Method::PUT,
        "delete" => Method::DELETE,
        other => Method::from_bytes(other.to_ascii_uppercase().as_bytes())
            .unwrap_or(Method::GET),
    }
}

/// MCP tool annotations derived from RFC 9110 method semantics.
///
/// `openWorldHint` is always true: every tool here talks to an external
/// system.
fn annotations_for_method(method: &Method) -> ToolAnnotations {
    let open_world_hint = Some(true);

    if *method == Method::GET {
        return ToolAnnotations {
            title: None,
            read_only_hint: Some(true),
            destructive_hint: Some(false),
            idempotent_hint: Some(true),
            open_world_hint,
        };
    }
    if *method == Method::POST {
        return ToolAnnotations {
            title: None,
            read_only_hint: Some(false),
            destructive_hint: Some(false),
            idempotent_hint: Some(false),
            open_world_hint,
        };
    }
    if *method == Method::PUT || *method == Method::DELETE {
        return ToolAnnotations {
            title: None,
            read_only_hint: Some(false),
            destructive_hint: Some(true),
            idempotent_hint: Some(true),
            open_world_hint,
        };
    }

    ToolAnnotations {
        title: None,
        read_only_hint: None,
        destructive_hint: None,
        idempotent_hint: None,
        open_world_hint,
    }
}
