//! Outgoing request construction.
//!
//! [`build_call_context`] turns a registered operation plus one set of call
//! arguments into a [`CallContext`]: the fully resolved request that the
//! middleware chain rewrites and the gateway dispatches. A context is created
//! fresh per invocation and discarded after the response is returned.

use crate::credentials::Credential;
use crate::error::{InvokeError, Result};
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::Url;

/// Header names carrying tenant identity on outgoing requests.
///
/// Concrete names are a deployment detail; these defaults match the common
/// dashboard convention.
#[derive(Debug, Clone)]
pub struct TenantHeaders {
    pub application_id: String,
    pub api_key: String,
}

impl Default for TenantHeaders {
    fn default() -> Self {
        Self {
            application_id: "X-Application-Id".to_string(),
            api_key: "X-Api-Key".to_string(),
        }
    }
}

/// A fully resolved outgoing request.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl CallContext {
    /// First value of a header, by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The dispatch shape of one registered operation.
#[derive(Debug, Clone)]
pub(crate) struct RequestTemplate {
    pub method: Method,
    /// Server URL template, e.g. `https://{appId}.example.net`.
    pub server_url: String,
    /// Defaults for server URL variables absent from arguments.
    pub server_defaults: BTreeMap<String, String>,
    /// Path template, e.g. `/1/indexes/{indexName}/settings`.
    pub path: String,
    /// Declared query parameter names, appended when present in arguments.
    pub query_params: Vec<String>,
}

/// Build the base request for one invocation.
///
/// # Errors
///
/// Returns [`InvokeError::Usage`] for a body on a GET-mapped operation,
/// an unresolvable template variable, or an unparseable resulting URL, all
/// before any network access.
pub(crate) fn build_call_context(
    template: &RequestTemplate,
    arguments: &Map<String, Value>,
    credential: &Credential,
    tenant_headers: &TenantHeaders,
) -> Result<CallContext> {
    let body_arg = arguments.get("requestBody").filter(|v| !v.is_null());
    if template.method == Method::GET && body_arg.is_some() {
        return Err(InvokeError::Usage(
            "requestBody is not supported for GET requests".to_string(),
        ));
    }

    let server = substitute(
        &template.server_url,
        |name| {
            arguments
                .get(name)
                .map(value_to_string)
                .or_else(|| template.server_defaults.get(name).cloned())
        },
        "server URL",
    )?;
    let path = substitute(
        &template.path,
        |name| arguments.get(name).map(value_to_string),
        "path",
    )?;
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    };

    let joined = format!("{}{}", server.trim_end_matches('/'), path);
    let mut url = Url::parse(&joined)
        .map_err(|e| InvokeError::Usage(format!("invalid request URL '{joined}': {e}")))?;

    let pairs: Vec<(&str, String)> = template
        .query_params
        .iter()
        .filter_map(|name| {
            arguments
                .get(name)
                .filter(|v| !v.is_null())
                .map(|v| (name.as_str(), value_to_string(v)))
        })
        .collect();
    if !pairs.is_empty() {
        let mut serializer = url.query_pairs_mut();
        for (name, value) in &pairs {
            serializer.append_pair(name, value);
        }
    }

    // Callers sometimes pre-serialize the body; valid JSON text passes
    // through unchanged, everything else is serialized from structured form.
    let body = match body_arg {
        None => None,
        Some(Value::String(s)) if serde_json::from_str::<Value>(s).is_ok() => Some(s.clone()),
        Some(value) => Some(
            serde_json::to_string(value)
                .map_err(|e| InvokeError::Usage(format!("unserializable requestBody: {e}")))?,
        ),
    };

    let mut headers = vec![
        (
            tenant_headers.application_id.clone(),
            credential.application_id.clone(),
        ),
        (tenant_headers.api_key.clone(), credential.api_key.clone()),
    ];
    if body.is_some() {
        headers.push(("content-type".to_string(), "application/json".to_string()));
    }

    Ok(CallContext {
        method: template.method.clone(),
        url,
        headers,
        body,
    })
}

fn substitute(
    template: &str,
    mut lookup: impl FnMut(&str) -> Option<String>,
    what: &str,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            return Err(InvokeError::Usage(format!(
                "unterminated variable in {what} template '{template}'"
            )));
        };
        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| {
            InvokeError::Usage(format!("missing {what} variable '{name}'"))
        })?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// String form of an argument for URL substitution and query values.
///
/// Arrays join with commas (upstream endpoints that need repeated keys get
/// them from the explode middleware instead).
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}
