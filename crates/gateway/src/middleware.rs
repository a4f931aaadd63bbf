//! Request-rewriting middleware.
//!
//! A middleware is a potentially asynchronous rewriting step, not a
//! general-purpose server middleware: it receives the request-so-far plus the
//! resolved call arguments and returns the same request or a replacement.
//! The gateway applies the chain in strict registration order and awaits each
//! step (a middleware may perform its own network side call) before the next.
//!
//! Tenant-specific corrections layer in here instead of being hardcoded in
//! the gateway; the two shipped middlewares cover the known upstream quirks.

use crate::credentials::{ApplicationInfo, DashboardSession};
use crate::error::{InvokeError, Result};
use crate::request::CallContext;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// One ordered request-rewriting step.
#[async_trait]
pub trait RequestMiddleware: Send + Sync {
    /// Rewrite the request-so-far, or return it unchanged.
    async fn apply(
        &self,
        ctx: CallContext,
        arguments: &Map<String, Value>,
    ) -> Result<CallContext>;
}

/// Rewrites the data-residency segment of the target host based on a side
/// lookup of the tenant's region.
///
/// Some upstream hosts embed a serving region (e.g. `data.us.example.net`)
/// that must match where the tenant's data actually lives. Callers routinely
/// guess this wrong, so the middleware looks the application up in the
/// session's application list and corrects the host when they disagree.
///
/// The application list is cached; refreshes swap the whole list under a
/// write lock so concurrent readers never observe a partial update.
pub struct DataResidencyRewrite {
    session: Arc<dyn DashboardSession>,
    /// Target host template with a `{region}` slot.
    host_template: String,
    /// Maps a reported residency value to the serving region when they differ.
    aliases: HashMap<String, String>,
    /// Region used when the dashboard reports none.
    fallback_region: String,
    cache: RwLock<Option<Arc<Vec<ApplicationInfo>>>>,
}

impl DataResidencyRewrite {
    #[must_use]
    pub fn new(
        session: Arc<dyn DashboardSession>,
        host_template: impl Into<String>,
        fallback_region: impl Into<String>,
    ) -> Self {
        Self {
            session,
            host_template: host_template.into(),
            aliases: HashMap::new(),
            fallback_region: fallback_region.into(),
            cache: RwLock::new(None),
        }
    }

    /// Map a reported residency value to a different serving region.
    #[must_use]
    pub fn with_alias(mut self, residency: impl Into<String>, region: impl Into<String>) -> Self {
        self.aliases.insert(residency.into(), region.into());
        self
    }

    async fn applications(&self) -> Result<Arc<Vec<ApplicationInfo>>> {
        if let Some(apps) = self.cache.read().clone() {
            return Ok(apps);
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<Arc<Vec<ApplicationInfo>>> {
        let apps = self.session.list_applications().await.map_err(|e| {
            InvokeError::Transport(format!("application list lookup failed: {e}"))
        })?;
        let apps = Arc::new(apps);
        *self.cache.write() = Some(Arc::clone(&apps));
        Ok(apps)
    }

    async fn serving_region(&self, application_id: &str) -> Result<String> {
        let find = |apps: &[ApplicationInfo]| {
            apps.iter()
                .find(|a| a.id == application_id)
                .map(|a| a.data_residency_region.clone())
        };

        let mut found = find(&self.applications().await?);
        if found.is_none() {
            // Unknown id: the cache may predate the application.
            found = find(&self.refresh().await?);
        }

        Ok(match found.flatten() {
            Some(residency) => self
                .aliases
                .get(&residency)
                .cloned()
                .unwrap_or(residency),
            None => self.fallback_region.clone(),
        })
    }
}

#[async_trait]
impl RequestMiddleware for DataResidencyRewrite {
    async fn apply(
        &self,
        mut ctx: CallContext,
        arguments: &Map<String, Value>,
    ) -> Result<CallContext> {
        let Some(application_id) = arguments.get("applicationId").and_then(Value::as_str) else {
            return Ok(ctx);
        };

        let region = self.serving_region(application_id).await?;
        let target = self.host_template.replace("{region}", &region);

        if ctx.url.host_str() != Some(target.as_str()) {
            tracing::warn!(
                from = ctx.url.host_str().unwrap_or(""),
                to = %target,
                application_id = %application_id,
                "adjusting data-residency host"
            );
            ctx.url.set_host(Some(&target)).map_err(|e| {
                InvokeError::Transport(format!("cannot rewrite host to '{target}': {e}"))
            })?;
        }

        Ok(ctx)
    }
}

/// Explodes a comma-joined query value into repeated query parameters, for
/// upstream endpoints that require repeated-key encoding
/// (`?name=a&name=b` rather than `?name=a,b`).
pub struct ExplodeQueryValues {
    param: String,
}

impl ExplodeQueryValues {
    #[must_use]
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }
}

#[async_trait]
impl RequestMiddleware for ExplodeQueryValues {
    async fn apply(
        &self,
        mut ctx: CallContext,
        _arguments: &Map<String, Value>,
    ) -> Result<CallContext> {
        let pairs: Vec<(String, String)> = ctx
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let joined = pairs
            .iter()
            .find(|(k, _)| *k == self.param)
            .map(|(_, v)| v.clone());
        let Some(joined) = joined else {
            return Ok(ctx);
        };
        if !joined.contains(',') {
            return Ok(ctx);
        }

        let mut serializer = ctx.url.query_pairs_mut();
        serializer.clear();
        for (key, value) in &pairs {
            if *key == self.param {
                for part in value.split(',') {
                    serializer.append_pair(key, part);
                }
            } else {
                serializer.append_pair(key, value);
            }
        }
        drop(serializer);

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use serde_json::json;
    use url::Url;

    fn ctx(url: &str) -> CallContext {
        CallContext {
            method: Method::GET,
            url: Url::parse(url).unwrap(),
            headers: Vec::new(),
            body: None,
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    struct ListSession {
        apps: Vec<ApplicationInfo>,
    }

    #[async_trait]
    impl DashboardSession for ListSession {
        async fn application_api_key(&self, _application_id: &str) -> anyhow::Result<String> {
            anyhow::bail!("not used")
        }

        async fn list_applications(&self) -> anyhow::Result<Vec<ApplicationInfo>> {
            Ok(self.apps.clone())
        }
    }

    #[tokio::test]
    async fn rewrites_host_when_region_disagrees() {
        let session = Arc::new(ListSession {
            apps: vec![ApplicationInfo {
                id: "APP1".to_string(),
                data_residency_region: Some("de".to_string()),
            }],
        });
        let mw = DataResidencyRewrite::new(session, "data.{region}.example.net", "us")
            .with_alias("de", "eu");

        let rewritten = mw
            .apply(
                ctx("https://data.us.example.net/1/metrics?x=1"),
                &args(json!({ "applicationId": "APP1" })),
            )
            .await
            .unwrap();

        assert_eq!(rewritten.url.host_str(), Some("data.eu.example.net"));
        // Path and query survive the host swap.
        assert_eq!(rewritten.url.path(), "/1/metrics");
        assert_eq!(rewritten.url.query(), Some("x=1"));
    }

    #[tokio::test]
    async fn leaves_host_alone_when_region_matches() {
        let session = Arc::new(ListSession {
            apps: vec![ApplicationInfo {
                id: "APP1".to_string(),
                data_residency_region: Some("us".to_string()),
            }],
        });
        let mw = DataResidencyRewrite::new(session, "data.{region}.example.net", "us");

        let out = mw
            .apply(
                ctx("https://data.us.example.net/1/metrics"),
                &args(json!({ "applicationId": "APP1" })),
            )
            .await
            .unwrap();

        assert_eq!(out.url.host_str(), Some("data.us.example.net"));
    }

    #[tokio::test]
    async fn unknown_application_uses_fallback_region() {
        let session = Arc::new(ListSession { apps: Vec::new() });
        let mw = DataResidencyRewrite::new(session, "data.{region}.example.net", "us");

        let out = mw
            .apply(
                ctx("https://data.eu.example.net/1/metrics"),
                &args(json!({ "applicationId": "GHOST" })),
            )
            .await
            .unwrap();

        assert_eq!(out.url.host_str(), Some("data.us.example.net"));
    }

    #[tokio::test]
    async fn explode_splits_comma_joined_values_into_repeated_keys() {
        let mw = ExplodeQueryValues::new("name");
        let out = mw
            .apply(
                ctx("https://api.example.net/metrics?name=records%2Cqueries&granularity=day"),
                &Map::new(),
            )
            .await
            .unwrap();

        assert_eq!(out.url.query(), Some("name=records&name=queries&granularity=day"));
    }

    #[tokio::test]
    async fn explode_leaves_single_values_untouched() {
        let mw = ExplodeQueryValues::new("name");
        let url = "https://api.example.net/metrics?name=records";
        let out = mw.apply(ctx(url), &Map::new()).await.unwrap();
        assert_eq!(out.url.as_str(), url);
    }

    #[tokio::test]
    async fn middleware_receives_headers_built_so_far() {
        // Ordering contract: a later middleware observes earlier effects.
        struct HeaderEcho;

        #[async_trait]
        impl RequestMiddleware for HeaderEcho {
            async fn apply(
                &self,
                mut ctx: CallContext,
                _arguments: &Map<String, Value>,
            ) -> Result<CallContext> {
                let seen = ctx.header("x-first").unwrap_or("absent").to_string();
                ctx.headers.push(("x-second".to_string(), seen));
                Ok(ctx)
            }
        }

        let mut ctx = ctx("https://api.example.net/");
        ctx.headers
            .push(("x-first".to_string(), "1".to_string()));

        let out = HeaderEcho.apply(ctx, &Map::new()).await.unwrap();
        assert_eq!(out.header("x-second"), Some("1"));
    }
}
