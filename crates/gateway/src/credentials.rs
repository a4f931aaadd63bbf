//! Per-tenant credential resolution.
//!
//! Exactly one [`CredentialStrategy`] is selected at startup and used for the
//! process lifetime. Resolution happens per call, using the caller-supplied
//! applicationId.

use crate::error::{InvokeError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// One resolved (applicationId, apiKey) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub application_id: String,
    pub api_key: String,
}

impl Credential {
    #[must_use]
    pub fn new(application_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            api_key: api_key.into(),
        }
    }
}

/// One upstream application as reported by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    pub id: String,
    /// Where the application's data lives, when the dashboard reports it.
    pub data_residency_region: Option<String>,
}

/// An authenticated dashboard session, provided by a collaborator.
///
/// The OAuth exchange that produces it is out of scope here; the gateway only
/// consumes the resolved session.
#[async_trait]
pub trait DashboardSession: Send + Sync {
    /// Look up the api key for one application.
    async fn application_api_key(&self, application_id: &str) -> anyhow::Result<String>;

    /// List the applications visible to this session.
    async fn list_applications(&self) -> anyhow::Result<Vec<ApplicationInfo>>;
}

/// How credentials are obtained for each invocation.
#[derive(Clone)]
pub enum CredentialStrategy {
    /// Per-application key lookup through an authenticated session.
    Session(Arc<dyn DashboardSession>),
    /// One fixed pair; the caller-supplied applicationId is ignored for key
    /// purposes.
    Static(Credential),
    /// A configured list matched by exact applicationId equality.
    StaticList(Vec<Credential>),
}

impl CredentialStrategy {
    /// Whether tools must require an `applicationId` argument.
    ///
    /// With a single static credential the argument is accepted but not
    /// needed, so it is surfaced as optional.
    #[must_use]
    pub fn requires_application_id(&self) -> bool {
        !matches!(self, CredentialStrategy::Static(_))
    }

    /// Resolve the credential for one call.
    ///
    /// For [`CredentialStrategy::StaticList`], an applicationId that matches
    /// no configured entry falls back to the first configured credential with
    /// a warning diagnostic. This is deliberate documented behavior, never an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::Credential`] when the session lookup fails or
    /// when no static credential is configured at all.
    pub async fn resolve(&self, application_id: &str) -> Result<Credential> {
        match self {
            CredentialStrategy::Session(session) => {
                let api_key = session
                    .application_api_key(application_id)
                    .await
                    .map_err(|e| {
                        InvokeError::Credential(format!(
                            "api key lookup failed for application '{application_id}': {e}"
                        ))
                    })?;
                Ok(Credential::new(application_id, api_key))
            }
            CredentialStrategy::Static(credential) => Ok(credential.clone()),
            CredentialStrategy::StaticList(credentials) => {
                if let Some(found) = credentials
                    .iter()
                    .find(|c| c.application_id == application_id)
                {
                    return Ok(found.clone());
                }
                let first = credentials.first().ok_or_else(|| {
                    InvokeError::Credential("no static credentials configured".to_string())
                })?;
                tracing::warn!(
                    requested = %application_id,
                    substituted = %first.application_id,
                    "applicationId matched no configured credential; falling back to the first entry"
                );
                Ok(first.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSession {
        key: Option<String>,
    }

    #[async_trait]
    impl DashboardSession for FixedSession {
        async fn application_api_key(&self, application_id: &str) -> anyhow::Result<String> {
            self.key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("unknown application '{application_id}'"))
        }

        async fn list_applications(&self) -> anyhow::Result<Vec<ApplicationInfo>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn session_strategy_looks_up_per_call() {
        let strategy = CredentialStrategy::Session(Arc::new(FixedSession {
            key: Some("k-session".to_string()),
        }));
        let credential = strategy.resolve("APP1").await.unwrap();
        assert_eq!(credential, Credential::new("APP1", "k-session"));
    }

    #[tokio::test]
    async fn session_lookup_failure_is_a_credential_error() {
        let strategy = CredentialStrategy::Session(Arc::new(FixedSession { key: None }));
        let err = strategy.resolve("NOPE").await.unwrap_err();
        assert!(matches!(err, InvokeError::Credential(_)));
    }

    #[tokio::test]
    async fn static_strategy_ignores_the_caller_application_id() {
        let strategy = CredentialStrategy::Static(Credential::new("FIXED", "k-fixed"));
        let credential = strategy.resolve("SOMETHING_ELSE").await.unwrap();
        assert_eq!(credential, Credential::new("FIXED", "k-fixed"));
    }

    #[tokio::test]
    async fn static_list_matches_by_exact_equality() {
        let strategy = CredentialStrategy::StaticList(vec![
            Credential::new("A", "k1"),
            Credential::new("B", "k2"),
        ]);
        let credential = strategy.resolve("B").await.unwrap();
        assert_eq!(credential, Credential::new("B", "k2"));
    }

    #[tokio::test]
    async fn static_list_falls_back_to_first_entry_without_error() {
        let strategy = CredentialStrategy::StaticList(vec![
            Credential::new("A", "k1"),
            Credential::new("B", "k2"),
        ]);
        let credential = strategy.resolve("C").await.unwrap();
        assert_eq!(credential, Credential::new("A", "k1"));
    }

    #[tokio::test]
    async fn empty_static_list_is_a_credential_error() {
        let strategy = CredentialStrategy::StaticList(Vec::new());
        let err = strategy.resolve("A").await.unwrap_err();
        assert!(matches!(err, InvokeError::Credential(_)));
    }
}
