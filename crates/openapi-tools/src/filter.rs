//! Tool filtering.
//!
//! Filters decide which declared operations are exposed as callable tools.
//! They are description-agnostic: an id that never appears in any loaded
//! description is legal and simply never matches.

use std::collections::HashSet;

/// Curated default allow-list, biased toward read-mostly operations plus a
/// small set of indexing writes. This is a fixed product decision, never
/// computed from a description.
const DEFAULT_ALLOWED_OPERATIONS: &[&str] = &[
    // Account
    "getUserInfo",
    "getApplications",
    // Search
    "listIndices",
    "getSettings",
    "searchSingleIndex",
    "searchRules",
    "searchSynonyms",
    "saveObject",
    "batch",
    "multipleBatch",
    "partialUpdateObject",
    "deleteByQuery",
    // Analytics
    "getTopSearches",
    "getTopHits",
    "getNoResultsRate",
    // AB testing
    "listABTests",
    // Monitoring
    "getClustersStatus",
    "getIncidents",
    // Ingestion
    "listTransformations",
    "listTasks",
    "listDestinations",
    "listSources",
    // Usage
    "retrieveMetricsRegistry",
    "retrieveMetricsDaily",
    "retrieveApplicationMetricsHourly",
    // Collections
    "listCollections",
    "getCollection",
    // Query suggestions
    "listQuerySuggestionsConfigs",
    "getQuerySuggestionsConfig",
    "createQuerySuggestionsConfig",
    "updateQuerySuggestionsConfig",
    "getQuerySuggestionConfigStatus",
    "getQuerySuggestionLogFile",
    // Index configuration helpers
    "setAttributesForFaceting",
    "setCustomRanking",
];

/// Immutable decision of which operation ids become tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolFilter {
    /// Every declared operation is exposed.
    All,
    /// Only the listed operation ids are exposed.
    Allowed(HashSet<String>),
}

impl ToolFilter {
    #[must_use]
    pub fn all() -> Self {
        ToolFilter::All
    }

    /// Build a filter from configured tokens.
    ///
    /// The single case-insensitive token `all` yields [`ToolFilter::All`];
    /// anything else is an explicit id set. Tokens are trimmed.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if ids.len() == 1 && ids[0].eq_ignore_ascii_case("all") {
            return ToolFilter::All;
        }

        ToolFilter::Allowed(ids.into_iter().collect())
    }

    /// Whether a tool for `operation_id` should be registered.
    #[must_use]
    pub fn is_allowed(&self, operation_id: &str) -> bool {
        match self {
            ToolFilter::All => true,
            ToolFilter::Allowed(ids) => ids.contains(operation_id),
        }
    }
}

impl Default for ToolFilter {
    /// The curated default allow-list used when no filter is configured.
    fn default() -> Self {
        ToolFilter::Allowed(
            DEFAULT_ALLOWED_OPERATIONS
                .iter()
                .map(|id| (*id).to_string())
                .collect(),
        )
    }
}
