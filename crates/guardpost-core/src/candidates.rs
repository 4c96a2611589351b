//! # Candidate Guard Ranking
//!
//! Produces the short list of guards handed to the conversational booking
//! flow: active guards only, best rated first, at most [`MAX_CANDIDATES`].
//!
//! The guard registry is owned by the hosted database; this module only
//! reads a projection of it through [`GuardRegistry`]. The registry is asked
//! to filter, order and limit server-side, and the same rules are enforced
//! again here so a misbehaving registry cannot leak inactive guards or an
//! oversized list downstream.

use crate::{Timestamp, UpstreamError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Upper bound on the number of candidates returned by a single fetch.
pub const MAX_CANDIDATES: usize = 20;

// ============================================================================
// Types
// ============================================================================

/// A guard row as returned by the registry.
///
/// Every attribute except the identifier may be missing or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardRecord {
    pub id: String,

    #[serde(default, alias = "full_name")]
    pub name: Option<String>,

    /// Loosely typed in the registry; coerced to a strict boolean
    #[serde(default)]
    pub armed: Option<Value>,

    #[serde(default)]
    pub rating: Option<f64>,

    #[serde(default)]
    pub certifications: Option<Vec<String>>,

    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(default)]
    pub last_active_at: Option<Timestamp>,
}

impl GuardRecord {
    /// Minimal active record, mostly useful for fakes and fixtures
    pub fn active(id: impl Into<String>, rating: Option<f64>) -> Self {
        Self {
            id: id.into(),
            name: None,
            armed: None,
            rating,
            certifications: None,
            is_active: Some(true),
            last_active_at: None,
        }
    }

    /// Only rows explicitly flagged active are eligible.
    pub fn is_eligible(&self) -> bool {
        self.is_active == Some(true)
    }
}

/// A normalized, rankable guard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardCandidate {
    pub id: String,
    pub name: String,
    pub armed: bool,
    pub rating: f64,
    pub certifications: BTreeSet<String>,
    pub is_active: bool,
    pub last_active_at: Option<Timestamp>,
}

impl From<GuardRecord> for GuardCandidate {
    fn from(record: GuardRecord) -> Self {
        let is_active = record.is_eligible();
        Self {
            id: record.id,
            name: record.name.unwrap_or_default(),
            armed: record.armed.as_ref().map(is_truthy).unwrap_or(false),
            rating: record.rating.filter(|r| r.is_finite()).unwrap_or(0.0),
            certifications: record
                .certifications
                .unwrap_or_default()
                .into_iter()
                .collect(),
            is_active,
            last_active_at: record.last_active_at,
        }
    }
}

/// Loose truthiness: null, false, zero and the empty string are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// What the registry is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateQuery {
    /// Restrict to guards flagged active
    pub active_only: bool,
    /// Maximum rows, ordered by rating descending
    pub limit: usize,
}

impl CandidateQuery {
    /// The top `limit` active guards by rating
    pub fn top_active(limit: usize) -> Self {
        Self {
            active_only: true,
            limit,
        }
    }
}

impl Default for CandidateQuery {
    fn default() -> Self {
        Self::top_active(MAX_CANDIDATES)
    }
}

// ============================================================================
// Registry interface
// ============================================================================

/// Read-only access to the external guard registry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GuardRegistry: Send + Sync {
    /// List guards matching the query, best rated first.
    ///
    /// Ties come back in whatever order the store produces.
    async fn list_guards(&self, query: &CandidateQuery) -> Result<Vec<GuardRecord>, UpstreamError>;
}

// ============================================================================
// Fetcher
// ============================================================================

/// Fetches and ranks candidate guards.
#[derive(Clone)]
pub struct CandidateFetcher {
    registry: Arc<dyn GuardRegistry>,
}

impl CandidateFetcher {
    /// Create a fetcher over the given registry
    pub fn new(registry: Arc<dyn GuardRegistry>) -> Self {
        Self { registry }
    }

    /// Fetch up to [`MAX_CANDIDATES`] active guards, rating non-increasing.
    ///
    /// # Errors
    ///
    /// Registry failures are returned unmodified; there is no retry and no
    /// partial result.
    #[instrument(skip(self))]
    pub async fn fetch_candidates(&self) -> Result<Vec<GuardCandidate>, UpstreamError> {
        let query = CandidateQuery::default();
        let records = self.registry.list_guards(&query).await?;
        let received = records.len();

        let mut candidates: Vec<GuardCandidate> = records
            .into_iter()
            .filter(GuardRecord::is_eligible)
            .map(GuardCandidate::from)
            .collect();

        if candidates.len() < received {
            warn!(
                dropped = received - candidates.len(),
                "Registry returned inactive guards; filtered locally"
            );
        }

        // Stable: equal ratings keep registry order.
        candidates.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        candidates.truncate(MAX_CANDIDATES);

        info!(count = candidates.len(), "Fetched candidate guards");
        Ok(candidates)
    }
}

#[cfg(test)]
#[path = "candidates_tests.rs"]
mod tests;
