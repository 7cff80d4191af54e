use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::BackendError;

/// The id/timestamp boundary used to request the next older page of records.
///
/// Message threads page on the integer record id; the chat list pages on the
/// `updated_at` timestamp, since chat rows re-surface on activity and their
/// ids no longer correlate with recency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PaginationToken {
    Id(i64),
    Timestamp(String),
}

impl fmt::Display for PaginationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaginationToken::Id(id) => write!(f, "{id}"),
            PaginationToken::Timestamp(ts) => write!(f, "{ts}"),
        }
    }
}

/// A declarative read request against one table or view.
///
/// Only the operations the core actually needs are modeled: conjunctive
/// equality filters, one disjunctive equality group, descending order on a
/// single column, an exclusive upper cursor bound and a row limit.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// Equality filters, all of which must match.
    pub filters: Vec<(String, Value)>,
    /// Equality filters of which at least one must match (empty = no-op).
    pub any_filters: Vec<(String, Value)>,
    /// Column to order by, descending. `None` leaves backend order.
    pub order_desc: Option<String>,
    /// Exclusive upper bound: only rows with `column < token` are returned.
    pub before: Option<(String, PaginationToken)>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
    /// Raw column projection, e.g. a joined sub-select. `None` selects all.
    pub projection: Option<String>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn any_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.any_filters.push((column.into(), value.into()));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order_desc = Some(column.into());
        self
    }

    pub fn before(mut self, column: impl Into<String>, token: PaginationToken) -> Self {
        self.before = Some((column.into(), token));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }
}

/// Read and write access to the backend's relational tables.
///
/// Rows travel as raw JSON values; decoding into domain records happens on
/// this side of the boundary so the trait stays object safe.
#[async_trait]
pub trait TableQuery: Send + Sync {
    /// Reads rows matching the request. Zero rows is a success, not an error.
    async fn select(&self, table: &str, request: QueryRequest) -> Result<Vec<Value>, BackendError>;

    /// Inserts one row and returns the stored representation
    /// (with backend-assigned id and timestamps).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError>;

    /// Applies `patch` to every row matching the equality filters.
    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: Vec<(String, Value)>,
    ) -> Result<(), BackendError>;

    /// Deletes every row matching the equality filters.
    async fn delete(&self, table: &str, filters: Vec<(String, Value)>)
    -> Result<(), BackendError>;
}

/// Point lookup decoding at most one row. `Ok(None)` means the lookup matched
/// nothing, which is an expected outcome for existence checks and must not be
/// conflated with a failure.
pub async fn select_one<T: DeserializeOwned>(
    query: &dyn TableQuery,
    table: &str,
    request: QueryRequest,
) -> Result<Option<T>, BackendError> {
    let mut rows = query.select(table, request.limit(1)).await?;
    match rows.pop() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}

/// Decodes every returned row, failing on the first undecodable one.
pub async fn select_decoded<T: DeserializeOwned>(
    query: &dyn TableQuery,
    table: &str,
    request: QueryRequest,
) -> Result<Vec<T>, BackendError> {
    let rows = query.select(table, request).await?;
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(BackendError::from))
        .collect()
}
