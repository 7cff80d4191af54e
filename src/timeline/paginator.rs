use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::backend::ChatBackend;
use crate::backend::error::BackendError;
use crate::backend::query::{PaginationToken, QueryRequest};

use super::item::TimelineRecord;

/// Pages backward through one table's history, newest first, using an
/// exclusive upper-bound cursor.
///
/// The bound is purely relational (`column < token`), so paging stays
/// correct even when the boundary row itself has been deleted upstream.
/// A page shorter than `page_size` marks the end of history; any further
/// call is a no-op.
pub struct CursorPaginator<R> {
    client: Arc<dyn ChatBackend>,
    table: String,
    projection: Option<String>,
    filters: Vec<(String, Value)>,
    order_column: String,
    page_size: usize,
    cursor: Option<PaginationToken>,
    exhausted: bool,
    _record: PhantomData<fn() -> R>,
}

impl<R> CursorPaginator<R>
where
    R: TimelineRecord + DeserializeOwned,
{
    pub fn new(
        client: Arc<dyn ChatBackend>,
        table: impl Into<String>,
        order_column: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            projection: None,
            filters: Vec::new(),
            order_column: order_column.into(),
            page_size,
            cursor: None,
            exhausted: false,
            _record: PhantomData,
        }
    }

    /// Adds an equality filter applied to every page request.
    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    /// Sets a raw column projection, e.g. to pull in a joined profile.
    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// The boundary the next page request will use. `None` before the first
    /// page.
    pub fn cursor(&self) -> Option<&PaginationToken> {
        self.cursor.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Forgets all paging progress, for a fresh first page.
    pub fn reset(&mut self) {
        self.cursor = None;
        self.exhausted = false;
    }

    /// Fetches the next older page. `Ok(None)` means the end of history was
    /// reached (now or earlier). Errors are reported once and leave the
    /// cursor untouched, so the caller may re-invoke with the same boundary.
    pub async fn next_page(&mut self) -> Result<Option<Vec<R>>, BackendError> {
        if self.exhausted {
            debug!(
                "pagination of {} is exhausted, ignoring request",
                self.table
            );
            return Ok(None);
        }

        let mut request = QueryRequest::new()
            .order_desc(self.order_column.clone())
            .limit(self.page_size);
        for (column, value) in &self.filters {
            request = request.eq(column.clone(), value.clone());
        }
        if let Some(projection) = &self.projection {
            request = request.projection(projection.clone());
        }
        if let Some(token) = &self.cursor {
            request = request.before(self.order_column.clone(), token.clone());
        }

        let rows = self.client.query().select(&self.table, request).await?;
        if rows.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        let records = rows
            .into_iter()
            .map(|row| serde_json::from_value::<R>(row).map_err(BackendError::from))
            .collect::<Result<Vec<_>, _>>()?;

        if records.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(oldest) = records.last() {
            self.cursor = Some(oldest.pagination_token());
        }
        debug!(
            "loaded {} rows from {}, cursor now {:?}",
            records.len(),
            self.table,
            self.cursor
        );
        Ok(Some(records))
    }
}
