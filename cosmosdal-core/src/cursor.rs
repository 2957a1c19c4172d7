//! Query pagination.
//!
//! [`QueryResults`] wraps a [`StoreCursor`] and turns its raw blocks into typed resources.
//! It is a small state machine:
//!
//! ```text
//!   Fresh ──fetch_next──▶ Active ──fetch_next (empty block)──▶ Exhausted
//!     └──────────fetch_next (empty block)──────────────────────────▲
//! ```
//!
//! [`QueryResults::fetch_next`] is the only transition and the only point where the store is
//! contacted, so a query the store refuses to plan fails on the first fetch and never when the
//! handle is created. Once exhausted, further fetches return an empty vector without touching
//! the store.

use futures::stream::{self, BoxStream, StreamExt};
use std::marker::PhantomData;
use tracing::trace;

use crate::{
    client::BoxStoreCursor,
    model::{Document, Resource},
};

/// Iteration state of a [`QueryResults`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No block has been fetched yet; the query has not been sent.
    Fresh,
    /// At least one non-empty block has been returned.
    Active,
    /// The store reported no further records.
    Exhausted,
}

/// A deferred, block-wise handle over the results of a read feed or query.
///
/// The handle is single-consumer: advancing it requires `&mut self`.
///
/// # Example
///
/// ```ignore
/// let mut results = documents.get_documents("orders", "my_db", Some(50));
///
/// loop {
///     let page = results.fetch_next().await?;
///     if page.is_empty() {
///         break;
///     }
///     for document in page {
///         println!("{}", document.resource_id());
///     }
/// }
/// ```
pub struct QueryResults<'a, R: Resource> {
    cursor: BoxStoreCursor<'a>,
    state: CursorState,
    _marker: PhantomData<fn() -> R>,
}

/// Pagination handle over documents, returned by the document manager.
pub type DocumentQueryResults<'a> = QueryResults<'a, Document>;

impl<'a, R: Resource> QueryResults<'a, R> {
    pub(crate) fn new(cursor: BoxStoreCursor<'a>) -> Self {
        Self {
            cursor,
            state: CursorState::Fresh,
            _marker: PhantomData,
        }
    }

    /// Returns the current iteration state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == CursorState::Exhausted
    }

    /// Fetches the next block of results.
    ///
    /// Returns the decoded resources in the order the store returned them, or an empty vector
    /// once the results are exhausted.
    ///
    /// # Errors
    ///
    /// Any store failure, including one raised while the store plans the query on the first
    /// call, is returned as the resource level's error kind. A failed fetch leaves the state
    /// unchanged.
    pub async fn fetch_next(&mut self) -> Result<Vec<R>, R::Error> {
        if self.state == CursorState::Exhausted {
            return Ok(Vec::new());
        }

        let block = self.cursor.fetch_next_block().await?;

        if block.is_empty() {
            trace!(target: "cosmosdal::cursor", kind = R::KIND, from = ?self.state, "results exhausted");
            self.state = CursorState::Exhausted;
            return Ok(Vec::new());
        }

        let resources = block
            .into_iter()
            .map(R::from_native)
            .collect::<Result<Vec<_>, _>>()?;

        trace!(target: "cosmosdal::cursor", kind = R::KIND, count = resources.len(), "fetched block");
        self.state = CursorState::Active;

        Ok(resources)
    }

    /// Drains every remaining block into a single vector.
    pub async fn collect_all(mut self) -> Result<Vec<R>, R::Error> {
        let mut resources = Vec::new();

        loop {
            let block = self.fetch_next().await?;
            if block.is_empty() {
                return Ok(resources);
            }
            resources.extend(block);
        }
    }

    /// Turns the handle into a lazy stream of resources.
    ///
    /// Blocks are fetched as the stream is polled. The stream ends after the first error.
    pub fn into_stream(self) -> BoxStream<'a, Result<R, R::Error>>
    where
        R: 'a,
    {
        stream::unfold(Some(self), |results| async move {
            let mut results = results?;

            match results.fetch_next().await {
                Ok(block) if block.is_empty() => None,
                Ok(block) => Some((
                    stream::iter(block.into_iter().map(Ok)).boxed(),
                    Some(results),
                )),
                Err(err) => Some((stream::iter(vec![Err(err)]).boxed(), None)),
            }
        })
        .flatten()
        .boxed()
    }
}

impl<'a, R: Resource> std::fmt::Debug for QueryResults<'a, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResults")
            .field("kind", &R::KIND)
            .field("state", &self.state)
            .finish()
    }
}
