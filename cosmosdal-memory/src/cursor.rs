use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::trace;

use cosmosdal_core::{
    client::StoreCursor,
    error::StoreResult,
    options::{FeedOptions, QuerySpec},
};

use crate::store::InMemoryStore;

/// The records a read feed or query runs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FeedSource {
    Databases,
    Collections {
        database_id: String,
    },
    Documents {
        database_id: String,
        collection_id: String,
    },
}

/// Cursor over a read feed or query of an [`InMemoryStore`].
///
/// The result set is computed on the first fetch and handed out `page_size` records at a time.
/// A failed plan leaves the cursor unplanned, so the next fetch plans again.
pub(crate) struct FeedCursor {
    store: InMemoryStore,
    source: StoreResult<FeedSource>,
    query: Option<QuerySpec>,
    options: FeedOptions,
    page_size: usize,
    pending: Option<VecDeque<Value>>,
}

impl FeedCursor {
    pub(crate) fn new(
        store: InMemoryStore,
        source: StoreResult<FeedSource>,
        query: Option<QuerySpec>,
        options: FeedOptions,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            source,
            query,
            options,
            page_size: page_size.max(1),
            pending: None,
        }
    }
}

#[async_trait]
impl StoreCursor for FeedCursor {
    async fn fetch_next_block(&mut self) -> StoreResult<Vec<Value>> {
        if self.pending.is_none() {
            let source = self.source.clone()?;
            let planned = self
                .store
                .plan(&source, self.query.as_ref(), &self.options)
                .await?;
            self.pending = Some(planned.into());
        }

        let Some(pending) = self.pending.as_mut() else {
            return Ok(Vec::new());
        };

        let count = pending.len().min(self.page_size);
        trace!(target: "cosmosdal::memory", count, remaining = pending.len() - count, "serving block");

        Ok(pending.drain(..count).collect())
    }
}
