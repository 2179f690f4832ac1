//! Bounded-concurrency insertion pipeline.
//!
//! Items are cut into batches sized by the [`BatchSizer`] and written through
//! one shared semaphore, so the number of simultaneous store writes never
//! exceeds `max_concurrent_inserts` no matter how many batches or callers exist.

use crate::config::RetrievalConfig;
use crate::load::BatchSizer;
use crate::store::{with_timeout, VectorStore};
use crate::types::VectorItem;
use docindex_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// What an [`InsertionPipeline::insert_all`] call wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertSummary {
    pub batches: usize,
    pub items: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct InsertionPipeline {
    store: Arc<dyn VectorStore>,
    semaphore: Arc<Semaphore>,
    sizer: BatchSizer,
    max_batch_size: usize,
    min_batch_size: usize,
    timeout: Duration,
    retries: u32,
}

impl InsertionPipeline {
    pub fn new(store: Arc<dyn VectorStore>, sizer: BatchSizer, config: &RetrievalConfig) -> Self {
        Self {
            store,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_inserts.max(1))),
            sizer,
            max_batch_size: config.max_batch_size,
            min_batch_size: config.min_batch_size,
            timeout: config.insert_timeout(),
            retries: config.insert_retries,
        }
    }

    /// Permits currently free on the write limiter.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Write every item to `collection`.
    ///
    /// Batches may commit in any order. On the first failed batch no further
    /// batch is scheduled, in-flight batches are awaited, and that first error
    /// is returned. Batches committed before the failure stay committed.
    pub async fn insert_all(
        &self,
        collection: &str,
        items: Vec<VectorItem>,
    ) -> AppResult<InsertSummary> {
        if items.is_empty() {
            return Ok(InsertSummary::default());
        }

        let batch_size = self
            .sizer
            .next_batch_size_async(self.max_batch_size, self.min_batch_size)
            .await
            .max(1);
        let total = items.len();
        let batches = split_batches(items, batch_size);
        let batch_count = batches.len();

        tracing::info!(
            "Inserting {} items into '{}' as {} batches of up to {}",
            total,
            collection,
            batch_count,
            batch_size
        );

        let mut tasks = JoinSet::new();
        let mut first_error: Option<AppError> = None;

        for (index, batch) in batches.into_iter().enumerate() {
            drain_finished(&mut tasks, &mut first_error);
            if first_error.is_some() {
                break;
            }

            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|e| AppError::Other(format!("Insert limiter closed: {}", e)))?;

            drain_finished(&mut tasks, &mut first_error);
            if first_error.is_some() {
                drop(permit);
                break;
            }

            let store = Arc::clone(&self.store);
            let collection = collection.to_string();
            let timeout = self.timeout;
            let retries = self.retries;
            tasks.spawn(async move {
                let _permit = permit;
                write_batch(store.as_ref(), &collection, &batch, index, timeout, retries).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            record(joined, &mut first_error);
        }

        match first_error {
            Some(e) => {
                tracing::error!("Insertion into '{}' failed: {}", collection, e);
                Err(e)
            }
            None => Ok(InsertSummary {
                batches: batch_count,
                items: total,
                batch_size,
            }),
        }
    }
}

fn split_batches(items: Vec<VectorItem>, batch_size: usize) -> Vec<Vec<VectorItem>> {
    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for item in items {
        current.push(item);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

fn drain_finished(tasks: &mut JoinSet<AppResult<()>>, first_error: &mut Option<AppError>) {
    while let Some(joined) = tasks.try_join_next() {
        record(joined, first_error);
    }
}

fn record(joined: Result<AppResult<()>, JoinError>, first_error: &mut Option<AppError>) {
    let outcome = match joined {
        Ok(result) => result,
        Err(e) => Err(AppError::VectorStore(format!("Insert task failed: {}", e))),
    };
    if let Err(e) = outcome {
        if first_error.is_none() {
            *first_error = Some(e);
        } else {
            tracing::warn!("Additional insert batch failure: {}", e);
        }
    }
}

async fn write_batch(
    store: &dyn VectorStore,
    collection: &str,
    batch: &[VectorItem],
    index: usize,
    timeout: Duration,
    retries: u32,
) -> AppResult<()> {
    let mut attempt = 0;
    loop {
        let operation = format!("insert batch {} into '{}'", index, collection);
        let result = with_timeout(&operation, timeout, store.insert(collection, batch)).await;

        match result {
            Ok(()) => {
                tracing::debug!("Batch {} ({} items) committed to '{}'", index, batch.len(), collection);
                return Ok(());
            }
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::warn!("Batch {} failed ({}), retry {}/{}", index, e, attempt, retries);
            }
            Err(e) => return Err(e),
        }
    }
}
