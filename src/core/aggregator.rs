use crate::domain::model::{ConsolidatedResult, Offer};
use crate::domain::ports::{EngineEvent, EventSink, OfferSource};
use crate::utils::error::{BulkError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

type FetchOutcome = (usize, usize, Result<Vec<Offer>>);

/// Fans item lookups out to every source and merges the answers.
///
/// Offers with equal prices are ordered by source position in the configured
/// list, then by the order the source returned them. Task completion order
/// never affects the output.
pub struct OfferAggregator {
    sources: Vec<Arc<dyn OfferSource>>,
    sink: Arc<dyn EventSink>,
    max_concurrent: usize,
}

impl OfferAggregator {
    pub fn new(sources: Vec<Arc<dyn OfferSource>>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            sources,
            sink,
            max_concurrent: 8,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn aggregate(&self, item: &str, deadline: Option<Instant>) -> Result<ConsolidatedResult> {
        let mut results = self.aggregate_items([item], deadline).await?;
        Ok(results.remove(item).unwrap_or_default())
    }

    /// One task per (item, source) pair. Dropping the join set on deadline
    /// aborts whatever is still in flight.
    pub async fn aggregate_items<I, S>(
        &self,
        items: I,
        deadline: Option<Instant>,
    ) -> Result<BTreeMap<String, ConsolidatedResult>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks: JoinSet<FetchOutcome> = JoinSet::new();
        let mut task_slots: HashMap<Id, (usize, usize)> = HashMap::new();

        for (item_idx, item) in items.iter().enumerate() {
            for (source_idx, source) in self.sources.iter().enumerate() {
                let source = Arc::clone(source);
                let semaphore = Arc::clone(&semaphore);
                let item = item.clone();
                let handle = tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    let fetched = source.fetch_offers(&item).await;
                    (item_idx, source_idx, fetched)
                });
                task_slots.insert(handle.id(), (item_idx, source_idx));
            }
        }

        let mut slots: Vec<Vec<Option<Vec<Offer>>>> = vec![vec![None; self.sources.len()]; items.len()];
        let drain = self.drain(&mut tasks, &task_slots, &items, &mut slots);
        match deadline {
            Some(deadline) => {
                tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), drain)
                    .await
                    .map_err(|_| BulkError::deadline("offer aggregation"))?;
            }
            None => drain.await,
        }

        let mut results = BTreeMap::new();
        for (item, per_source) in items.into_iter().zip(slots) {
            let mut consolidated = ConsolidatedResult::new();
            for offers in per_source.into_iter().flatten() {
                consolidated.merge(offers);
            }
            consolidated.sort_by_price();
            self.sink.emit(EngineEvent::ItemAggregated {
                item: item.clone(),
                offers: consolidated.offers.len(),
                available: consolidated.available,
            });
            results.insert(item, consolidated);
        }
        Ok(results)
    }

    async fn drain(
        &self,
        tasks: &mut JoinSet<FetchOutcome>,
        task_slots: &HashMap<Id, (usize, usize)>,
        items: &[String],
        slots: &mut [Vec<Option<Vec<Offer>>>],
    ) {
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (item_idx, source_idx, Ok(offers)))) => {
                    let accepted = self.screen(source_idx, &items[item_idx], offers);
                    slots[item_idx][source_idx] = Some(accepted);
                }
                Ok((_, (item_idx, source_idx, Err(err)))) => {
                    self.sink.emit(EngineEvent::SourceFailed {
                        source: self.sources[source_idx].name().to_string(),
                        item: items[item_idx].clone(),
                        error: err.to_string(),
                    });
                }
                Err(join_err) => {
                    if let Some(&(item_idx, source_idx)) = task_slots.get(&join_err.id()) {
                        self.sink.emit(EngineEvent::SourceFailed {
                            source: self.sources[source_idx].name().to_string(),
                            item: items[item_idx].clone(),
                            error: join_err.to_string(),
                        });
                    }
                }
            }
        }
    }

    fn screen(&self, source_idx: usize, item: &str, offers: Vec<Offer>) -> Vec<Offer> {
        let source_name = self.sources[source_idx].name();
        offers
            .into_iter()
            .filter_map(|mut offer| {
                if let Some(reason) = offer.defect() {
                    self.sink.emit(EngineEvent::OfferRejected {
                        source: source_name.to_string(),
                        item: item.to_string(),
                        seller: offer.seller.clone(),
                        reason,
                    });
                    return None;
                }
                if offer.platform.is_empty() {
                    offer.platform = source_name.to_string();
                }
                Some(offer)
            })
            .collect()
    }
}
