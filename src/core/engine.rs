use crate::core::aggregator::OfferAggregator;
use crate::core::delivery::{DeliveryPlan, DeliveryProblem, SearchLimits, SearchMode};
use crate::core::greedy::allocate_greedy;
use crate::core::possession::{PossessionMatrix, PossessionTable};
use crate::domain::model::{AllocationPlan, ConsolidatedResult, Request};
use crate::domain::ports::{EngineEvent, EventSink, OfferSource};
use crate::utils::error::{BulkError, Result};
use crate::utils::events::TracingSink;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub consolidated: BTreeMap<String, ConsolidatedResult>,
    pub greedy: AllocationPlan,
    pub matrix: PossessionMatrix,
    pub delivery: Option<DeliveryPlan>,
}

impl BulkResult {
    pub fn possession_table(&self) -> PossessionTable {
        self.matrix.to_table()
    }
}

/// Runs one request end to end: aggregate, allocate greedily, build the
/// possession matrix and, when a delivery fee applies, search for the
/// delivery-aware plan.
pub struct BulkBuyEngine {
    aggregator: OfferAggregator,
    sink: Arc<dyn EventSink>,
    search: SearchLimits,
    timeout: Option<Duration>,
}

impl BulkBuyEngine {
    pub fn new(sources: Vec<Arc<dyn OfferSource>>) -> Self {
        Self::with_sink(sources, Arc::new(TracingSink))
    }

    pub fn with_sink(sources: Vec<Arc<dyn OfferSource>>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            aggregator: OfferAggregator::new(sources, Arc::clone(&sink)),
            sink,
            search: SearchLimits::default(),
            timeout: None,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.aggregator = self.aggregator.with_max_concurrent(max_concurrent);
        self
    }

    pub fn with_search(mut self, mode: SearchMode, max_exact_nodes: u64) -> Self {
        self.search.mode = mode;
        self.search.max_exact_nodes = max_exact_nodes;
        self
    }

    /// Whole-request time limit, covering source calls and the delivery search.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.aggregator.source_names()
    }

    /// Validates raw `(name, quantity)` pairs before any source is contacted.
    pub async fn process_raw<I, S>(&self, items: I, delivery_fee: Option<f64>) -> Result<BulkResult>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let request = Request::new(items, delivery_fee)?;
        self.process(&request).await
    }

    pub async fn process(&self, request: &Request) -> Result<BulkResult> {
        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);
        self.sink.emit(EngineEvent::RequestStarted {
            items: request.len(),
            delivery_fee: request.delivery_fee(),
        });

        let consolidated = self
            .aggregator
            .aggregate_items(request.items().keys(), deadline)
            .await?;

        let greedy = allocate_greedy(request, &consolidated, self.sink.as_ref())?;
        let matrix = PossessionMatrix::from_results(&consolidated);

        let delivery = if request.wants_delivery_plan() {
            let problem = DeliveryProblem::build(request, &consolidated)?;
            let limits = SearchLimits {
                deadline,
                ..self.search
            };
            let sink = Arc::clone(&self.sink);
            let plan = tokio::task::spawn_blocking(move || problem.solve(&limits, sink.as_ref()))
                .await
                .map_err(|e| BulkError::Internal {
                    message: format!("delivery search task failed: {}", e),
                })??;
            Some(plan)
        } else {
            None
        };

        self.sink.emit(EngineEvent::RequestCompleted {
            items: request.len(),
            greedy_cost: greedy.total_cost(),
            delivery_cost: delivery.as_ref().map(|d| d.total_cost),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        Ok(BulkResult {
            consolidated,
            greedy,
            matrix,
            delivery,
        })
    }
}
