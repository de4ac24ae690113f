use crate::domain::model::Offer;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// A marketplace that can be asked for offers on one item.
///
/// "Not found" is an empty list; `Err` is reserved for transport or parsing
/// failures.
#[async_trait]
pub trait OfferSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_offers(&self, item: &str) -> Result<Vec<Offer>>;
}

/// Maps localized or alternate spellings onto one item identity.
pub trait AliasResolver: Send + Sync {
    /// Every known name for the item, `None` if the name is unknown.
    fn aliases_of(&self, item: &str) -> Option<BTreeSet<String>>;
    fn canonical_name(&self, item: &str) -> Option<String>;
}

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Structured engine events; the sink decides where they go.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    RequestStarted {
        items: usize,
        delivery_fee: f64,
    },
    RequestCompleted {
        items: usize,
        greedy_cost: f64,
        delivery_cost: Option<f64>,
        elapsed_ms: u64,
    },
    SourceFailed {
        source: String,
        item: String,
        error: String,
    },
    OfferRejected {
        source: String,
        item: String,
        seller: String,
        reason: &'static str,
    },
    ItemAggregated {
        item: String,
        offers: usize,
        available: bool,
    },
    LotAllocated {
        item: String,
        seller: String,
        price: f64,
        quantity: u32,
    },
    SearchFinished {
        strategy: &'static str,
        nodes: u64,
        cost: f64,
        optimal: bool,
    },
    SearchBudgetExhausted {
        nodes: u64,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}
