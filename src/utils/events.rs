use crate::domain::ports::{EngineEvent, EventSink};
use std::sync::{Arc, Mutex};

/// Forwards engine events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::RequestStarted {
                items,
                delivery_fee,
            } => {
                tracing::info!(items, delivery_fee, "processing request");
            }
            EngineEvent::RequestCompleted {
                items,
                greedy_cost,
                delivery_cost,
                elapsed_ms,
            } => {
                tracing::info!(items, greedy_cost, ?delivery_cost, elapsed_ms, "request completed");
            }
            EngineEvent::SourceFailed {
                source,
                item,
                error,
            } => {
                tracing::warn!(source = %source, item = %item, error = %error, "source failed, counting it as zero offers");
            }
            EngineEvent::OfferRejected {
                source,
                item,
                seller,
                reason,
            } => {
                tracing::warn!(source = %source, item = %item, seller = %seller, reason, "offer rejected");
            }
            EngineEvent::ItemAggregated {
                item,
                offers,
                available,
            } => {
                tracing::debug!(item = %item, offers, available, "item aggregated");
            }
            EngineEvent::LotAllocated {
                item,
                seller,
                price,
                quantity,
            } => {
                tracing::debug!(item = %item, seller = %seller, price, quantity, "lot allocated");
            }
            EngineEvent::SearchFinished {
                strategy,
                nodes,
                cost,
                optimal,
            } => {
                tracing::info!(strategy, nodes, cost, optimal, "delivery search finished");
            }
            EngineEvent::SearchBudgetExhausted { nodes } => {
                tracing::warn!(nodes, "exact delivery search budget exhausted, using heuristic plan");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Keeps every event in memory; cloned handles share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&EngineEvent) -> bool,
    {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_shares_buffer_between_clones() {
        let sink = MemorySink::new();
        let handle = sink.clone();
        handle.emit(EngineEvent::SearchBudgetExhausted { nodes: 7 });

        assert_eq!(sink.events(), vec![EngineEvent::SearchBudgetExhausted { nodes: 7 }]);
        assert_eq!(
            sink.count(|e| matches!(e, EngineEvent::SearchBudgetExhausted { .. })),
            1
        );
    }
}
