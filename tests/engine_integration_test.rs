use async_trait::async_trait;
use bulk_buy::domain::ports::{EngineEvent, EventSink, OfferSource};
use bulk_buy::utils::events::MemorySink;
use bulk_buy::{BulkBuyEngine, BulkError, Offer, Request, Result, SearchMode, StaticSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct CountingSource {
    inner: StaticSource,
    calls: AtomicUsize,
}

impl CountingSource {
    fn new(inner: StaticSource) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OfferSource for CountingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_offers(&self, item: &str) -> Result<Vec<Offer>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_offers(item).await
    }
}

struct BrokenSource;

#[async_trait]
impl OfferSource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    async fn fetch_offers(&self, _item: &str) -> Result<Vec<Offer>> {
        Err(BulkError::source_failure("broken", "connection reset"))
    }
}

struct SlowSource;

#[async_trait]
impl OfferSource for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    async fn fetch_offers(&self, _item: &str) -> Result<Vec<Offer>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(vec![Offer::new("late", 1.0, 1)])
    }
}

fn engine_with_sink(sources: Vec<Arc<dyn OfferSource>>) -> (BulkBuyEngine, MemorySink) {
    let sink = MemorySink::new();
    let engine = BulkBuyEngine::with_sink(sources, Arc::new(sink.clone()) as Arc<dyn EventSink>);
    (engine, sink)
}

#[tokio::test]
async fn test_sol_ring_end_to_end() {
    let source = StaticSource::new("market").with_offers(
        "Sol Ring",
        vec![Offer::new("A", 5.0, 1), Offer::new("B", 4.0, 3)],
    );
    let (engine, sink) = engine_with_sink(vec![Arc::new(source)]);

    let result = engine.process_raw(vec![("Sol Ring", 2)], None).await.unwrap();

    let lots = result.greedy.lots("sol ring");
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].seller, "B");
    assert_eq!(lots[0].quantity, 2);
    assert_eq!(lots[0].platform, "market");
    assert_eq!(result.greedy.total_cost(), 8.0);
    assert!(result.delivery.is_none());

    assert_eq!(result.matrix.price("A", "sol ring"), Some(5.0));
    assert_eq!(result.matrix.price("B", "sol ring"), Some(4.0));
    assert_eq!(sink.count(|e| matches!(e, EngineEvent::RequestCompleted { .. })), 1);
}

#[tokio::test]
async fn test_invalid_request_never_reaches_sources() {
    let source = Arc::new(CountingSource::new(
        StaticSource::new("market").with_offers("Sol Ring", vec![Offer::new("A", 5.0, 1)]),
    ));
    let (engine, sink) = engine_with_sink(vec![source.clone() as Arc<dyn OfferSource>]);

    let zero = engine.process_raw(vec![("Sol Ring", 0)], None).await;
    let duplicate = engine
        .process_raw(vec![("Sol Ring", 1), ("sol ring", 1)], None)
        .await;
    let negative_fee = engine.process_raw(vec![("Sol Ring", 1)], Some(-5.0)).await;

    assert!(matches!(zero, Err(BulkError::InvalidRequest { .. })));
    assert!(matches!(duplicate, Err(BulkError::InvalidRequest { .. })));
    assert!(matches!(negative_fee, Err(BulkError::InvalidRequest { .. })));
    assert_eq!(source.calls(), 0);
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_each_source_asked_once_per_item() {
    let first = Arc::new(CountingSource::new(
        StaticSource::new("first")
            .with_offers("a", vec![Offer::new("X", 1.0, 1)])
            .with_offers("b", vec![Offer::new("X", 2.0, 1)]),
    ));
    let second = Arc::new(CountingSource::new(StaticSource::new("second")));
    let (engine, _sink) = engine_with_sink(vec![
        first.clone() as Arc<dyn OfferSource>,
        second.clone() as Arc<dyn OfferSource>,
    ]);

    engine
        .process_raw(vec![("a", 1), ("b", 1), ("c", 0)], None)
        .await
        .unwrap_err();
    assert_eq!(first.calls(), 0);

    engine.process_raw(vec![("a", 1), ("b", 1)], None).await.unwrap();
    assert_eq!(first.calls(), 2);
    assert_eq!(second.calls(), 2);
}

#[tokio::test]
async fn test_delivery_plan_prefers_single_seller() {
    let source = StaticSource::new("market")
        .with_offers("a", vec![Offer::new("X", 10.0, 1), Offer::new("Y", 8.0, 1)])
        .with_offers("b", vec![Offer::new("X", 5.0, 1)]);
    let (engine, sink) = engine_with_sink(vec![Arc::new(source)]);

    let result = engine
        .process_raw(vec![("a", 1), ("b", 1)], Some(3.0))
        .await
        .unwrap();

    let delivery = result.delivery.expect("delivery plan");
    assert_eq!(delivery.total_cost, 18.0);
    assert_eq!(delivery.sellers, vec!["X"]);
    assert_eq!(delivery.plan.lots("a")[0].seller, "X");
    assert_eq!(delivery.plan.lots("b")[0].seller, "X");

    // the fee-blind plan still picks the cheapest offer per item
    assert_eq!(result.greedy.lots("a")[0].seller, "Y");
    assert_eq!(result.greedy.total_cost(), 13.0);

    assert_eq!(sink.count(|e| matches!(e, EngineEvent::SearchFinished { .. })), 1);
}

#[tokio::test]
async fn test_delivery_plan_skipped_for_multiples() {
    let source = StaticSource::new("market")
        .with_offers("a", vec![Offer::new("X", 10.0, 2)])
        .with_offers("b", vec![Offer::new("X", 5.0, 1)]);
    let engine = BulkBuyEngine::new(vec![Arc::new(source)]).with_search(SearchMode::Exact, 10);

    let result = engine
        .process_raw(vec![("a", 2), ("b", 1)], Some(3.0))
        .await
        .unwrap();

    assert!(result.delivery.is_none());
    assert_eq!(result.greedy.total_cost(), 25.0);
}

#[tokio::test]
async fn test_failing_source_counts_as_no_offers() {
    let good = StaticSource::new("good").with_offers("a", vec![Offer::new("X", 3.0, 1)]);
    let (engine, sink) = engine_with_sink(vec![Arc::new(BrokenSource), Arc::new(good)]);

    let result = engine.process_raw(vec![("a", 1)], None).await.unwrap();

    assert_eq!(result.greedy.total_cost(), 3.0);
    assert!(result.consolidated["a"].available);
    assert_eq!(
        sink.count(|e| matches!(e, EngineEvent::SourceFailed { source, .. } if source == "broken")),
        1
    );
}

#[tokio::test]
async fn test_unavailable_and_partial_items() {
    let source = StaticSource::new("market").with_offers("a", vec![Offer::new("X", 3.0, 1)]);
    let engine = BulkBuyEngine::new(vec![Arc::new(source)]);

    let missing = engine.process_raw(vec![("a", 1), ("b", 1)], None).await;
    assert!(matches!(missing, Err(BulkError::ItemUnavailable { item }) if item == "b"));

    let partial = engine.process_raw(vec![("a", 4)], None).await;
    assert!(matches!(
        partial,
        Err(BulkError::PartialAllocation {
            requested: 4,
            available: 1,
            ..
        })
    ));
}

#[tokio::test]
async fn test_request_deadline_aborts_slow_sources() {
    let engine = BulkBuyEngine::new(vec![Arc::new(SlowSource)]).with_timeout(Duration::from_millis(50));
    let request = Request::new(vec![("a", 1)], None).unwrap();

    let started = std::time::Instant::now();
    let result = engine.process(&request).await;

    assert!(matches!(result, Err(BulkError::DeadlineExceeded { .. })));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let make_sources = || -> Vec<Arc<dyn OfferSource>> {
        vec![
            Arc::new(
                StaticSource::new("one")
                    .with_offers("a", vec![Offer::new("X", 2.0, 1), Offer::new("Y", 2.0, 1)])
                    .with_offers("b", vec![Offer::new("Y", 1.0, 1)]),
            ),
            Arc::new(
                StaticSource::new("two")
                    .with_offers("a", vec![Offer::new("Z", 2.0, 1)])
                    .with_offers("b", vec![Offer::new("X", 1.0, 1)]),
            ),
        ]
    };

    let first = BulkBuyEngine::new(make_sources())
        .process_raw(vec![("a", 1), ("b", 1)], Some(1.0))
        .await
        .unwrap();
    let second = BulkBuyEngine::new(make_sources())
        .process_raw(vec![("a", 1), ("b", 1)], Some(1.0))
        .await
        .unwrap();

    assert_eq!(first.greedy, second.greedy);
    assert_eq!(first.delivery, second.delivery);
    assert_eq!(first.possession_table(), second.possession_table());
    // equal prices keep source order, then the order the source listed them
    let sellers: Vec<&str> = first.consolidated["a"]
        .offers
        .iter()
        .map(|o| o.seller.as_str())
        .collect();
    assert_eq!(sellers, vec!["X", "Y", "Z"]);
}
