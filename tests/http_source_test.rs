use bulk_buy::domain::ports::OfferSource;
use bulk_buy::{BulkError, Currency, HttpJsonSource};
use httpmock::prelude::*;
use std::time::Duration;

fn source(server: &MockServer) -> HttpJsonSource {
    HttpJsonSource::new("mock-market", server.url("/search"), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_fetch_offers_success() {
    let server = MockServer::start();
    let search_mock = server.mock(|when, then| {
        when.method(GET).path("/search").query_param("query", "sol ring");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([
                {"price": 120.0, "quantity": 2, "seller": "CardHouse"},
                {"price": 1.5, "quantity": 1, "seller": "Overseas", "currency": "USD", "foil": true,
                 "url": "https://shop.example.com/lot/7"}
            ]));
    });

    let offers = source(&server).fetch_offers("sol ring").await.unwrap();

    search_mock.assert();
    assert_eq!(offers.len(), 2);
    assert_eq!(offers[0].seller, "CardHouse");
    assert_eq!(offers[0].currency, Currency::Rub);
    assert_eq!(offers[0].platform, "mock-market");
    assert!(offers[0].url.contains("/search?query="));
    assert_eq!(offers[1].currency, Currency::Usd);
    assert!(offers[1].foil);
    assert_eq!(offers[1].url, "https://shop.example.com/lot/7");
}

#[tokio::test]
async fn test_default_currency_applies_to_unlabelled_offers() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(200)
            .json_body(serde_json::json!([{"price": 3.0, "quantity": 1, "seller": "A"}]));
    });

    let offers = source(&server)
        .with_currency(Currency::Eur)
        .fetch_offers("lightning bolt")
        .await
        .unwrap();

    assert_eq!(offers[0].currency, Currency::Eur);
}

#[tokio::test]
async fn test_not_found_means_no_offers() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(404);
    });

    let offers = source(&server).fetch_offers("black lotus").await.unwrap();
    assert!(offers.is_empty());
}

#[tokio::test]
async fn test_server_error_is_source_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(503);
    });

    let err = source(&server).fetch_offers("sol ring").await.unwrap_err();
    match err {
        BulkError::SourceFailure { source_name, message } => {
            assert_eq!(source_name, "mock-market");
            assert!(message.contains("503"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_source_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(200).body("{\"offers\": oops");
    });

    let err = source(&server).fetch_offers("sol ring").await.unwrap_err();
    assert!(matches!(err, BulkError::SourceFailure { .. }));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_source_failure() {
    let source = HttpJsonSource::new(
        "nowhere",
        "http://127.0.0.1:9/search",
        Duration::from_millis(500),
    )
    .unwrap();

    let err = source.fetch_offers("sol ring").await.unwrap_err();
    assert!(matches!(err, BulkError::SourceFailure { .. }));
}
