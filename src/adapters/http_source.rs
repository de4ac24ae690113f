use crate::domain::model::{Currency, Offer};
use crate::domain::ports::OfferSource;
use crate::utils::error::{BulkError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Offer as served by a JSON search endpoint.
#[derive(Debug, Clone, Deserialize)]
struct WireOffer {
    price: f64,
    quantity: u32,
    seller: String,
    #[serde(default)]
    foil: bool,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Queries `GET {endpoint}?query=<item>` and expects a JSON array of offers.
///
/// 404 means the item is unknown and yields no offers; any other non-2xx
/// status is a source failure.
pub struct HttpJsonSource {
    name: String,
    endpoint: String,
    currency: Currency,
    client: Client,
}

impl HttpJsonSource {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.into(),
            endpoint: endpoint.into(),
            currency: Currency::default(),
            client,
        })
    }

    /// Currency assumed when an offer does not name one.
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    fn to_offer(&self, wire: WireOffer, search_url: &str) -> Offer {
        let currency = wire
            .currency
            .as_deref()
            .and_then(Currency::parse)
            .unwrap_or(self.currency);
        Offer::new(wire.seller, wire.price, wire.quantity)
            .with_currency(currency)
            .with_foil(wire.foil)
            .with_platform(self.name.clone())
            .with_url(wire.url.unwrap_or_else(|| search_url.to_string()))
    }
}

#[async_trait]
impl OfferSource for HttpJsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_offers(&self, item: &str) -> Result<Vec<Offer>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("query", item)])
            .send()
            .await
            .map_err(|e| BulkError::source_failure(&self.name, e.to_string()))?;

        let status = response.status();
        let search_url = response.url().to_string();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(BulkError::source_failure(
                &self.name,
                format!("HTTP {} for {}", status, search_url),
            ));
        }

        let wire: Vec<WireOffer> = response
            .json()
            .await
            .map_err(|e| BulkError::source_failure(&self.name, format!("invalid offer list: {}", e)))?;

        Ok(wire
            .into_iter()
            .map(|w| self.to_offer(w, &search_url))
            .collect())
    }
}
