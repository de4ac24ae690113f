use crate::domain::model::{normalize_item_name, Offer};
use crate::domain::ports::OfferSource;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Serves a fixed snapshot of offers, loaded from memory or a JSON file of
/// the form `{ "item name": [offer, ...] }`.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    name: String,
    offers: HashMap<String, Vec<Offer>>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offers: HashMap::new(),
        }
    }

    pub fn with_offers(mut self, item: &str, offers: Vec<Offer>) -> Self {
        self.insert(item, offers);
        self
    }

    pub fn insert(&mut self, item: &str, offers: Vec<Offer>) {
        self.offers
            .entry(normalize_item_name(item))
            .or_default()
            .extend(offers);
    }

    pub fn from_json_str(name: impl Into<String>, content: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<Offer>> = serde_json::from_str(content)?;
        let mut source = Self::new(name);
        let mut items: Vec<_> = raw.into_iter().collect();
        // Names that normalize to the same key are merged in a fixed order.
        items.sort_by(|a, b| a.0.cmp(&b.0));
        for (item, offers) in items {
            source.insert(&item, offers);
        }
        Ok(source)
    }

    pub fn from_json_file<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(name, &content)
    }

    pub fn item_count(&self) -> usize {
        self.offers.len()
    }
}

#[async_trait]
impl OfferSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_offers(&self, item: &str) -> Result<Vec<Offer>> {
        Ok(self
            .offers
            .get(&normalize_item_name(item))
            .cloned()
            .unwrap_or_default())
    }
}
