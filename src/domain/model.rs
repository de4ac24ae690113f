use crate::utils::error::{BulkError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Lowercase, trim and collapse inner whitespace so "Sol  Ring " and
/// "sol ring" are the same item.
pub fn normalize_item_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Rub,
    Usd,
    Eur,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Rub => "₽",
            Currency::Usd => "$",
            Currency::Eur => "€",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "RUB" | "RUR" => Some(Currency::Rub),
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One priced lot of an item from one seller, as reported by one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub price: f64,
    #[serde(default)]
    pub currency: Currency,
    pub quantity: u32,
    #[serde(default)]
    pub foil: bool,
    pub seller: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub url: String,
}

impl Offer {
    pub fn new(seller: impl Into<String>, price: f64, quantity: u32) -> Self {
        Self {
            price,
            currency: Currency::default(),
            quantity,
            foil: false,
            seller: seller.into(),
            platform: String::new(),
            url: String::new(),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_foil(mut self, foil: bool) -> Self {
        self.foil = foil;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Reason the offer cannot be used, if any.
    pub fn defect(&self) -> Option<&'static str> {
        if !self.price.is_finite() {
            Some("price is not a finite number")
        } else if self.price < 0.0 {
            Some("price is negative")
        } else if self.quantity == 0 {
            Some("quantity is zero")
        } else if self.seller.trim().is_empty() {
            Some("seller is empty")
        } else {
            None
        }
    }
}

/// All offers for one item across every source, cheapest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedResult {
    pub available: bool,
    pub offers: Vec<Offer>,
}

impl ConsolidatedResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one source's offers. Availability only ever turns on.
    pub fn merge(&mut self, offers: Vec<Offer>) {
        if !offers.is_empty() {
            self.available = true;
        }
        self.offers.extend(offers);
    }

    /// Stable: equal prices keep their merge order.
    pub fn sort_by_price(&mut self) {
        self.offers.sort_by(|a, b| a.price.total_cmp(&b.price));
    }
}

/// A validated shopping list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    items: BTreeMap<String, u32>,
    delivery_fee: f64,
    only_singles: bool,
}

impl Request {
    /// Item names are normalized; two raw names that normalize to the same
    /// key are a duplicate.
    pub fn new<I, S>(items: I, delivery_fee: Option<f64>) -> Result<Self>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let mut map = BTreeMap::new();
        for (raw_name, quantity) in items {
            let name = normalize_item_name(raw_name.as_ref());
            if name.is_empty() {
                return Err(BulkError::invalid_request("empty item name"));
            }
            if quantity <= 0 {
                return Err(BulkError::invalid_request(format!(
                    "illegal quantity {} for item {:?}",
                    quantity, name
                )));
            }
            let quantity = u32::try_from(quantity).map_err(|_| {
                BulkError::invalid_request(format!(
                    "quantity {} for item {:?} is too large",
                    quantity, name
                ))
            })?;
            if map.insert(name.clone(), quantity).is_some() {
                return Err(BulkError::invalid_request(format!(
                    "item {:?} is duplicated in the list",
                    name
                )));
            }
        }

        if map.is_empty() {
            return Err(BulkError::invalid_request("empty item list"));
        }

        let only_singles = map.values().all(|&q| q == 1);
        let mut request = Self {
            items: map,
            delivery_fee: 0.0,
            only_singles,
        };
        if let Some(fee) = delivery_fee {
            request.set_delivery_fee(fee)?;
        }
        Ok(request)
    }

    pub fn with_delivery_fee(mut self, fee: f64) -> Result<Self> {
        self.set_delivery_fee(fee)?;
        Ok(self)
    }

    fn set_delivery_fee(&mut self, fee: f64) -> Result<()> {
        if !fee.is_finite() || fee < 0.0 {
            return Err(BulkError::invalid_request(format!(
                "delivery fee must be a non-negative number, got {}",
                fee
            )));
        }
        self.delivery_fee = fee;
        Ok(())
    }

    pub fn items(&self) -> &BTreeMap<String, u32> {
        &self.items
    }

    pub fn quantity(&self, item: &str) -> Option<u32> {
        self.items.get(item).copied()
    }

    pub fn delivery_fee(&self) -> f64 {
        self.delivery_fee
    }

    pub fn has_only_singles(&self) -> bool {
        self.only_singles
    }

    pub fn wants_delivery_plan(&self) -> bool {
        self.delivery_fee > 0.0 && self.only_singles
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The part of one offer a plan buys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotAllocation {
    pub seller: String,
    pub platform: String,
    pub price: f64,
    pub currency: Currency,
    pub quantity: u32,
    pub foil: bool,
    pub url: String,
}

impl LotAllocation {
    pub fn from_offer(offer: &Offer, quantity: u32) -> Self {
        Self {
            seller: offer.seller.clone(),
            platform: offer.platform.clone(),
            price: offer.price,
            currency: offer.currency,
            quantity,
            foil: offer.foil,
            url: offer.url.clone(),
        }
    }

    pub fn cost(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationPlan {
    items: BTreeMap<String, Vec<LotAllocation>>,
}

impl AllocationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: &str, lot: LotAllocation) {
        self.items.entry(item.to_string()).or_default().push(lot);
    }

    pub fn lots(&self, item: &str) -> &[LotAllocation] {
        self.items.get(item).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn allocated_quantity(&self, item: &str) -> u32 {
        self.lots(item).iter().map(|l| l.quantity).sum()
    }

    pub fn total_cost(&self) -> f64 {
        self.items.values().flatten().map(LotAllocation::cost).sum()
    }

    pub fn sellers(&self) -> BTreeSet<&str> {
        self.items
            .values()
            .flatten()
            .map(|l| l.seller.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<LotAllocation>)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
