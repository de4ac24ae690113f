use crate::domain::model::ConsolidatedResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// Cheapest advertised price per (seller, item), kept in two views that
/// always hold the same facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PossessionMatrix {
    seller_items: BTreeMap<String, BTreeMap<String, f64>>,
    item_sellers: BTreeMap<String, BTreeMap<String, f64>>,
}

impl PossessionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results(results: &BTreeMap<String, ConsolidatedResult>) -> Self {
        let mut matrix = Self::new();
        for (item, consolidated) in results {
            for offer in &consolidated.offers {
                matrix.add(&offer.seller, item, offer.price);
            }
        }
        matrix
    }

    pub fn add(&mut self, seller: &str, item: &str, price: f64) {
        keep_min(
            self.seller_items
                .entry(seller.to_string())
                .or_default()
                .entry(item.to_string()),
            price,
        );
        keep_min(
            self.item_sellers
                .entry(item.to_string())
                .or_default()
                .entry(seller.to_string()),
            price,
        );
    }

    pub fn price(&self, seller: &str, item: &str) -> Option<f64> {
        self.seller_items.get(seller)?.get(item).copied()
    }

    pub fn items_of(&self, seller: &str) -> Option<&BTreeMap<String, f64>> {
        self.seller_items.get(seller)
    }

    pub fn sellers_of(&self, item: &str) -> Option<&BTreeMap<String, f64>> {
        self.item_sellers.get(item)
    }

    pub fn sellers(&self) -> impl Iterator<Item = &String> {
        self.seller_items.keys()
    }

    pub fn items(&self) -> impl Iterator<Item = &String> {
        self.item_sellers.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.seller_items.is_empty()
    }

    /// Rows are items in lexicographic order. Columns are sellers by
    /// descending item count; equal counts fall back to seller name.
    pub fn to_table(&self) -> PossessionTable {
        let items: Vec<String> = self.item_sellers.keys().cloned().collect();
        let mut sellers: Vec<String> = self.seller_items.keys().cloned().collect();
        sellers.sort_by_key(|s| std::cmp::Reverse(self.seller_items[s].len()));

        let mut table = PossessionTable {
            prices: vec![vec![None; sellers.len()]; items.len()],
            item_seller_counts: vec![0; items.len()],
            seller_price_totals: vec![0.0; sellers.len()],
            seller_item_counts: vec![0; sellers.len()],
            sellers,
            items,
        };

        for (x, seller) in table.sellers.iter().enumerate() {
            for (y, item) in table.items.iter().enumerate() {
                if let Some(price) = self.price(seller, item) {
                    table.prices[y][x] = Some(price);
                    table.seller_price_totals[x] += price;
                    table.seller_item_counts[x] += 1;
                    table.item_seller_counts[y] += 1;
                }
            }
        }
        table
    }
}

fn keep_min(entry: std::collections::btree_map::Entry<'_, String, f64>, price: f64) {
    entry
        .and_modify(|current| {
            if price < *current {
                *current = price;
            }
        })
        .or_insert(price);
}

/// Dense seller x item grid. `None` means the seller does not stock the item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PossessionTable {
    pub sellers: Vec<String>,
    pub items: Vec<String>,
    /// Indexed `[item][seller]`.
    pub prices: Vec<Vec<Option<f64>>>,
    pub item_seller_counts: Vec<usize>,
    /// Sum of the prices in a seller's column; not a purchase cost.
    pub seller_price_totals: Vec<f64>,
    pub seller_item_counts: Vec<usize>,
}

impl PossessionTable {
    pub fn cell(&self, item: &str, seller: &str) -> Option<f64> {
        let y = self.items.iter().position(|i| i == item)?;
        let x = self.sellers.iter().position(|s| s == seller)?;
        self.prices[y][x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Offer;

    fn results() -> BTreeMap<String, ConsolidatedResult> {
        let mut results = BTreeMap::new();
        let mut bolt = ConsolidatedResult::new();
        bolt.merge(vec![
            Offer::new("x", 3.0, 1),
            Offer::new("x", 2.0, 1),
            Offer::new("y", 0.0, 1),
        ]);
        bolt.sort_by_price();
        results.insert("bolt".to_string(), bolt);

        let mut anthem = ConsolidatedResult::new();
        anthem.merge(vec![Offer::new("x", 7.0, 2), Offer::new("z", 6.0, 1)]);
        anthem.sort_by_price();
        results.insert("anthem".to_string(), anthem);
        results
    }

    #[test]
    fn test_keeps_minimum_price_per_pair() {
        let matrix = PossessionMatrix::from_results(&results());
        assert_eq!(matrix.price("x", "bolt"), Some(2.0));
        assert_eq!(matrix.price("x", "anthem"), Some(7.0));
        assert_eq!(matrix.price("z", "bolt"), None);
    }

    #[test]
    fn test_views_agree() {
        let matrix = PossessionMatrix::from_results(&results());
        for seller in matrix.sellers() {
            for (item, price) in matrix.items_of(seller).unwrap() {
                assert_eq!(matrix.sellers_of(item).unwrap().get(seller), Some(price));
            }
        }
        for item in matrix.items() {
            for (seller, price) in matrix.sellers_of(item).unwrap() {
                assert_eq!(matrix.items_of(seller).unwrap().get(item), Some(price));
            }
        }
    }

    #[test]
    fn test_table_layout_and_totals() {
        let table = PossessionMatrix::from_results(&results()).to_table();

        assert_eq!(table.items, vec!["anthem", "bolt"]);
        // x stocks two items; y and z tie on one and fall back to name order.
        assert_eq!(table.sellers, vec!["x", "y", "z"]);
        assert_eq!(table.item_seller_counts, vec![2, 2]);
        assert_eq!(table.seller_item_counts, vec![2, 1, 1]);
        assert_eq!(table.seller_price_totals, vec![9.0, 0.0, 6.0]);
    }

    #[test]
    fn test_zero_price_is_not_absence() {
        let table = PossessionMatrix::from_results(&results()).to_table();
        assert_eq!(table.cell("bolt", "y"), Some(0.0));
        assert_eq!(table.cell("anthem", "y"), None);
    }

    #[test]
    fn test_zero_price_can_still_be_undercut() {
        let mut matrix = PossessionMatrix::new();
        matrix.add("x", "bolt", 0.0);
        matrix.add("x", "bolt", 1.0);
        assert_eq!(matrix.price("x", "bolt"), Some(0.0));
    }

    #[test]
    fn test_table_is_idempotent() {
        let data = results();
        let first = serde_json::to_string(&PossessionMatrix::from_results(&data).to_table()).unwrap();
        let second = serde_json::to_string(&PossessionMatrix::from_results(&data).to_table()).unwrap();
        assert_eq!(first, second);
    }
}
