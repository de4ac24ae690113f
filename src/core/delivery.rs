//! Delivery-aware allocation.
//!
//! Each requested item (quantity 1) is bought from exactly one seller at that
//! seller's cheapest price for it, and every distinct seller used adds the
//! delivery fee once:
//!
//! ```text
//! total = sum(price[item, seller(item)]) + fee * |sellers used|
//! ```
//!
//! The exact search walks items in lexicographic order and, for each item,
//! tries sellers by ascending price then seller name. The first complete
//! assignment reaching the minimum wins; later assignments of equal cost are
//! rejected. The search is a branch-and-bound with two cuts:
//!
//! * a lower bound of `partial + cheapest remaining prices (+ one fee if no
//!   seller is used yet)`;
//! * a memo keyed on `(depth, sellers used)`, since the cost of finishing an
//!   assignment depends only on those two.
//!
//! A local-search heuristic runs first and its cost caps the search. In
//! `auto` mode the exact search is bounded by a node budget and the heuristic
//! plan is returned when the budget runs out. The deadline is checked by both
//! the heuristic (once per improvement round) and the exact search.
//!
//! Costs are compared in whole ten-thousandths of the currency unit, so sums
//! are exact and do not depend on the order prices are added in.

use crate::domain::model::{AllocationPlan, ConsolidatedResult, LotAllocation, Offer, Request};
use crate::domain::ports::{EngineEvent, EventSink};
use crate::utils::error::{BulkError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

const DEADLINE_CHECK_INTERVAL: u64 = 1024;
const MEMO_CAPACITY: usize = 1 << 20;

type Units = i64;

const UNITS_PER_CURRENCY: f64 = 10_000.0;
/// Keeps any sum over a realistic list well inside `i64`.
const MAX_AMOUNT: f64 = 1e12;

fn to_units(amount: f64) -> Result<Units> {
    if amount > MAX_AMOUNT {
        return Err(BulkError::invalid_request(format!(
            "amount {} is too large for delivery planning",
            amount
        )));
    }
    Ok((amount * UNITS_PER_CURRENCY).round() as Units)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Exact search within the node budget, heuristic plan beyond it.
    #[default]
    Auto,
    /// Exact search with no node budget; only the deadline stops it.
    Exact,
    Heuristic,
}

impl SearchMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auto" => Some(SearchMode::Auto),
            "exact" => Some(SearchMode::Exact),
            "heuristic" => Some(SearchMode::Heuristic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Auto => "auto",
            SearchMode::Exact => "exact",
            SearchMode::Heuristic => "heuristic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchLimits {
    pub mode: SearchMode,
    pub max_exact_nodes: u64,
    pub deadline: Option<Instant>,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            mode: SearchMode::Auto,
            max_exact_nodes: 1_000_000,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryPlan {
    pub plan: AllocationPlan,
    pub sellers: Vec<String>,
    pub item_cost: f64,
    pub delivery_cost: f64,
    pub total_cost: f64,
    /// True when the plan is proven to be a minimum.
    pub optimal: bool,
    pub strategy: &'static str,
    pub nodes_explored: u64,
}

pub fn allocate_with_delivery(
    request: &Request,
    results: &BTreeMap<String, ConsolidatedResult>,
    limits: &SearchLimits,
    sink: &dyn EventSink,
) -> Result<DeliveryPlan> {
    DeliveryProblem::build(request, results)?.solve(limits, sink)
}

#[derive(Debug, Clone)]
struct Candidate {
    seller: usize,
    price: f64,
    units: Units,
    offer: Offer,
}

/// An owned snapshot of everything the search needs, so it can run on a
/// blocking thread.
#[derive(Debug, Clone)]
pub struct DeliveryProblem {
    items: Vec<String>,
    sellers: Vec<String>,
    candidates: Vec<Vec<Candidate>>,
    fee: f64,
    fee_units: Units,
}

impl DeliveryProblem {
    pub fn build(request: &Request, results: &BTreeMap<String, ConsolidatedResult>) -> Result<Self> {
        if !request.wants_delivery_plan() {
            return Err(BulkError::invalid_request(
                "delivery-aware allocation needs a positive delivery fee and a quantity of 1 for every item",
            ));
        }

        let mut seller_names = BTreeSet::new();
        let mut per_item: Vec<(String, Vec<Offer>)> = Vec::with_capacity(request.len());
        for item in request.items().keys() {
            let consolidated = results.get(item).ok_or_else(|| BulkError::ItemNotFound {
                item: item.clone(),
            })?;

            // Offers are price-sorted, so the first offer seen per seller is
            // that seller's minimum.
            let mut cheapest: Vec<Offer> = Vec::new();
            for offer in &consolidated.offers {
                if !cheapest.iter().any(|o| o.seller == offer.seller) {
                    cheapest.push(offer.clone());
                }
            }
            if cheapest.is_empty() {
                return Err(BulkError::NoFeasibleAllocation { item: item.clone() });
            }
            seller_names.extend(cheapest.iter().map(|o| o.seller.clone()));
            per_item.push((item.clone(), cheapest));
        }

        let sellers: Vec<String> = seller_names.into_iter().collect();
        let index: HashMap<&str, usize> = sellers
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let mut items = Vec::with_capacity(per_item.len());
        let mut candidates = Vec::with_capacity(per_item.len());
        for (item, offers) in per_item {
            let mut list = Vec::with_capacity(offers.len());
            for offer in offers {
                list.push(Candidate {
                    seller: index[offer.seller.as_str()],
                    price: offer.price,
                    units: to_units(offer.price)?,
                    offer,
                });
            }
            list.sort_by(|a, b| a.units.cmp(&b.units).then(a.seller.cmp(&b.seller)));
            items.push(item);
            candidates.push(list);
        }

        Ok(Self {
            items,
            sellers,
            candidates,
            fee: request.delivery_fee(),
            fee_units: to_units(request.delivery_fee())?,
        })
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn solve(&self, limits: &SearchLimits, sink: &dyn EventSink) -> Result<DeliveryPlan> {
        let heuristic = self.heuristic(limits.deadline)?;
        let heuristic_cost = self.cost(&heuristic);

        if limits.mode == SearchMode::Heuristic {
            let proven = heuristic_cost <= self.lower_bound();
            let plan = self.finish(&heuristic, "heuristic", 0, proven);
            emit_finished(sink, &plan);
            return Ok(plan);
        }

        let max_nodes = match limits.mode {
            SearchMode::Auto => Some(limits.max_exact_nodes),
            _ => None,
        };
        let mut search = ExactSearch::new(self, heuristic_cost, max_nodes, limits.deadline);
        let plan = match search.run() {
            Ok(()) => {
                let best = search.best.take().map(|(_, a)| a).unwrap_or(heuristic);
                self.finish(&best, "exact", search.nodes, true)
            }
            Err(Abort::Budget) => {
                sink.emit(EngineEvent::SearchBudgetExhausted {
                    nodes: search.nodes,
                });
                self.finish(&heuristic, "heuristic", search.nodes, false)
            }
            Err(Abort::Deadline) => return Err(BulkError::deadline("delivery search")),
        };
        emit_finished(sink, &plan);
        Ok(plan)
    }

    /// Cost of a complete assignment, given as a candidate index per item.
    fn cost(&self, assignment: &[usize]) -> Units {
        let mut used = vec![false; self.sellers.len()];
        let mut cost = 0;
        for (item, &choice) in assignment.iter().enumerate() {
            let candidate = &self.candidates[item][choice];
            cost += candidate.units;
            if !used[candidate.seller] {
                used[candidate.seller] = true;
                cost += self.fee_units;
            }
        }
        cost
    }

    fn lower_bound(&self) -> Units {
        self.candidates.iter().map(|c| c[0].units).sum::<Units>() + self.fee_units
    }

    /// Starts from the cheapest seller per item, then repeatedly applies the
    /// single best improving move: close a used seller (moving its items to
    /// other used sellers) or open a seller (moving items onto it).
    fn heuristic(&self, deadline: Option<Instant>) -> Result<Vec<usize>> {
        let mut assignment = vec![0usize; self.items.len()];
        let mut cost = self.cost(&assignment);

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(BulkError::deadline("delivery search"));
            }
            let mut best_move: Option<(Units, Vec<usize>)> = None;
            let used = self.used_sellers(&assignment);

            for seller in 0..self.sellers.len() {
                let moves = if used[seller] {
                    self.close_seller(&assignment, &used, seller).into_iter().collect::<Vec<_>>()
                } else {
                    self.open_seller(&assignment, seller)
                };
                for candidate in moves {
                    let candidate_cost = self.cost(&candidate);
                    if candidate_cost < cost && best_move.as_ref().map_or(true, |(c, _)| candidate_cost < *c) {
                        best_move = Some((candidate_cost, candidate));
                    }
                }
            }

            match best_move {
                Some((new_cost, next)) => {
                    cost = new_cost;
                    assignment = next;
                }
                None => return Ok(assignment),
            }
        }
    }

    fn used_sellers(&self, assignment: &[usize]) -> Vec<bool> {
        let mut used = vec![false; self.sellers.len()];
        for (item, &choice) in assignment.iter().enumerate() {
            used[self.candidates[item][choice].seller] = true;
        }
        used
    }

    fn close_seller(&self, assignment: &[usize], used: &[bool], seller: usize) -> Option<Vec<usize>> {
        let mut next = assignment.to_vec();
        for (item, choice) in next.iter_mut().enumerate() {
            if self.candidates[item][*choice].seller != seller {
                continue;
            }
            *choice = self.candidates[item]
                .iter()
                .position(|c| c.seller != seller && used[c.seller])?;
        }
        Some(next)
    }

    /// Two variants: move every item the seller stocks, or only the items it
    /// sells cheaper than the current choice.
    fn open_seller(&self, assignment: &[usize], seller: usize) -> Vec<Vec<usize>> {
        let mut all = assignment.to_vec();
        let mut cheaper = assignment.to_vec();
        let mut touched = false;
        for item in 0..assignment.len() {
            if let Some(pos) = self.candidates[item].iter().position(|c| c.seller == seller) {
                touched = true;
                all[item] = pos;
                if self.candidates[item][pos].units < self.candidates[item][assignment[item]].units {
                    cheaper[item] = pos;
                }
            }
        }
        if !touched {
            return Vec::new();
        }
        vec![all, cheaper]
    }

    fn finish(&self, assignment: &[usize], strategy: &'static str, nodes: u64, optimal: bool) -> DeliveryPlan {
        let mut plan = AllocationPlan::new();
        let mut sellers = BTreeSet::new();
        let mut item_cost = 0.0;
        for (item, &choice) in assignment.iter().enumerate() {
            let candidate = &self.candidates[item][choice];
            plan.push(&self.items[item], LotAllocation::from_offer(&candidate.offer, 1));
            sellers.insert(self.sellers[candidate.seller].clone());
            item_cost += candidate.price;
        }
        let delivery_cost = self.fee * sellers.len() as f64;
        DeliveryPlan {
            plan,
            sellers: sellers.into_iter().collect(),
            item_cost,
            delivery_cost,
            total_cost: item_cost + delivery_cost,
            optimal,
            strategy,
            nodes_explored: nodes,
        }
    }
}

fn emit_finished(sink: &dyn EventSink, plan: &DeliveryPlan) {
    sink.emit(EngineEvent::SearchFinished {
        strategy: plan.strategy,
        nodes: plan.nodes_explored,
        cost: plan.total_cost,
        optimal: plan.optimal,
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SellerSet(Vec<u64>);

impl SellerSet {
    fn with_capacity(sellers: usize) -> Self {
        SellerSet(vec![0; sellers.div_ceil(64)])
    }

    fn insert(&mut self, seller: usize) {
        self.0[seller / 64] |= 1 << (seller % 64);
    }

    fn remove(&mut self, seller: usize) {
        self.0[seller / 64] &= !(1 << (seller % 64));
    }

    fn is_empty(&self) -> bool {
        self.0.iter().all(|w| *w == 0)
    }
}

enum Abort {
    Budget,
    Deadline,
}

struct ExactSearch<'a> {
    problem: &'a DeliveryProblem,
    suffix_min: Vec<Units>,
    ceiling: Units,
    max_nodes: Option<u64>,
    deadline: Option<Instant>,
    best: Option<(Units, Vec<usize>)>,
    memo: HashMap<(usize, SellerSet), Units>,
    nodes: u64,
    current: Vec<usize>,
    seller_uses: Vec<u32>,
    used: SellerSet,
}

impl<'a> ExactSearch<'a> {
    fn new(problem: &'a DeliveryProblem, ceiling: Units, max_nodes: Option<u64>, deadline: Option<Instant>) -> Self {
        let n = problem.items.len();
        let mut suffix_min = vec![0; n + 1];
        for item in (0..n).rev() {
            suffix_min[item] = suffix_min[item + 1] + problem.candidates[item][0].units;
        }
        Self {
            problem,
            suffix_min,
            ceiling,
            max_nodes,
            deadline,
            best: None,
            memo: HashMap::new(),
            nodes: 0,
            current: vec![0; n],
            seller_uses: vec![0; problem.sellers.len()],
            used: SellerSet::with_capacity(problem.sellers.len()),
        }
    }

    fn run(&mut self) -> std::result::Result<(), Abort> {
        self.dfs(0, 0)
    }

    fn dfs(&mut self, depth: usize, partial: Units) -> std::result::Result<(), Abort> {
        self.nodes += 1;
        if self.max_nodes.is_some_and(|max| self.nodes > max) {
            return Err(Abort::Budget);
        }
        if self.nodes % DEADLINE_CHECK_INTERVAL == 1
            && self.deadline.is_some_and(|d| Instant::now() >= d)
        {
            return Err(Abort::Deadline);
        }

        if depth == self.problem.items.len() {
            let cost = self.problem.cost(&self.current);
            if cost <= self.ceiling && self.best.as_ref().map_or(true, |(best, _)| cost < *best) {
                self.best = Some((cost, self.current.clone()));
            }
            return Ok(());
        }

        let opening_fee = if self.used.is_empty() { self.problem.fee_units } else { 0 };
        let bound = partial + self.suffix_min[depth] + opening_fee;
        if bound > self.ceiling || self.best.as_ref().is_some_and(|(best, _)| bound >= *best) {
            return Ok(());
        }

        let key = (depth, self.used.clone());
        match self.memo.get(&key) {
            Some(&seen) if partial >= seen => return Ok(()),
            _ => {
                if self.memo.len() < MEMO_CAPACITY || self.memo.contains_key(&key) {
                    self.memo.insert(key, partial);
                }
            }
        }

        for choice in 0..self.problem.candidates[depth].len() {
            let candidate = &self.problem.candidates[depth][choice];
            let seller = candidate.seller;
            let opens = self.seller_uses[seller] == 0;
            let step = candidate.units + if opens { self.problem.fee_units } else { 0 };

            self.current[depth] = choice;
            self.seller_uses[seller] += 1;
            if opens {
                self.used.insert(seller);
            }

            let outcome = self.dfs(depth + 1, partial + step);

            self.seller_uses[seller] -= 1;
            if opens {
                self.used.remove(seller);
            }
            outcome?;
        }
        Ok(())
    }
}
