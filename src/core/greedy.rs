use crate::domain::model::{AllocationPlan, ConsolidatedResult, LotAllocation, Request};
use crate::domain::ports::{EngineEvent, EventSink};
use crate::utils::error::{BulkError, Result};
use std::collections::BTreeMap;

/// Cheapest-first allocation that ignores delivery fees.
///
/// Offers must already be sorted by price. The last lot taken for an item is
/// cut down to the remaining need, so every item's lots sum exactly to the
/// requested quantity or the whole call fails with `PartialAllocation`.
pub fn allocate_greedy(
    request: &Request,
    results: &BTreeMap<String, ConsolidatedResult>,
    sink: &dyn EventSink,
) -> Result<AllocationPlan> {
    let mut plan = AllocationPlan::new();

    for (item, &requested) in request.items() {
        let consolidated = results.get(item).ok_or_else(|| BulkError::ItemNotFound {
            item: item.clone(),
        })?;

        if !consolidated.available {
            return Err(BulkError::ItemUnavailable { item: item.clone() });
        }

        let mut found: u32 = 0;
        for offer in &consolidated.offers {
            if found >= requested {
                break;
            }
            let take = offer.quantity.min(requested - found);
            if take == 0 {
                continue;
            }
            plan.push(item, LotAllocation::from_offer(offer, take));
            found += take;
            sink.emit(EngineEvent::LotAllocated {
                item: item.clone(),
                seller: offer.seller.clone(),
                price: offer.price,
                quantity: take,
            });
        }

        if found < requested {
            return Err(BulkError::PartialAllocation {
                item: item.clone(),
                requested,
                available: found,
            });
        }
    }

    Ok(plan)
}
