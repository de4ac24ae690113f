pub mod aggregator;
pub mod delivery;
pub mod engine;
pub mod greedy;
pub mod possession;

pub use crate::domain::model::{AllocationPlan, ConsolidatedResult, LotAllocation, Offer, Request};
pub use crate::domain::ports::{AliasResolver, EngineEvent, EventSink, OfferSource, Storage};
pub use crate::utils::error::Result;
