pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{HttpJsonSource, InMemoryAliasLibrary, LocalStorage, StaticSource};
pub use config::BulkConfig;
pub use core::delivery::{DeliveryPlan, SearchMode};
pub use core::engine::{BulkBuyEngine, BulkResult};
pub use domain::model::{AllocationPlan, ConsolidatedResult, Currency, LotAllocation, Offer, Request};
pub use utils::error::{BulkError, Result};
