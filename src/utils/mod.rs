pub mod error;
pub mod events;
pub mod logger;
pub mod validation;
