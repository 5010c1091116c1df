//! Location readings and how they are judged.
//!
//! - [`state`] - `Position`, `Provider`, `ProviderAvailability`
//! - [`quality`] - cache freshness and "is this reading better" predicates
//! - [`model`] - `PositionModel`, the best reading seen so far

mod model;
mod quality;
mod state;

pub use model::PositionModel;
pub use quality::{
    is_better, is_cache_valid, SIGNIFICANT_ACCURACY_DELTA_M, SIGNIFICANT_TIME_DELTA_MS,
};
pub use state::{Position, Provider, ProviderAvailability};
