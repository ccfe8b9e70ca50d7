//! World Bank Indicators API as a [`census_core::source::StatsSource`].
//!
//! Population, crude birth rate and crude death rate are fetched per country
//! and merged into one yearly series. Birth and death counts are derived from
//! the per-1,000 rates and the population of the same year.

mod client;
mod response;

pub mod error;

pub use client::{WorldBankClient, WorldBankConfig};
pub use error::{Error, Result};
pub use response::Indicator;
