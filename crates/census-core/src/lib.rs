//! Core types and pipelines for the census demographic ingestion tool.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! upstream statistics source and the persistent store are reached through
//! the [`source::StatsSource`] and [`store::PopulationStore`] traits.

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// trait methods themselves.
#![allow(async_fn_in_trait)]

pub mod batch;
pub mod country;
pub mod error;
pub mod fetch;
pub mod load;
pub mod record;
pub mod reference;
pub mod source;
pub mod store;
pub mod summary;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
