//! End-of-run accounting shared by the fetch and load pipelines.

use std::fmt;

/// An item that was attempted and skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
  pub item:   String,
  pub reason: String,
}

/// Totals for one fetch or load run.
///
/// `Display` renders the single summary line printed at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub attempted: usize,
  pub succeeded: usize,
  pub failures:  Vec<ItemFailure>,
}

impl RunSummary {
  pub fn skipped(&self) -> usize { self.failures.len() }

  pub(crate) fn success(&mut self) {
    self.attempted += 1;
    self.succeeded += 1;
  }

  pub(crate) fn failure(&mut self, item: impl Into<String>, reason: impl Into<String>) {
    self.attempted += 1;
    self.failures.push(ItemFailure { item: item.into(), reason: reason.into() });
  }
}

impl fmt::Display for RunSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "attempted {}, succeeded {}, skipped {}",
      self.attempted,
      self.succeeded,
      self.skipped()
    )
  }
}
