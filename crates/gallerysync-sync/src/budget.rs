//! Per-invocation run budget
//!
//! The engine checks the budget once before the first item and after every
//! item. It is the only point at which a run stops voluntarily.

use std::time::Duration;

use tokio::time::Instant;

/// Limits for a single `run_sync` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunBudget {
    wall_clock: Duration,
    max_items: Option<u64>,
}

impl RunBudget {
    /// A budget bounded by wall-clock time only
    pub fn new(wall_clock: Duration) -> Self {
        Self {
            wall_clock,
            max_items: None,
        }
    }

    /// A budget with no limit at all
    pub fn unlimited() -> Self {
        Self::new(Duration::MAX)
    }

    /// Also stop after `max_items` processed items
    pub fn with_max_items(mut self, max_items: u64) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn wall_clock(&self) -> Duration {
        self.wall_clock
    }

    pub fn max_items(&self) -> Option<u64> {
        self.max_items
    }

    /// Starts the clock
    pub fn start(&self) -> BudgetClock {
        BudgetClock {
            budget: *self,
            started: Instant::now(),
        }
    }
}

/// A running budget
#[derive(Debug, Clone, Copy)]
pub struct BudgetClock {
    budget: RunBudget,
    started: Instant,
}

impl BudgetClock {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// True once the wall clock ran out or `processed` reached the item cap
    pub fn is_exhausted(&self, processed: u64) -> bool {
        if self.elapsed() >= self.budget.wall_clock {
            return true;
        }
        matches!(self.budget.max_items, Some(max) if processed >= max)
    }
}
