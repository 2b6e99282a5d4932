//! Idle filter chain pool.
//!
//! # Responsibilities
//! - Keep released chains per servlet so their slot storage is reused
//! - Cap the number of idle chains held for each servlet
//!
//! # Design Decisions
//! - A chain is released before it re-enters the pool
//! - `acquire` hands a chain to exactly one caller; it is owned, not shared

use dashmap::DashMap;

use crate::chain::FilterChain;
use crate::observability::metrics;

/// Per-servlet idle chains.
#[derive(Debug)]
pub struct ChainPool {
    idle: DashMap<String, Vec<FilterChain>>,
    max_idle: usize,
}

impl ChainPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: DashMap::new(),
            max_idle,
        }
    }

    /// Take an idle chain for `servlet`, or build one with `make`.
    pub fn acquire(&self, servlet: &str, make: impl FnOnce() -> FilterChain) -> FilterChain {
        let pooled = self.idle.get_mut(servlet).and_then(|mut chains| chains.pop());
        metrics::record_pool(pooled.is_some());
        pooled.unwrap_or_else(make)
    }

    /// Release `chain` and keep it for the next request to `servlet`.
    /// Dropped when the servlet already has `max_idle` idle chains.
    pub fn give_back(&self, servlet: &str, mut chain: FilterChain) {
        chain.release();
        let mut idle = self.idle.entry(servlet.to_string()).or_default();
        if idle.len() < self.max_idle {
            idle.push(chain);
        }
    }

    /// Number of idle chains held for `servlet`.
    pub fn idle_count(&self, servlet: &str) -> usize {
        self.idle.get(servlet).map_or(0, |chains| chains.len())
    }

    /// Drop every idle chain.
    pub fn clear(&self) {
        self.idle.clear();
    }
}
