//! Daily PIN pool
//!
//! One pool per clinic per day. Codes move from `available` (or `reserve`)
//! to `taken` and never come back until the pool is reset.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::PinConfig;

/// Per-clinic, per-day pool of two-digit access codes
///
/// Invariant: `available.len() + reserve.len() + taken.len() == pool_size`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPinPool {
    pub available: VecDeque<String>,
    pub reserve: VecDeque<String>,

    /// Issued codes in issuance order
    pub taken: Vec<String>,
    pub issued: u64,
    pub reserve_mode: bool,
    pub pool_size: usize,
}

impl DailyPinPool {
    /// Fresh pool: primary codes first, reserve codes after
    pub fn new(config: &PinConfig) -> Self {
        let code = |n: usize| format!("{:02}", n);
        let primary_end = config.primary_size;
        let pool_size = config.pool_size();

        Self {
            available: (1..=primary_end).map(code).collect(),
            reserve: (primary_end + 1..=pool_size).map(code).collect(),
            taken: Vec::new(),
            issued: 0,
            reserve_mode: false,
            pool_size,
        }
    }

    /// Take the next code, or `None` if the pool is exhausted
    pub fn take_next(&mut self) -> Option<String> {
        let pin = match self.available.pop_front() {
            Some(pin) => pin,
            None => {
                let pin = self.reserve.pop_front()?;
                self.reserve_mode = true;
                pin
            }
        };

        self.taken.push(pin.clone());
        self.issued += 1;
        debug_assert!(self.is_conserved());
        Some(pin)
    }

    pub fn is_taken(&self, pin: &str) -> bool {
        self.taken.iter().any(|p| p == pin)
    }

    pub fn remaining(&self) -> usize {
        self.available.len() + self.reserve.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Conservation check: no code lost or duplicated
    pub fn is_conserved(&self) -> bool {
        self.available.len() + self.reserve.len() + self.taken.len() == self.pool_size
    }
}
