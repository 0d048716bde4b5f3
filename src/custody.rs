// src/custody.rs
//! Value held by the ledger
//!
//! Every attached value enters custody once and leaves only through `claim`.
//! Refunds, settlements and released stakes are credited as pull-payments
//! that the owner claims in a separate call.

use crate::error::{checked_add, LedgerError, Result};
use crate::types::{Address, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Custody {
    /// Total value currently held
    total_held: Value,
    /// Claimable balances per account
    payouts: BTreeMap<Address, Value>,
}

impl Custody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_held(&self) -> Value {
        self.total_held
    }

    pub fn payout_of(&self, account: &Address) -> Value {
        self.payouts.get(account).copied().unwrap_or(0)
    }

    /// Sum of all unclaimed payouts
    pub fn total_payouts(&self) -> Value {
        self.payouts.values().sum()
    }

    /// Validate that `amount` can enter custody without overflowing
    pub fn check_receive(&self, amount: Value) -> Result<Value> {
        checked_add(self.total_held, amount, "custody total")
    }

    /// Take attached value into custody
    pub fn receive(&mut self, amount: Value) -> Result<()> {
        self.total_held = self.check_receive(amount)?;
        Ok(())
    }

    /// Make `amount` of already-held value claimable by `account`.
    ///
    /// Payouts never exceed `total_held`, so the sum cannot overflow.
    pub fn credit(&mut self, account: Address, amount: Value) {
        if amount == 0 {
            return;
        }
        let entry = self.payouts.entry(account).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Release the caller's whole payout
    pub fn claim(&mut self, account: Address) -> Result<Value> {
        let amount = self.payout_of(&account);
        if amount == 0 {
            return Err(LedgerError::NothingToClaim(account));
        }
        self.payouts.remove(&account);
        self.total_held = self.total_held.saturating_sub(amount);
        Ok(amount)
    }
}
