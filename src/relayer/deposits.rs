// src/relayer/deposits.rs
//! Per-(depositor, relayer) balances
//!
//! Pure value accounting: the only rule enforced here besides conservation is
//! the relayer's deposit cap. Part of a balance can be reserved to back open
//! channels; reserved value cannot be withdrawn, only released or settled.

use crate::error::{checked_add, LedgerError, Result};
use crate::types::{Address, RelayerKey, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Balance one depositor holds against one relayer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEntry {
    pub depositor: Address,
    pub relayer: RelayerKey,
    pub balance: Value,
    /// Portion of `balance` backing open channels
    pub reserved: Value,
}

impl DepositEntry {
    pub fn empty(depositor: Address, relayer: RelayerKey) -> Self {
        Self {
            depositor,
            relayer,
            balance: 0,
            reserved: 0,
        }
    }

    pub fn available(&self) -> Value {
        self.balance.saturating_sub(self.reserved)
    }
}

/// Read-only access to deposit balances for other components
pub trait DepositView {
    fn balance_of(&self, depositor: &Address, relayer: &RelayerKey) -> Value;
    fn available_of(&self, depositor: &Address, relayer: &RelayerKey) -> Value;
    fn relayer_total(&self, relayer: &RelayerKey) -> Value;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositLedger {
    entries: BTreeMap<RelayerKey, BTreeMap<Address, DepositEntry>>,
    /// Running sum of balances per relayer
    totals: BTreeMap<RelayerKey, Value>,
}

impl DepositLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for (depositor, relayer); zeroed when absent
    pub fn entry(&self, depositor: &Address, relayer: &RelayerKey) -> DepositEntry {
        self.entries
            .get(relayer)
            .and_then(|m| m.get(depositor))
            .copied()
            .unwrap_or_else(|| DepositEntry::empty(*depositor, *relayer))
    }

    /// All entries against a relayer, in depositor order
    pub fn entries_for(&self, relayer: &RelayerKey) -> Vec<DepositEntry> {
        self.entries
            .get(relayer)
            .map(|m| m.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn depositor_count(&self, relayer: &RelayerKey) -> usize {
        self.entries.get(relayer).map_or(0, |m| m.len())
    }

    /// Sum of balances across every relayer
    pub fn total(&self) -> Value {
        self.totals.values().sum()
    }

    /// Validate a deposit and return the relayer total it would produce
    pub fn check_deposit(
        &self,
        depositor: &Address,
        relayer: &RelayerKey,
        amount: Value,
        cap: Value,
    ) -> Result<Value> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let new_total = checked_add(self.relayer_total(relayer), amount, "relayer deposit total")?;
        if new_total > cap {
            return Err(LedgerError::CapacityExceeded {
                key: *relayer,
                cap,
                attempted: new_total,
            });
        }
        // The entry can never exceed the total, so this only guards corrupted state
        checked_add(self.balance_of(depositor, relayer), amount, "deposit balance")?;
        Ok(new_total)
    }

    /// Credit `amount` to (depositor, relayer), enforcing the relayer's cap.
    ///
    /// Returns the depositor's new balance.
    pub fn deposit(
        &mut self,
        depositor: Address,
        relayer: RelayerKey,
        amount: Value,
        cap: Value,
    ) -> Result<Value> {
        let new_total = self.check_deposit(&depositor, &relayer, amount, cap)?;

        let entry = self
            .entries
            .entry(relayer)
            .or_default()
            .entry(depositor)
            .or_insert_with(|| DepositEntry::empty(depositor, relayer));
        entry.balance += amount;
        let balance = entry.balance;
        self.totals.insert(relayer, new_total);

        log::debug!(
            "Deposit {} on relayer {} by {} (balance {}, relayer total {})",
            amount,
            relayer,
            depositor,
            balance,
            new_total
        );
        Ok(balance)
    }

    pub fn check_withdraw(
        &self,
        depositor: &Address,
        relayer: &RelayerKey,
        amount: Value,
    ) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let entry = self.entry(depositor, relayer);
        if amount > entry.balance {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: entry.balance,
            });
        }
        if amount > entry.available() {
            return Err(LedgerError::DepositLocked {
                balance: entry.balance,
                reserved: entry.reserved,
            });
        }
        Ok(())
    }

    /// Debit unreserved balance. Returns the remaining balance.
    pub fn withdraw(
        &mut self,
        depositor: Address,
        relayer: RelayerKey,
        amount: Value,
    ) -> Result<Value> {
        self.check_withdraw(&depositor, &relayer, amount)?;
        Ok(self.debit(depositor, relayer, amount))
    }

    pub fn check_reserve(
        &self,
        depositor: &Address,
        relayer: &RelayerKey,
        amount: Value,
    ) -> Result<()> {
        let available = self.available_of(depositor, relayer);
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        Ok(())
    }

    /// Mark `amount` of the balance as backing an open channel
    pub fn reserve(&mut self, depositor: Address, relayer: RelayerKey, amount: Value) -> Result<()> {
        self.check_reserve(&depositor, &relayer, amount)?;
        if amount == 0 {
            return Ok(());
        }
        if let Some(entry) = self
            .entries
            .get_mut(&relayer)
            .and_then(|m| m.get_mut(&depositor))
        {
            entry.reserved += amount;
        }
        Ok(())
    }

    /// Return reserved value to the available balance
    pub fn release(&mut self, depositor: Address, relayer: RelayerKey, amount: Value) {
        if let Some(entry) = self
            .entries
            .get_mut(&relayer)
            .and_then(|m| m.get_mut(&depositor))
        {
            entry.reserved = entry.reserved.saturating_sub(amount);
        }
    }

    /// Consume reserved value: it leaves the deposit entirely.
    ///
    /// Returns the amount actually debited.
    pub fn settle_reserved(&mut self, depositor: Address, relayer: RelayerKey, amount: Value) -> Value {
        let reserved = self.entry(&depositor, &relayer).reserved;
        let amount = amount.min(reserved);
        if amount == 0 {
            return 0;
        }
        self.release(depositor, relayer, amount);
        self.debit(depositor, relayer, amount);
        amount
    }

    fn debit(&mut self, depositor: Address, relayer: RelayerKey, amount: Value) -> Value {
        let mut remaining = 0;
        let mut drop_entry = false;
        if let Some(entry) = self
            .entries
            .get_mut(&relayer)
            .and_then(|m| m.get_mut(&depositor))
        {
            entry.balance = entry.balance.saturating_sub(amount);
            remaining = entry.balance;
            drop_entry = entry.balance == 0 && entry.reserved == 0;
        }

        if drop_entry {
            if let Some(m) = self.entries.get_mut(&relayer) {
                m.remove(&depositor);
                if m.is_empty() {
                    self.entries.remove(&relayer);
                }
            }
        }

        let total = self.relayer_total(&relayer).saturating_sub(amount);
        if total == 0 {
            self.totals.remove(&relayer);
        } else {
            self.totals.insert(relayer, total);
        }
        remaining
    }
}

impl DepositView for DepositLedger {
    fn balance_of(&self, depositor: &Address, relayer: &RelayerKey) -> Value {
        self.entry(depositor, relayer).balance
    }

    fn available_of(&self, depositor: &Address, relayer: &RelayerKey) -> Value {
        self.entry(depositor, relayer).available()
    }

    fn relayer_total(&self, relayer: &RelayerKey) -> Value {
        self.totals.get(relayer).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::COIN_UNIT;

    fn alice() -> Address {
        Address([0xa1; 20])
    }

    fn bob() -> Address {
        Address([0xb0; 20])
    }

    fn relayer() -> RelayerKey {
        RelayerKey([7; 32])
    }

    #[test]
    fn test_balance_of_absent_entry_is_zero() {
        let ledger = DepositLedger::new();
        assert_eq!(ledger.balance_of(&alice(), &relayer()), 0);
        assert_eq!(ledger.relayer_total(&relayer()), 0);
    }

    #[test]
    fn test_deposits_accumulate() {
        let mut ledger = DepositLedger::new();
        let amount = COIN_UNIT / 10_000; // 0.0001
        ledger.deposit(alice(), relayer(), amount, COIN_UNIT).unwrap();
        ledger.deposit(alice(), relayer(), amount, COIN_UNIT).unwrap();
        assert_eq!(ledger.balance_of(&alice(), &relayer()), 2 * amount);
    }

    #[test]
    fn test_zero_deposit_rejected() {
        let mut ledger = DepositLedger::new();
        assert_eq!(
            ledger.deposit(alice(), relayer(), 0, 100),
            Err(LedgerError::InvalidAmount)
        );
    }

    #[test]
    fn test_cap_is_shared_across_depositors() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), relayer(), 60, 100).unwrap();
        let err = ledger.deposit(bob(), relayer(), 41, 100).unwrap_err();
        assert!(matches!(err, LedgerError::CapacityExceeded { attempted: 101, .. }));
        assert_eq!(ledger.balance_of(&bob(), &relayer()), 0);
        assert_eq!(ledger.relayer_total(&relayer()), 60);

        ledger.deposit(bob(), relayer(), 40, 100).unwrap();
        assert_eq!(ledger.relayer_total(&relayer()), 100);
    }

    #[test]
    fn test_withdraw_respects_balance_and_reservation() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), relayer(), 100, 1_000).unwrap();
        ledger.reserve(alice(), relayer(), 30).unwrap();

        assert_eq!(
            ledger.withdraw(alice(), relayer(), 101),
            Err(LedgerError::InsufficientBalance {
                required: 101,
                available: 100
            })
        );
        assert_eq!(
            ledger.withdraw(alice(), relayer(), 71),
            Err(LedgerError::DepositLocked {
                balance: 100,
                reserved: 30
            })
        );
        assert_eq!(ledger.withdraw(alice(), relayer(), 70).unwrap(), 30);
        assert_eq!(ledger.relayer_total(&relayer()), 30);
    }

    #[test]
    fn test_settle_reserved_debits_balance() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), relayer(), 50, 1_000).unwrap();
        ledger.reserve(alice(), relayer(), 50).unwrap();
        assert_eq!(ledger.settle_reserved(alice(), relayer(), 50), 50);
        assert_eq!(ledger.balance_of(&alice(), &relayer()), 0);
        assert_eq!(ledger.depositor_count(&relayer()), 0);
        assert_eq!(ledger.relayer_total(&relayer()), 0);
    }

    #[test]
    fn test_release_restores_availability() {
        let mut ledger = DepositLedger::new();
        ledger.deposit(alice(), relayer(), 50, 1_000).unwrap();
        ledger.reserve(alice(), relayer(), 20).unwrap();
        assert_eq!(ledger.available_of(&alice(), &relayer()), 30);
        ledger.release(alice(), relayer(), 20);
        assert_eq!(ledger.available_of(&alice(), &relayer()), 50);
    }
}
