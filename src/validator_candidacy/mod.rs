// src/validator_candidacy/mod.rs
//! Validator candidacy staking
//!
//! A candidate locks `required_stake + witness_funds`. The attached value
//! must match that sum exactly, and `required_stake` may not undercut the
//! schedule for the next slot. Slots are handed out in registration order
//! and never reused, so a later entrant always faces a higher floor.

use crate::error::{checked_add, LedgerError, Result};
use crate::stake::StakeSchedule;
use crate::types::{Address, CallContext, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidacy {
    pub candidate: Address,
    /// Candidacies registered before this one, withdrawn ones included
    pub slot: u64,
    pub required_stake: Value,
    pub witness_funds: Value,
    /// Always `required_stake + witness_funds`
    pub total_locked: Value,
    pub registered_at: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidacyBook {
    candidates: BTreeMap<Address, Candidacy>,
    /// Slot the next candidacy takes; only ever increases
    #[serde(default)]
    slots_issued: u64,
}

impl CandidacyBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stake the schedule demands for `slot`
    pub fn required_staking_funds(schedule: &StakeSchedule, slot: u64) -> Result<Value> {
        schedule.required_validator_stake(slot)
    }

    /// Slot the next candidacy would occupy
    pub fn next_slot(&self) -> u64 {
        self.slots_issued
    }

    pub fn check_candidate(
        &self,
        ctx: &CallContext,
        required_stake: Value,
        witness_funds: Value,
        schedule: &StakeSchedule,
    ) -> Result<Value> {
        if self.candidates.contains_key(&ctx.caller) {
            return Err(LedgerError::AlreadyCandidate(ctx.caller));
        }
        let expected = checked_add(required_stake, witness_funds, "candidacy total")?;
        if ctx.attached_value != expected {
            return Err(LedgerError::StakeMismatch {
                expected,
                attached: ctx.attached_value,
            });
        }
        let floor = schedule.required_validator_stake(self.next_slot())?;
        if required_stake < floor {
            return Err(LedgerError::InsufficientStake {
                required: floor,
                attached: required_stake,
            });
        }
        Ok(expected)
    }

    /// Register `ctx.caller` as a validator candidate, locking the attached value
    pub fn validator_as_candidate(
        &mut self,
        ctx: &CallContext,
        required_stake: Value,
        witness_funds: Value,
        schedule: &StakeSchedule,
    ) -> Result<Candidacy> {
        let total_locked = self.check_candidate(ctx, required_stake, witness_funds, schedule)?;

        let candidacy = Candidacy {
            candidate: ctx.caller,
            slot: self.next_slot(),
            required_stake,
            witness_funds,
            total_locked,
            registered_at: ctx.timestamp,
        };
        self.candidates.insert(ctx.caller, candidacy);
        self.slots_issued += 1;

        log::info!(
            "Validator candidate {} registered at slot {} ({} stake, {} witness)",
            ctx.caller,
            candidacy.slot,
            required_stake,
            witness_funds
        );
        Ok(candidacy)
    }

    /// Drop the caller's candidacy. Returns it; `total_locked` is due back.
    pub fn withdraw(&mut self, ctx: &CallContext) -> Result<Candidacy> {
        let candidacy = self
            .candidates
            .remove(&ctx.caller)
            .ok_or(LedgerError::NotCandidate(ctx.caller))?;
        log::info!(
            "Validator candidate {} withdrew, releasing {}",
            ctx.caller,
            candidacy.total_locked
        );
        Ok(candidacy)
    }

    pub fn candidacy_of(&self, candidate: &Address) -> Option<Candidacy> {
        self.candidates.get(candidate).copied()
    }

    /// Active candidacies in address order
    pub fn candidates(&self) -> Vec<Candidacy> {
        self.candidates.values().copied().collect()
    }

    pub fn total_locked(&self) -> Value {
        self.candidates.values().map(|c| c.total_locked).sum()
    }
}
