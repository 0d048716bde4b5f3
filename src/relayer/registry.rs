// src/relayer/registry.rs
//! Relayer Registry
//!
//! Onboarding for relayers:
//! - Key derived from the domain string (one record per key)
//! - Stake gated by the advertised capacity
//! - Reputation entry initialized at 0
//! - Owner-initiated retirement once nothing depends on the relayer

use super::deposits::{DepositLedger, DepositView};
use super::reputation::ReputationLedger;
use crate::error::{LedgerError, Result};
use crate::hashing::DomainHasher;
use crate::stake::{RelayerCapacity, StakeSchedule};
use crate::types::{Address, CallContext, RelayerKey, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Longest relayer name, in UTF-8 bytes
pub const MAX_NAME_LEN: usize = 32;

/// What happens to value attached beyond the required stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcessStakePolicy {
    /// Credit the excess to the owner's claimable payout
    #[default]
    Refund,
    /// Keep the excess as the owner's own deposit on the new relayer
    SelfDeposit,
}

impl std::fmt::Display for ExcessStakePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExcessStakePolicy::Refund => write!(f, "refund"),
            ExcessStakePolicy::SelfDeposit => write!(f, "self_deposit"),
        }
    }
}

impl std::str::FromStr for ExcessStakePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "refund" => Ok(ExcessStakePolicy::Refund),
            "self_deposit" => Ok(ExcessStakePolicy::SelfDeposit),
            _ => Err(format!("Invalid excess stake policy: {}", s)),
        }
    }
}

/// Registered relayer. Immutable after registration; rating and deposits
/// live in their own ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerRecord {
    pub key: RelayerKey,
    /// Domain the key was derived from
    pub domain: String,
    /// Display name, at most `MAX_NAME_LEN` bytes
    pub name: String,
    pub owner: Address,
    /// Fee charged per settled channel, drawn from the opener's deposit
    pub fee: Value,
    pub capacity: RelayerCapacity,
    /// Advertised off-chain confirmation delay in seconds
    pub offchain_tx_delay: u64,
    /// Stake locked for the lifetime of the record
    pub stake_locked: Value,
    /// Block time of registration
    pub created_at: u64,
}

/// Registration parameters supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelayer {
    pub domain: String,
    pub name: String,
    pub fee: Value,
    pub capacity: RelayerCapacity,
    pub offchain_tx_delay: u64,
}

/// Outcome of a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub key: RelayerKey,
    pub required_stake: Value,
    /// Attached value beyond `required_stake`
    pub excess: Value,
    pub excess_policy: ExcessStakePolicy,
}

/// Collaborators a registration needs besides the registry itself
pub struct RegistrationEnv<'a> {
    pub hasher: &'a dyn DomainHasher,
    pub schedule: &'a StakeSchedule,
    pub policy: ExcessStakePolicy,
}

/// Read access to registered relayers for other components
pub trait RelayerDirectory {
    fn relayer(&self, key: &RelayerKey) -> Option<&RelayerRecord>;

    fn contains(&self, key: &RelayerKey) -> bool {
        self.relayer(key).is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayerRegistry {
    relayers: BTreeMap<RelayerKey, RelayerRecord>,
    by_owner: BTreeMap<Address, BTreeSet<RelayerKey>>,
}

impl RelayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact stake to attach when registering `capacity`
    pub fn fund_required(schedule: &StakeSchedule, capacity: &RelayerCapacity) -> Result<Value> {
        schedule.required_relayer_stake(capacity)
    }

    /// Register a relayer for `ctx.caller`.
    ///
    /// Everything is validated before the first write, including the
    /// self-deposit of excess stake when that policy is active.
    pub fn add_relayer(
        &mut self,
        ctx: &CallContext,
        params: NewRelayer,
        env: &RegistrationEnv<'_>,
        deposits: &mut DepositLedger,
        reputation: &mut ReputationLedger,
    ) -> Result<RegistrationReceipt> {
        if params.name.len() > MAX_NAME_LEN {
            return Err(LedgerError::NameTooLong {
                len: params.name.len(),
                max: MAX_NAME_LEN,
            });
        }
        let key = env.hasher.relayer_key(&params.domain);
        if self.relayers.contains_key(&key) {
            return Err(LedgerError::DuplicateRelayer(key));
        }

        let required = Self::fund_required(env.schedule, &params.capacity)?;
        if ctx.attached_value < required {
            return Err(LedgerError::InsufficientStake {
                required,
                attached: ctx.attached_value,
            });
        }
        let excess = ctx.attached_value - required;

        let self_deposit = env.policy == ExcessStakePolicy::SelfDeposit && excess > 0;
        if self_deposit {
            let cap = params.capacity.deposit_cap()?;
            deposits.check_deposit(&ctx.caller, &key, excess, cap)?;
        }

        let record = RelayerRecord {
            key,
            domain: params.domain,
            name: params.name,
            owner: ctx.caller,
            fee: params.fee,
            capacity: params.capacity,
            offchain_tx_delay: params.offchain_tx_delay,
            stake_locked: required,
            created_at: ctx.timestamp,
        };

        if self_deposit {
            deposits.deposit(ctx.caller, key, excess, record.capacity.deposit_cap()?)?;
        }
        reputation.init(key);
        self.by_owner.entry(ctx.caller).or_default().insert(key);

        log::info!(
            "Relayer registered: {} ({}) owner {} - stake {} locked, excess {} ({})",
            record.domain,
            key,
            ctx.caller,
            required,
            excess,
            env.policy
        );
        self.relayers.insert(key, record);

        Ok(RegistrationReceipt {
            key,
            required_stake: required,
            excess,
            excess_policy: env.policy,
        })
    }

    /// Validate that `ctx.caller` may retire `key` right now
    pub fn check_retire<V: DepositView + ?Sized>(
        &self,
        ctx: &CallContext,
        key: &RelayerKey,
        deposits: &V,
        open_channels: usize,
    ) -> Result<&RelayerRecord> {
        let record = self
            .relayers
            .get(key)
            .ok_or(LedgerError::UnknownRelayer(*key))?;
        if record.owner != ctx.caller {
            return Err(LedgerError::Unauthorized(ctx.caller));
        }
        if open_channels > 0 || deposits.relayer_total(key) > 0 {
            return Err(LedgerError::RelayerBusy(*key));
        }
        Ok(record)
    }

    /// Remove a relayer with no open channels and no deposits.
    ///
    /// Returns the removed record; its `stake_locked` is due to the owner.
    pub fn retire<V: DepositView + ?Sized>(
        &mut self,
        ctx: &CallContext,
        key: &RelayerKey,
        deposits: &V,
        open_channels: usize,
        reputation: &mut ReputationLedger,
    ) -> Result<RelayerRecord> {
        self.check_retire(ctx, key, deposits, open_channels)?;

        let record = self
            .relayers
            .remove(key)
            .ok_or(LedgerError::UnknownRelayer(*key))?;
        if let Some(keys) = self.by_owner.get_mut(&record.owner) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_owner.remove(&record.owner);
            }
        }
        reputation.remove(key);

        log::info!(
            "Relayer retired: {} ({}) - {} stake released to {}",
            record.domain,
            key,
            record.stake_locked,
            record.owner
        );
        Ok(record)
    }

    /// Relayers owned by `owner`, in key order
    pub fn relayers_of(&self, owner: &Address) -> Vec<RelayerRecord> {
        self.by_owner
            .get(owner)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| self.relayers.get(k).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<RelayerRecord> {
        self.relayers.values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.relayers.len()
    }

    /// Sum of all locked registration stakes
    pub fn total_stake_locked(&self) -> Value {
        self.relayers.values().map(|r| r.stake_locked).sum()
    }
}

impl RelayerDirectory for RelayerRegistry {
    fn relayer(&self, key: &RelayerKey) -> Option<&RelayerRecord> {
        self.relayers.get(key)
    }
}
