// src/ledger.rs
//! Ledger facade
//!
//! Owns every component store behind a single `RwLock`. A mutating call holds
//! the write lock from its first check to its last write, runs all validation
//! before touching state, and appends exactly one journal entry on success.
//! A failed call leaves the state untouched.

use crate::channel::{Channel, ChannelBook, OpenChannel, SettleOutcome, Settlement};
use crate::config::LedgerConfig;
use crate::custody::Custody;
use crate::error::{LedgerError, Result};
use crate::events::{JournalEntry, LedgerEvent};
use crate::hashing::DomainHasher;
use crate::relayer::{
    DepositEntry, DepositLedger, DepositView, ExcessStakePolicy, NewRelayer, RegistrationEnv,
    RegistrationReceipt, RelayerDirectory, RelayerRecord, RelayerRegistry, ReputationLedger,
};
use crate::stake::RelayerCapacity;
use crate::storage::LedgerStore;
use crate::types::{Address, CallContext, ChannelId, ChannelRef, RelayerKey, Value};
use crate::validator_candidacy::{Candidacy, CandidacyBook};
use anyhow::Context;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Everything the ledger persists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerState {
    pub relayers: RelayerRegistry,
    pub deposits: DepositLedger,
    pub reputation: ReputationLedger,
    pub channels: ChannelBook,
    pub candidacies: CandidacyBook,
    pub custody: Custody,
    /// Sequence number of the next journal entry
    pub next_seq: u64,
    /// Entries not yet drained by the host
    #[serde(skip)]
    pub journal: Vec<JournalEntry>,
}

impl LedgerState {
    /// Value the components account for; equals `custody.total_held()`
    pub fn accounted_value(&self) -> Value {
        self.relayers.total_stake_locked()
            + self.deposits.total()
            + self.channels.total_escrowed()
            + self.candidacies.total_locked()
            + self.custody.total_payouts()
    }
}

pub struct Ledger {
    state: RwLock<LedgerState>,
    config: LedgerConfig,
    hasher: Box<dyn DomainHasher>,
    store: Option<LedgerStore>,
}

impl Ledger {
    /// In-memory ledger
    pub fn new(config: LedgerConfig) -> anyhow::Result<Self> {
        config.ensure_valid()?;
        let hasher = config.hasher.build();
        Ok(Self {
            state: RwLock::new(LedgerState::default()),
            config,
            hasher,
            store: None,
        })
    }

    /// In-memory ledger when `config.db_path` is unset, persistent otherwise
    pub fn open(config: LedgerConfig) -> anyhow::Result<Self> {
        match config.db_path.clone() {
            Some(path) => {
                let store = LedgerStore::open(&path)?;
                Self::with_store(config, store)
            }
            None => Self::new(config),
        }
    }

    /// Persistent ledger, restored from the store's snapshot when one exists
    pub fn with_store(config: LedgerConfig, store: LedgerStore) -> anyhow::Result<Self> {
        config.ensure_valid()?;
        let state: LedgerState = store
            .load_snapshot()
            .context("Failed to restore ledger snapshot")?
            .unwrap_or_default();
        if state.next_seq > 0 {
            log::info!(
                "Ledger restored: {} relayers, {} candidates, {} held, next seq {}",
                state.relayers.count(),
                state.candidacies.candidates().len(),
                state.custody.total_held(),
                state.next_seq
            );
        }
        let hasher = config.hasher.build();
        Ok(Self {
            state: RwLock::new(state),
            config,
            hasher,
            store: Some(store),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn commit(&self, state: &mut LedgerState, timestamp: u64, event: LedgerEvent) {
        let entry = JournalEntry {
            seq: state.next_seq,
            timestamp,
            event,
        };
        state.next_seq += 1;
        log::debug!("Ledger #{}: {}", entry.seq, entry.event.name());

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&*state, std::slice::from_ref(&entry)) {
                log::error!("Failed to persist ledger after #{}: {:#}", entry.seq, e);
            }
        }
        state.journal.push(entry);
    }

    fn reject_value(ctx: &CallContext) -> Result<()> {
        if ctx.attached_value != 0 {
            return Err(LedgerError::UnexpectedValue(ctx.attached_value));
        }
        Ok(())
    }

    fn apply_settlement(custody: &mut Custody, settlement: &Settlement) {
        custody.credit(settlement.channel.opener, settlement.opener_payout);
        custody.credit(settlement.counterparty, settlement.counterparty_payout);
        if let Some(owner) = settlement.relayer_owner {
            custody.credit(owner, settlement.relayer_fee);
        }
    }

    // Relayers

    pub fn get_fund_required_for_relayer(
        &self,
        max_users: u64,
        max_coins: u64,
        max_tx_throughput: u64,
    ) -> Result<Value> {
        let capacity = RelayerCapacity::new(max_users, max_coins, max_tx_throughput);
        RelayerRegistry::fund_required(&self.config.stake, &capacity)
    }

    pub fn add_relayer(&self, ctx: &CallContext, params: NewRelayer) -> Result<RegistrationReceipt> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        state.custody.check_receive(ctx.attached_value)?;

        let domain = params.domain.clone();
        let env = RegistrationEnv {
            hasher: self.hasher.as_ref(),
            schedule: &self.config.stake,
            policy: self.config.excess_stake_policy,
        };
        let receipt = state.relayers.add_relayer(
            ctx,
            params,
            &env,
            &mut state.deposits,
            &mut state.reputation,
        )?;
        state.custody.receive(ctx.attached_value)?;
        if receipt.excess_policy == ExcessStakePolicy::Refund {
            state.custody.credit(ctx.caller, receipt.excess);
        }

        self.commit(
            state,
            ctx.timestamp,
            LedgerEvent::RelayerRegistered {
                key: receipt.key,
                owner: ctx.caller,
                domain,
                stake_locked: receipt.required_stake,
                excess: receipt.excess,
                excess_policy: receipt.excess_policy,
            },
        );
        Ok(receipt)
    }

    pub fn relayer(&self, key: &RelayerKey) -> Option<RelayerRecord> {
        self.state.read().relayers.relayer(key).cloned()
    }

    pub fn relayers(&self) -> Vec<RelayerRecord> {
        self.state.read().relayers.all()
    }

    pub fn relayers_of(&self, owner: &Address) -> Vec<RelayerRecord> {
        self.state.read().relayers.relayers_of(owner)
    }

    pub fn relayer_key_for(&self, domain: &str) -> RelayerKey {
        self.hasher.relayer_key(domain)
    }

    /// Whether `key` is the digest of `domain` under the configured hasher
    pub fn verify_domain_hash(&self, key: &RelayerKey, domain: &str) -> bool {
        self.hasher.relayer_key(domain) == *key
    }

    /// Remove an idle relayer and make its stake claimable by the owner
    pub fn retire_relayer(&self, ctx: &CallContext, key: &RelayerKey) -> Result<RelayerRecord> {
        Self::reject_value(ctx)?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let open = state.channels.open_channels(key);
        let record = state
            .relayers
            .retire(ctx, key, &state.deposits, open, &mut state.reputation)?;
        state.custody.credit(record.owner, record.stake_locked);

        self.commit(
            state,
            ctx.timestamp,
            LedgerEvent::RelayerRetired {
                key: *key,
                owner: record.owner,
                stake_released: record.stake_locked,
            },
        );
        Ok(record)
    }

    // Deposits

    /// Deposit the attached value on `key`. Returns the caller's new balance.
    pub fn deposit_to_relayer(&self, ctx: &CallContext, key: &RelayerKey) -> Result<Value> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        state.custody.check_receive(ctx.attached_value)?;

        let cap = state
            .relayers
            .relayer(key)
            .ok_or(LedgerError::UnknownRelayer(*key))?
            .capacity
            .deposit_cap()?;
        let balance = state
            .deposits
            .deposit(ctx.caller, *key, ctx.attached_value, cap)?;
        state.custody.receive(ctx.attached_value)?;

        self.commit(
            state,
            ctx.timestamp,
            LedgerEvent::Deposited {
                depositor: ctx.caller,
                relayer: *key,
                amount: ctx.attached_value,
                balance,
            },
        );
        Ok(balance)
    }

    /// Move unreserved deposit into the caller's payout. Returns what remains.
    pub fn withdraw_deposit(&self, ctx: &CallContext, key: &RelayerKey, amount: Value) -> Result<Value> {
        Self::reject_value(ctx)?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let balance = state.deposits.withdraw(ctx.caller, *key, amount)?;
        state.custody.credit(ctx.caller, amount);

        self.commit(
            state,
            ctx.timestamp,
            LedgerEvent::Withdrawn {
                depositor: ctx.caller,
                relayer: *key,
                amount,
                balance,
            },
        );
        Ok(balance)
    }

    pub fn user_deposit_on_relayer(&self, depositor: &Address, key: &RelayerKey) -> DepositEntry {
        self.state.read().deposits.entry(depositor, key)
    }

    pub fn relayer_total_deposits(&self, key: &RelayerKey) -> Value {
        self.state.read().deposits.relayer_total(key)
    }

    /// Every depositor's entry on `key`, in depositor order
    pub fn deposits_on(&self, key: &RelayerKey) -> Vec<DepositEntry> {
        self.state.read().deposits.entries_for(key)
    }

    // Reputation

    pub fn vote_relayer(&self, ctx: &CallContext, key: &RelayerKey, rating: i32) -> Result<()> {
        Self::reject_value(ctx)?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let previous = state.reputation.vote(
            *key,
            rating,
            ctx.caller,
            ctx.timestamp,
            &self.config.rating,
            &state.relayers,
        )?;

        self.commit(
            state,
            ctx.timestamp,
            LedgerEvent::RelayerRated {
                relayer: *key,
                voter: ctx.caller,
                rating,
                previous,
            },
        );
        Ok(())
    }

    pub fn get_relayer_rating(&self, key: &RelayerKey) -> i32 {
        self.state.read().reputation.rating_of(key)
    }

    // Channels

    /// Open a channel escrowing the attached value. Returns its reference.
    pub fn open_channel(
        &self,
        ctx: &CallContext,
        counterparty: Address,
        key: &RelayerKey,
        duration: u64,
    ) -> Result<ChannelRef> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        state.custody.check_receive(ctx.attached_value)?;

        let req = OpenChannel {
            counterparty,
            relayer: *key,
            duration,
        };
        let reference = state
            .channels
            .open(ctx, req, &state.relayers, &mut state.deposits)?;
        state.custody.receive(ctx.attached_value)?;

        let expires_at = state
            .channels
            .channel(&reference)
            .map_or(0, |c| c.expires_at);
        self.commit(
            state,
            ctx.timestamp,
            LedgerEvent::ChannelOpened {
                channel: reference,
                counterparty,
                relayer: *key,
                locked_value: ctx.attached_value,
                expires_at,
            },
        );
        Ok(reference)
    }

    pub fn get_channel_id(&self, opener: &Address, index: u64) -> Option<ChannelId> {
        self.state.read().channels.channel_id_at(opener, index)
    }

    pub fn get_user_total_channels(&self, account: &Address) -> u64 {
        self.state.read().channels.user_total_channels(account)
    }

    pub fn channel(&self, reference: &ChannelRef) -> Option<Channel> {
        self.state.read().channels.channel(reference).cloned()
    }

    pub fn channels_of(&self, opener: &Address) -> Vec<Channel> {
        self.state.read().channels.channels_of(opener).to_vec()
    }

    pub fn live_channels(&self, key: &RelayerKey, now: u64) -> usize {
        self.state.read().channels.live_channels(key, now)
    }

    /// Propose or confirm a cooperative split of a channel's escrow
    pub fn settle_channel(
        &self,
        ctx: &CallContext,
        reference: ChannelRef,
        opener_share: Value,
    ) -> Result<SettleOutcome> {
        Self::reject_value(ctx)?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let outcome = state.channels.settle(
            ctx,
            reference,
            opener_share,
            &state.relayers,
            &mut state.deposits,
        )?;

        let event = match &outcome {
            SettleOutcome::Proposed {
                channel,
                opener_share,
            } => LedgerEvent::SettlementProposed {
                channel: *channel,
                proposer: ctx.caller,
                opener_share: *opener_share,
            },
            SettleOutcome::Closed(settlement) => {
                Self::apply_settlement(&mut state.custody, settlement);
                closed_event(settlement)
            }
        };
        self.commit(state, ctx.timestamp, event);
        Ok(outcome)
    }

    /// Close an expired channel, returning the escrow to the opener
    pub fn reclaim_expired_channel(&self, ctx: &CallContext, reference: ChannelRef) -> Result<Settlement> {
        Self::reject_value(ctx)?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let settlement = state
            .channels
            .reclaim_expired(ctx, reference, &state.relayers, &mut state.deposits)?;
        Self::apply_settlement(&mut state.custody, &settlement);

        self.commit(state, ctx.timestamp, closed_event(&settlement));
        Ok(settlement)
    }

    // Validator candidacy

    pub fn get_required_staking_funds(&self, slot: u64) -> Result<Value> {
        CandidacyBook::required_staking_funds(&self.config.stake, slot)
    }

    /// Slot the next candidacy would take
    pub fn next_validator_slot(&self) -> u64 {
        self.state.read().candidacies.next_slot()
    }

    pub fn validator_as_candidate(
        &self,
        ctx: &CallContext,
        required_stake: Value,
        witness_funds: Value,
    ) -> Result<Candidacy> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        state.custody.check_receive(ctx.attached_value)?;

        let candidacy = state.candidacies.validator_as_candidate(
            ctx,
            required_stake,
            witness_funds,
            &self.config.stake,
        )?;
        state.custody.receive(ctx.attached_value)?;

        self.commit(
            state,
            ctx.timestamp,
            LedgerEvent::CandidateRegistered {
                candidate: ctx.caller,
                slot: candidacy.slot,
                required_stake,
                witness_funds,
            },
        );
        Ok(candidacy)
    }

    pub fn withdraw_candidacy(&self, ctx: &CallContext) -> Result<Candidacy> {
        Self::reject_value(ctx)?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let candidacy = state.candidacies.withdraw(ctx)?;
        state.custody.credit(ctx.caller, candidacy.total_locked);

        self.commit(
            state,
            ctx.timestamp,
            LedgerEvent::CandidacyWithdrawn {
                candidate: ctx.caller,
                released: candidacy.total_locked,
            },
        );
        Ok(candidacy)
    }

    pub fn candidacy_of(&self, candidate: &Address) -> Option<Candidacy> {
        self.state.read().candidacies.candidacy_of(candidate)
    }

    pub fn candidates(&self) -> Vec<Candidacy> {
        self.state.read().candidacies.candidates()
    }

    // Custody

    /// Release the caller's payout. The host transfers the returned amount.
    pub fn claim(&self, ctx: &CallContext) -> Result<Value> {
        Self::reject_value(ctx)?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let amount = state.custody.claim(ctx.caller)?;
        self.commit(
            state,
            ctx.timestamp,
            LedgerEvent::PayoutClaimed {
                account: ctx.caller,
                amount,
            },
        );
        Ok(amount)
    }

    pub fn payout_of(&self, account: &Address) -> Value {
        self.state.read().custody.payout_of(account)
    }

    pub fn total_custody(&self) -> Value {
        self.state.read().custody.total_held()
    }

    // Journal and state

    /// Take the journal entries accumulated since the last drain
    pub fn drain_events(&self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.state.write().journal)
    }

    /// Point-in-time copy of the whole state
    pub fn snapshot(&self) -> LedgerState {
        self.state.read().clone()
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

fn closed_event(settlement: &Settlement) -> LedgerEvent {
    LedgerEvent::ChannelClosed {
        channel: settlement.channel,
        reason: settlement.reason,
        opener_payout: settlement.opener_payout,
        counterparty_payout: settlement.counterparty_payout,
        relayer_fee: settlement.relayer_fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::COIN_UNIT;

    fn owner() -> Address {
        Address([0x0e; 20])
    }

    fn register(ledger: &Ledger, domain: &str, extra: Value) -> RelayerKey {
        let stake = ledger.get_fund_required_for_relayer(2, 10, 1).unwrap();
        let params = NewRelayer {
            domain: domain.into(),
            name: "relay".into(),
            fee: 0,
            capacity: RelayerCapacity::new(2, 10, 1),
            offchain_tx_delay: 5,
        };
        ledger
            .add_relayer(&CallContext::with_value(owner(), stake + extra, 1), params)
            .unwrap()
            .key
    }

    #[test]
    fn test_non_payable_calls_reject_value() {
        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        let key = register(&ledger, "relay.one", 0);
        assert_eq!(
            ledger.vote_relayer(&CallContext::with_value(owner(), 1, 2), &key, 10),
            Err(LedgerError::UnexpectedValue(1))
        );
        assert_eq!(
            ledger.claim(&CallContext::with_value(owner(), 5, 2)),
            Err(LedgerError::UnexpectedValue(5))
        );
    }

    #[test]
    fn test_refund_policy_credits_excess() {
        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        register(&ledger, "relay.one", COIN_UNIT);
        assert_eq!(ledger.payout_of(&owner()), COIN_UNIT);
        assert_eq!(ledger.claim(&CallContext::new(owner(), 3)), Ok(COIN_UNIT));

        let state = ledger.snapshot();
        assert_eq!(state.accounted_value(), state.custody.total_held());
    }

    #[test]
    fn test_failed_call_leaves_no_journal_entry() {
        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        let key = register(&ledger, "relay.one", 0);
        assert_eq!(ledger.drain_events().len(), 1);

        let err = ledger
            .vote_relayer(&CallContext::new(owner(), 2), &key, 5_000)
            .unwrap_err();
        assert_eq!(err.kind(), "rating_out_of_range");
        assert!(ledger.drain_events().is_empty());
        assert_eq!(ledger.snapshot().next_seq, 1);
    }

    #[test]
    fn test_domain_hash_helpers() {
        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        let key = ledger.relayer_key_for("relay.one");
        assert!(ledger.verify_domain_hash(&key, "relay.one"));
        assert!(!ledger.verify_domain_hash(&key, "relay.two"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = LedgerConfig::default();
        config.stake.validator_slot_step = 0;
        let err = Ledger::new(config).err().unwrap();
        assert!(err.to_string().contains("validator_slot_step"));

        let mut config = LedgerConfig::default();
        config.rating.min = 10;
        config.rating.max = -10;
        assert!(Ledger::new(config).is_err());
    }
}
