// src/events.rs
//! Journal of successful ledger mutations, one entry per call.

use crate::channel::CloseReason;
use crate::relayer::ExcessStakePolicy;
use crate::types::{Address, ChannelRef, RelayerKey, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    RelayerRegistered {
        key: RelayerKey,
        owner: Address,
        domain: String,
        stake_locked: Value,
        excess: Value,
        excess_policy: ExcessStakePolicy,
    },
    RelayerRetired {
        key: RelayerKey,
        owner: Address,
        stake_released: Value,
    },
    Deposited {
        depositor: Address,
        relayer: RelayerKey,
        amount: Value,
        balance: Value,
    },
    Withdrawn {
        depositor: Address,
        relayer: RelayerKey,
        amount: Value,
        balance: Value,
    },
    RelayerRated {
        relayer: RelayerKey,
        voter: Address,
        rating: i32,
        previous: i32,
    },
    ChannelOpened {
        channel: ChannelRef,
        counterparty: Address,
        relayer: RelayerKey,
        locked_value: Value,
        expires_at: u64,
    },
    SettlementProposed {
        channel: ChannelRef,
        proposer: Address,
        opener_share: Value,
    },
    ChannelClosed {
        channel: ChannelRef,
        reason: CloseReason,
        opener_payout: Value,
        counterparty_payout: Value,
        relayer_fee: Value,
    },
    CandidateRegistered {
        candidate: Address,
        slot: u64,
        required_stake: Value,
        witness_funds: Value,
    },
    CandidacyWithdrawn {
        candidate: Address,
        released: Value,
    },
    PayoutClaimed {
        account: Address,
        amount: Value,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::RelayerRegistered { .. } => "relayer_registered",
            LedgerEvent::RelayerRetired { .. } => "relayer_retired",
            LedgerEvent::Deposited { .. } => "deposited",
            LedgerEvent::Withdrawn { .. } => "withdrawn",
            LedgerEvent::RelayerRated { .. } => "relayer_rated",
            LedgerEvent::ChannelOpened { .. } => "channel_opened",
            LedgerEvent::SettlementProposed { .. } => "settlement_proposed",
            LedgerEvent::ChannelClosed { .. } => "channel_closed",
            LedgerEvent::CandidateRegistered { .. } => "candidate_registered",
            LedgerEvent::CandidacyWithdrawn { .. } => "candidacy_withdrawn",
            LedgerEvent::PayoutClaimed { .. } => "payout_claimed",
        }
    }
}

/// Journal entry: event plus its position and block time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub timestamp: u64,
    pub event: LedgerEvent,
}
