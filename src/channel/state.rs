// src/channel/state.rs
use crate::types::{Address, ChannelId, ChannelRef, RelayerKey, Value};
use serde::{Deserialize, Serialize};

/// Channel lifecycle: `Open -> Closed`, no way back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Open,
    Closed,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Open => write!(f, "open"),
            ChannelState::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    /// Both parties agreed on a split
    Settled,
    /// Duration elapsed; locked value returned to the opener
    Expired,
}

/// Split one party has proposed and the other has not yet confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementProposal {
    pub proposer: Address,
    /// Portion of the locked value going to the opener
    pub opener_share: Value,
    pub proposed_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub opener: Address,
    pub counterparty: Address,
    pub relayer: RelayerKey,
    /// Value escrowed in this channel alone
    pub locked_value: Value,
    /// Relayer fee reserved from the opener's deposit
    pub fee_reserved: Value,
    pub opened_at: u64,
    pub expires_at: u64,
    pub state: ChannelState,
    pub proposal: Option<SettlementProposal>,
    pub closed_at: Option<u64>,
    pub close_reason: Option<CloseReason>,
}

impl Channel {
    pub fn reference(&self) -> ChannelRef {
        ChannelRef::new(self.opener, self.id)
    }

    pub fn is_party(&self, account: &Address) -> bool {
        self.opener == *account || self.counterparty == *account
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Open and still within its duration at `now`
    pub fn is_live(&self, now: u64) -> bool {
        self.is_open() && !self.is_expired(now)
    }
}

/// Value movements produced by closing a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub channel: ChannelRef,
    pub reason: CloseReason,
    pub counterparty: Address,
    pub opener_payout: Value,
    pub counterparty_payout: Value,
    /// Fee debited from the opener's deposit
    pub relayer_fee: Value,
    /// Receiver of `relayer_fee`
    pub relayer_owner: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleOutcome {
    /// Split recorded, waiting for the other party
    Proposed {
        channel: ChannelRef,
        opener_share: Value,
    },
    Closed(Settlement),
}
