// src/channel/mod.rs
//! Payment channel lifecycle
//!
//! Channels are opened by one user towards a counterparty through a
//! registered relayer and escrow the attached value individually. Ids are
//! scoped per opener: the n-th channel an account opens gets id n-1.
//!
//! A channel closes either cooperatively (both parties submit the same split)
//! or, once its duration has elapsed, by either party reclaiming it, which
//! returns the whole escrow to the opener. Expiry is checked when a call
//! touches the channel; nothing runs on a timer.

pub mod state;

pub use state::{Channel, ChannelState, CloseReason, SettleOutcome, Settlement, SettlementProposal};

use crate::error::{LedgerError, Result};
use crate::relayer::{DepositLedger, RelayerDirectory};
use crate::types::{Address, CallContext, ChannelId, ChannelRef, RelayerKey, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Parameters of `open`; the escrow is the call's attached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenChannel {
    pub counterparty: Address,
    pub relayer: RelayerKey,
    /// Seconds until the channel may be reclaimed
    pub duration: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelBook {
    /// Channels per opener; index == channel id
    channels: BTreeMap<Address, Vec<Channel>>,
    /// Open channels per relayer (expired ones included until reclaimed)
    open_by_relayer: BTreeMap<RelayerKey, BTreeSet<ChannelRef>>,
}

impl ChannelBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channels ever opened by `account`. Never decreases.
    pub fn user_total_channels(&self, account: &Address) -> u64 {
        self.channels.get(account).map_or(0, |v| v.len() as u64)
    }

    /// Id of the channel `opener` created when its count was `index`
    pub fn channel_id_at(&self, opener: &Address, index: u64) -> Option<ChannelId> {
        let idx = usize::try_from(index).ok()?;
        self.channels.get(opener)?.get(idx).map(|c| c.id)
    }

    pub fn channel(&self, channel: &ChannelRef) -> Option<&Channel> {
        let idx = usize::try_from(channel.id).ok()?;
        self.channels.get(&channel.opener)?.get(idx)
    }

    fn channel_mut(&mut self, channel: &ChannelRef) -> Option<&mut Channel> {
        let idx = usize::try_from(channel.id).ok()?;
        self.channels.get_mut(&channel.opener)?.get_mut(idx)
    }

    pub fn channels_of(&self, opener: &Address) -> &[Channel] {
        self.channels.get(opener).map_or(&[], |v| v.as_slice())
    }

    /// Open channels on `relayer` that have not yet expired at `now`
    pub fn live_channels(&self, relayer: &RelayerKey, now: u64) -> usize {
        self.open_by_relayer.get(relayer).map_or(0, |refs| {
            refs.iter()
                .filter_map(|r| self.channel(r))
                .filter(|c| c.is_live(now))
                .count()
        })
    }

    /// Open channels on `relayer`, expired or not
    pub fn open_channels(&self, relayer: &RelayerKey) -> usize {
        self.open_by_relayer.get(relayer).map_or(0, |refs| refs.len())
    }

    /// Sum of value escrowed in open channels
    pub fn total_escrowed(&self) -> Value {
        self.channels
            .values()
            .flatten()
            .filter(|c| c.is_open())
            .map(|c| c.locked_value)
            .sum()
    }

    /// Open a channel for `ctx.caller`, escrowing `ctx.attached_value`.
    ///
    /// The relayer fee is reserved from the opener's deposit on the relayer
    /// and stays reserved until the channel closes.
    pub fn open<D: RelayerDirectory + ?Sized>(
        &mut self,
        ctx: &CallContext,
        req: OpenChannel,
        relayers: &D,
        deposits: &mut DepositLedger,
    ) -> Result<ChannelRef> {
        let record = relayers
            .relayer(&req.relayer)
            .ok_or(LedgerError::UnknownRelayer(req.relayer))?;
        if ctx.attached_value == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if req.counterparty == ctx.caller {
            return Err(LedgerError::InvalidCounterparty);
        }
        if req.duration == 0 {
            return Err(LedgerError::InvalidDuration);
        }
        let expires_at = ctx
            .timestamp
            .checked_add(req.duration)
            .ok_or(LedgerError::ArithmeticOverflow("channel expiry"))?;

        let max_users = record.capacity.max_users;
        if self.live_channels(&req.relayer, ctx.timestamp) as u64 >= max_users {
            return Err(LedgerError::RelayerCapacityExceeded {
                key: req.relayer,
                max_users,
            });
        }

        let fee = record.fee;
        deposits.check_reserve(&ctx.caller, &req.relayer, fee)?;

        let id = self.user_total_channels(&ctx.caller);
        deposits.reserve(ctx.caller, req.relayer, fee)?;

        let channel = Channel {
            id,
            opener: ctx.caller,
            counterparty: req.counterparty,
            relayer: req.relayer,
            locked_value: ctx.attached_value,
            fee_reserved: fee,
            opened_at: ctx.timestamp,
            expires_at,
            state: ChannelState::Open,
            proposal: None,
            closed_at: None,
            close_reason: None,
        };
        let reference = channel.reference();
        self.channels.entry(ctx.caller).or_default().push(channel);
        self.open_by_relayer
            .entry(req.relayer)
            .or_default()
            .insert(reference);

        log::info!(
            "Channel {} opened to {} via {} - {} locked until {}",
            reference,
            req.counterparty,
            req.relayer,
            ctx.attached_value,
            expires_at
        );
        Ok(reference)
    }

    /// Propose or confirm a cooperative split.
    ///
    /// The channel closes when the second party submits the split the first
    /// one proposed. A different split replaces the pending proposal.
    pub fn settle<D: RelayerDirectory + ?Sized>(
        &mut self,
        ctx: &CallContext,
        reference: ChannelRef,
        opener_share: Value,
        relayers: &D,
        deposits: &mut DepositLedger,
    ) -> Result<SettleOutcome> {
        let channel = self
            .channel(&reference)
            .ok_or(LedgerError::UnknownChannel(reference))?;
        if !channel.is_open() {
            return Err(LedgerError::ChannelClosed(reference));
        }
        if !channel.is_party(&ctx.caller) {
            return Err(LedgerError::Unauthorized(ctx.caller));
        }
        if channel.is_expired(ctx.timestamp) {
            return Err(LedgerError::ChannelExpired(reference));
        }
        if opener_share > channel.locked_value {
            return Err(LedgerError::InvalidSplit {
                share: opener_share,
                locked: channel.locked_value,
            });
        }

        let agreed = matches!(
            channel.proposal,
            Some(p) if p.proposer != ctx.caller && p.opener_share == opener_share
        );
        if !agreed {
            if let Some(ch) = self.channel_mut(&reference) {
                ch.proposal = Some(SettlementProposal {
                    proposer: ctx.caller,
                    opener_share,
                    proposed_at: ctx.timestamp,
                });
            }
            log::debug!(
                "Channel {} settlement proposed by {}: opener share {}",
                reference,
                ctx.caller,
                opener_share
            );
            return Ok(SettleOutcome::Proposed {
                channel: reference,
                opener_share,
            });
        }

        let (relayer, opener, counterparty, fee_reserved, locked) = (
            channel.relayer,
            channel.opener,
            channel.counterparty,
            channel.fee_reserved,
            channel.locked_value,
        );
        let relayer_owner = relayers.relayer(&relayer).map(|r| r.owner);
        let relayer_fee = match relayer_owner {
            Some(_) => deposits.settle_reserved(opener, relayer, fee_reserved),
            None => {
                deposits.release(opener, relayer, fee_reserved);
                0
            }
        };

        self.close(&reference, ctx.timestamp, CloseReason::Settled);
        let settlement = Settlement {
            channel: reference,
            reason: CloseReason::Settled,
            counterparty,
            opener_payout: opener_share,
            counterparty_payout: locked - opener_share,
            relayer_fee,
            relayer_owner,
        };
        log::info!(
            "Channel {} settled: opener {}, counterparty {}, relayer fee {}",
            reference,
            settlement.opener_payout,
            settlement.counterparty_payout,
            relayer_fee
        );
        Ok(SettleOutcome::Closed(settlement))
    }

    /// Close an expired channel and return its whole escrow to the opener
    pub fn reclaim_expired<D: RelayerDirectory + ?Sized>(
        &mut self,
        ctx: &CallContext,
        reference: ChannelRef,
        relayers: &D,
        deposits: &mut DepositLedger,
    ) -> Result<Settlement> {
        let channel = self
            .channel(&reference)
            .ok_or(LedgerError::UnknownChannel(reference))?;
        if !channel.is_open() {
            return Err(LedgerError::ChannelClosed(reference));
        }
        let relayer_owner = relayers.relayer(&channel.relayer).map(|r| r.owner);
        if !channel.is_party(&ctx.caller) && relayer_owner != Some(ctx.caller) {
            return Err(LedgerError::Unauthorized(ctx.caller));
        }
        if !channel.is_expired(ctx.timestamp) {
            return Err(LedgerError::ChannelNotExpired {
                channel: reference,
                expires_at: channel.expires_at,
            });
        }

        let (relayer, opener, counterparty, fee_reserved, locked) = (
            channel.relayer,
            channel.opener,
            channel.counterparty,
            channel.fee_reserved,
            channel.locked_value,
        );
        deposits.release(opener, relayer, fee_reserved);
        self.close(&reference, ctx.timestamp, CloseReason::Expired);

        log::info!(
            "Channel {} reclaimed after expiry: {} returned to {}",
            reference,
            locked,
            opener
        );
        Ok(Settlement {
            channel: reference,
            reason: CloseReason::Expired,
            counterparty,
            opener_payout: locked,
            counterparty_payout: 0,
            relayer_fee: 0,
            relayer_owner: None,
        })
    }

    fn close(&mut self, reference: &ChannelRef, now: u64, reason: CloseReason) {
        let mut relayer = None;
        if let Some(ch) = self.channel_mut(reference) {
            ch.state = ChannelState::Closed;
            ch.proposal = None;
            ch.closed_at = Some(now);
            ch.close_reason = Some(reason);
            relayer = Some(ch.relayer);
        }
        if let Some(key) = relayer {
            if let Some(refs) = self.open_by_relayer.get_mut(&key) {
                refs.remove(reference);
                if refs.is_empty() {
                    self.open_by_relayer.remove(&key);
                }
            }
        }
    }
}
