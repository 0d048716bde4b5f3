// src/relayer/reputation.rs
//! Relayer ratings
//!
//! One rating per relayer. Each accepted vote overwrites the stored value:
//! no averaging, no voter deduplication, no stake requirement to vote.
//! A stake-weighted running average is the intended successor; until then the
//! vote count and last voter are recorded so that history is not lost.

use super::registry::RelayerDirectory;
use crate::error::{LedgerError, Result};
use crate::types::{Address, RelayerKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive bounds a vote must fall within
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingBounds {
    pub min: i32,
    pub max: i32,
}

impl Default for RatingBounds {
    fn default() -> Self {
        Self {
            min: -1_000,
            max: 1_000,
        }
    }
}

impl RatingBounds {
    pub fn contains(&self, rating: i32) -> bool {
        (self.min..=self.max).contains(&rating)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReputationEntry {
    pub rating: i32,
    /// Accepted votes so far
    pub votes: u64,
    pub last_voter: Option<Address>,
    /// Block time of the last accepted vote
    pub updated_at: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReputationLedger {
    entries: BTreeMap<RelayerKey, ReputationEntry>,
}

impl ReputationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a freshly registered relayer at rating 0
    pub fn init(&mut self, relayer: RelayerKey) {
        self.entries.insert(relayer, ReputationEntry::default());
    }

    pub fn remove(&mut self, relayer: &RelayerKey) {
        self.entries.remove(relayer);
    }

    pub fn check_vote<D: RelayerDirectory + ?Sized>(
        &self,
        relayer: &RelayerKey,
        rating: i32,
        bounds: &RatingBounds,
        directory: &D,
    ) -> Result<()> {
        if !directory.contains(relayer) {
            return Err(LedgerError::UnknownRelayer(*relayer));
        }
        if !bounds.contains(rating) {
            return Err(LedgerError::RatingOutOfRange {
                rating,
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(())
    }

    /// Record a vote, replacing the previous rating. Returns the replaced one.
    pub fn vote<D: RelayerDirectory + ?Sized>(
        &mut self,
        relayer: RelayerKey,
        rating: i32,
        voter: Address,
        timestamp: u64,
        bounds: &RatingBounds,
        directory: &D,
    ) -> Result<i32> {
        self.check_vote(&relayer, rating, bounds, directory)?;

        let entry = self.entries.entry(relayer).or_default();
        let previous = entry.rating;
        entry.rating = rating;
        entry.votes = entry.votes.saturating_add(1);
        entry.last_voter = Some(voter);
        entry.updated_at = timestamp;

        log::info!(
            "Relayer {} rated {} by {} (was {})",
            relayer,
            rating,
            voter,
            previous
        );
        Ok(previous)
    }

    /// Current rating; 0 before any vote
    pub fn rating_of(&self, relayer: &RelayerKey) -> i32 {
        self.entries.get(relayer).map_or(0, |e| e.rating)
    }

    pub fn entry(&self, relayer: &RelayerKey) -> Option<ReputationEntry> {
        self.entries.get(relayer).copied()
    }
}
