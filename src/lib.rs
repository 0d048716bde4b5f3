// src/lib.rs
//! Relayer stake ledger, payment channel lifecycle and validator candidacy
//! staking for Ouroboros.

pub mod channel;
pub mod config;
pub mod custody;
pub mod error;
pub mod events;
pub mod hashing;
pub mod ledger;
pub mod relayer;
pub mod stake;
pub mod storage;
pub mod types;
pub mod validator_candidacy;

pub use channel::{Channel, ChannelState, CloseReason, SettleOutcome, Settlement};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use events::{JournalEntry, LedgerEvent};
pub use hashing::{DomainHasher, HasherKind, Keccak256Hasher, Sha256Hasher};
pub use ledger::{Ledger, LedgerState};
pub use relayer::{DepositEntry, ExcessStakePolicy, NewRelayer, RegistrationReceipt, RelayerRecord};
pub use stake::{required_relayer_stake, required_validator_stake, RelayerCapacity, StakeSchedule};
pub use storage::LedgerStore;
pub use types::{parse_coins, Address, CallContext, ChannelId, ChannelRef, RelayerKey, Value, COIN_UNIT};
pub use validator_candidacy::Candidacy;
