// src/error.rs
use crate::types::{Address, ChannelRef, RelayerKey, Value};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Every way a ledger call can fail.
///
/// All variants are terminal for the call that raised them: the ledger never
/// retries internally and never commits partial state before returning one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Arithmetic overflow while computing {0}")]
    ArithmeticOverflow(&'static str),

    #[error("Insufficient stake: required {required}, attached {attached}")]
    InsufficientStake { required: Value, attached: Value },

    #[error("Stake mismatch: expected {expected}, attached {attached}")]
    StakeMismatch { expected: Value, attached: Value },

    #[error("Relayer {0} already registered")]
    DuplicateRelayer(RelayerKey),

    #[error("Unknown relayer {0}")]
    UnknownRelayer(RelayerKey),

    #[error("Relayer {key} is at capacity ({max_users} live channels)")]
    RelayerCapacityExceeded { key: RelayerKey, max_users: u64 },

    #[error("Deposit cap exceeded on relayer {key}: cap {cap}, would reach {attempted}")]
    CapacityExceeded {
        key: RelayerKey,
        cap: Value,
        attempted: Value,
    },

    #[error("Channel {0} is closed")]
    ChannelClosed(ChannelRef),

    #[error("Account {0} already holds a validator candidacy")]
    AlreadyCandidate(Address),

    #[error("Account {0} is not authorized for this operation")]
    Unauthorized(Address),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Value, available: Value },

    #[error("Deposit is backing open channels: {reserved} of {balance} reserved")]
    DepositLocked { balance: Value, reserved: Value },

    #[error("Rating {rating} outside [{min}, {max}]")]
    RatingOutOfRange { rating: i32, min: i32, max: i32 },

    #[error("Unknown channel {0}")]
    UnknownChannel(ChannelRef),

    #[error("Channel {0} has expired")]
    ChannelExpired(ChannelRef),

    #[error("Channel {channel} does not expire until {expires_at}")]
    ChannelNotExpired { channel: ChannelRef, expires_at: u64 },

    #[error("Opener share {share} exceeds locked value {locked}")]
    InvalidSplit { share: Value, locked: Value },

    #[error("Counterparty must differ from the opener")]
    InvalidCounterparty,

    #[error("Channel duration must be greater than zero")]
    InvalidDuration,

    #[error("Relayer {0} still has live channels or deposits")]
    RelayerBusy(RelayerKey),

    #[error("Account {0} holds no validator candidacy")]
    NotCandidate(Address),

    #[error("Nothing to claim for {0}")]
    NothingToClaim(Address),

    #[error("Relayer name is {len} bytes, at most {max} allowed")]
    NameTooLong { len: usize, max: usize },

    #[error("Call does not accept attached value (got {0})")]
    UnexpectedValue(Value),
}

impl LedgerError {
    /// Stable, machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::ArithmeticOverflow(_) => "arithmetic_overflow",
            LedgerError::InsufficientStake { .. } => "insufficient_stake",
            LedgerError::StakeMismatch { .. } => "stake_mismatch",
            LedgerError::DuplicateRelayer(_) => "duplicate_relayer",
            LedgerError::UnknownRelayer(_) => "unknown_relayer",
            LedgerError::RelayerCapacityExceeded { .. } => "relayer_capacity_exceeded",
            LedgerError::CapacityExceeded { .. } => "capacity_exceeded",
            LedgerError::ChannelClosed(_) => "channel_closed",
            LedgerError::AlreadyCandidate(_) => "already_candidate",
            LedgerError::Unauthorized(_) => "unauthorized",
            LedgerError::InvalidAmount => "invalid_amount",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::DepositLocked { .. } => "deposit_locked",
            LedgerError::RatingOutOfRange { .. } => "rating_out_of_range",
            LedgerError::UnknownChannel(_) => "unknown_channel",
            LedgerError::ChannelExpired(_) => "channel_expired",
            LedgerError::ChannelNotExpired { .. } => "channel_not_expired",
            LedgerError::InvalidSplit { .. } => "invalid_split",
            LedgerError::InvalidCounterparty => "invalid_counterparty",
            LedgerError::InvalidDuration => "invalid_duration",
            LedgerError::RelayerBusy(_) => "relayer_busy",
            LedgerError::NotCandidate(_) => "not_candidate",
            LedgerError::NothingToClaim(_) => "nothing_to_claim",
            LedgerError::NameTooLong { .. } => "name_too_long",
            LedgerError::UnexpectedValue(_) => "unexpected_value",
        }
    }
}

/// Checked addition tagged with what was being computed.
pub(crate) fn checked_add(lhs: Value, rhs: Value, ctx: &'static str) -> Result<Value> {
    lhs.checked_add(rhs)
        .ok_or(LedgerError::ArithmeticOverflow(ctx))
}

/// Checked multiplication tagged with what was being computed.
pub(crate) fn checked_mul(lhs: Value, rhs: Value, ctx: &'static str) -> Result<Value> {
    lhs.checked_mul(rhs)
        .ok_or(LedgerError::ArithmeticOverflow(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_helpers_report_overflow() {
        assert_eq!(checked_add(1, 2, "sum"), Ok(3));
        assert_eq!(
            checked_add(Value::MAX, 1, "sum"),
            Err(LedgerError::ArithmeticOverflow("sum"))
        );
        assert_eq!(
            checked_mul(Value::MAX, 2, "product"),
            Err(LedgerError::ArithmeticOverflow("product"))
        );
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(LedgerError::InvalidAmount.kind(), "invalid_amount");
        assert_eq!(
            LedgerError::StakeMismatch {
                expected: 2,
                attached: 1
            }
            .kind(),
            "stake_mismatch"
        );
    }
}
