// src/relayer/mod.rs
pub mod deposits;
pub mod registry;
pub mod reputation;

pub use deposits::{DepositEntry, DepositLedger, DepositView};
pub use registry::{
    ExcessStakePolicy, NewRelayer, RegistrationEnv, RegistrationReceipt, RelayerDirectory,
    RelayerRecord, RelayerRegistry, MAX_NAME_LEN,
};
pub use reputation::{RatingBounds, ReputationEntry, ReputationLedger};
