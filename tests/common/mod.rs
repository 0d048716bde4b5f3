// tests/common/mod.rs
#![allow(dead_code)]

use ouro_channels::{
    Address, CallContext, Ledger, LedgerConfig, NewRelayer, RelayerCapacity, RelayerKey, Value,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn addr(n: u8) -> Address {
    Address([n; 20])
}

pub fn relayer_params(domain: &str, fee: Value, capacity: RelayerCapacity) -> NewRelayer {
    NewRelayer {
        domain: domain.to_string(),
        name: "ouro relay".to_string(),
        fee,
        capacity,
        offchain_tx_delay: 30,
    }
}

/// Register `domain` for `owner` attaching exactly the required stake
pub fn register_relayer(
    ledger: &Ledger,
    owner: Address,
    domain: &str,
    fee: Value,
    capacity: RelayerCapacity,
) -> RelayerKey {
    let stake = ledger
        .get_fund_required_for_relayer(
            capacity.max_users,
            capacity.max_coins,
            capacity.max_tx_throughput,
        )
        .expect("stake");
    ledger
        .add_relayer(
            &CallContext::with_value(owner, stake, 1_000),
            relayer_params(domain, fee, capacity),
        )
        .expect("register relayer")
        .key
}

pub fn new_ledger() -> Ledger {
    init_logger();
    Ledger::new(LedgerConfig::default()).expect("ledger")
}

/// Custody must equal the sum of everything the components hold
pub fn assert_conserved(ledger: &Ledger) {
    let state = ledger.snapshot();
    assert_eq!(state.accounted_value(), state.custody.total_held());
}
