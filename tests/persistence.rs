// tests/persistence.rs
mod common;

use common::*;
use ouro_channels::{
    CallContext, Ledger, LedgerConfig, LedgerEvent, LedgerStore, RelayerCapacity, COIN_UNIT,
};

#[test]
fn ledger_state_survives_reopen() {
    init_logger();
    let dir = tempfile::tempdir().expect("tempdir");
    let config = LedgerConfig {
        db_path: Some(dir.path().to_path_buf()),
        ..LedgerConfig::default()
    };
    let (alice, bob) = (addr(2), addr(3));

    let (key, reference) = {
        let ledger = Ledger::open(config.clone()).expect("open ledger");
        let key = register_relayer(&ledger, addr(1), "relay.one", 0, RelayerCapacity::new(5, 10, 1));
        ledger
            .deposit_to_relayer(&CallContext::with_value(alice, COIN_UNIT, 2), &key)
            .expect("deposit");
        ledger
            .vote_relayer(&CallContext::new(bob, 3), &key, 480)
            .expect("vote");
        let reference = ledger
            .open_channel(&CallContext::with_value(alice, 2 * COIN_UNIT, 4), bob, &key, 60)
            .expect("open");
        (key, reference)
    };

    let ledger = Ledger::open(config).expect("reopen ledger");
    assert!(ledger.relayer(&key).is_some());
    assert_eq!(ledger.user_deposit_on_relayer(&alice, &key).balance, COIN_UNIT);
    assert_eq!(ledger.get_relayer_rating(&key), 480);
    assert_eq!(ledger.get_user_total_channels(&alice), 1);
    assert_eq!(ledger.channel(&reference).expect("channel").locked_value, 2 * COIN_UNIT);
    assert_conserved(&ledger);

    // The next channel continues the opener's sequence
    let next = ledger
        .open_channel(&CallContext::with_value(alice, COIN_UNIT, 5), bob, &key, 60)
        .expect("open after reopen");
    assert_eq!(next.id, 1);
    assert_eq!(ledger.snapshot().next_seq, 5);
}

#[test]
fn journal_is_persisted_in_order() {
    init_logger();
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LedgerStore::open(dir.path()).expect("store");
    let ledger = Ledger::with_store(LedgerConfig::default(), store.clone()).expect("ledger");

    let stake = ledger.get_required_staking_funds(0).expect("stake");
    ledger
        .validator_as_candidate(&CallContext::with_value(addr(9), stake, 1), stake, 0)
        .expect("candidacy");
    ledger
        .withdraw_candidacy(&CallContext::new(addr(9), 2))
        .expect("withdraw");

    let journal = store.journal().expect("journal");
    assert_eq!(journal.len(), 2);
    assert!(matches!(journal[0].event, LedgerEvent::CandidateRegistered { .. }));
    assert!(matches!(journal[1].event, LedgerEvent::CandidacyWithdrawn { .. }));
    assert_eq!(journal[1].timestamp, 2);

    // Draining the in-memory journal leaves the persisted one intact
    assert_eq!(ledger.drain_events().len(), 2);
    assert_eq!(store.journal().expect("journal").len(), 2);
}
