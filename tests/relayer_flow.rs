// tests/relayer_flow.rs
mod common;

use common::*;
use ouro_channels::{
    parse_coins, CallContext, ExcessStakePolicy, Ledger, LedgerConfig, LedgerError, LedgerEvent,
    RelayerCapacity, COIN_UNIT,
};

#[test]
fn registration_requires_the_computed_stake() {
    let ledger = new_ledger();
    let owner = addr(1);
    let capacity = RelayerCapacity::new(150, 10_000, 10);
    let required = ledger
        .get_fund_required_for_relayer(150, 10_000, 10)
        .expect("stake");
    // 0.1 base + 0.15 users + 10 collateral + 0.1 throughput
    assert_eq!(required, parse_coins("10.35").expect("coins"));

    let err = ledger
        .add_relayer(
            &CallContext::with_value(owner, required - 1, 5),
            relayer_params("relay.ouro.network", 0, capacity),
        )
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientStake {
            required,
            attached: required - 1
        }
    );
    assert!(ledger.relayers().is_empty());
    assert_eq!(ledger.total_custody(), 0);

    let receipt = ledger
        .add_relayer(
            &CallContext::with_value(owner, required, 6),
            relayer_params("relay.ouro.network", 0, capacity),
        )
        .expect("register");
    assert_eq!(receipt.excess, 0);
    assert!(ledger.verify_domain_hash(&receipt.key, "relay.ouro.network"));

    let record = ledger.relayer(&receipt.key).expect("record");
    assert_eq!(record.owner, owner);
    assert_eq!(record.stake_locked, required);
    assert_eq!(record.created_at, 6);
    assert_eq!(ledger.get_relayer_rating(&receipt.key), 0);
    assert_eq!(ledger.relayers_of(&owner).len(), 1);
    assert_conserved(&ledger);
}

#[test]
fn duplicate_domain_is_rejected() {
    let ledger = new_ledger();
    let capacity = RelayerCapacity::new(1, 1, 1);
    let key = register_relayer(&ledger, addr(1), "relay.one", 0, capacity);

    let stake = ledger.get_fund_required_for_relayer(1, 1, 1).expect("stake");
    let err = ledger
        .add_relayer(
            &CallContext::with_value(addr(2), stake, 2),
            relayer_params("relay.one", 0, capacity),
        )
        .unwrap_err();
    assert_eq!(err, LedgerError::DuplicateRelayer(key));
}

#[test]
fn self_deposit_policy_keeps_excess_on_the_relayer() {
    init_logger();
    let config = LedgerConfig {
        excess_stake_policy: ExcessStakePolicy::SelfDeposit,
        ..LedgerConfig::default()
    };
    let ledger = Ledger::new(config).expect("ledger");
    let owner = addr(1);
    let capacity = RelayerCapacity::new(10, 5, 1);
    let stake = ledger.get_fund_required_for_relayer(10, 5, 1).expect("stake");

    let receipt = ledger
        .add_relayer(
            &CallContext::with_value(owner, stake + COIN_UNIT, 1),
            relayer_params("relay.self", 0, capacity),
        )
        .expect("register");
    assert_eq!(receipt.excess_policy, ExcessStakePolicy::SelfDeposit);
    assert_eq!(
        ledger.user_deposit_on_relayer(&owner, &receipt.key).balance,
        COIN_UNIT
    );
    assert_eq!(ledger.payout_of(&owner), 0);
    assert_conserved(&ledger);

    // Excess beyond the 5 coin deposit cap fails the whole registration
    let err = ledger
        .add_relayer(
            &CallContext::with_value(owner, stake + 6 * COIN_UNIT, 2),
            relayer_params("relay.self.two", 0, capacity),
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::CapacityExceeded { .. }));
    assert_eq!(ledger.relayers().len(), 1);
}

#[test]
fn deposits_accumulate_per_depositor() {
    let ledger = new_ledger();
    let key = register_relayer(&ledger, addr(1), "relay.one", 0, RelayerCapacity::new(10, 10_000, 1));
    let user = addr(2);
    let tiny = parse_coins("0.0001").expect("coins");

    ledger
        .deposit_to_relayer(&CallContext::with_value(user, tiny, 10), &key)
        .expect("first deposit");
    let balance = ledger
        .deposit_to_relayer(&CallContext::with_value(user, tiny, 11), &key)
        .expect("second deposit");

    assert_eq!(balance, parse_coins("0.0002").expect("coins"));
    assert_eq!(ledger.user_deposit_on_relayer(&user, &key).balance, 2 * tiny);
    assert_conserved(&ledger);
}

#[test]
fn deposit_cap_is_shared_by_all_depositors() {
    let ledger = new_ledger();
    let key = register_relayer(&ledger, addr(1), "relay.one", 0, RelayerCapacity::new(10, 3, 1));

    ledger
        .deposit_to_relayer(&CallContext::with_value(addr(2), 2 * COIN_UNIT, 1), &key)
        .expect("deposit");
    let err = ledger
        .deposit_to_relayer(&CallContext::with_value(addr(3), 2 * COIN_UNIT, 2), &key)
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::CapacityExceeded {
            key,
            cap: 3 * COIN_UNIT,
            attempted: 4 * COIN_UNIT
        }
    );
    assert_eq!(ledger.user_deposit_on_relayer(&addr(3), &key).balance, 0);
    assert_eq!(ledger.relayer_total_deposits(&key), 2 * COIN_UNIT);

    ledger
        .deposit_to_relayer(&CallContext::with_value(addr(3), COIN_UNIT, 3), &key)
        .expect("deposit up to the cap");
    assert_eq!(ledger.relayer_total_deposits(&key), 3 * COIN_UNIT);

    let balances: Vec<_> = ledger
        .deposits_on(&key)
        .iter()
        .map(|e| (e.depositor, e.balance))
        .collect();
    assert_eq!(balances, vec![(addr(2), 2 * COIN_UNIT), (addr(3), COIN_UNIT)]);
    assert_conserved(&ledger);
}

#[test]
fn withdrawal_moves_deposit_into_payout() {
    let ledger = new_ledger();
    let key = register_relayer(&ledger, addr(1), "relay.one", 0, RelayerCapacity::new(10, 10, 1));
    let user = addr(2);
    ledger
        .deposit_to_relayer(&CallContext::with_value(user, 5 * COIN_UNIT, 1), &key)
        .expect("deposit");

    let err = ledger
        .withdraw_deposit(&CallContext::new(user, 2), &key, 6 * COIN_UNIT)
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

    let remaining = ledger
        .withdraw_deposit(&CallContext::new(user, 3), &key, 2 * COIN_UNIT)
        .expect("withdraw");
    assert_eq!(remaining, 3 * COIN_UNIT);
    assert_eq!(ledger.claim(&CallContext::new(user, 4)), Ok(2 * COIN_UNIT));
    assert_eq!(
        ledger.claim(&CallContext::new(user, 5)),
        Err(LedgerError::NothingToClaim(user))
    );
    assert_conserved(&ledger);
}

#[test]
fn last_vote_overwrites_rating() {
    let ledger = new_ledger();
    let key = register_relayer(&ledger, addr(1), "relay.one", 0, RelayerCapacity::new(1, 1, 1));

    ledger
        .vote_relayer(&CallContext::new(addr(2), 1), &key, 480)
        .expect("vote");
    ledger
        .vote_relayer(&CallContext::new(addr(3), 2), &key, 460)
        .expect("vote");
    assert_eq!(ledger.get_relayer_rating(&key), 460);

    let unknown = ledger.relayer_key_for("nobody.example");
    assert_eq!(
        ledger.vote_relayer(&CallContext::new(addr(2), 3), &unknown, 1),
        Err(LedgerError::UnknownRelayer(unknown))
    );
}

#[test]
fn retiring_releases_stake_to_owner() {
    let ledger = new_ledger();
    let owner = addr(1);
    let key = register_relayer(&ledger, owner, "relay.one", 0, RelayerCapacity::new(1, 10, 1));
    let stake = ledger.relayer(&key).expect("record").stake_locked;

    ledger
        .deposit_to_relayer(&CallContext::with_value(addr(2), COIN_UNIT, 2), &key)
        .expect("deposit");
    assert_eq!(
        ledger.retire_relayer(&CallContext::new(addr(2), 3), &key),
        Err(LedgerError::Unauthorized(addr(2)))
    );
    assert_eq!(
        ledger.retire_relayer(&CallContext::new(owner, 3), &key),
        Err(LedgerError::RelayerBusy(key))
    );

    ledger
        .withdraw_deposit(&CallContext::new(addr(2), 4), &key, COIN_UNIT)
        .expect("withdraw");
    let record = ledger
        .retire_relayer(&CallContext::new(owner, 5), &key)
        .expect("retire");
    assert_eq!(record.key, key);
    assert!(ledger.relayer(&key).is_none());
    assert_eq!(ledger.payout_of(&owner), stake);
    assert_conserved(&ledger);

    let events = ledger.drain_events();
    assert!(matches!(
        events.last().map(|e| &e.event),
        Some(LedgerEvent::RelayerRetired { .. })
    ));
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, (0..events.len() as u64).collect::<Vec<_>>());
}
