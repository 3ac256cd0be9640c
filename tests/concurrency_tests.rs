//! Concurrent trading through one shared exchange.
//!
//! Trades on different subjects run in parallel. Trades racing on the same
//! subject either land or come back as a retryable conflict, and the ledger
//! stays consistent either way.

use socialcoin_core::*;
use std::thread;

const ONE: u64 = 1_000_000_000;

fn exchange() -> Exchange {
    Exchange::new(ExchangeConfig::default(), EngineConfig::default()).unwrap()
}

#[test]
fn parallel_trades_on_distinct_subjects() {
    let exchange = exchange();
    let subjects: Vec<Identity> = (1..=8u64).map(Identity::from_u64).collect();
    for s in &subjects {
        exchange.deposit(*s, 100 * ONE);
    }

    thread::scope(|scope| {
        for s in &subjects {
            let exchange = &exchange;
            scope.spawn(move || {
                exchange.issue(*s, 1).unwrap();
                for _ in 0..5 {
                    exchange.buy(*s, *s, 1).unwrap();
                }
                exchange.sell(*s, *s, 2).unwrap();
            });
        }
    });

    let curve = exchange.global().unwrap().curve;
    for s in &subjects {
        let subject = exchange.store().subject(*s).unwrap();
        assert_eq!(subject.value.supply, 4);
        assert!(subject.value.is_consistent(&curve));
    }
    assert_eq!(exchange.store().subject_count(), subjects.len());
    assert_eq!(exchange.wallet().reserved_count(), 0);
}

#[test]
fn racing_buyers_on_one_subject_stay_consistent() {
    // cheap curve so fifty buys stay well inside each buyer's balance
    let config = ExchangeConfig {
        curve: PriceCurve::quadratic(1_000_000),
        ..ExchangeConfig::default()
    };
    let exchange = Exchange::new(config, EngineConfig::default()).unwrap();
    let subject = Identity::from_u64(1);
    exchange.issue(subject, 1).unwrap();

    let buyers: Vec<Identity> = (10..20u64).map(Identity::from_u64).collect();
    for b in &buyers {
        for _ in 0..4 {
            exchange.deposit(*b, 25 * ONE);
        }
    }

    let landed: Vec<u64> = thread::scope(|scope| {
        let handles: Vec<_> = buyers
            .iter()
            .map(|b| {
                let exchange = &exchange;
                scope.spawn(move || {
                    let mut landed = 0u64;
                    for _ in 0..5 {
                        match exchange.buy(*b, subject, 1) {
                            Ok(_) => landed += 1,
                            Err(e) => assert!(e.kind().is_retryable(), "unexpected {e}"),
                        }
                    }
                    landed
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let state = exchange.store().subject(subject).unwrap().value;
    let bought: u64 = landed.iter().sum();
    assert_eq!(state.supply, 1 + bought);
    assert!(state.is_consistent(&exchange.global().unwrap().curve));
    for (b, n) in buyers.iter().zip(&landed) {
        assert_eq!(state.holding_of(*b), *n);
    }
    assert_eq!(exchange.wallet().reserved_count(), 0);

    // every attempt that failed handed its funds back
    let spent: u128 = buyers
        .iter()
        .map(|b| 100 * ONE as u128 - exchange.wallet().balance(*b))
        .sum();
    let trades: u128 = exchange
        .events()
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Trade(t) if t.direction == Direction::Buy => Some(t.total as u128),
            _ => None,
        })
        .sum();
    assert_eq!(spent, trades);
}
