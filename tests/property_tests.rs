//! Property-based tests for pricing, fees, selection, and the subject ledger.
//!
//! These tests verify invariants hold under random inputs.

use proptest::prelude::*;
use socialcoin_core::*;

fn curve_strategy() -> impl Strategy<Value = PriceCurve> {
    prop_oneof![
        (1u64..=1_000_000_000u64).prop_map(PriceCurve::quadratic),
        (1u64..=1_000_000_000u64).prop_map(PriceCurve::linear),
    ]
}

fn rate_strategy() -> impl Strategy<Value = FeeRate> {
    (0u64..=200_000_000u64).prop_map(FeeRate::from_ppb) // 0% to 20%
}

fn owner(n: u64) -> Identity {
    Identity::from_u64(n)
}

proptest! {
    /// Buying a..a+n+m costs the same as buying a..a+n then a+n..a+n+m
    #[test]
    fn range_price_is_additive(
        curve in curve_strategy(),
        start in 0u64..2_000,
        n in 0u64..500,
        m in 0u64..500,
    ) {
        let whole = curve.price_of_range(start, n + m).unwrap();
        let first = curve.price_of_range(start, n).unwrap();
        let second = curve.price_of_range(start + n, m).unwrap();
        prop_assert_eq!(whole, first + second);
    }

    /// The next unit never gets cheaper as supply grows
    #[test]
    fn unit_price_is_monotonic(
        curve in curve_strategy(),
        supply in 0u64..100_000,
    ) {
        let here = curve.price_of_unit(supply).unwrap();
        let next = curve.price_of_unit(supply + 1).unwrap();
        prop_assert!(next >= here);
        if supply > 0 {
            prop_assert!(here > 0);
        }
    }

    /// A range of fixed length never gets cheaper further up the curve
    #[test]
    fn range_price_is_monotonic_in_start(
        curve in curve_strategy(),
        s1 in 0u64..1_000,
        gap in 0u64..1_000,
        count in 0u64..100,
    ) {
        let lower = curve.price_of_range(s1, count).unwrap();
        let higher = curve.price_of_range(s1 + gap, count).unwrap();
        prop_assert!(lower <= higher);
    }

    /// Buying more units from the same supply never costs less
    #[test]
    fn range_price_is_monotonic_in_count(
        curve in curve_strategy(),
        start in 0u64..2_000,
        count in 0u64..500,
        extra in 0u64..500,
    ) {
        let fewer = curve.price_of_range(start, count).unwrap();
        let more = curve.price_of_range(start, count + extra).unwrap();
        prop_assert!(fewer <= more);
    }

    /// Range pricing agrees with summing single units
    #[test]
    fn range_matches_unit_sum(
        curve in curve_strategy(),
        start in 0u64..1_000,
        count in 0u64..50,
    ) {
        let summed: u64 = (start..start + count).map(|s| curve.price_of_unit(s).unwrap()).sum();
        prop_assert_eq!(curve.price_of_range(start, count).unwrap(), summed);
    }

    /// Same inputs always give the same quote
    #[test]
    fn fees_are_deterministic(
        base in 0u64..1_000_000_000_000,
        protocol in rate_strategy(),
        subject in rate_strategy(),
    ) {
        let a = apply_fees(base, protocol, subject, Direction::Buy).unwrap();
        let b = apply_fees(base, protocol, subject, Direction::Buy).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Buy total = base + fees; with any nonzero fee the buyer pays strictly more
    #[test]
    fn buy_total_covers_base_and_fees(
        base in 0u64..1_000_000_000_000,
        protocol in rate_strategy(),
        subject in rate_strategy(),
    ) {
        let quote = apply_fees(base, protocol, subject, Direction::Buy).unwrap();
        prop_assert_eq!(quote.total, quote.base_price + quote.protocol_fee + quote.subject_fee);
        prop_assert!(quote.protocol_fee <= base && quote.subject_fee <= base);
        if quote.fees() > 0 {
            prop_assert!(quote.total > base);
        }
    }

    /// Sell total never exceeds the base and fees are floored per side
    #[test]
    fn sell_total_below_base(
        base in 0u64..1_000_000_000_000,
        protocol in rate_strategy(),
        subject in rate_strategy(),
    ) {
        let quote = apply_fees(base, protocol, subject, Direction::Sell).unwrap();
        prop_assert!(quote.total <= base);
        prop_assert!(!quote.degenerate);
        prop_assert_eq!(quote.total + quote.fees(), base);
        prop_assert_eq!(quote.protocol_fee, fee_amount(base, protocol).unwrap());
    }

    /// The selection is the shortest covering prefix of the owner's units
    #[test]
    fn selection_is_shortest_covering_prefix(
        values in proptest::collection::vec((1u64..1_000, 0u64..3), 1..40),
        target in 1u64..20_000,
    ) {
        let units: Vec<FundingUnit> = values
            .iter()
            .enumerate()
            .map(|(i, (v, o))| FundingUnit::new(UnitId(i as u64 + 1), owner(*o), *v))
            .collect();
        let mine: Vec<FundingUnit> =
            units.iter().copied().filter(|u| u.owner == owner(0)).collect();
        let available: u64 = mine.iter().map(|u| u.value).sum();

        match select(owner(0), &units, target) {
            Ok(selection) => {
                let n = selection.selected.len();
                prop_assert_eq!(&selection.selected[..], &mine[..n]);
                prop_assert!(selection.total() >= target as u128);
                prop_assert_eq!(selection.total() - target as u128, selection.change as u128);
                // dropping the last unit would not cover
                let without_last: u128 =
                    selection.selected[..n - 1].iter().map(|u| u.value as u128).sum();
                prop_assert!(without_last < target as u128);
            }
            Err(SelectionError::InsufficientFunds { available: reported, target: t }) => {
                prop_assert!(available < target);
                prop_assert_eq!(reported, available);
                prop_assert_eq!(t, target);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Random buy/sell sequences keep supply, holders, and backing consistent
    #[test]
    fn ledger_conserves_supply_and_backing(
        curve in curve_strategy(),
        protocol in rate_strategy(),
        subject_rate in rate_strategy(),
        steps in proptest::collection::vec((1u64..6, 1u64..4, any::<bool>()), 1..40),
    ) {
        let global = Global {
            protocol_fee_rate: protocol,
            subject_fee_rate: subject_rate,
            curve,
            protocol_fee_destination: Identity::ZERO,
        };
        let id = owner(100);
        let mut subject = Subject::new(id);
        subject.apply(&global, id, Direction::Issue, 1, 0).unwrap();

        for (trader_n, units, is_buy) in steps {
            let trader = owner(trader_n);
            let before = subject.clone();
            if is_buy {
                let quote = global.buy_quote(subject.supply, units, Direction::Buy).unwrap();
                let settled = subject
                    .apply(&global, trader, Direction::Buy, units, quote.total)
                    .unwrap();
                prop_assert_eq!(settled.supply_after, before.supply + units);
                let paid: u64 = settled.payouts.iter().map(|p| p.value).sum();
                prop_assert_eq!(paid + quote.base_price, quote.total);
            } else {
                match subject.apply(&global, trader, Direction::Sell, units, 0) {
                    Ok(settled) => {
                        prop_assert_eq!(settled.supply_after, before.supply - units);
                        let paid: u64 = settled.payouts.iter().map(|p| p.value).sum();
                        prop_assert_eq!(paid, settled.quote.base_price);
                    }
                    Err(_) => prop_assert_eq!(&subject, &before),
                }
            }
            prop_assert!(subject.is_consistent(&global.curve));
            prop_assert!(subject.supply >= 1);
        }
    }
}
