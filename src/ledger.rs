//! Subject ledger: per-subject supply, holders, and holdings.
//!
//! A subject is `Uninitialized` until it issues its first unit and stays
//! `Active` from then on. `Subject::apply` is the atomicity boundary: it
//! validates and computes every new value first and only then writes them, so
//! a rejected call leaves the subject untouched.

use crate::curve::{CurveError, PriceCurve};
use crate::fees::{apply_fees, FeeError, PriceQuote};
use crate::types::{Direction, FeeRate, Identity};
use crate::wallet::Payout;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubjectStatus {
    /// Nothing issued yet
    #[default]
    Uninitialized,
    /// Bootstrap unit issued, open for trading
    Active,
}

/// Fee rates, curve, and fee destination read at quote time. The subject
/// registry itself lives in the ledger store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    pub protocol_fee_rate: FeeRate,
    pub subject_fee_rate: FeeRate,
    pub curve: PriceCurve,
    pub protocol_fee_destination: Identity,
}

impl Global {
    // 5.1: buy-side quote for `units` starting at `supply`
    pub fn buy_quote(
        &self,
        supply: u64,
        units: u64,
        direction: Direction,
    ) -> Result<PriceQuote, LedgerError> {
        let base = self.curve.price_of_range(supply, units)?;
        Ok(apply_fees(base, self.protocol_fee_rate, self.subject_fee_rate, direction)?)
    }

    // 5.2: sell-side quote. the units being sold are the top `units` of supply
    pub fn sell_quote(&self, supply: u64, units: u64) -> Result<PriceQuote, LedgerError> {
        if units > supply {
            return Err(LedgerError::InsufficientShares { requested: units, held: supply });
        }
        let base = self.curve.price_of_range(supply - units, units)?;
        Ok(apply_fees(base, self.protocol_fee_rate, self.subject_fee_rate, Direction::Sell)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid amount: units must be greater than zero")]
    InvalidAmount,

    #[error("Only the subject can issue: trader {trader}, subject {subject}")]
    NotSubject { trader: Identity, subject: Identity },

    #[error("Subject {0} has not issued yet")]
    NotActive(Identity),

    #[error("Insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: u64, held: u64 },

    #[error("Cannot sell the last outstanding unit of {0}")]
    LastUnit(Identity),

    #[error("Payment mismatch: expected {expected}, provided {provided}")]
    PaymentMismatch { expected: u64, provided: u64 },

    #[error("Backing shortfall: needed {needed}, available {available}")]
    InsufficientBacking { needed: u64, available: u64 },

    #[error("Supply overflow")]
    Overflow,

    #[error("Curve error: {0}")]
    Curve(#[from] CurveError),

    #[error("Fee error: {0}")]
    Fee(#[from] FeeError),
}

/// Outcome of one accepted apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub units: u64,
    pub quote: PriceQuote,
    /// Units to credit once the trade settles (fees, sell proceeds).
    pub payouts: Vec<Payout>,
    pub supply_after: u64,
    /// True when this apply moved the subject out of `Uninitialized`.
    pub activated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub subject: Identity,
    pub status: SubjectStatus,
    pub supply: u64,
    pub holder_count: usize,
    pub holding_count: usize,
    pub backing: u64,
}

/// A page of holders or holdings in ascending identity order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Identity>,
}

/** 5.0: one subject's token line */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Identity,
    pub status: SubjectStatus,
    pub supply: u64,
    pub holders: BTreeSet<Identity>,
    pub holding: BTreeMap<Identity, u64>,
    /// Base value paid into the curve and not yet paid back out by sells.
    pub backing: u64,
}

impl Subject {
    pub fn new(id: Identity) -> Self {
        Self {
            id,
            status: SubjectStatus::Uninitialized,
            supply: 0,
            holders: BTreeSet::new(),
            holding: BTreeMap::new(),
            backing: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SubjectStatus::Active
    }

    pub fn holding_of(&self, trader: Identity) -> u64 {
        self.holding.get(&trader).copied().unwrap_or(0)
    }

    // 5.3: apply one trade. `payment` is the value of the funding piece handed over
    // (ignored for sells). either every field changes or none does.
    pub fn apply(
        &mut self,
        global: &Global,
        trader: Identity,
        direction: Direction,
        units: u64,
        payment: u64,
    ) -> Result<Settlement, LedgerError> {
        if units == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        match direction {
            Direction::Issue | Direction::Buy => {
                self.apply_buy(global, trader, direction, units, payment)
            }
            Direction::Sell => self.apply_sell(global, trader, units),
        }
    }

    fn apply_buy(
        &mut self,
        global: &Global,
        trader: Identity,
        direction: Direction,
        units: u64,
        payment: u64,
    ) -> Result<Settlement, LedgerError> {
        match direction {
            Direction::Issue if trader != self.id => {
                return Err(LedgerError::NotSubject { trader, subject: self.id });
            }
            Direction::Buy if !self.is_active() => return Err(LedgerError::NotActive(self.id)),
            _ => {}
        }

        let quote = global.buy_quote(self.supply, units, direction)?;
        if payment != quote.total {
            return Err(LedgerError::PaymentMismatch {
                expected: quote.total,
                provided: payment,
            });
        }

        let supply = self.supply.checked_add(units).ok_or(LedgerError::Overflow)?;
        let held = self.holding_of(trader).checked_add(units).ok_or(LedgerError::Overflow)?;
        let backing = self
            .backing
            .checked_add(quote.base_price)
            .ok_or(LedgerError::Overflow)?;

        let activated = !self.is_active();
        self.status = SubjectStatus::Active;
        self.supply = supply;
        self.backing = backing;
        self.holding.insert(trader, held);
        self.holders.insert(trader);

        Ok(Settlement {
            units,
            quote,
            payouts: vec![
                Payout { owner: global.protocol_fee_destination, value: quote.protocol_fee },
                Payout { owner: self.id, value: quote.subject_fee },
            ],
            supply_after: supply,
            activated,
        })
    }

    fn apply_sell(
        &mut self,
        global: &Global,
        trader: Identity,
        units: u64,
    ) -> Result<Settlement, LedgerError> {
        let held = self.holding_of(trader);
        if held < units {
            return Err(LedgerError::InsufficientShares { requested: units, held });
        }
        if units >= self.supply {
            return Err(LedgerError::LastUnit(self.id));
        }

        let quote = global.sell_quote(self.supply, units)?;
        let backing = self
            .backing
            .checked_sub(quote.base_price)
            .ok_or(LedgerError::InsufficientBacking {
                needed: quote.base_price,
                available: self.backing,
            })?;

        // fees never take more than the base released from backing
        let protocol_paid = quote.protocol_fee.min(quote.base_price);
        let subject_paid = quote.subject_fee.min(quote.base_price - protocol_paid);

        let supply = self.supply - units;
        let remaining = held - units;
        self.supply = supply;
        self.backing = backing;
        if remaining == 0 {
            self.holding.remove(&trader);
            self.holders.remove(&trader);
        } else {
            self.holding.insert(trader, remaining);
        }

        Ok(Settlement {
            units,
            quote,
            payouts: vec![
                Payout { owner: trader, value: quote.total },
                Payout { owner: global.protocol_fee_destination, value: protocol_paid },
                Payout { owner: self.id, value: subject_paid },
            ],
            supply_after: supply,
            activated: false,
        })
    }

    pub fn profile(&self) -> SubjectProfile {
        SubjectProfile {
            subject: self.id,
            status: self.status,
            supply: self.supply,
            holder_count: self.holders.len(),
            holding_count: self.holding.len(),
            backing: self.backing,
        }
    }

    pub fn holders_page(&self, cursor: Option<Identity>, limit: usize) -> Page<Identity> {
        let lower = cursor.map_or(Bound::Unbounded, Bound::Excluded);
        let mut items: Vec<Identity> = self
            .holders
            .range((lower, Bound::Unbounded))
            .take(limit.saturating_add(1))
            .copied()
            .collect();
        let next_cursor = trim_page(&mut items, limit, |id| *id);
        Page { items, next_cursor }
    }

    pub fn holding_page(&self, cursor: Option<Identity>, limit: usize) -> Page<(Identity, u64)> {
        let lower = cursor.map_or(Bound::Unbounded, Bound::Excluded);
        let mut items: Vec<(Identity, u64)> = self
            .holding
            .range((lower, Bound::Unbounded))
            .take(limit.saturating_add(1))
            .map(|(id, n)| (*id, *n))
            .collect();
        let next_cursor = trim_page(&mut items, limit, |(id, _)| *id);
        Page { items, next_cursor }
    }

    /// supply == Σ holding, holders == {k : holding[k] > 0}, and backing equals
    /// the curve price of everything outstanding.
    pub fn is_consistent(&self, curve: &PriceCurve) -> bool {
        let total: u128 = self.holding.values().map(|n| *n as u128).sum();
        let positive: BTreeSet<Identity> = self
            .holding
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(id, _)| *id)
            .collect();
        let priced = curve.price_of_range(0, self.supply);

        total == self.supply as u128
            && positive == self.holders
            && positive.len() == self.holding.len()
            && priced == Ok(self.backing)
    }
}

fn trim_page<T>(
    items: &mut Vec<T>,
    limit: usize,
    key: impl Fn(&T) -> Identity,
) -> Option<Identity> {
    if items.len() > limit {
        items.truncate(limit);
        items.last().map(key)
    } else {
        None
    }
}
