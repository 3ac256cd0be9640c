//! Quote operations.

use super::core::Exchange;
use super::results::TradeError;
use crate::fees::{apply_fees, PriceQuote};
use crate::ledger::{Global, LedgerError, Subject};
use crate::store::LedgerStore;
use crate::types::{Direction, Identity};
use crate::wallet::FundingSource;
use tracing::debug;

/// Units per ledger apply. Issuing from zero supply splits off the free
/// bootstrap unit so it can be funded by a zero-value piece.
pub(super) fn legs(subject: &Subject, direction: Direction, units: u64) -> Vec<u64> {
    if direction == Direction::Issue && subject.supply == 0 && units > 1 {
        vec![1, units - 1]
    } else {
        vec![units]
    }
}

// 8.2: quote every leg against the subject state it will be applied to
pub(super) fn quote_legs(
    global: &Global,
    subject: &Subject,
    direction: Direction,
    units: u64,
) -> Result<Vec<(u64, PriceQuote)>, TradeError> {
    if units == 0 {
        return Err(TradeError::InvalidAmount);
    }
    if direction == Direction::Sell {
        let quote = global.sell_quote(subject.supply, units)?;
        return Ok(vec![(units, quote)]);
    }
    if direction == Direction::Buy && !subject.is_active() {
        return Err(LedgerError::NotActive(subject.id).into());
    }

    let mut supply = subject.supply;
    let mut quoted = Vec::with_capacity(2);
    for leg in legs(subject, direction, units) {
        quoted.push((leg, global.buy_quote(supply, leg, direction)?));
        supply = supply.checked_add(leg).ok_or(LedgerError::Overflow)?;
    }
    Ok(quoted)
}

/// Sum of per-leg quotes. Totals of a priced trade always fit u64 (they were funded).
pub(super) fn combine(direction: Direction, legs: &[PriceQuote]) -> PriceQuote {
    legs.iter().fold(PriceQuote::free(direction), |acc, q| PriceQuote {
        direction,
        base_price: acc.base_price.saturating_add(q.base_price),
        protocol_fee: acc.protocol_fee.saturating_add(q.protocol_fee),
        subject_fee: acc.subject_fee.saturating_add(q.subject_fee),
        total: acc.total.saturating_add(q.total),
        degenerate: acc.degenerate || q.degenerate,
    })
}

impl<L: LedgerStore, F: FundingSource> Exchange<L, F> {
    /// Price and fees for `units` in `direction` against the subject's current supply.
    pub fn quote(
        &self,
        subject: Identity,
        direction: Direction,
        units: u64,
    ) -> Result<PriceQuote, TradeError> {
        let global = self.store.global()?;
        let state = self.store.subject(subject)?.value;
        let legs: Vec<PriceQuote> = quote_legs(&global, &state, direction, units)?
            .into_iter()
            .map(|(_, q)| q)
            .collect();
        let quote = combine(direction, &legs);
        debug!(
            subject = %subject.short(),
            %direction,
            units,
            supply = state.supply,
            total = quote.total,
            "quoted"
        );
        Ok(quote)
    }

    /// Base curve price of buying `units` now, before fees.
    pub fn buy_price(&self, subject: Identity, units: u64) -> Result<u64, TradeError> {
        if units == 0 {
            return Err(TradeError::InvalidAmount);
        }
        let global = self.store.global()?;
        let supply = self.store.subject(subject)?.value.supply;
        Ok(global.curve.price_of_range(supply, units)?)
    }

    /// Base curve price released by selling `units` now, before fees.
    pub fn sell_price(&self, subject: Identity, units: u64) -> Result<u64, TradeError> {
        if units == 0 {
            return Err(TradeError::InvalidAmount);
        }
        let global = self.store.global()?;
        let supply = self.store.subject(subject)?.value.supply;
        Ok(global.sell_quote(supply, units)?.base_price)
    }

    pub fn buy_price_after_fee(&self, subject: Identity, units: u64) -> Result<u64, TradeError> {
        Ok(self.quote(subject, Direction::Buy, units)?.total)
    }

    pub fn sell_price_after_fee(&self, subject: Identity, units: u64) -> Result<u64, TradeError> {
        Ok(self.quote(subject, Direction::Sell, units)?.total)
    }

    /// What a brand-new subject pays to issue `units` to itself: the first is free,
    /// the remaining `units - 1` are priced from supply 1.
    pub fn issue_price_after_fee(&self, units: u64) -> Result<u64, TradeError> {
        if units == 0 {
            return Err(TradeError::InvalidAmount);
        }
        if units == 1 {
            return Ok(0);
        }
        let global = self.store.global()?;
        let base = global.curve.price_of_range(1, units - 1)?;
        let quote = apply_fees(
            base,
            global.protocol_fee_rate,
            global.subject_fee_rate,
            Direction::Issue,
        )?;
        Ok(quote.total)
    }
}
