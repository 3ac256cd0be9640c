//! Trade execution: quote, fund, carve, apply, settle.
//!
//! The subject is read once with its version and every leg is applied to a
//! private copy. The copy is written back with a single compare-and-set, and
//! the funding reservation is settled only after that write succeeds. Any
//! error before then drops the reservation, which hands the units back.

use super::core::Exchange;
use super::pricing::{combine, quote_legs};
use super::results::{TradeError, TradeReceipt};
use crate::events::{EventPayload, SubjectActivatedEvent, TradeEvent};
use crate::fees::PriceQuote;
use crate::ledger::{LedgerError, Settlement};
use crate::selector::FundingUnit;
use crate::store::LedgerStore;
use crate::types::{Direction, Identity};
use crate::wallet::{carve, select_from_source, FundingPlan, FundingSource, Reservation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub trader: Identity,
    pub subject: Identity,
    pub direction: Direction,
    pub units: u64,
}

impl<L: LedgerStore, F: FundingSource> Exchange<L, F> {
    /// Issue `units` of the trader's own line. From zero supply the first unit is free.
    pub fn issue(&self, trader: Identity, units: u64) -> Result<TradeReceipt, TradeError> {
        self.execute(TradeRequest {
            trader,
            subject: trader,
            direction: Direction::Issue,
            units,
        })
    }

    pub fn buy(
        &self,
        trader: Identity,
        subject: Identity,
        units: u64,
    ) -> Result<TradeReceipt, TradeError> {
        self.execute(TradeRequest {
            trader,
            subject,
            direction: Direction::Buy,
            units,
        })
    }

    pub fn sell(
        &self,
        trader: Identity,
        subject: Identity,
        units: u64,
    ) -> Result<TradeReceipt, TradeError> {
        self.execute(TradeRequest {
            trader,
            subject,
            direction: Direction::Sell,
            units,
        })
    }

    pub fn execute(&self, request: TradeRequest) -> Result<TradeReceipt, TradeError> {
        let result = match request.direction {
            Direction::Issue | Direction::Buy => self.execute_buy(request),
            Direction::Sell => self.execute_sell(request),
        };

        match &result {
            Ok(receipt) => info!(
                trader = %request.trader.short(),
                subject = %request.subject.short(),
                direction = %request.direction,
                units = request.units,
                total = receipt.quote.total,
                supply = receipt.supply_after,
                "trade applied"
            ),
            Err(e) => warn!(
                trader = %request.trader.short(),
                subject = %request.subject.short(),
                direction = %request.direction,
                units = request.units,
                kind = ?e.kind(),
                error = %e,
                "trade rejected"
            ),
        }
        result
    }

    fn execute_buy(&self, request: TradeRequest) -> Result<TradeReceipt, TradeError> {
        let TradeRequest { trader, subject, direction, units } = request;
        if direction == Direction::Issue && trader != subject {
            return Err(LedgerError::NotSubject { trader, subject }.into());
        }

        // 1. quote
        let global = self.store.global()?;
        let snapshot = self.store.subject(subject)?;
        let legs = quote_legs(&global, &snapshot.value, direction, units)?;
        let pieces: Vec<u64> = legs.iter().map(|(_, q)| q.total).collect();
        let owed = pieces
            .iter()
            .try_fold(0u64, |acc, p| acc.checked_add(*p))
            .ok_or(LedgerError::Overflow)?;

        // 2. fund. a free trade selects nothing
        let (selection, reservation) = if owed > 0 {
            let selection = select_from_source(&self.wallet, trader, owed, self.page_size)?;
            let reservation = Reservation::acquire(&self.wallet, trader, &selection)?;
            (Some(selection), reservation)
        } else {
            (None, Reservation::empty(&self.wallet))
        };

        // 3. carve exact pieces, one per leg
        let plan = carve(trader, selection.as_ref(), pieces)?;

        // 4. apply every leg to a private copy, then publish it in one write
        let mut working = snapshot.value.clone();
        let mut settlements: Vec<Settlement> = Vec::with_capacity(legs.len());
        for ((leg_units, _), piece) in legs.iter().zip(plan.pieces.iter()) {
            settlements.push(working.apply(&global, trader, direction, *leg_units, *piece)?);
        }
        let supply_after = working.supply;
        let version = self.store.compare_and_set(subject, snapshot.version, working)?;

        // 5. settle: consume pieces, return change, pay fees
        let payouts: Vec<_> = settlements.iter().flat_map(|s| s.payouts.iter().copied()).collect();
        let created_units = reservation.settle(&plan, &payouts);

        Ok(self.record(request, settlements, plan, created_units, supply_after, version))
    }

    fn execute_sell(&self, request: TradeRequest) -> Result<TradeReceipt, TradeError> {
        let TradeRequest { trader, subject, units, .. } = request;
        if units == 0 {
            return Err(TradeError::InvalidAmount);
        }

        let global = self.store.global()?;
        let snapshot = self.store.subject(subject)?;
        let mut working = snapshot.value.clone();
        let settlement = working.apply(&global, trader, Direction::Sell, units, 0)?;
        let supply_after = working.supply;
        let version = self.store.compare_and_set(subject, snapshot.version, working)?;

        let plan = FundingPlan {
            owner: trader,
            ops: Vec::new(),
            pieces: Vec::new(),
            change: 0,
        };
        let created_units = Reservation::empty(&self.wallet).settle(&plan, &settlement.payouts);

        Ok(self.record(request, vec![settlement], plan, created_units, supply_after, version))
    }

    fn record(
        &self,
        request: TradeRequest,
        settlements: Vec<Settlement>,
        plan: FundingPlan,
        created_units: Vec<FundingUnit>,
        supply_after: u64,
        version: u64,
    ) -> TradeReceipt {
        for s in &settlements {
            if s.activated {
                self.emit_event(EventPayload::SubjectActivated(SubjectActivatedEvent {
                    subject: request.subject,
                }));
            }
            self.emit_event(EventPayload::Trade(TradeEvent {
                trader: request.trader,
                subject: request.subject,
                direction: request.direction,
                units: s.units,
                base_price: s.quote.base_price,
                protocol_fee: s.quote.protocol_fee,
                subject_fee: s.quote.subject_fee,
                total: s.quote.total,
                supply_after: s.supply_after,
            }));
        }

        let legs: Vec<PriceQuote> = settlements.iter().map(|s| s.quote).collect();
        TradeReceipt {
            trader: request.trader,
            subject: request.subject,
            direction: request.direction,
            units: request.units,
            quote: combine(request.direction, &legs),
            legs,
            plan,
            created_units,
            supply_after,
            version,
        }
    }
}
