// 3.0 fees.rs: protocol and subject fees on top of a curve price.
// each fee is floor(base × rate / 1e9), computed independently from the same base.
// buys pay base + fees. sells receive base - fees, clamped to zero.

use crate::types::{Direction, FeeRate, RATE_DENOMINATOR};
use serde::{Deserialize, Serialize};

/// Price and fees for one prospective trade. Valid only for the supply it was
/// computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub direction: Direction,
    pub base_price: u64,
    pub protocol_fee: u64,
    pub subject_fee: u64,
    pub total: u64,
    /// Sell whose fees exceed the base price. `total` is clamped to 0.
    pub degenerate: bool,
}

impl PriceQuote {
    pub fn free(direction: Direction) -> Self {
        Self {
            direction,
            base_price: 0,
            protocol_fee: 0,
            subject_fee: 0,
            total: 0,
            degenerate: false,
        }
    }

    pub fn fees(&self) -> u64 {
        self.protocol_fee.saturating_add(self.subject_fee)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FeeError {
    #[error("Fee overflow: base price {base} with fees does not fit in u64")]
    Overflow { base: u64 },
}

/// floor(base × rate / 1e9). The product is taken in u128 so it cannot wrap;
/// the quotient is at most base for any rate up to 100%.
pub fn fee_amount(base: u64, rate: FeeRate) -> Result<u64, FeeError> {
    let fee = (base as u128) * (rate.ppb() as u128) / (RATE_DENOMINATOR as u128);
    u64::try_from(fee).map_err(|_| FeeError::Overflow { base })
}

// 3.1
pub fn apply_fees(
    base: u64,
    protocol_rate: FeeRate,
    subject_rate: FeeRate,
    direction: Direction,
) -> Result<PriceQuote, FeeError> {
    let protocol_fee = fee_amount(base, protocol_rate)?;
    let subject_fee = fee_amount(base, subject_rate)?;
    let fees = protocol_fee
        .checked_add(subject_fee)
        .ok_or(FeeError::Overflow { base })?;

    let (total, degenerate) = if direction.is_buy() {
        let total = base.checked_add(fees).ok_or(FeeError::Overflow { base })?;
        (total, false)
    } else {
        match base.checked_sub(fees) {
            Some(total) => (total, false),
            None => (0, true),
        }
    };

    Ok(PriceQuote {
        direction,
        base_price: base,
        protocol_fee,
        subject_fee,
        total,
        degenerate,
    })
}
