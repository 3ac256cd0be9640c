//! Bonding curve pricing.
//!
//! Each shape prices the unit minted while supply equals `i` with a marginal
//! term `f(i)` where `f(0) == 0`. The price of a range is the plain sum of its
//! terms, evaluated in closed form with checked `u128` arithmetic and never
//! divided, so splitting a range into contiguous pieces never changes its cost.

use serde::{Deserialize, Serialize};

/// Default quadratic coefficient: 0.1 base-asset unit per squared supply step.
pub const DEFAULT_QUADRATIC_COEFFICIENT: u64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurveShape {
    /// f(i) = slope × i
    Linear { slope: u64 },
    /// f(i) = coefficient × i²
    Quadratic { coefficient: u64 },
}

impl CurveShape {
    pub fn name(&self) -> &'static str {
        match self {
            CurveShape::Linear { .. } => "linear",
            CurveShape::Quadratic { .. } => "quadratic",
        }
    }
}

impl Default for CurveShape {
    fn default() -> Self {
        CurveShape::Quadratic {
            coefficient: DEFAULT_QUADRATIC_COEFFICIENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CurveError {
    #[error("Curve price overflow: start_supply {start_supply}, count {count}")]
    Overflow { start_supply: u64, count: u64 },

    #[error("Curve {0} has a zero coefficient and would not increase with supply")]
    Flat(&'static str),
}

/** 2.0: the curve itself. stateless, safe to share across threads */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceCurve {
    shape: CurveShape,
}

impl PriceCurve {
    pub fn new(shape: CurveShape) -> Self {
        Self { shape }
    }

    pub fn quadratic(coefficient: u64) -> Self {
        Self::new(CurveShape::Quadratic { coefficient })
    }

    pub fn linear(slope: u64) -> Self {
        Self::new(CurveShape::Linear { slope })
    }

    pub fn shape(&self) -> CurveShape {
        self.shape
    }

    pub fn validate(&self) -> Result<(), CurveError> {
        let coefficient = match self.shape {
            CurveShape::Linear { slope } => slope,
            CurveShape::Quadratic { coefficient } => coefficient,
        };
        if coefficient == 0 {
            return Err(CurveError::Flat(self.shape.name()));
        }
        Ok(())
    }

    // 2.1: cost of minting `count` units when `start_supply` are already out.
    pub fn price_of_range(&self, start_supply: u64, count: u64) -> Result<u64, CurveError> {
        if count == 0 {
            return Ok(0);
        }
        let overflow = CurveError::Overflow { start_supply, count };

        let start = start_supply as u128;
        let end = start + count as u128;

        let (coefficient, terms) = match self.shape {
            CurveShape::Linear { slope } => {
                let hi = prefix_sum_of_integers(end).ok_or(overflow)?;
                let lo = prefix_sum_of_integers(start).ok_or(overflow)?;
                (slope, hi - lo)
            }
            CurveShape::Quadratic { coefficient } => {
                let hi = prefix_sum_of_squares(end).ok_or(overflow)?;
                let lo = prefix_sum_of_squares(start).ok_or(overflow)?;
                (coefficient, hi - lo)
            }
        };

        let total = terms
            .checked_mul(coefficient as u128)
            .ok_or(overflow)?;
        u64::try_from(total).map_err(|_| overflow)
    }

    /// Marginal price of the unit minted while supply is `supply`.
    pub fn price_of_unit(&self, supply: u64) -> Result<u64, CurveError> {
        self.price_of_range(supply, 1)
    }
}

// Σ i for i in [0, n)
fn prefix_sum_of_integers(n: u128) -> Option<u128> {
    if n == 0 {
        return Some(0);
    }
    n.checked_mul(n - 1).map(|p| p / 2)
}

// Σ i² for i in [0, n) = (n-1)·n·(2n-1) / 6
fn prefix_sum_of_squares(n: u128) -> Option<u128> {
    if n == 0 {
        return Some(0);
    }
    // (n-1)·n is even, and the full product is divisible by 6
    let half = n.checked_mul(n - 1)? / 2;
    let odd = n.checked_mul(2)?.checked_sub(1)?;
    Some(half.checked_mul(odd)? / 3)
}
