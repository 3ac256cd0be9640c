//! Greedy-prefix funding selection.
//!
//! Units are consumed in the order the caller hands them over, accumulating
//! until the running sum covers the target. The selected set is always a
//! prefix of the owner's units under that order, and the overshoot is the
//! change. This is not a minimal-count or minimal-waste selection: a single
//! pass in caller order is the policy. Callers that need a deterministic
//! choice across differently ordered sources sort the units first.

use crate::types::{Identity, UnitId};
use serde::{Deserialize, Serialize};

/// 4.0: a discrete spendable value container (a coin). immutable once observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FundingUnit {
    pub id: UnitId,
    pub owner: Identity,
    pub value: u64,
}

impl FundingUnit {
    pub fn new(id: UnitId, owner: Identity, value: u64) -> Self {
        Self { id, owner, value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub selected: Vec<FundingUnit>,
    /// Selected total minus target, returned to the owner.
    pub change: u64,
}

impl Selection {
    pub fn total(&self) -> u128 {
        self.selected.iter().map(|u| u.value as u128).sum()
    }

    pub fn ids(&self) -> Vec<UnitId> {
        self.selected.iter().map(|u| u.id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Invalid amount: funding target must be greater than zero")]
    InvalidAmount,

    #[error("Insufficient funds: available {available}, target {target}")]
    InsufficientFunds { available: u64, target: u64 },
}

/// Running greedy accumulation, shared by the slice and paged selectors.
#[derive(Debug)]
pub(crate) struct Accumulator {
    owner: Identity,
    target: u64,
    running: u128,
    selected: Vec<FundingUnit>,
}

impl Accumulator {
    pub(crate) fn new(owner: Identity, target: u64) -> Result<Self, SelectionError> {
        if target == 0 {
            return Err(SelectionError::InvalidAmount);
        }
        Ok(Self {
            owner,
            target,
            running: 0,
            selected: Vec::new(),
        })
    }

    /// Takes the unit if it belongs to the owner. Returns true once covered.
    pub(crate) fn push(&mut self, unit: FundingUnit) -> bool {
        if unit.owner != self.owner {
            return self.is_covered();
        }
        self.running += unit.value as u128;
        self.selected.push(unit);
        self.is_covered()
    }

    pub(crate) fn is_covered(&self) -> bool {
        self.running >= self.target as u128
    }

    pub(crate) fn finish(self) -> Result<Selection, SelectionError> {
        if !self.is_covered() {
            // running < target here, so it fits u64
            return Err(SelectionError::InsufficientFunds {
                available: self.running as u64,
                target: self.target,
            });
        }
        // overshoot is smaller than the last unit's value
        let change = (self.running - self.target as u128) as u64;
        Ok(Selection {
            selected: self.selected,
            change,
        })
    }
}

// 4.1: select the shortest prefix of `owner`'s units covering `target`.
// units owned by anyone else are skipped.
pub fn select(
    owner: Identity,
    units: &[FundingUnit],
    target: u64,
) -> Result<Selection, SelectionError> {
    let mut acc = Accumulator::new(owner, target)?;
    for unit in units {
        if acc.push(*unit) {
            break;
        }
    }
    acc.finish()
}
