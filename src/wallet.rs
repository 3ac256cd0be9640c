//! Funding source: where a trader's spendable units live.
//!
//! The orchestrator pages through an owner's available units, reserves the
//! greedy prefix it selected, and settles the reservation only after the
//! ledger accepted the trade. A [`Reservation`] that is dropped without being
//! settled hands its units back, so every early return leaves the wallet as it
//! was.

use crate::selector::{Accumulator, FundingUnit, Selection, SelectionError};
use crate::types::{Identity, UnitId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPage {
    pub units: Vec<FundingUnit>,
    /// Pass back as `cursor` to continue after the last unit of this page.
    pub next_cursor: Option<UnitId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservationId(pub u64);

/// 4.2: one ledger-mutating coin operation of a carve plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingOp {
    /// Fold `from` into `into`.
    Merge { into: UnitId, from: Vec<UnitId> },
    /// Split exact pieces off `from`; what is left stays with the owner.
    Split { from: UnitId, amounts: Vec<u64> },
}

/// Ordered coin operations that turn a selection into exact payment pieces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingPlan {
    pub owner: Identity,
    pub ops: Vec<FundingOp>,
    /// Payment pieces in submission order. Zero-value pieces need no source unit.
    pub pieces: Vec<u64>,
    pub change: u64,
}

impl FundingPlan {
    pub fn funded(&self) -> u128 {
        self.pieces.iter().map(|p| *p as u128).sum()
    }
}

/// A new unit credited to `owner` when a trade settles (fee or sell proceeds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub owner: Identity,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("Selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("Funding unit {0} is not available")]
    Unavailable(UnitId),

    #[error("Funding unit {unit} is not owned by {owner}")]
    NotOwner { unit: UnitId, owner: Identity },

    #[error("Carve plan mismatch: pieces {pieces} + change {change} != selected {selected}")]
    PlanMismatch { pieces: u128, change: u64, selected: u128 },

    #[error("Nonzero piece {0} requested without any selected funding")]
    UnfundedPiece(u64),
}

// 4.3: carve a selection into exact payment pieces.
// the first selected unit is the primary: the rest merge into it, then the pieces split off.
pub fn carve(
    owner: Identity,
    selection: Option<&Selection>,
    pieces: Vec<u64>,
) -> Result<FundingPlan, WalletError> {
    let Some(selection) = selection.filter(|s| !s.selected.is_empty()) else {
        if let Some(piece) = pieces.iter().find(|p| **p > 0) {
            return Err(WalletError::UnfundedPiece(*piece));
        }
        return Ok(FundingPlan {
            owner,
            ops: Vec::new(),
            pieces,
            change: 0,
        });
    };

    let funded: u128 = pieces.iter().map(|p| *p as u128).sum();
    let selected = selection.total();
    if funded + selection.change as u128 != selected {
        return Err(WalletError::PlanMismatch {
            pieces: funded,
            change: selection.change,
            selected,
        });
    }

    let primary = selection.selected[0].id;
    let mut ops = Vec::with_capacity(2);
    if selection.selected.len() > 1 {
        ops.push(FundingOp::Merge {
            into: primary,
            from: selection.selected[1..].iter().map(|u| u.id).collect(),
        });
    }
    ops.push(FundingOp::Split {
        from: primary,
        amounts: pieces.clone(),
    });

    Ok(FundingPlan {
        owner,
        ops,
        pieces,
        change: selection.change,
    })
}

/// Storage of funding units. Implementations must make `reserve` exclusive:
/// a reserved unit is invisible to paging and to other reservations until it
/// is released or settled.
pub trait FundingSource: Send + Sync {
    /// Available (unreserved) units of `owner`, in stable source order.
    fn available_units(
        &self,
        owner: Identity,
        cursor: Option<UnitId>,
        limit: usize,
    ) -> Result<UnitPage, WalletError>;

    fn reserve(&self, owner: Identity, ids: &[UnitId]) -> Result<ReservationId, WalletError>;

    /// Return reserved units to the owner's available set.
    fn release(&self, reservation: ReservationId);

    /// Consume the reserved units according to `plan`, mint the change back to
    /// the plan owner, and mint every nonzero payout. Never fails: everything
    /// it needs was checked when the plan was carved and the units reserved.
    fn settle(
        &self,
        reservation: Option<ReservationId>,
        plan: &FundingPlan,
        payouts: &[Payout],
    ) -> Vec<FundingUnit>;

    fn deposit(&self, owner: Identity, value: u64) -> FundingUnit;
}

// 4.4: greedy-prefix selection across pages. re-queries until covered or exhausted.
pub fn select_from_source<S: FundingSource + ?Sized>(
    source: &S,
    owner: Identity,
    target: u64,
    page_size: usize,
) -> Result<Selection, WalletError> {
    let mut acc = Accumulator::new(owner, target)?;
    let mut cursor = None;
    let mut pages = 0usize;

    loop {
        let page = source.available_units(owner, cursor, page_size.max(1))?;
        pages += 1;
        let mut covered = false;
        for unit in page.units {
            if acc.push(unit) {
                covered = true;
                break;
            }
        }
        if covered || page.next_cursor.is_none() {
            break;
        }
        cursor = page.next_cursor;
    }

    debug!(owner = %owner.short(), target, pages, "funding selection finished");
    Ok(acc.finish()?)
}

/// Scoped hold on selected units. Drop without [`Reservation::settle`] releases them.
pub struct Reservation<'a, S: FundingSource + ?Sized> {
    source: &'a S,
    id: Option<ReservationId>,
    units: Vec<FundingUnit>,
}

impl<'a, S: FundingSource + ?Sized> Reservation<'a, S> {
    pub fn acquire(
        source: &'a S,
        owner: Identity,
        selection: &Selection,
    ) -> Result<Self, WalletError> {
        let id = source.reserve(owner, &selection.ids())?;
        Ok(Self {
            source,
            id: Some(id),
            units: selection.selected.clone(),
        })
    }

    /// Holds nothing. Used when a trade needs no funding (free bootstrap unit, sells).
    pub fn empty(source: &'a S) -> Self {
        Self {
            source,
            id: None,
            units: Vec::new(),
        }
    }

    pub fn units(&self) -> &[FundingUnit] {
        &self.units
    }

    pub fn settle(mut self, plan: &FundingPlan, payouts: &[Payout]) -> Vec<FundingUnit> {
        let id = self.id.take();
        self.source.settle(id, plan, payouts)
    }
}

impl<S: FundingSource + ?Sized> Drop for Reservation<'_, S> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            debug!(reservation = id.0, units = self.units.len(), "releasing unsettled reservation");
            self.source.release(id);
        }
    }
}

#[derive(Debug, Default)]
struct WalletState {
    units: BTreeMap<UnitId, FundingUnit>,
    reserved: HashMap<ReservationId, Vec<FundingUnit>>,
    next_unit: u64,
    next_reservation: u64,
}

impl WalletState {
    fn mint(&mut self, owner: Identity, value: u64) -> FundingUnit {
        self.next_unit += 1;
        let unit = FundingUnit::new(UnitId(self.next_unit), owner, value);
        self.units.insert(unit.id, unit);
        unit
    }
}

/** 4.5: in-process funding source. units page out in creation order */
#[derive(Debug, Default)]
pub struct MemoryWallet {
    state: Mutex<WalletState>,
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of the owner's available units.
    pub fn balance(&self, owner: Identity) -> u128 {
        let state = self.state.lock();
        state
            .units
            .values()
            .filter(|u| u.owner == owner)
            .map(|u| u.value as u128)
            .sum()
    }

    pub fn units_of(&self, owner: Identity) -> Vec<FundingUnit> {
        let state = self.state.lock();
        state.units.values().filter(|u| u.owner == owner).copied().collect()
    }

    pub fn reserved_count(&self) -> usize {
        self.state.lock().reserved.values().map(Vec::len).sum()
    }
}

impl FundingSource for MemoryWallet {
    fn available_units(
        &self,
        owner: Identity,
        cursor: Option<UnitId>,
        limit: usize,
    ) -> Result<UnitPage, WalletError> {
        let state = self.state.lock();
        let start = cursor.map(|c| UnitId(c.0.saturating_add(1))).unwrap_or(UnitId(0));
        let mut units: Vec<FundingUnit> = state
            .units
            .range(start..)
            .map(|(_, u)| *u)
            .filter(|u| u.owner == owner)
            .take(limit.saturating_add(1))
            .collect();

        let next_cursor = if units.len() > limit {
            units.truncate(limit);
            units.last().map(|u| u.id)
        } else {
            None
        };
        Ok(UnitPage { units, next_cursor })
    }

    fn reserve(&self, owner: Identity, ids: &[UnitId]) -> Result<ReservationId, WalletError> {
        let mut state = self.state.lock();
        // validate everything before taking anything
        for id in ids {
            let unit = state.units.get(id).ok_or(WalletError::Unavailable(*id))?;
            if unit.owner != owner {
                return Err(WalletError::NotOwner { unit: *id, owner });
            }
        }
        let taken: Vec<FundingUnit> = ids.iter().filter_map(|id| state.units.remove(id)).collect();

        state.next_reservation += 1;
        let reservation = ReservationId(state.next_reservation);
        state.reserved.insert(reservation, taken);
        Ok(reservation)
    }

    fn release(&self, reservation: ReservationId) {
        let mut state = self.state.lock();
        if let Some(units) = state.reserved.remove(&reservation) {
            for unit in units {
                state.units.insert(unit.id, unit);
            }
        }
    }

    fn settle(
        &self,
        reservation: Option<ReservationId>,
        plan: &FundingPlan,
        payouts: &[Payout],
    ) -> Vec<FundingUnit> {
        let mut state = self.state.lock();
        let consumed = reservation
            .and_then(|r| state.reserved.remove(&r))
            .unwrap_or_default();

        // carve already checked pieces + change == selected, so the merged
        // primary never needs replaying here
        let mut created = Vec::new();
        if !consumed.is_empty() && plan.change > 0 {
            created.push(state.mint(plan.owner, plan.change));
        }
        for payout in payouts.iter().filter(|p| p.value > 0) {
            created.push(state.mint(payout.owner, payout.value));
        }
        created
    }

    fn deposit(&self, owner: Identity, value: u64) -> FundingUnit {
        self.state.lock().mint(owner, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::select;

    fn alice() -> Identity {
        Identity::from_u64(1)
    }

    fn bob() -> Identity {
        Identity::from_u64(2)
    }

    fn funded_wallet(values: &[u64]) -> MemoryWallet {
        let wallet = MemoryWallet::new();
        for v in values {
            wallet.deposit(alice(), *v);
        }
        wallet
    }

    #[test]
    fn pages_follow_creation_order() {
        let wallet = funded_wallet(&[1, 2, 3, 4, 5]);
        wallet.deposit(bob(), 50);

        let first = wallet.available_units(alice(), None, 2).unwrap();
        assert_eq!(first.units.iter().map(|u| u.value).collect::<Vec<_>>(), vec![1, 2]);
        let second = wallet.available_units(alice(), first.next_cursor, 2).unwrap();
        assert_eq!(second.units.iter().map(|u| u.value).collect::<Vec<_>>(), vec![3, 4]);
        let third = wallet.available_units(alice(), second.next_cursor, 2).unwrap();
        assert_eq!(third.units.len(), 1);
        assert!(third.next_cursor.is_none());
    }

    #[test]
    fn paged_selection_matches_flat_selection() {
        let wallet = funded_wallet(&[3, 1, 4, 1, 5, 9, 2, 6]);
        let flat = select(alice(), &wallet.units_of(alice()), 14).unwrap();
        let paged = select_from_source(&wallet, alice(), 14, 3).unwrap();
        assert_eq!(flat, paged);
    }

    #[test]
    fn paged_selection_reports_shortfall() {
        let wallet = funded_wallet(&[2, 3]);
        let result = select_from_source(&wallet, alice(), 10, 1);
        assert_eq!(
            result,
            Err(WalletError::Selection(SelectionError::InsufficientFunds {
                available: 5,
                target: 10
            }))
        );
    }

    #[test]
    fn carve_merges_then_splits() {
        let wallet = funded_wallet(&[4, 4, 4]);
        let selection = select(alice(), &wallet.units_of(alice()), 10).unwrap();
        let plan = carve(alice(), Some(&selection), vec![0, 10]).unwrap();

        assert_eq!(
            plan.ops,
            vec![
                FundingOp::Merge { into: UnitId(1), from: vec![UnitId(2), UnitId(3)] },
                FundingOp::Split { from: UnitId(1), amounts: vec![0, 10] },
            ]
        );
        assert_eq!(plan.change, 2);
        assert_eq!(plan.funded(), 10);
    }

    #[test]
    fn carve_single_unit_skips_merge() {
        let wallet = funded_wallet(&[20]);
        let selection = select(alice(), &wallet.units_of(alice()), 7).unwrap();
        let plan = carve(alice(), Some(&selection), vec![7]).unwrap();
        assert_eq!(plan.ops, vec![FundingOp::Split { from: UnitId(1), amounts: vec![7] }]);
        assert_eq!(plan.change, 13);
    }

    #[test]
    fn carve_without_selection_only_allows_zero_pieces() {
        let plan = carve(alice(), None, vec![0]).unwrap();
        assert!(plan.ops.is_empty());
        assert_eq!(carve(alice(), None, vec![5]), Err(WalletError::UnfundedPiece(5)));
    }

    #[test]
    fn carve_rejects_mismatched_pieces() {
        let wallet = funded_wallet(&[10]);
        let selection = select(alice(), &wallet.units_of(alice()), 6).unwrap();
        let result = carve(alice(), Some(&selection), vec![5]);
        assert!(matches!(result, Err(WalletError::PlanMismatch { .. })));
    }

    #[test]
    fn dropped_reservation_restores_units() {
        let wallet = funded_wallet(&[5, 5]);
        let selection = select(alice(), &wallet.units_of(alice()), 8).unwrap();
        {
            let reservation = Reservation::acquire(&wallet, alice(), &selection).unwrap();
            assert_eq!(reservation.units().len(), 2);
            assert_eq!(wallet.balance(alice()), 0);
            assert_eq!(wallet.reserved_count(), 2);
        }
        assert_eq!(wallet.balance(alice()), 10);
        assert_eq!(wallet.reserved_count(), 0);
        assert_eq!(wallet.units_of(alice()).len(), 2);
    }

    #[test]
    fn reserved_units_cannot_be_reserved_twice() {
        let wallet = funded_wallet(&[5]);
        let selection = select(alice(), &wallet.units_of(alice()), 5).unwrap();
        let _held = Reservation::acquire(&wallet, alice(), &selection).unwrap();
        let second = Reservation::acquire(&wallet, alice(), &selection);
        assert!(matches!(second, Err(WalletError::Unavailable(UnitId(1)))));
    }

    #[test]
    fn reserve_rejects_foreign_units_without_taking_any() {
        let wallet = funded_wallet(&[5]);
        let foreign = wallet.deposit(bob(), 5);
        let result = wallet.reserve(alice(), &[UnitId(1), foreign.id]);
        assert!(matches!(result, Err(WalletError::NotOwner { .. })));
        assert_eq!(wallet.balance(alice()), 5);
        assert_eq!(wallet.reserved_count(), 0);
    }

    #[test]
    fn settle_consumes_pieces_and_mints_change_and_payouts() {
        let wallet = funded_wallet(&[6, 6]);
        let selection = select(alice(), &wallet.units_of(alice()), 10).unwrap();
        let plan = carve(alice(), Some(&selection), vec![10]).unwrap();
        let reservation = Reservation::acquire(&wallet, alice(), &selection).unwrap();

        let payouts = [
            Payout { owner: bob(), value: 3 },
            Payout { owner: bob(), value: 0 },
        ];
        let created = reservation.settle(&plan, &payouts);

        assert_eq!(created.len(), 2);
        assert_eq!(wallet.balance(alice()), 2);
        assert_eq!(wallet.balance(bob()), 3);
        assert_eq!(wallet.reserved_count(), 0);
    }

    #[test]
    fn settle_returns_full_change_when_units_sum_past_u64() {
        let wallet = funded_wallet(&[u64::MAX - 10, 20]);
        let target = u64::MAX - 5;
        let selection = select_from_source(&wallet, alice(), target, 10).unwrap();
        assert_eq!(selection.change, 15);

        let plan = carve(alice(), Some(&selection), vec![target]).unwrap();
        let reservation = Reservation::acquire(&wallet, alice(), &selection).unwrap();
        let created = reservation.settle(&plan, &[]);

        assert_eq!(created.len(), 1);
        assert_eq!(wallet.balance(alice()), 15);
        assert_eq!(wallet.reserved_count(), 0);
    }

    #[test]
    fn unbounded_page_limit_returns_everything() {
        let wallet = funded_wallet(&[10, 20]);
        let page = wallet.available_units(alice(), None, usize::MAX).unwrap();
        assert_eq!(page.units.len(), 2);
        assert!(page.next_cursor.is_none());

        let selection = select_from_source(&wallet, alice(), 5, usize::MAX).unwrap();
        assert_eq!(selection.change, 5);
    }
}
