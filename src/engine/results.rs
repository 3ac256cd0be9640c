// 8.0.2: result types and errors for trade operations.

use crate::config::ConfigError;
use crate::curve::CurveError;
use crate::fees::{FeeError, PriceQuote};
use crate::ledger::LedgerError;
use crate::selector::{FundingUnit, SelectionError};
use crate::store::StoreError;
use crate::types::{Direction, Identity};
use crate::wallet::{FundingPlan, WalletError};

#[derive(Debug, Clone)]
pub struct TradeReceipt {
    pub trader: Identity,
    pub subject: Identity,
    pub direction: Direction,
    pub units: u64,
    /// Sum over all legs.
    pub quote: PriceQuote,
    /// One quote per ledger apply. A free-bootstrap issue has two.
    pub legs: Vec<PriceQuote>,
    /// Coin operations executed to fund the trade. Empty for sells.
    pub plan: FundingPlan,
    /// Units minted by settlement: change, fees, sell proceeds.
    pub created_units: Vec<FundingUnit>,
    pub supply_after: u64,
    pub version: u64,
}

/// Caller-facing failure classes. All of them are recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidAmount,
    InsufficientFunds,
    InsufficientShares,
    NotActive,
    NotSubject,
    LedgerConflict,
    Unavailable,
    Overflow,
    Storage,
    Config,
}

impl ErrorKind {
    /// Re-quote and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::LedgerConflict | ErrorKind::Unavailable)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TradeError {
    #[error("Invalid amount: units must be greater than zero")]
    InvalidAmount,

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Funding error: {0}")]
    Funding(#[from] WalletError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Curve error: {0}")]
    Curve(#[from] CurveError),

    #[error("Fee error: {0}")]
    Fee(#[from] FeeError),
}

impl TradeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TradeError::InvalidAmount => ErrorKind::InvalidAmount,
            TradeError::Ledger(e) => match e {
                LedgerError::InvalidAmount | LedgerError::PaymentMismatch { .. } => {
                    ErrorKind::InvalidAmount
                }
                LedgerError::NotSubject { .. } => ErrorKind::NotSubject,
                LedgerError::NotActive(_) => ErrorKind::NotActive,
                LedgerError::InsufficientShares { .. } | LedgerError::LastUnit(_) => {
                    ErrorKind::InsufficientShares
                }
                LedgerError::InsufficientBacking { .. } => ErrorKind::InsufficientFunds,
                LedgerError::Overflow | LedgerError::Curve(_) | LedgerError::Fee(_) => {
                    ErrorKind::Overflow
                }
            },
            TradeError::Funding(e) => match e {
                WalletError::Selection(SelectionError::InvalidAmount) => ErrorKind::InvalidAmount,
                WalletError::Selection(SelectionError::InsufficientFunds { .. }) => {
                    ErrorKind::InsufficientFunds
                }
                WalletError::Unavailable(_) | WalletError::NotOwner { .. } => {
                    ErrorKind::Unavailable
                }
                WalletError::PlanMismatch { .. } | WalletError::UnfundedPiece(_) => {
                    ErrorKind::InvalidAmount
                }
            },
            TradeError::Store(e) => match e {
                StoreError::Conflict { .. } => ErrorKind::LedgerConflict,
                StoreError::Backend(_) => ErrorKind::Storage,
            },
            TradeError::Config(_) => ErrorKind::Config,
            TradeError::Curve(CurveError::Overflow { .. }) | TradeError::Fee(_) => {
                ErrorKind::Overflow
            }
            TradeError::Curve(CurveError::Flat(_)) => ErrorKind::Config,
        }
    }
}
