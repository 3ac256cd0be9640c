//! Read-only subject queries.

use super::core::Exchange;
use super::results::TradeError;
use crate::ledger::{Page, SubjectProfile};
use crate::store::LedgerStore;
use crate::types::Identity;
use crate::wallet::FundingSource;

impl<L: LedgerStore, F: FundingSource> Exchange<L, F> {
    pub fn profile(&self, subject: Identity) -> Result<SubjectProfile, TradeError> {
        Ok(self.store.subject(subject)?.value.profile())
    }

    pub fn supply(&self, subject: Identity) -> Result<u64, TradeError> {
        Ok(self.store.subject(subject)?.value.supply)
    }

    /// Holders in ascending identity order, starting after `cursor`.
    pub fn holders(
        &self,
        subject: Identity,
        cursor: Option<Identity>,
        limit: usize,
    ) -> Result<Page<Identity>, TradeError> {
        let limit = if limit == 0 { self.page_size } else { limit };
        Ok(self.store.subject(subject)?.value.holders_page(cursor, limit))
    }

    pub fn holdings(
        &self,
        subject: Identity,
        cursor: Option<Identity>,
        limit: usize,
    ) -> Result<Page<(Identity, u64)>, TradeError> {
        let limit = if limit == 0 { self.page_size } else { limit };
        Ok(self.store.subject(subject)?.value.holding_page(cursor, limit))
    }

    pub fn holding_of(&self, subject: Identity, trader: Identity) -> Result<u64, TradeError> {
        Ok(self.store.subject(subject)?.value.holding_of(trader))
    }

    pub fn is_holder(&self, subject: Identity, trader: Identity) -> Result<bool, TradeError> {
        Ok(self.store.subject(subject)?.value.holders.contains(&trader))
    }
}
