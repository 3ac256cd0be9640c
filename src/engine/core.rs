// 8.0 engine/core.rs: the exchange. holds the ledger store, the funding source, the event log.

use super::config::EngineConfig;
use super::results::TradeError;
use crate::config::{ConfigError, ExchangeConfig};
use crate::events::{Event, EventId, EventLog, EventPayload, FeeRatesChangedEvent};
use crate::ledger::Global;
use crate::selector::FundingUnit;
use crate::store::{LedgerStore, MemoryLedgerStore};
use crate::types::{FeeRate, Identity, Timestamp, RATE_DENOMINATOR};
use crate::wallet::{FundingSource, MemoryWallet};
use parking_lot::Mutex;
use tracing::info;

/** 8.1: main exchange struct. trades on different subjects may run from different threads */
#[derive(Debug)]
pub struct Exchange<L: LedgerStore = MemoryLedgerStore, F: FundingSource = MemoryWallet> {
    pub(super) store: L,
    pub(super) wallet: F,
    pub(super) page_size: usize,
    pub(super) events: Mutex<EventLog>,
    pub(super) current_time: Mutex<Timestamp>,
}

impl Exchange {
    /// In-memory exchange built from a validated config.
    pub fn new(config: ExchangeConfig, engine: EngineConfig) -> Result<Self, TradeError> {
        config.validate()?;
        Ok(Self::with_parts(
            MemoryLedgerStore::new(config.global()),
            MemoryWallet::new(),
            config.page_size,
            engine,
        ))
    }
}

impl<L: LedgerStore, F: FundingSource> Exchange<L, F> {
    pub fn with_parts(store: L, wallet: F, page_size: usize, engine: EngineConfig) -> Self {
        Self {
            store,
            wallet,
            page_size: page_size.max(1),
            events: Mutex::new(EventLog::new(engine.max_events)),
            current_time: Mutex::new(engine.start_time),
        }
    }

    pub fn store(&self) -> &L {
        &self.store
    }

    pub fn wallet(&self) -> &F {
        &self.wallet
    }

    pub fn set_time(&self, timestamp: Timestamp) {
        *self.current_time.lock() = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        *self.current_time.lock()
    }

    pub fn advance_time(&self, millis: i64) {
        let mut now = self.current_time.lock();
        *now = Timestamp::from_millis(now.as_millis() + millis);
    }

    /// Credit a new funding unit to `owner`.
    pub fn deposit(&self, owner: Identity, value: u64) -> FundingUnit {
        self.wallet.deposit(owner, value)
    }

    pub fn global(&self) -> Result<Global, TradeError> {
        Ok(self.store.global()?)
    }

    // new rates apply from the next quote on
    pub fn set_fee_rates(&self, protocol: FeeRate, subject: FeeRate) -> Result<Global, TradeError> {
        let combined = protocol.ppb() as u128 + subject.ppb() as u128;
        if combined > RATE_DENOMINATOR as u128 {
            return Err(ConfigError::InvalidFees {
                reason: format!("protocol {protocol} + subject {subject} exceeds 100%"),
            }
            .into());
        }

        let global = self.store.set_fee_rates(protocol, subject)?;
        info!(protocol = %protocol, subject = %subject, "fee rates changed");
        self.emit_event(EventPayload::FeeRatesChanged(FeeRatesChangedEvent {
            protocol_fee_rate: protocol,
            subject_fee_rate: subject,
        }));
        Ok(global)
    }

    pub fn recent_events(&self, count: usize) -> Vec<Event> {
        self.events.lock().recent(count).to_vec()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().all().to_vec()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    pub(super) fn emit_event(&self, payload: EventPayload) -> EventId {
        let timestamp = self.time();
        self.events.lock().push(timestamp, payload)
    }
}
