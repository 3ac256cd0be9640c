//! Ledger store: point reads and per-subject compare-and-set.
//!
//! Every subject carries a version. A writer reads `Versioned<Subject>`,
//! applies the trade to a copy, and writes it back with the version it read.
//! A stale version means someone else got there first and the write is refused.

use crate::ledger::{Global, Subject};
use crate::types::{FeeRate, Identity};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// 0 means the key has never been written.
    pub version: u64,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Ledger conflict on {subject}: expected version {expected}, found {found}")]
    Conflict { subject: Identity, expected: u64, found: u64 },

    #[error("Storage error: {0}")]
    Backend(String),
}

pub trait LedgerStore: Send + Sync {
    fn global(&self) -> Result<Global, StoreError>;

    /// Takes effect on the next quote. Nothing already quoted is repriced.
    fn set_fee_rates(&self, protocol: FeeRate, subject: FeeRate) -> Result<Global, StoreError>;

    /// Never-written subjects come back `Uninitialized` at version 0.
    fn subject(&self, id: Identity) -> Result<Versioned<Subject>, StoreError>;

    /// Write `subject` if the stored version is still `expected_version`.
    /// Returns the new version.
    fn compare_and_set(
        &self,
        id: Identity,
        expected_version: u64,
        subject: Subject,
    ) -> Result<u64, StoreError>;
}

/** 5.4: in-process store. one lock for the registry, versions give per-subject linearization */
#[derive(Debug)]
pub struct MemoryLedgerStore {
    global: RwLock<Global>,
    subjects: RwLock<HashMap<Identity, Versioned<Subject>>>,
}

impl MemoryLedgerStore {
    pub fn new(global: Global) -> Self {
        Self {
            global: RwLock::new(global),
            subjects: RwLock::new(HashMap::new()),
        }
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.read().len()
    }

    pub fn all_subjects(&self) -> Vec<Subject> {
        self.subjects.read().values().map(|v| v.value.clone()).collect()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn global(&self) -> Result<Global, StoreError> {
        Ok(*self.global.read())
    }

    fn set_fee_rates(&self, protocol: FeeRate, subject: FeeRate) -> Result<Global, StoreError> {
        let mut global = self.global.write();
        global.protocol_fee_rate = protocol;
        global.subject_fee_rate = subject;
        Ok(*global)
    }

    fn subject(&self, id: Identity) -> Result<Versioned<Subject>, StoreError> {
        let subjects = self.subjects.read();
        Ok(subjects.get(&id).cloned().unwrap_or_else(|| Versioned {
            version: 0,
            value: Subject::new(id),
        }))
    }

    fn compare_and_set(
        &self,
        id: Identity,
        expected_version: u64,
        subject: Subject,
    ) -> Result<u64, StoreError> {
        let mut subjects = self.subjects.write();
        let found = subjects.get(&id).map_or(0, |v| v.version);
        if found != expected_version {
            return Err(StoreError::Conflict {
                subject: id,
                expected: expected_version,
                found,
            });
        }
        let version = found + 1;
        subjects.insert(id, Versioned { version, value: subject });
        Ok(version)
    }
}
