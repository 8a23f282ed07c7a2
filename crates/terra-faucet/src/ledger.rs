//! Persistent per-account rate-limit ledger.
//!
//! Each account (keyed by its raw address bytes) owns a [`DripRecord`] holding
//! the amounts dispensed during the current UTC day and the time of its last
//! claim. A claim is admitted only if the account waited long enough since its
//! previous claim and the denomination's daily cap still has room for one more
//! drip. Admission and the record update happen in one sled transaction, and
//! the tree is flushed before the reservation is reported, so nothing is
//! dispensed unless the reservation is durable.

use crate::address::AccountId;
use crate::denom::{DenomLimit, DenomLimits};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

const LEDGER_TREE: &str = "drip_records";

/// Ledger admission failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("claimed again too soon, retry in {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("daily amount limit exceeded for {denom}")]
    QuotaExceeded { denom: String },

    #[error("denomination {0} is not dispensed")]
    UnknownDenom(String),

    #[error("ledger storage failure: {0}")]
    Storage(String),
}

/// Cumulative amount of one denomination in the current window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenomAmount {
    pub denom: String,
    pub amount: u64,
}

/// Per-account drip history, persisted as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DripRecord {
    pub amounts: Vec<DenomAmount>,
    #[serde(rename = "lastRequestedAt")]
    pub last_requested_at: DateTime<Utc>,
}

impl DripRecord {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            amounts: Vec::new(),
            last_requested_at: now,
        }
    }

    /// Amount of `denom` dispensed in the current window
    pub fn amount_of(&self, denom: &str) -> u64 {
        self.amounts
            .iter()
            .find(|entry| entry.denom == denom)
            .map(|entry| entry.amount)
            .unwrap_or(0)
    }

    /// Enforce the claim interval; the daily window resets on a new UTC date.
    fn admit(&mut self, now: DateTime<Utc>, interval: Duration) -> Result<(), RateLimitError> {
        let elapsed = now.signed_duration_since(self.last_requested_at);
        if elapsed < interval {
            let remaining = (interval - elapsed).min(interval);
            let retry_after_secs = remaining.num_seconds().max(1) as u64;
            return Err(RateLimitError::Throttled { retry_after_secs });
        }

        if self.last_requested_at.date_naive() != now.date_naive() {
            self.amounts.clear();
        }

        Ok(())
    }

    /// Add one drip of `denom`, refusing to cross the window cap.
    fn drip(&mut self, denom: &str, limit: DenomLimit) -> Result<(), RateLimitError> {
        let current = self.amount_of(denom);
        let next = current.saturating_add(limit.drip_amount);
        if next > limit.window_cap {
            return Err(RateLimitError::QuotaExceeded {
                denom: denom.to_string(),
            });
        }

        match self.amounts.iter_mut().find(|entry| entry.denom == denom) {
            Some(entry) => entry.amount = next,
            None => self.amounts.push(DenomAmount {
                denom: denom.to_string(),
                amount: next,
            }),
        }
        Ok(())
    }
}

/// Ledger statistics
#[derive(Debug, Clone)]
pub struct LedgerStats {
    pub accounts: usize,
}

/// sled-backed rate-limit ledger
#[derive(Debug, Clone)]
pub struct RateLimitLedger {
    db: sled::Db,
    records: sled::Tree,
    limits: DenomLimits,
    request_interval: Duration,
}

impl RateLimitLedger {
    /// Open (or create) the ledger database at `path`
    pub fn open<P: AsRef<Path>>(
        path: P,
        limits: DenomLimits,
        request_interval: Duration,
    ) -> Result<Self, RateLimitError> {
        info!("Opening rate-limit ledger at: {}", path.as_ref().display());
        let db = sled::open(path).map_err(storage_error)?;
        Self::from_db(db, limits, request_interval)
    }

    /// Ledger backed by a throwaway database, removed on drop
    pub fn temporary(limits: DenomLimits, request_interval: Duration) -> Result<Self, RateLimitError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage_error)?;
        Self::from_db(db, limits, request_interval)
    }

    fn from_db(
        db: sled::Db,
        limits: DenomLimits,
        request_interval: Duration,
    ) -> Result<Self, RateLimitError> {
        let records = db.open_tree(LEDGER_TREE).map_err(storage_error)?;
        Ok(Self {
            db,
            records,
            limits,
            request_interval,
        })
    }

    pub fn limits(&self) -> &DenomLimits {
        &self.limits
    }

    /// Admit a claim of `denom` for `account` at `now` and record it durably.
    ///
    /// A brand-new account's first claim is recorded like any other.
    pub fn check_and_reserve(
        &self,
        account: &AccountId,
        denom: &str,
        now: DateTime<Utc>,
    ) -> Result<DripRecord, RateLimitError> {
        let limit = self
            .limits
            .get(denom)
            .ok_or_else(|| RateLimitError::UnknownDenom(denom.to_string()))?;
        let key = account.as_bytes();
        let interval = self.request_interval;

        let result = self.records.transaction(
            |tx| -> ConflictableTransactionResult<DripRecord, RateLimitError> {
                let mut record = match tx.get(key)? {
                    Some(bytes) => {
                        let mut record: DripRecord = serde_json::from_slice(&bytes).map_err(|e| {
                            ConflictableTransactionError::Abort(RateLimitError::Storage(format!(
                                "corrupt drip record: {}",
                                e
                            )))
                        })?;
                        record
                            .admit(now, interval)
                            .map_err(ConflictableTransactionError::Abort)?;
                        record
                    }
                    None => DripRecord::empty(now),
                };

                record
                    .drip(denom, limit)
                    .map_err(ConflictableTransactionError::Abort)?;
                record.last_requested_at = now;

                let bytes = serde_json::to_vec(&record).map_err(|e| {
                    ConflictableTransactionError::Abort(RateLimitError::Storage(e.to_string()))
                })?;
                tx.insert(key, bytes)?;
                Ok(record)
            },
        );

        let record = match result {
            Ok(record) => record,
            Err(TransactionError::Abort(err)) => {
                debug!("Claim of {} for {} rejected: {}", denom, account, err);
                return Err(err);
            }
            Err(TransactionError::Storage(err)) => return Err(storage_error(err)),
        };

        self.records.flush().map_err(storage_error)?;

        debug!(
            "Reserved {} {} for {} ({} in window)",
            limit.drip_amount,
            denom,
            account,
            record.amount_of(denom)
        );
        Ok(record)
    }

    /// Current record for `account`, if it ever claimed
    pub fn get(&self, account: &AccountId) -> Result<Option<DripRecord>, RateLimitError> {
        match self.records.get(account.as_bytes()).map_err(storage_error)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| RateLimitError::Storage(format!("corrupt drip record: {}", e))),
            None => Ok(None),
        }
    }

    pub fn get_stats(&self) -> LedgerStats {
        LedgerStats {
            accounts: self.records.len(),
        }
    }

    /// Whether the backing database was recovered from a previous run
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, account: &AccountId, bytes: &[u8]) {
        self.records.insert(account.as_bytes(), bytes).unwrap();
    }
}

fn storage_error(err: sled::Error) -> RateLimitError {
    RateLimitError::Storage(err.to_string())
}
