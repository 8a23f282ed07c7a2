//! Single-writer coordination of the faucet account's transaction sequence.
//!
//! The remote ledger accepts a transaction only if it is signed with the
//! account's next sequence. [`SequenceCoordinator::lock`] hands out a guard
//! that must be held from the sequence refresh until the broadcast outcome is
//! known; the sequence advances only through [`SequenceGuard::commit`], and
//! dropping the guard on any other path leaves it unchanged.

use crate::error::FaucetResult;
use crate::lcd::RemoteLedger;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Faucet account signing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequenceState {
    pub sequence: u64,
    pub account_number: u64,
}

pub struct SequenceCoordinator {
    state: Mutex<SequenceState>,
    remote: Arc<dyn RemoteLedger>,
    faucet_address: String,
}

impl std::fmt::Debug for SequenceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceCoordinator")
            .field("faucet_address", &self.faucet_address)
            .finish_non_exhaustive()
    }
}

impl SequenceCoordinator {
    pub fn new(
        state: SequenceState,
        remote: Arc<dyn RemoteLedger>,
        faucet_address: impl Into<String>,
    ) -> Self {
        Self {
            state: Mutex::new(state),
            remote,
            faucet_address: faucet_address.into(),
        }
    }

    /// Load the account number and starting sequence from the remote ledger
    pub async fn bootstrap(
        remote: Arc<dyn RemoteLedger>,
        faucet_address: impl Into<String>,
    ) -> FaucetResult<Self> {
        let faucet_address = faucet_address.into();
        let info = remote.query_account(&faucet_address).await?;
        info!(
            "Faucet account {}: account number {}, sequence {}",
            faucet_address, info.account_number, info.sequence
        );

        Ok(Self::new(
            SequenceState {
                sequence: info.sequence,
                account_number: info.account_number,
            },
            remote,
            faucet_address,
        ))
    }

    pub fn faucet_address(&self) -> &str {
        &self.faucet_address
    }

    /// Enter the exclusive signing section, waiting for any in-flight claim
    pub async fn lock(&self) -> SequenceGuard<'_> {
        SequenceGuard {
            state: self.state.lock().await,
            coordinator: self,
        }
    }

    /// Current state, read under the lock
    pub async fn snapshot(&self) -> SequenceState {
        *self.state.lock().await
    }
}

/// Exclusive hold on the faucet's sequence. Releases on drop.
pub struct SequenceGuard<'a> {
    state: MutexGuard<'a, SequenceState>,
    coordinator: &'a SequenceCoordinator,
}

impl SequenceGuard<'_> {
    /// Absorb sequence advances made outside this process; never moves back.
    pub async fn refresh(&mut self) -> FaucetResult<SequenceState> {
        let info = self
            .coordinator
            .remote
            .query_account(&self.coordinator.faucet_address)
            .await?;

        if info.account_number != self.state.account_number {
            warn!(
                "Remote account number {} differs from {}; keeping the startup value",
                info.account_number, self.state.account_number
            );
        }
        if info.sequence > self.state.sequence {
            debug!(
                "Sequence advanced remotely: {} -> {}",
                self.state.sequence, info.sequence
            );
            self.state.sequence = info.sequence;
        }

        Ok(*self.state)
    }

    /// State to sign with while the guard is held
    pub fn acquire_for_signing(&self) -> SequenceState {
        *self.state
    }

    /// Record a successful broadcast and release the section
    pub fn commit(mut self) -> u64 {
        self.state.sequence += 1;
        self.state.sequence
    }

    /// Release without advancing
    pub fn release(self) {}
}
