//! Drip orchestration: one validated claim through reservation, signing and
//! broadcast.

use crate::address::Bech32Address;
use crate::broadcast::{BroadcastMode, BroadcastResult, Broadcaster};
use crate::error::{FaucetError, FaucetResult};
use crate::lcd::{RemoteLedger, TransferRequest};
use crate::ledger::RateLimitLedger;
use crate::sequence::SequenceCoordinator;
use crate::signer::{SignContext, TxSigner};
use crate::tx::Coin;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inbound claim as submitted by the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub address: String,
    pub denom: String,
    #[serde(default, alias = "response")]
    pub verification_response: String,
}

/// A claim whose address and denomination passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClaim {
    pub recipient: Bech32Address,
    pub denom: String,
}

/// Successful drip
#[derive(Debug, Clone, Serialize)]
pub struct DripOutcome {
    pub amount: u64,
    pub denom: String,
    pub recipient: String,
    pub sequence: u64,
    pub response: BroadcastResult,
}

/// Transaction parameters fixed at startup
#[derive(Debug, Clone)]
pub struct DripSettings {
    pub chain_id: String,
    pub memo: String,
    pub fees: Vec<Coin>,
    pub broadcast_mode: BroadcastMode,
}

/// Composes ledger, sequence coordinator, signer and remote ledger per claim
pub struct DripService {
    ledger: RateLimitLedger,
    sequence: SequenceCoordinator,
    remote: Arc<dyn RemoteLedger>,
    broadcaster: Arc<dyn Broadcaster>,
    signer: TxSigner,
    settings: DripSettings,
}

impl std::fmt::Debug for DripService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DripService")
            .field("sequence", &self.sequence)
            .field("signer", &self.signer)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl DripService {
    pub fn new(
        ledger: RateLimitLedger,
        sequence: SequenceCoordinator,
        remote: Arc<dyn RemoteLedger>,
        broadcaster: Arc<dyn Broadcaster>,
        signer: TxSigner,
        settings: DripSettings,
    ) -> Self {
        Self {
            ledger,
            sequence,
            remote,
            broadcaster,
            signer,
            settings,
        }
    }

    pub fn ledger(&self) -> &RateLimitLedger {
        &self.ledger
    }

    pub fn sequence(&self) -> &SequenceCoordinator {
        &self.sequence
    }

    pub fn settings(&self) -> &DripSettings {
        &self.settings
    }

    pub fn faucet_address(&self) -> &str {
        self.sequence.faucet_address()
    }

    /// Decode the address and check the denomination is dispensed
    pub fn validate(&self, claim: &Claim) -> FaucetResult<ValidatedClaim> {
        let recipient = Bech32Address::parse(&claim.address)?;
        if !self.ledger.limits().contains(&claim.denom) {
            return Err(FaucetError::UnknownDenom(claim.denom.clone()));
        }
        Ok(ValidatedClaim {
            recipient,
            denom: claim.denom.clone(),
        })
    }

    pub async fn drip(self: &Arc<Self>, claim: ValidatedClaim) -> FaucetResult<DripOutcome> {
        self.spawn_drip_at(claim, Utc::now()).await
    }

    /// Run [`DripService::drip_at`] on its own task.
    ///
    /// Dropping the returned future (a client hanging up mid-broadcast) does
    /// not abandon the drip: the task keeps the sequence lock until the
    /// broadcast outcome is known and commits or releases it.
    pub async fn spawn_drip_at(
        self: &Arc<Self>,
        claim: ValidatedClaim,
        now: DateTime<Utc>,
    ) -> FaucetResult<DripOutcome> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.drip_at(claim, now).await })
            .await
            .map_err(|e| FaucetError::Internal(anyhow::anyhow!("drip task failed: {}", e)))?
    }

    /// Dispense one drip for `claim` as of `now`.
    ///
    /// The ledger reservation is kept even if a later step fails. The
    /// sequence advances only when the broadcast succeeds.
    pub async fn drip_at(
        &self,
        claim: ValidatedClaim,
        now: DateTime<Utc>,
    ) -> FaucetResult<DripOutcome> {
        let recipient = claim.recipient.encode()?;
        let amount = self
            .ledger
            .limits()
            .drip_amount(&claim.denom)
            .ok_or_else(|| FaucetError::UnknownDenom(claim.denom.clone()))?;

        let mut guard = self.sequence.lock().await;

        let ledger = self.ledger.clone();
        let account = claim.recipient.account().clone();
        let denom = claim.denom.clone();
        tokio::task::spawn_blocking(move || ledger.check_and_reserve(&account, &denom, now))
            .await
            .map_err(|e| FaucetError::Internal(anyhow::anyhow!("ledger task failed: {}", e)))??;

        let state = guard.refresh().await?;

        let unsigned = self
            .remote
            .build_transfer(&TransferRequest {
                from: self.faucet_address().to_string(),
                to: recipient.clone(),
                memo: self.settings.memo.clone(),
                chain_id: self.settings.chain_id.clone(),
                sequence: state.sequence,
                fees: self.settings.fees.clone(),
                amount: vec![Coin::new(claim.denom.as_str(), amount)],
            })
            .await?;

        let signed = self.signer.sign_tx(
            unsigned,
            SignContext {
                chain_id: &self.settings.chain_id,
                account_number: state.account_number,
                sequence: state.sequence,
            },
        )?;

        let response = match self
            .broadcaster
            .submit(&signed, self.settings.broadcast_mode)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    "Broadcast of {} {} to {} at sequence {} failed: {}",
                    amount, claim.denom, recipient, state.sequence, err
                );
                guard.release();
                return Err(err.into());
            }
        };

        let next = guard.commit();
        info!(
            "{} {} [1] {} {} (sequence {}, next {})",
            now.to_rfc3339(),
            recipient,
            amount,
            claim.denom,
            state.sequence,
            next
        );
        debug!("Broadcast response: {}", response);

        Ok(DripOutcome {
            amount,
            denom: claim.denom,
            recipient,
            sequence: state.sequence,
            response,
        })
    }
}
