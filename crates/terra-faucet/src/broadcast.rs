//! Submission of signed transactions to the remote ledger.
//!
//! Nothing here retries: a retry has to go back through the sequence
//! coordinator, otherwise the same sequence could be signed twice.

use crate::tx::StdTx;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Broadcast outcome classification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("status: {status}, message: {body}")]
    Rejected { status: u16, body: String },

    #[error("broadcast did not complete: {0}")]
    Transient(String),
}

/// How long the remote ledger holds the request before answering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    /// Return immediately after the transaction is accepted for relay
    #[default]
    Async,
    /// Return after the mempool check
    Sync,
    /// Return after the transaction is committed in a block
    Block,
}

impl fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self {
            BroadcastMode::Async => "async",
            BroadcastMode::Sync => "sync",
            BroadcastMode::Block => "block",
        };
        f.write_str(mode)
    }
}

impl FromStr for BroadcastMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "async" => Ok(BroadcastMode::Async),
            "sync" => Ok(BroadcastMode::Sync),
            "block" => Ok(BroadcastMode::Block),
            other => Err(format!("unknown broadcast mode: {}", other)),
        }
    }
}

/// Opaque remote response to a successful broadcast
pub type BroadcastResult = serde_json::Value;

#[derive(Serialize)]
struct BroadcastRequest<'a> {
    tx: &'a StdTx,
    mode: BroadcastMode,
}

/// Submits signed transactions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn submit(
        &self,
        tx: &StdTx,
        mode: BroadcastMode,
    ) -> Result<BroadcastResult, BroadcastError>;
}

/// Classify a completed HTTP exchange.
///
/// A 200 means the remote took the transaction, so a body that is not JSON is
/// passed through as a string rather than reported as a failure.
pub fn classify_response(status: u16, body: &str) -> Result<BroadcastResult, BroadcastError> {
    if status != StatusCode::OK.as_u16() {
        return Err(BroadcastError::Rejected {
            status,
            body: body.to_string(),
        });
    }
    Ok(serde_json::from_str(body).unwrap_or_else(|e| {
        debug!("Broadcast response is not JSON ({}), keeping raw body", e);
        BroadcastResult::String(body.to_string())
    }))
}

/// reqwest-backed broadcaster posting to `{lcd}/txs`
#[derive(Debug, Clone)]
pub struct BroadcastClient {
    client: Client,
    url: String,
}

impl BroadcastClient {
    pub fn new(client: Client, lcd_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/txs", lcd_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl Broadcaster for BroadcastClient {
    async fn submit(
        &self,
        tx: &StdTx,
        mode: BroadcastMode,
    ) -> Result<BroadcastResult, BroadcastError> {
        debug!("Broadcasting transaction ({} mode) to {}", mode, self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&BroadcastRequest { tx, mode })
            .send()
            .await
            .map_err(|e| BroadcastError::Transient(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| BroadcastError::Transient(e.to_string()))?;

        let result = classify_response(status, &body);
        if let Err(err) = &result {
            warn!("Broadcast failed: {}", err);
        }
        result
    }
}
