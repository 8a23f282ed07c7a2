//! Client for the remote ledger's light-client daemon (LCD) REST API.

use crate::error::{FaucetError, FaucetResult};
use crate::tx::{Coin, StdTx};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::debug;

/// Sequence and account number of an account, as the chain sees them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Parameters of an unsigned transfer skeleton request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub memo: String,
    pub chain_id: String,
    pub sequence: u64,
    pub fees: Vec<Coin>,
    pub amount: Vec<Coin>,
}

/// Account queries and transaction building against the remote ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteLedger: Send + Sync {
    /// Current sequence and account number of `address`
    async fn query_account(&self, address: &str) -> FaucetResult<AccountInfo>;

    /// Unsigned transfer transaction for `request`
    async fn build_transfer(&self, request: &TransferRequest) -> FaucetResult<StdTx>;
}

#[derive(Serialize)]
struct BaseReq<'a> {
    from: &'a str,
    memo: &'a str,
    chain_id: &'a str,
    sequence: String,
    fees: &'a [Coin],
}

#[derive(Serialize)]
struct TransferBody<'a> {
    base_req: BaseReq<'a>,
    amount: &'a [Coin],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AccountResponse {
    Wrapped { result: AccountEnvelope },
    Bare(AccountEnvelope),
}

#[derive(Deserialize)]
struct AccountEnvelope {
    value: AccountValue,
}

#[derive(Deserialize)]
struct AccountValue {
    #[serde(deserialize_with = "u64_from_string_or_number")]
    account_number: u64,
    #[serde(deserialize_with = "u64_from_string_or_number")]
    sequence: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnsignedTxResponse {
    Wrapped { value: StdTx },
    Bare(StdTx),
}

impl UnsignedTxResponse {
    fn into_tx(self) -> StdTx {
        match self {
            UnsignedTxResponse::Wrapped { value } => value,
            UnsignedTxResponse::Bare(tx) => tx,
        }
    }
}

fn u64_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Parse an account query response body
pub fn parse_account(body: &str) -> FaucetResult<AccountInfo> {
    let response: AccountResponse = serde_json::from_str(body)
        .map_err(|e| FaucetError::Parse(format!("account response: {}", e)))?;
    let value = match response {
        AccountResponse::Wrapped { result } => result.value,
        AccountResponse::Bare(envelope) => envelope.value,
    };
    Ok(AccountInfo {
        account_number: value.account_number,
        sequence: value.sequence,
    })
}

/// Parse an unsigned transaction response body
pub fn parse_unsigned_tx(body: &str) -> FaucetResult<StdTx> {
    serde_json::from_str::<UnsignedTxResponse>(body)
        .map(UnsignedTxResponse::into_tx)
        .map_err(|e| FaucetError::Parse(format!("unsigned transaction: {}", e)))
}

/// Build the shared HTTP client with a bounded per-request timeout
pub fn http_client(timeout: Duration) -> FaucetResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FaucetError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))
}

/// reqwest-backed LCD client
#[derive(Debug, Clone)]
pub struct LcdClient {
    client: Client,
    base_url: String,
}

impl LcdClient {
    pub fn new(base_url: &str, timeout: Duration) -> FaucetResult<Self> {
        Self::with_client(base_url, http_client(timeout)?)
    }

    pub fn with_client(base_url: &str, client: Client) -> FaucetResult<Self> {
        url::Url::parse(base_url).map_err(|e| {
            FaucetError::Internal(anyhow::anyhow!("Invalid LCD URL {}: {}", base_url, e))
        })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RemoteLedger for LcdClient {
    async fn query_account(&self, address: &str) -> FaucetResult<AccountInfo> {
        let url = format!("{}/auth/accounts/{}", self.base_url, address);
        debug!("Querying account: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error("account query", e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("account query", e))?;

        if status != StatusCode::OK {
            return Err(FaucetError::RemoteQuery(format!(
                "status: {}, message: {}",
                status, body
            )));
        }

        parse_account(&body)
    }

    async fn build_transfer(&self, request: &TransferRequest) -> FaucetResult<StdTx> {
        let url = format!("{}/bank/accounts/{}/transfers", self.base_url, request.to);
        let body = TransferBody {
            base_req: BaseReq {
                from: &request.from,
                memo: &request.memo,
                chain_id: &request.chain_id,
                sequence: request.sequence.to_string(),
                fees: &request.fees,
            },
            amount: &request.amount,
        };
        debug!("Building transfer at sequence {}: {}", request.sequence, url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("transfer build", e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error("transfer build", e))?;

        if status != StatusCode::OK {
            return Err(FaucetError::BuildTx(format!(
                "status: {}, message: {}",
                status, text
            )));
        }

        parse_unsigned_tx(&text)
    }
}

fn transport_error(what: &str, err: reqwest::Error) -> FaucetError {
    FaucetError::Transient(format!("{} failed: {}", what, err))
}
