//! HTTP server and API endpoints for the faucet server.

use crate::{
    broadcast::{BroadcastClient, BroadcastResult},
    captcha::{DisabledVerifier, HumanVerifier, RecaptchaVerifier},
    config::FaucetConfig,
    drip::{Claim, DripService, DripSettings},
    error::{FaucetError, FaucetResult},
    lcd::{http_client, LcdClient, RemoteLedger},
    ledger::RateLimitLedger,
    sequence::SequenceCoordinator,
    signer::TxSigner,
};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    net::{IpAddr, SocketAddr},
    path::Path,
    sync::Arc,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct SharedState {
    pub drip: Arc<DripService>,
    pub verifier: Arc<dyn HumanVerifier>,
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("drip", &self.drip)
            .finish_non_exhaustive()
    }
}

/// Response after a successful claim
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub amount: u64,
    pub response: BroadcastResult,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub ledger_accounts: usize,
}

/// Operator view of the faucet account
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub faucet_address: String,
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub denoms: BTreeMap<String, DenomStatus>,
}

#[derive(Debug, Serialize)]
pub struct DenomStatus {
    pub drip_amount: u64,
    pub daily_cap: u64,
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: SharedState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/claim", post(claim))
        .route("/health", get(health))
        .route("/status", get(status))
        .fallback_service(ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let stats = state.drip.ledger().get_stats();
    Json(HealthResponse {
        status: "healthy".to_string(),
        ledger_accounts: stats.accounts,
    })
}

/// Faucet account and denomination table
async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let sequence = state.drip.sequence().snapshot().await;
    let denoms = state
        .drip
        .ledger()
        .limits()
        .iter()
        .map(|(denom, limit)| {
            (
                denom.to_string(),
                DenomStatus {
                    drip_amount: limit.drip_amount,
                    daily_cap: limit.window_cap,
                },
            )
        })
        .collect();

    Json(StatusResponse {
        faucet_address: state.drip.faucet_address().to_string(),
        chain_id: state.drip.settings().chain_id.clone(),
        account_number: sequence.account_number,
        sequence: sequence.sequence,
        denoms,
    })
}

/// Dispense one drip to the claimed address
async fn claim(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<Claim>, JsonRejection>,
) -> FaucetResult<Json<ClaimResponse>> {
    let Json(claim) = payload.map_err(|e| FaucetError::Validation(e.body_text()))?;
    let client_ip = client_ip(&headers, addr);
    info!("Claim from {}: {} {}", client_ip, claim.address, claim.denom);

    let validated = state.drip.validate(&claim)?;

    if !state
        .verifier
        .verify(&claim.verification_response, Some(client_ip))
        .await?
    {
        debug!("Verification failed for {}", client_ip);
        return Err(FaucetError::VerificationFailed);
    }

    let outcome = state.drip.drip(validated).await.map_err(|e| {
        match &e {
            FaucetError::Throttled { .. } | FaucetError::QuotaExceeded { .. } => {
                debug!("Claim for {} rejected: {}", claim.address, e)
            }
            _ => warn!("Claim for {} failed: {}", claim.address, e),
        }
        e
    })?;

    Ok(Json(ClaimResponse {
        amount: outcome.amount,
        response: outcome.response,
    }))
}

/// Client address as seen by the proxy in front of us, else the peer address
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    };

    forwarded.or_else(real_ip).unwrap_or_else(|| peer.ip())
}

/// Wire the faucet together from configuration
pub async fn build_state(config: &FaucetConfig) -> FaucetResult<SharedState> {
    let signer = TxSigner::from_hex(&config.wallet.private_key)?;
    let faucet_address = signer.address(&config.wallet.account_prefix)?;
    info!("Faucet address: {}", faucet_address);

    let client = http_client(config.lcd_timeout())?;
    let remote: Arc<dyn RemoteLedger> =
        Arc::new(LcdClient::with_client(&config.lcd.url, client.clone())?);
    let broadcaster = Arc::new(BroadcastClient::new(client.clone(), &config.lcd.url));

    info!("Loading faucet account from {}", config.lcd.url);
    let sequence = SequenceCoordinator::bootstrap(remote.clone(), faucet_address).await?;

    let ledger = RateLimitLedger::open(
        &config.ledger.db_path,
        config.denom_limits(),
        config.request_interval(),
    )?;
    if ledger.was_recovered() {
        info!("Recovered {} ledger entries", ledger.get_stats().accounts);
    }

    let verifier: Arc<dyn HumanVerifier> = if config.captcha.enabled {
        Arc::new(RecaptchaVerifier::new(
            client,
            config.captcha.secret.clone(),
            config.captcha.verify_url.clone(),
        ))
    } else {
        warn!("Captcha verification is disabled");
        Arc::new(DisabledVerifier)
    };

    let settings = DripSettings {
        chain_id: config.lcd.chain_id.clone(),
        memo: config.drip.memo.clone(),
        fees: config.fees(),
        broadcast_mode: config.lcd.broadcast_mode,
    };

    Ok(SharedState {
        drip: Arc::new(DripService::new(
            ledger,
            sequence,
            remote,
            broadcaster,
            signer,
            settings,
        )),
        verifier,
    })
}

/// Start the HTTP server
pub async fn start_server(config: &FaucetConfig) -> FaucetResult<()> {
    info!("Starting faucet server...");

    let shared_state = build_state(config).await?;
    let app = create_router(shared_state, &config.http.static_dir);

    // Bind and serve
    let bind_addr = format!("{}:{}", config.http.bind_address, config.http.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| FaucetError::Internal(anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e)))?;

    info!("Faucet server listening on {}", bind_addr);
    info!("Endpoints:");
    info!("  POST /claim    - Request a drip");
    info!("  GET  /health   - Health check");
    info!("  GET  /status   - Faucet account status");
    info!("  GET  /*        - Frontend from {}", config.http.static_dir);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| FaucetError::Internal(anyhow::anyhow!("Server error: {}", e)))?;

    info!("Faucet server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
