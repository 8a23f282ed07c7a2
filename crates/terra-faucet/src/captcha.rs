//! Human verification of claims via reCAPTCHA.

use crate::error::{FaucetError, FaucetResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Confirms that a claim was made by a person
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HumanVerifier: Send + Sync {
    /// `true` if the verification response token is valid
    async fn verify(&self, response: &str, remote_ip: Option<IpAddr>) -> FaucetResult<bool>;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// Google reCAPTCHA `siteverify` client
#[derive(Debug, Clone)]
pub struct RecaptchaVerifier {
    client: Client,
    secret: String,
    verify_url: String,
}

impl RecaptchaVerifier {
    pub fn new(client: Client, secret: impl Into<String>, verify_url: impl Into<String>) -> Self {
        Self {
            client,
            secret: secret.into(),
            verify_url: verify_url.into(),
        }
    }
}

#[async_trait]
impl HumanVerifier for RecaptchaVerifier {
    async fn verify(&self, response: &str, remote_ip: Option<IpAddr>) -> FaucetResult<bool> {
        if response.is_empty() {
            return Ok(false);
        }

        let mut form = vec![("secret", self.secret.clone()), ("response", response.to_string())];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip.to_string()));
        }

        let reply = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| FaucetError::Transient(format!("captcha verification failed: {}", e)))?;
        let reply: SiteVerifyResponse = reply
            .json()
            .await
            .map_err(|e| FaucetError::Parse(format!("captcha verification response: {}", e)))?;

        if !reply.success {
            warn!("Captcha rejected: {:?}", reply.error_codes);
        } else {
            debug!("Captcha accepted");
        }
        Ok(reply.success)
    }
}

/// Accepts every claim; used when verification is switched off
#[derive(Debug, Clone, Default)]
pub struct DisabledVerifier;

#[async_trait]
impl HumanVerifier for DisabledVerifier {
    async fn verify(&self, _response: &str, _remote_ip: Option<IpAddr>) -> FaucetResult<bool> {
        Ok(true)
    }
}
